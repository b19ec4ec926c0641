use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Whole-transfer timeout of new requests when the config does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Global configuration loaded from `~/.config/fetchq/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchqConfig {
    /// Number of fetch workers. Fixed for the lifetime of a queue; when
    /// missing, `max(available_parallelism, 4)` is used.
    #[serde(default)]
    pub pool_size: Option<usize>,
    /// Default whole-transfer timeout in seconds for new requests (0 = none).
    pub timeout_secs: u64,
    /// Connect timeout in seconds applied by every worker.
    pub connect_timeout_secs: u64,
    /// Follow HTTP redirects.
    pub follow_redirects: bool,
    /// Redirect limit when `follow_redirects` is set.
    pub max_redirects: u32,
    /// User-Agent header sent by the workers.
    pub user_agent: String,
}

impl Default for FetchqConfig {
    fn default() -> Self {
        Self {
            pool_size: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: 15,
            follow_redirects: true,
            max_redirects: 10,
            user_agent: format!("fetchq/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchqConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Pool size to build the queue with; never below 1.
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size
            .unwrap_or_else(crate::worker::default_pool_size)
            .max(1)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from(&path)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<FetchqConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: FetchqConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = FetchqConfig::default();
        assert!(cfg.pool_size.is_none());
        assert_eq!(cfg.timeout_secs, 60);
        assert_eq!(cfg.connect_timeout_secs, 15);
        assert!(cfg.follow_redirects);
        assert!(cfg.user_agent.starts_with("fetchq/"));
        assert!(cfg.effective_pool_size() >= 4);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = FetchqConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: FetchqConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            pool_size = 2
            timeout_secs = 5
            connect_timeout_secs = 3
            follow_redirects = false
            max_redirects = 0
            user_agent = "test-agent"
        "#;
        let cfg: FetchqConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.pool_size, Some(2));
        assert_eq!(cfg.effective_pool_size(), 2);
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(3));
        assert!(!cfg.follow_redirects);
        assert_eq!(cfg.user_agent, "test-agent");
    }

    #[test]
    fn zero_pool_size_is_clamped() {
        let cfg = FetchqConfig {
            pool_size: Some(0),
            ..FetchqConfig::default()
        };
        assert_eq!(cfg.effective_pool_size(), 1);
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            timeout_secs = 9
            connect_timeout_secs = 1
            follow_redirects = true
            max_redirects = 3
            user_agent = "x"
            "#,
        )
        .unwrap();
        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.timeout_secs, 9);
        assert!(cfg.pool_size.is_none());
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "pool_size = \"many\"").unwrap();
        assert!(load_from(&path).is_err());
    }
}
