//! `fetchq config` – print the effective configuration.

use anyhow::Result;
use fetchq_core::config::{self, FetchqConfig};

pub fn run_config(cfg: &FetchqConfig) -> Result<()> {
    if let Ok(path) = config::config_path() {
        println!("# {}", path.display());
    }
    println!("# effective pool size: {}", cfg.effective_pool_size());
    print!("{}", render(cfg)?);
    Ok(())
}

fn render(cfg: &FetchqConfig) -> Result<String> {
    Ok(toml::to_string_pretty(cfg)?)
}
