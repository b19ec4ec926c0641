//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_get_single() {
    match parse(&["fetchq", "get", "https://example.com/a"]) {
        CliCommand::Get {
            urls,
            post,
            referer,
            timeout,
            attrs,
            files,
            workers,
            json,
        } => {
            assert_eq!(urls, vec!["https://example.com/a"]);
            assert!(!post);
            assert!(referer.is_none());
            assert!(timeout.is_none());
            assert!(attrs.is_empty());
            assert!(files.is_empty());
            assert!(workers.is_none());
            assert!(!json);
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_get_all_flags() {
    match parse(&[
        "fetchq",
        "get",
        "https://example.com/a",
        "https://example.com/b",
        "--post",
        "--referer",
        "https://example.com/",
        "--timeout",
        "9",
        "--attr",
        "a=1",
        "--attr",
        "b=2",
        "--file",
        "doc=/tmp/doc.txt",
        "--workers",
        "6",
        "--json",
    ]) {
        CliCommand::Get {
            urls,
            post,
            referer,
            timeout,
            attrs,
            files,
            workers,
            json,
        } => {
            assert_eq!(urls.len(), 2);
            assert!(post);
            assert_eq!(referer.as_deref(), Some("https://example.com/"));
            assert_eq!(timeout, Some(9));
            assert_eq!(attrs, vec!["a=1", "b=2"]);
            assert_eq!(files, vec!["doc=/tmp/doc.txt"]);
            assert_eq!(workers, Some(6));
            assert!(json);
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_get_requires_url() {
    assert!(Cli::try_parse_from(["fetchq", "get"]).is_err());
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["fetchq", "config"]), CliCommand::Config));
}
