//! Unit tests for CLI commands

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::commands::parse_request;
use crate::cli::{run, Cli, Commands};
use clap::Parser;
use http::Method;
use std::fs;
use std::path::Path;

const PAGES: &str = r#"
{% fragment "GET /user/{id} GetUser(ctx, id)" %}<h1>{{ data.result() }}</h1>{% endfragment %}
{% fragment "GET /login" %}{{ data.redirect("/", 303) }}{% endfragment %}
{% fragment "GET /" %}home{% endfragment %}
"#;

fn project(pages: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("ui")).unwrap();
    fs::write(dir.path().join("ui").join("pages.html"), pages).unwrap();
    fs::write(
        dir.path().join("fragmux.toml"),
        "templates = \"ui\"\noutput = \"out/template_routes.rs\"\n",
    )
    .unwrap();
    dir
}

fn run_args(args: &[&str]) -> (anyhow::Result<()>, String) {
    let cli = Cli::try_parse_from(args).unwrap();
    let mut out = Vec::new();
    let result = run(&cli, &mut out);
    (result, String::from_utf8(out).unwrap())
}

fn config_arg(dir: &Path) -> String {
    dir.join("fragmux.toml").to_string_lossy().into_owned()
}

#[test]
fn test_generate_command_with_flags() {
    let cli = Cli::try_parse_from([
        "fragmux-gen",
        "generate",
        "--templates",
        "ui",
        "--receiver",
        "Server",
        "--output",
        "src/template_routes.rs",
        "--dry-run",
        "--format",
    ])
    .unwrap();

    match cli.command {
        Commands::Generate {
            source,
            output,
            dry_run,
            format,
        } => {
            assert_eq!(source.templates.unwrap().to_string_lossy(), "ui");
            assert_eq!(source.receiver.as_deref(), Some("Server"));
            assert_eq!(output.unwrap().to_string_lossy(), "src/template_routes.rs");
            assert!(dry_run);
            assert!(format);
        }
        _ => panic!("Expected Generate command"),
    }
}

#[test]
fn test_all_commands_parse() {
    let commands = vec![
        vec!["fragmux-gen", "generate"],
        vec!["fragmux-gen", "check", "--types", "types.yaml"],
        vec!["fragmux-gen", "routes", "--match", "GET /user/1"],
        vec!["fragmux-gen", "--log-level", "debug", "check"],
    ];
    for args in commands {
        assert!(Cli::try_parse_from(&args).is_ok(), "failed to parse {args:?}");
    }
    assert!(Cli::try_parse_from(["fragmux-gen", "serve"]).is_err());
}

#[test]
fn test_parse_request() {
    assert_eq!(
        parse_request("GET /user/42").unwrap(),
        (Method::GET, String::new(), "/user/42".to_string())
    );
    assert_eq!(
        parse_request("POST example.com/login").unwrap(),
        (Method::POST, "example.com".to_string(), "/login".to_string())
    );
    assert_eq!(parse_request("/").unwrap().0, Method::GET);
    assert!(parse_request("GET user").is_err());
}

#[test]
fn test_generate_writes_output() {
    let dir = project(PAGES);
    let config = config_arg(dir.path());
    let (result, stdout) = run_args(&["fragmux-gen", "generate", "--config", &config]);
    result.unwrap();
    assert!(stdout.is_empty());

    let written = fs::read_to_string(dir.path().join("out").join("template_routes.rs")).unwrap();
    assert!(written.contains("pub trait RoutesReceiver {"));
    assert!(written.contains("fn GetUser(&self, ctx: &Context, id: String) -> serde_json::Value;"));
}

#[test]
fn test_generate_dry_run_prints_module() {
    let dir = project(PAGES);
    let config = config_arg(dir.path());
    let (result, stdout) = run_args(&[
        "fragmux-gen",
        "generate",
        "--config",
        &config,
        "--dry-run",
        "--interface",
        "Pages",
    ]);
    result.unwrap();
    assert!(stdout.contains("pub trait Pages {"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_check_reports_every_issue() {
    let dir = project(
        r#"
{% fragment "GET /a" %}a{% endfragment %}
{% fragment "GET  /a" %}b{% endfragment %}
{% fragment "GET /b/{id} Show(id, missing)" %}c{% endfragment %}
"#,
    );
    let config = config_arg(dir.path());
    let (result, stdout) = run_args(&["fragmux-gen", "check", "--config", &config]);
    let err = result.unwrap_err();
    assert!(err.to_string().contains("issue(s) found"));
    assert!(stdout.contains("duplicate route pattern \"GET /a\""));
    assert!(stdout.lines().all(|line| line.starts_with("error: ")));
}

#[test]
fn test_check_ok() {
    let dir = project(PAGES);
    let config = config_arg(dir.path());
    let (result, stdout) = run_args(&["fragmux-gen", "check", "--config", &config]);
    result.unwrap();
    assert_eq!(stdout, "ok: 3 route(s), 1 interface method(s)\n");
}

#[test]
fn test_routes_lists_definitions() {
    let dir = project(PAGES);
    let config = config_arg(dir.path());
    let (result, stdout) = run_args(&["fragmux-gen", "routes", "--config", &config]);
    result.unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("GET /user/{id}"));
    assert!(lines[0].contains("GetUser(&Context, String) -> serde_json::Value"));
    assert!(lines[1].ends_with("redirect"));
    assert!(!lines[2].ends_with("redirect"));
}

#[test]
fn test_routes_match() {
    let dir = project(PAGES);
    let config = config_arg(dir.path());
    let (result, stdout) = run_args(&[
        "fragmux-gen",
        "routes",
        "--config",
        &config,
        "--match",
        "GET /user/42",
    ]);
    result.unwrap();
    assert_eq!(stdout, "GET /user/{id} -> GetUser\n  id = 42\n");

    let (result, _) = run_args(&[
        "fragmux-gen",
        "routes",
        "--config",
        &config,
        "--match",
        "POST /user/42",
    ]);
    assert!(result.unwrap_err().to_string().contains("no route matches"));
}
