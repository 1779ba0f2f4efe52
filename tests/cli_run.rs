//! Integration tests for the pipewarden runner
//!
//! **Feature: pipewarden-cli, Configured run end to end**

#![cfg(unix)]

use std::io::Write;

use pipewarden_cli::{output::OutputStyle, runner, CliError, RunConfig};

const PREFIX: &str = "PIPEWARDEN_IT_NOTHING_SET";

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn configured_script_sees_only_its_environment() {
    let file = write_config(
        r#"
command = "/bin/sh"
args = ["-c", "cat; echo \"key=$MYKEY home=$HOME\""]
input = "a\nb\nc\n"
env = ["MYKEY=MYVALUE"]
color = false
"#,
    );
    let config = RunConfig::load_from(file.path(), PREFIX).unwrap();
    let style = OutputStyle::with_colors(config.color);
    let (mut out, mut err) = (Vec::new(), Vec::new());

    let outcome = runner::run(&config, &style, &mut out, &mut err).await.unwrap();

    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.starts_with("a\nb\nc\n"));
    assert!(stdout.contains("home=\n"));
    assert!(stdout.contains("key=MYVALUE"));
    assert!(err.is_empty());
    assert_eq!(runner::exit_code(&outcome), 0);
}

#[tokio::test]
async fn env_names_reach_the_child_unchanged() {
    // Only the command is set, so no default args or input are added
    let file = write_config(
        r#"
command = "/usr/bin/env"
env = ["MYKEY=MYVALUE", "PATH=/usr/bin:/bin"]
color = false
"#,
    );
    let config = RunConfig::load_from(file.path(), PREFIX).unwrap();
    assert!(config.args.is_empty());
    assert_eq!(config.input, None);

    let style = OutputStyle::with_colors(config.color);
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let outcome = runner::run(&config, &style, &mut out, &mut err).await.unwrap();

    let mut lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["MYKEY=MYVALUE", "PATH=/usr/bin:/bin"]);
    assert!(err.is_empty(), "stderr: {}", String::from_utf8_lossy(&err));
    assert!(outcome.is_success());
}

#[tokio::test]
async fn timeout_from_config_stops_the_child() {
    let file = write_config(
        r#"
command = "/bin/sh"
args = ["-c", "sleep 30"]
timeout_ms = 200
inherit = ["PATH"]
color = false
"#,
    );
    let config = RunConfig::load_from(file.path(), PREFIX).unwrap();
    let style = OutputStyle::with_colors(config.color);
    let (mut out, mut err) = (Vec::new(), Vec::new());

    let outcome = runner::run(&config, &style, &mut out, &mut err).await.unwrap();

    assert!(outcome.error().is_some());
    assert_eq!(runner::exit_code(&outcome), 1);
}

#[tokio::test]
async fn unknown_executable_is_reported() {
    let file = write_config("command = \"/no/such/executable\"\n");
    let config = RunConfig::load_from(file.path(), PREFIX).unwrap();
    let style = OutputStyle::with_colors(Some(false));
    let (mut out, mut err) = (Vec::new(), Vec::new());

    let err = runner::run(&config, &style, &mut out, &mut err)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Process(ref e) if e.is_start_error()));
}
