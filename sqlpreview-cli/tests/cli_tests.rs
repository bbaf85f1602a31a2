//! Integration tests for the sqlpreview CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the sqlpreview binary with a clean CI environment
#[allow(deprecated)]
fn sqlpreview_cmd() -> Command {
    let mut cmd = Command::cargo_bin("sqlpreview").unwrap();
    for var in [
        "GITHUB_ACTIONS",
        "GITHUB_EVENT_NAME",
        "GITHUB_EVENT_PATH",
        "GITHUB_OUTPUT",
        "GITHUB_REPOSITORY",
        "GITHUB_WORKSPACE",
        "INPUT_GITHUB_TOKEN",
        "SQLPREVIEW_CONFIG",
        "SQLPREVIEW_DEBUG",
        "SQLPREVIEW_LOG_LEVEL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_command() {
    sqlpreview_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: sqlpreview <COMMAND>"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_version_command() {
    sqlpreview_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("psqldef"));
}

#[test]
fn test_preview_help() {
    sqlpreview_cmd()
        .args(["preview", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--kind"))
        .stdout(predicate::str::contains("--schema-file"))
        .stdout(predicate::str::contains("--baseline-file"))
        .stdout(predicate::str::contains("--github-token"));
}

#[test]
fn test_unsupported_kind_fails_before_download() {
    let temp_dir = TempDir::new().unwrap();

    sqlpreview_cmd()
        .current_dir(temp_dir.path())
        .args([
            "preview",
            "--kind",
            "oracle",
            "--schema-file",
            "schema.sql",
            "--database",
            "app",
            // Nothing listens here; reaching it would fail differently.
            "--release-base-url",
            "http://127.0.0.1:9/releases",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unsupported database kind 'oracle'"));
}

#[test]
fn test_missing_database_fails_before_download() {
    let temp_dir = TempDir::new().unwrap();

    sqlpreview_cmd()
        .current_dir(temp_dir.path())
        .args([
            "preview",
            "--kind",
            "postgresql",
            "--schema-file",
            "schema.sql",
            "--release-base-url",
            "http://127.0.0.1:9/releases",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required parameter: database"));
}

#[test]
fn test_invalid_config_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("sqlpreview.toml"), "[database\n").unwrap();

    sqlpreview_cmd()
        .current_dir(temp_dir.path())
        .args(["preview", "--kind", "mysql"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse TOML"));
}

#[cfg(unix)]
mod end_to_end {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use sqlpreview_engine::{DatabaseKind, Platform, ToolSpec, ToolVersion};

    /// A tar.gz holding a shell script that stands in for sqlite3def.
    fn engine_archive(script: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(script.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "sqlite3def", script.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_preview_with_downloaded_engine() {
        let platform = match Platform::host() {
            Ok(platform) => platform,
            Err(_) => return,
        };
        let asset = ToolSpec::new(DatabaseKind::Sqlite, ToolVersion::Latest, platform).asset_name();

        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", format!("/latest/download/{}", asset).as_str())
            .with_status(200)
            .with_body(engine_archive(
                "#!/bin/sh\necho '-- dry run --'\necho 'ALTER TABLE users ADD COLUMN email text;'\n",
            ))
            .create();

        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("schema.sql"),
            "CREATE TABLE users (id int, username text, email text);\n",
        )
        .unwrap();
        let outputs = temp_dir.path().join("github_output");
        let url = server.url();

        sqlpreview_cmd()
            .current_dir(temp_dir.path())
            .env("GITHUB_OUTPUT", &outputs)
            .args([
                "preview",
                "--kind",
                "sqlite",
                "--schema-file",
                "schema.sql",
                "--database",
                "app.db",
                "--release-base-url",
                url.as_str(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("ALTER TABLE users ADD COLUMN email text;"))
            .stdout(predicate::str::contains("Not a pull request run"));

        let written = fs::read_to_string(&outputs).unwrap();
        assert!(written.starts_with("has_changes=true\nddl<<SQLPREVIEW_EOF\n"));
        assert!(written.contains("ALTER TABLE users ADD COLUMN email text;"));
    }

    #[test]
    fn test_failing_engine_exits_non_zero() {
        let platform = match Platform::host() {
            Ok(platform) => platform,
            Err(_) => return,
        };
        let asset = ToolSpec::new(DatabaseKind::Sqlite, ToolVersion::Latest, platform).asset_name();

        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", format!("/latest/download/{}", asset).as_str())
            .with_status(200)
            .with_body(engine_archive("#!/bin/sh\necho 'near \"CREAT\": syntax error' >&2\nexit 1\n"))
            .create();

        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("schema.sql"), "CREAT TABLE users;\n").unwrap();
        let url = server.url();

        sqlpreview_cmd()
            .current_dir(temp_dir.path())
            .args([
                "preview",
                "--kind",
                "sqlite",
                "--schema-file",
                "schema.sql",
                "--database",
                "app.db",
                "--release-base-url",
                url.as_str(),
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("syntax error"));
    }
}
