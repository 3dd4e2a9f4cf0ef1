//! CLI surface tests
//!
//! None of these start a browser: they stop at argument parsing or at
//! browser discovery.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

fn console_browser() -> Command {
    let mut cmd = Command::cargo_bin("console-browser").unwrap();
    cmd.env_remove("CONSOLE_BROWSER_BROWSER_PATH")
        .env_remove("CONSOLE_BROWSER_URL")
        .env_remove("CONSOLE_BROWSER_MAX_CHARS");
    cmd
}

mod help {
    use super::*;

    #[test]
    fn shows_help_with_all_flags() {
        console_browser()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--url"))
            .stdout(predicate::str::contains("--once"))
            .stdout(predicate::str::contains("--max-chars"))
            .stdout(predicate::str::contains("--user-data-dir"))
            .stdout(predicate::str::contains("--render"));
    }

    #[test]
    fn shows_version() {
        console_browser()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("console-browser"));
    }
}

mod arguments {
    use super::*;

    #[test]
    fn render_mode_must_be_known() {
        console_browser()
            .args(["--render", "xml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("xml"));
    }

    #[test]
    fn max_chars_must_be_a_number() {
        console_browser()
            .args(["--max-chars", "abc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--max-chars"));
    }

    #[test]
    fn once_needs_a_command() {
        console_browser().arg("--once").assert().failure();
    }
}

mod startup {
    use super::*;

    #[test]
    fn missing_browser_executable_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        console_browser()
            .args(["--browser-path", "/definitely/not/a/browser"])
            .arg("--config")
            .arg(dir.path().join("absent.toml"))
            .args(["--once", "title"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Browser not found at"));
    }

    #[test]
    fn broken_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[render]\nmax_chars = \"lots\"\n").unwrap();

        console_browser()
            .arg("--config")
            .arg(&path)
            .args(["--once", "title"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration error"));
    }
}
