//! Integration tests for the CLI binary.
//!
//! Drives the `wipa` binary against a temporary home directory.
//!
//! This test is registered as a [[test]] in the wip-alerts-cli crate
//! so that CARGO_BIN_EXE_wipa is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `wipa` binary.
fn wipa_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wipa"))
}

/// Run `wipa --home <home> <args>`.
fn wipa(home: &Path, args: &[&str]) -> Output {
    wipa_binary()
        .arg("--home")
        .arg(home)
        .args(args)
        .output()
        .expect("failed to execute wipa")
}

/// Run and require success, returning stdout.
fn wipa_ok(home: &Path, args: &[&str]) -> String {
    let output = wipa(home, args);
    assert!(
        output.status.success(),
        "wipa {args:?} failed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Value of the first `  <label>: <value>` line.
fn field(stdout: &str, label: &str) -> String {
    let prefix = format!("{label}:");
    stdout
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(&prefix))
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| panic!("no {label} in output: {stdout}"))
}

fn init_home() -> tempfile::TempDir {
    let home = tempfile::tempdir().unwrap();
    wipa_ok(home.path(), &["init"]);
    home
}

#[test]
fn cli_responds_to_help() {
    let output = wipa_binary()
        .arg("--help")
        .output()
        .expect("failed to execute wipa --help");

    assert!(
        output.status.success(),
        "wipa --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("wipa") || stdout.contains("Usage"),
        "wipa --help output should contain usage information, got: {stdout}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = wipa_binary()
        .arg("--version")
        .output()
        .expect("failed to execute wipa --version");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("0.3") || stdout.contains("wipa"),
        "wipa --version should contain version info, got: {stdout}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = wipa_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute wipa");

    assert!(
        !output.status.success(),
        "wipa with unknown flag should exit with error"
    );
}

#[test]
fn cli_init_refuses_to_overwrite_keys() {
    let home = init_home();
    assert!(home.path().join("keys.json").is_file());
    assert!(home.path().join("data").join("Tokens").is_dir());

    let output = wipa(home.path(), &["init"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn cli_commands_without_keys_fail() {
    let home = tempfile::tempdir().unwrap();
    let account = field(&wipa_ok(home.path(), &["account", "create"]), "ID");

    let output = wipa(home.path(), &["token", "issue", "--account", &account]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("wipa init"));
}

#[test]
fn cli_token_lifecycle() {
    let home = init_home();
    let h = home.path();

    let account = field(
        &wipa_ok(
            h,
            &[
                "account",
                "create",
                "--device-id",
                "phone-1",
                "--device-type",
                "ios",
                "--device-info",
                r#"{"model":"x"}"#,
            ],
        ),
        "ID",
    );
    assert!(wipa_ok(h, &["account", "list"]).contains(&account));

    let issued = wipa_ok(h, &["token", "issue", "--account", &account]);
    let refresh = field(&issued, "Refresh");
    let access = field(&issued, "Access");
    assert_eq!(refresh.split('.').count(), 5);

    // Second grant for the same account is refused.
    assert!(!wipa(h, &["token", "issue", "--account", &account]).status.success());

    let authorized = wipa_ok(
        h,
        &["authorize", "--header", &format!("Bearer {access}"), "--role", "user"],
    );
    assert_eq!(field(&authorized, "Account"), account);
    assert!(field(&authorized, "Issued").ends_with("UTC"));

    let renewal = field(
        &wipa_ok(h, &["renewal", "create", "--refresh-token", &refresh]),
        "ID",
    );
    let renewed = field(&wipa_ok(h, &["token", "renew", "--renewal", &renewal]), "Access");
    assert_ne!(renewed, access);
    wipa_ok(
        h,
        &[
            "authorize",
            "--header",
            &format!("Bearer {renewed}"),
            "--capability",
            "access_token",
        ],
    );

    // A renewal is good for one access token only.
    assert!(!wipa(h, &["token", "renew", "--renewal", &renewal]).status.success());

    let tokens = wipa_ok(h, &["token", "list"]);
    assert_eq!(tokens.matches("access_token").count(), 2);
    assert_eq!(tokens.matches("refresh_token").count(), 1);
    assert!(!tokens.contains(&access));
    assert!(wipa_ok(h, &["renewal", "list"]).contains("  used "));
}

#[test]
fn cli_authorize_rejects_refresh_token_and_bad_header() {
    let home = init_home();
    let h = home.path();
    let account = field(&wipa_ok(h, &["account", "create"]), "ID");
    let refresh = field(&wipa_ok(h, &["token", "issue", "--account", &account]), "Refresh");

    for header in [format!("Bearer {refresh}"), "Bearer".to_string(), "Bearer a b".to_string()] {
        assert!(
            !wipa(h, &["authorize", "--header", &header]).status.success(),
            "{header} accepted"
        );
    }
}

#[test]
fn cli_api_key_alert_and_heartbeat_flow() {
    let home = init_home();
    let h = home.path();
    let account = field(&wipa_ok(h, &["account", "create"]), "ID");

    let key = field(
        &wipa_ok(h, &["apikey", "create", "--account", &account, "--description", "probe"]),
        "ID",
    );
    let checked = wipa_ok(h, &["apikey", "check", "--query", &key]);
    assert_eq!(field(&checked, "Account"), account);
    assert_eq!(field(&checked, "Via"), "apiKey query parameter");
    let checked = wipa_ok(h, &["apikey", "check", "--header", &key, "--query", "other"]);
    assert_eq!(field(&checked, "Via"), "APIKey header");

    let alert = field(
        &wipa_ok(
            h,
            &["alert", "create", "--api-key", &key, "--title", "disk full", "--priority", "high"],
        ),
        "ID",
    );
    assert!(wipa_ok(h, &["alert", "list", "--account", &account]).contains("disk full"));

    wipa_ok(h, &["alert", "status", "--account", &account, "--id", &alert, "--to", "archived"]);
    assert!(wipa_ok(h, &["alert", "list", "--account", &account]).contains("No alerts found"));
    assert!(wipa_ok(h, &["alert", "list", "--account", &account, "--all"]).contains("archived"));

    // archived -> seen is not an allowed transition.
    assert!(!wipa(h, &["alert", "status", "--account", &account, "--id", &alert, "--to", "seen"])
        .status
        .success());

    wipa_ok(h, &["heartbeat", "send", "--api-key", &key]);
    assert!(wipa_ok(h, &["heartbeat", "latest", "--account", &account]).contains(&key));

    wipa_ok(h, &["apikey", "deactivate", "--account", &account, "--id", &key]);
    assert!(!wipa(h, &["apikey", "check", "--header", &key]).status.success());
    assert!(!wipa(h, &["heartbeat", "send", "--api-key", &key]).status.success());
}
