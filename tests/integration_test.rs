// CLI-surface tests for impctl

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;

#[test]
fn entity_commands_accept_identifier_arguments() {
    let commands = vec![
        ("products", "PRODUCT"),
        ("device-groups", "DEVICE_GROUP"),
        ("devices", "DEVICE"),
        ("builds", "BUILD"),
        ("webhooks", "WEBHOOK"),
        ("loginkeys", "LOGIN_KEY"),
    ];

    for (group, value_name) in commands {
        let mut cmd = cargo_bin_cmd!("impctl");
        cmd.args([group, "get", "--help"]);
        cmd.assert()
            .success()
            .stdout(predicates::str::contains(value_name));
    }
}

#[test]
fn get_falls_back_to_project_defaults_in_help_text() {
    let mut cmd = cargo_bin_cmd!("impctl");
    cmd.args(["device-groups", "get", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("falls back to the linked project"));
}

#[test]
fn missing_token_fails_with_configure_hint() {
    let config_dir = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("impctl");
    cmd.env("IMPCTL_CONFIG_DIR", config_dir.path())
        .current_dir(cwd.path())
        .args(["products", "list"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("access token is required"));
}

#[test]
fn configure_writes_local_scope() {
    let config_dir = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("impctl");
    cmd.env("IMPCTL_CONFIG_DIR", config_dir.path())
        .current_dir(cwd.path())
        .args(["configure", "--token", "tok", "--scope", "local"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Saved access token"));
    assert!(cwd.path().join(".impctl.yaml").exists());
}

#[test]
fn config_show_masks_the_token() {
    let config_dir = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();

    let mut configure = cargo_bin_cmd!("impctl");
    configure
        .env("IMPCTL_CONFIG_DIR", config_dir.path())
        .current_dir(cwd.path())
        .args(["configure", "--token", "secret-token"]);
    configure.assert().success();

    let mut show = cargo_bin_cmd!("impctl");
    show.env("IMPCTL_CONFIG_DIR", config_dir.path())
        .current_dir(cwd.path())
        .arg("config-show");
    show.assert()
        .success()
        .stdout(predicates::str::contains("*****"))
        .stdout(predicates::str::contains("secret-token").not());
}

#[test]
fn completion_generates_a_script() {
    let mut cmd = cargo_bin_cmd!("impctl");
    cmd.args(["completion", "bash"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("impctl"));
}
