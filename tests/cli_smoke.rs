//! Behavioural tests for the `rsw-infra` CLI entrypoint.

#[path = "common/test_constants.rs"]
mod test_constants;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use test_constants::{EMAIL, PUBLIC_KEY};

/// Command isolated from the caller's config files and environment.
fn isolated_cmd(home: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("rsw-infra");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RSW_EMAIL")
        .env_remove("RSW_PUBLIC_KEY")
        .env_remove("RSW_INFRA_CONFIG_PATH")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn cli_prints_manifest_with_every_output() {
    let home = TempDir::new().expect("tempdir");
    let mut cmd = isolated_cmd(&home);
    cmd.env("RSW_EMAIL", EMAIL).env("RSW_PUBLIC_KEY", PUBLIC_KEY);

    let mut assert = cmd.assert().success();
    for output in [
        "server_public_ip",
        "server_public_dns",
        "server_subnet_id",
        "db_port",
        "db_address",
        "db_endpoint",
        "db_name",
        "db_domain",
    ] {
        assert = assert.stdout(contains(output));
    }
    assert
        .stdout(contains("alice@example.com-keypair-for-pulumi"))
        .stdout(contains(PUBLIC_KEY));
}

#[test]
fn cli_warns_about_insecure_database_defaults() {
    let home = TempDir::new().expect("tempdir");
    let mut cmd = isolated_cmd(&home);
    cmd.env("RSW_EMAIL", EMAIL).env("RSW_PUBLIC_KEY", PUBLIC_KEY);

    cmd.assert()
        .success()
        .stderr(contains("publicly accessible"))
        .stderr(contains("static literal"));
}

#[test]
fn cli_reports_missing_public_key() {
    let home = TempDir::new().expect("tempdir");
    let mut cmd = isolated_cmd(&home);
    cmd.env("RSW_EMAIL", EMAIL);

    cmd.assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(contains("`public_key`").and(contains("RSW_PUBLIC_KEY")));
}

#[test]
fn cli_reads_values_from_config_file() {
    let home = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(home.path().to_path_buf()).expect("utf8 tempdir");
    let dir = Dir::open_ambient_dir(&root, ambient_authority()).expect("open tempdir");
    dir.write(
        "custom.toml",
        format!("email = \"{EMAIL}\"\npublic_key = \"{PUBLIC_KEY}\"\n"),
    )
    .expect("write config");

    let mut cmd = isolated_cmd(&home);
    cmd.env("RSW_INFRA_CONFIG_PATH", root.join("custom.toml"));

    cmd.assert()
        .success()
        .stdout(contains("alice@example.com-key-pair"));
}

#[test]
fn cli_writes_manifest_to_requested_path() {
    let home = TempDir::new().expect("tempdir");
    let target = home.path().join("out").join("stack.json");
    let mut cmd = isolated_cmd(&home);
    cmd.env("RSW_EMAIL", EMAIL)
        .env("RSW_PUBLIC_KEY", PUBLIC_KEY)
        .arg("--manifest")
        .arg(&target);

    cmd.assert().success().stdout("");

    let written = std::fs::read_to_string(&target).expect("manifest written");
    assert!(written.contains("\"rstudio_pm\""), "manifest: {written}");
}
