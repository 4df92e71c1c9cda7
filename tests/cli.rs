use assert_cmd::Command;
use predicates::prelude::*;

fn yxd(workdir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("yxd").unwrap();
    cmd.current_dir(workdir)
        .env("HOME", workdir)
        .env("XDG_CONFIG_HOME", workdir.join(".config"))
        .env_remove("YXD_PROXY_URL")
        .env_remove("YXD_WEBSHARE_USERNAME")
        .env_remove("YXD_WEBSHARE_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();

    yxd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download").and(predicate::str::contains("config")));
}

#[test]
fn download_help_lists_proxy_options() {
    let dir = tempfile::tempdir().unwrap();

    yxd(dir.path())
        .args(["download", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--proxy-url")
                .and(predicate::str::contains("--webshare-username"))
                .and(predicate::str::contains("--webshare-scheme"))
                .and(predicate::str::contains("--no-webshare-prompt"))
                .and(predicate::str::contains("--max-videos")),
        );
}

#[test]
fn download_requires_channel() {
    let dir = tempfile::tempdir().unwrap();

    yxd(dir.path())
        .arg("download")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<CHANNEL>"));
}

#[test]
fn rejects_unknown_proxy_scheme() {
    let dir = tempfile::tempdir().unwrap();

    yxd(dir.path())
        .args(["download", "@someone", "--webshare-scheme", "socks5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn unrecognized_channel_fails_before_any_download() {
    let dir = tempfile::tempdir().unwrap();

    yxd(dir.path())
        .args(["--quiet", "download", "not a channel", "--no-webshare-prompt", "-o", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unrecognized channel identifier"));

    assert!(!dir.path().join("out").exists());
}

#[test]
fn invalid_proxy_url_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    yxd(dir.path())
        .args(["--quiet", "download", "@someone", "--proxy-url", "socks5://host:1080"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid proxy URL"));
}

#[test]
fn config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();

    yxd(dir.path())
        .args(["config", "--init", "--show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Configuration written to")
                .and(predicate::str::contains("proxy.webshare.io")),
        );

    yxd(dir.path())
        .args(["config", "--init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn local_config_file_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    fs_err::write(dir.path().join("yxd.yaml"), "retry:\n  max_attempts: 0\n").unwrap();

    yxd(dir.path())
        .args(["config", "--show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("retry.max_attempts"));
}
