use std::net::TcpListener;
use std::process::{Command, Output};

use anyhow::Context as _;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn ensure_exit(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

/// A loopback URL whose port was just released, so connections are refused.
fn unreachable_url() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    let addr = listener.local_addr().context("local addr")?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

#[test]
fn help_exits_0() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_infermeter"))
        .arg("--help")
        .output()
        .context("run infermeter binary")?;

    ensure_exit(&out, 0)
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_infermeter"))
        .arg("load-test")
        .arg("--deadline")
        .arg("10x")
        .output()
        .context("run infermeter binary")?;

    ensure_exit(&out, 30)
}

#[test]
fn missing_data_exits_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create temp dir")?;

    let out = Command::new(env!("CARGO_BIN_EXE_infermeter"))
        .arg("load-test")
        .arg("--data")
        .arg(dir.path().join("does-not-exist.json"))
        .arg("--output-dir")
        .arg(dir.path())
        .arg("--progress")
        .arg("off")
        .output()
        .context("run infermeter binary")?;

    ensure_exit(&out, 30)?;
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("loading test data"),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[test]
fn no_target_completed_exits_10() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let data = dir.path().join("test_data.json");
    std::fs::write(&data, r#"{"samples": [[1.0, 2.0]]}"#).context("write test data")?;

    let out = Command::new(env!("CARGO_BIN_EXE_infermeter"))
        .arg("load-test")
        .arg("--requests")
        .arg("5")
        .arg("--workers")
        .arg("1")
        .arg("--baseline-url")
        .arg(unreachable_url()?)
        .arg("--candidate-url")
        .arg(unreachable_url()?)
        .arg("--ready-timeout")
        .arg("200ms")
        .arg("--data")
        .arg(&data)
        .arg("--output-dir")
        .arg(dir.path())
        .arg("--progress")
        .arg("off")
        .output()
        .context("run infermeter binary")?;

    ensure_exit(&out, 10)?;
    anyhow::ensure!(
        dir.path().join("concurrent_load_test_results.json").exists(),
        "results file should still be written"
    );
    Ok(())
}
