use std::path::Path;
use std::process::{Command, Output};

use anyhow::Context as _;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn ensure_code(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

fn write(dir: &Path, name: &str, text: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

const PROFILES: &str = "\
- name: lpar1
  type: rest
  credentials:
    baseUrl: http://127.0.0.1:9
";

#[test]
fn help_exits_0() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_paceload"))
        .arg("--help")
        .output()
        .context("run paceload binary")?;
    ensure_code(&out, 0)
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_paceload"))
        .arg("run")
        .arg("./does-not-matter.yaml")
        .arg("--duration")
        .arg("10x")
        .output()
        .context("run paceload binary")?;
    ensure_code(&out, 30)
}

#[test]
fn missing_definition_exit_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let out = Command::new(env!("CARGO_BIN_EXE_paceload"))
        .arg("run")
        .arg(dir.path().join("missing.yaml"))
        .output()
        .context("run paceload binary")?;
    ensure_code(&out, 30)?;
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("failed to read test definition"),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[test]
fn zero_users_in_definition_exit_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let def = write(dir.path(), "t.yaml", "name: t\nconcurrentUsers: 0\nprofiles: [lpar1]\n")?;
    let out = Command::new(env!("CARGO_BIN_EXE_paceload"))
        .arg("run")
        .arg(&def)
        .output()
        .context("run paceload binary")?;
    ensure_code(&out, 30)
}

#[test]
fn unknown_operation_exit_30_before_any_session() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let def = write(
        dir.path(),
        "t.yaml",
        "name: t\nconcurrentUsers: 1\nprofiles: [lpar1]\noperations: [TsoCommand, Bogus]\n",
    )?;
    let profiles = write(dir.path(), "profiles.yaml", PROFILES)?;

    let out = Command::new(env!("CARGO_BIN_EXE_paceload"))
        .arg("run")
        .arg(&def)
        .arg("--profiles")
        .arg(&profiles)
        .output()
        .context("run paceload binary")?;
    ensure_code(&out, 30)?;

    let stderr = String::from_utf8_lossy(&out.stderr);
    anyhow::ensure!(stderr.contains("unknown operation `Bogus`"), "stderr:\n{stderr}");
    anyhow::ensure!(
        !String::from_utf8_lossy(&out.stdout).contains("total:"),
        "no run should have started"
    );
    Ok(())
}

#[test]
fn unreadable_profiles_exit_20() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let def = write(dir.path(), "t.yaml", "name: t\nconcurrentUsers: 1\nprofiles: [lpar1]\n")?;

    let out = Command::new(env!("CARGO_BIN_EXE_paceload"))
        .arg("run")
        .arg(&def)
        .arg("--profiles")
        .arg(dir.path().join("nope.yaml"))
        .output()
        .context("run paceload binary")?;
    ensure_code(&out, 20)
}

#[test]
fn profiles_of_another_kind_exit_20() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let def = write(dir.path(), "t.yaml", "name: t\nconcurrentUsers: 1\nprofiles: [lpar1]\n")?;
    let profiles = write(dir.path(), "profiles.yaml", "- name: lpar1\n  type: ssh\n")?;

    let out = Command::new(env!("CARGO_BIN_EXE_paceload"))
        .arg("run")
        .arg(&def)
        .arg("--profiles")
        .arg(&profiles)
        .output()
        .context("run paceload binary")?;
    ensure_code(&out, 20)
}

#[test]
fn operations_lists_the_standard_set() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_paceload"))
        .arg("operations")
        .output()
        .context("run paceload binary")?;
    ensure_code(&out, 0)?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    let names: Vec<&str> = stdout.lines().collect();
    anyhow::ensure!(
        names
            == [
                "DatasetUpload",
                "DatasetDownload",
                "FileUpload",
                "FileDownload",
                "TsoCommand",
                "ConsoleCommand",
                "JobSubmit",
                "JobView",
                "JobDownload",
            ],
        "unexpected operations: {names:?}"
    );
    Ok(())
}
