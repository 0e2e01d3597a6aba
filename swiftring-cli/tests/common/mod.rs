#![allow(dead_code)]

use assert_cmd::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

pub fn cli() -> Command {
    let mut cmd = Command::cargo_bin("swiftring").expect("binary exists");
    cmd.env("RUST_LOG", "error");
    cmd
}

/// Writes `content` as `rings.yaml` inside `dir` and returns its path.
pub fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("rings.yaml");
    std::fs::write(&path, content).expect("write config");
    path
}

/// Writes an executable shell script named `name` into `dir`.
#[cfg(unix)]
pub fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write script");
    let mut permissions = std::fs::metadata(&path).expect("stat script").permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("chmod script");
    path
}

/// Ring builder stand-in: `create` writes the builder file, any invocation on
/// a builder whose path ends with `fail_suffix` exits with status 2.
#[cfg(unix)]
pub fn fake_ring_builder(dir: &Path, fail_suffix: Option<&str>, creates_builders: bool) -> PathBuf {
    let mut body = String::new();
    if let Some(suffix) = fail_suffix {
        body.push_str(&format!("case \"$1\" in\n  *{}) exit 2 ;;\nesac\n", suffix));
    }
    if creates_builders {
        body.push_str("if [ \"$2\" = create ]; then : > \"$1\"; fi\n");
    }
    body.push_str("exit 0\n");
    write_executable(dir, "fake-srb", &body)
}

/// `ssh` stand-in placed first on PATH; every invocation is appended to the
/// returned log file and fails like an unreachable host.
#[cfg(unix)]
pub fn recording_ssh(dir: &Path) -> (String, PathBuf) {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).expect("create bin dir");
    let log = dir.join("ssh.log");
    write_executable(
        &bin,
        "ssh",
        &format!("echo \"$@\" >> '{}'\necho 'connection refused' >&2\nexit 255\n", log.display()),
    );
    let path = match std::env::var("PATH") {
        Ok(path) => format!("{}:{}", bin.display(), path),
        Err(_) => bin.display().to_string(),
    };
    (path, log)
}
