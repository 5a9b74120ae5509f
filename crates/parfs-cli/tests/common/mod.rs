#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use wait_timeout::ChildExt;

pub const TIMEOUT: Duration = Duration::from_secs(60);

pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Output {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().expect("spawn command");

    match child.wait_timeout(timeout).expect("wait for process") {
        Some(_status) => child
            .wait_with_output()
            .expect("collect command output after completion"),
        None => {
            let _ = child.kill();
            let output = child
                .wait_with_output()
                .expect("collect output after killing command");
            panic!(
                "command timed out after {:?}\nstdout:\n{}\nstderr:\n{}",
                timeout,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
    }
}

/// Scratch workspace with an isolated configuration directory.
pub struct TestContext {
    pub work: TempDir,
    pub config_home: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let work = tempfile::tempdir().expect("tempdir");
        let config_home = work.path().join("config-home");
        std::fs::create_dir_all(&config_home).expect("config home");
        Self { work, config_home }
    }

    pub fn path(&self) -> &Path {
        self.work.path()
    }

    /// `parfs` with progress off and plain readdir listing.
    pub fn parfs(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_parfs"));
        cmd.env("XDG_CONFIG_HOME", &self.config_home)
            .env_remove("RUST_LOG")
            .arg("--no-progress")
            .arg("--lister")
            .arg("readdir");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        let mut cmd = self.parfs();
        cmd.args(args);
        run_with_timeout(cmd, TIMEOUT)
    }
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed: {}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}
