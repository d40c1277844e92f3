use std::path::PathBuf;
use std::process::{Command, ExitStatus};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CmdResult {
    /// One-line transcript for assertion messages.
    pub fn transcript(&self) -> String {
        format!(
            "status={} stdout={:?} stderr={:?}",
            self.status, self.stdout, self.stderr
        )
    }
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_tks") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "tks.exe" } else { "tks" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve tks binary path for integration test"),
    }
}

pub fn run_cli(args: &[&str]) -> CmdResult {
    run_cli_env(args, &[])
}

pub fn run_cli_env(args: &[&str], envs: &[(&str, &str)]) -> CmdResult {
    let mut command = Command::new(resolve_bin_path());
    command.args(args).env("RUST_BACKTRACE", "1");
    for (key, value) in envs {
        command.env(key, value);
    }
    let output = command.output().expect("execute tks command");

    CmdResult {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}
