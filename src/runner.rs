//! Subprocess helpers for external CLI tools.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

/// Run a command in a working directory and capture stdout.
///
/// On a non-zero exit the combined stderr/stdout becomes the error message.
pub fn run_capture_in(cmd: &str, args: &[&str], dir: &Path) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        anyhow::bail!("{}{}", stderr.trim(), stdout.trim())
    }
}

/// Check if a command exists on PATH.
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
