use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::config::{Config, PYTHON_ENV};

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Execute a program and capture stdout/stderr.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or its output cannot
/// be collected.
pub fn run_command(program: &str, args: &[String], cwd: &Path) -> Result<RunOutput> {
    debug!(program, ?args, cwd = %cwd.display(), "spawning");
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to start {program}"))?;
    Ok(RunOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Interpreter used for tag queries and extension builds: the configured
/// override, else the first `python3`/`python` on `PATH`.
pub(crate) fn resolve_python(config: &Config) -> Result<String> {
    if let Some(python) = config.python() {
        return Ok(python.to_string());
    }
    ["python3", "python"]
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
        .map(|path| path.display().to_string())
        .ok_or_else(|| anyhow!("no Python interpreter found on PATH (set {PYTHON_ENV})"))
}
