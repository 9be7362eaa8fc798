//! Subprocess execution shared by the tool adapters

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use ckg_core::ToolError;
use tokio::process::Command;

/// Exit status and combined output of one tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    pub success: bool,
    pub output: String,
}

/// Run `program args..` in `cwd`, capturing stdout then stderr.
///
/// A non-zero exit is a normal [`ToolRun`]; failing to start the process or
/// exceeding `timeout` is a [`ToolError`].
pub async fn run_tool(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> Result<ToolRun, ToolError> {
    tracing::debug!("Running {} {} in {}", program, args.join(" "), cwd.display());
    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::spawn(program, e))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ToolError::Timeout {
            tool: program.to_string(),
            secs: timeout.as_secs(),
        })?
        .map_err(|e| ToolError::spawn(program, e))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(ToolRun {
        success: output.status.success(),
        output: text,
    })
}
