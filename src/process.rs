//! External tool invocation
//!
//! All history, fetch, and line-count queries go through external
//! commands. This module provides the common subprocess runner: spawn,
//! capture output, and optionally kill the process after a timeout so an
//! unreachable remote cannot block a run indefinitely.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured result of an external tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Process exit code, if the process ran to completion
    pub return_code: Option<i32>,
    /// Whether the tool was killed after exceeding its timeout
    pub timed_out: bool,
    /// Error message when the tool could not be run at all
    pub error: Option<String>,
}

impl ToolOutput {
    fn completed(stdout: String, stderr: String, return_code: i32) -> Self {
        Self {
            stdout,
            stderr,
            return_code: Some(return_code),
            timed_out: false,
            error: None,
        }
    }

    fn failure(error: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            return_code: None,
            timed_out: false,
            error: Some(error),
        }
    }

    fn timeout(tool_name: &str, timeout_secs: u64) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            return_code: None,
            timed_out: true,
            error: Some(format!("{} timed out after {}s", tool_name, timeout_secs)),
        }
    }

    /// True when the process completed with a zero exit code.
    pub fn success(&self) -> bool {
        self.return_code == Some(0)
    }

    /// True when the executable itself was not found.
    pub fn tool_missing(&self) -> bool {
        self.error.as_deref().is_some_and(|e| e.ends_with("not found"))
    }
}

/// Run an external tool, capturing stdout and stderr.
///
/// # Arguments
/// * `cmd` - Command and arguments to run
/// * `tool_name` - Human-readable tool name for log and error messages
/// * `timeout_secs` - Timeout in seconds (0 = no timeout)
/// * `cwd` - Working directory for the tool
pub fn run_tool(
    cmd: &[&str],
    tool_name: &str,
    timeout_secs: u64,
    cwd: Option<&Path>,
) -> ToolOutput {
    if cmd.is_empty() {
        return ToolOutput::failure("empty command".to_string());
    }

    let program = cmd[0];
    let args = &cmd[1..];

    debug!("Running {}: {} {:?}", tool_name, program, args);

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                return ToolOutput::failure(format!("{} not found", tool_name));
            }
            return ToolOutput::failure(format!("failed to run {}: {}", tool_name, e));
        }
    };

    if timeout_secs > 0 {
        run_with_timeout(child, tool_name, timeout_secs)
    } else {
        run_without_timeout(child, tool_name)
    }
}

fn run_without_timeout(child: std::process::Child, tool_name: &str) -> ToolOutput {
    let output = match child.wait_with_output() {
        Ok(output) => output,
        Err(e) => {
            return ToolOutput::failure(format!("failed to wait for {}: {}", tool_name, e));
        }
    };

    ToolOutput::completed(
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Wait for the child with a deadline, draining its pipes from a helper
/// thread so a chatty process cannot deadlock on a full pipe buffer.
fn run_with_timeout(
    mut child: std::process::Child,
    tool_name: &str,
    timeout_secs: u64,
) -> ToolOutput {
    use std::io::Read;
    use std::thread;

    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_handle = thread::spawn(move || {
        let mut buf = String::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = stdout_handle.join().unwrap_or_default();
                let stderr = stderr_handle.join().unwrap_or_default();
                return ToolOutput::completed(stdout, stderr, status.code().unwrap_or(-1));
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!("{} timed out after {}s", tool_name, timeout_secs);
                    return ToolOutput::timeout(tool_name, timeout_secs);
                }
                thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                return ToolOutput::failure(format!("failed to wait for {}: {}", tool_name, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_output() {
        let result = run_tool(&["echo", "hello"], "echo", 0, None);
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
        assert!(!result.timed_out);
    }

    #[test]
    fn test_missing_tool() {
        let result = run_tool(&["definitely-not-a-real-tool-xyz"], "xyz", 0, None);
        assert!(!result.success());
        assert!(result.tool_missing());
    }

    #[test]
    fn test_nonzero_exit() {
        let result = run_tool(&["sh", "-c", "exit 3"], "sh", 0, None);
        assert!(!result.success());
        assert_eq!(result.return_code, Some(3));
    }

    #[test]
    fn test_timeout_kills_process() {
        let result = run_tool(&["sleep", "5"], "sleep", 1, None);
        assert!(result.timed_out);
        assert!(!result.success());
    }
}
