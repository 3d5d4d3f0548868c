//! Execution engine — spawns the (possibly rewritten) invocation, captures
//! output, and enforces the execution deadline.
//!
//! Expected subprocess failures never escape as errors: launch faults come
//! back as `errored` with code 1, deadline expiry as `timed_out` with the
//! conventional code 124, and normal completion with the real exit code.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

/// Exit code reported for a command killed by the deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported for a launch or runtime fault.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// What the engine is asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Plain command, interpreted by `sh -c`.
    Shell(String),
    /// Pre-built argument list (sandbox rewrites land here).
    Argv(Vec<String>),
}

impl Invocation {
    fn describe(&self) -> String {
        match self {
            Invocation::Shell(cmd) => cmd.clone(),
            Invocation::Argv(args) => args.join(" "),
        }
    }
}

/// Raw result of one subprocess run.
#[derive(Debug, Clone)]
pub struct RawExec {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub errored: bool,
    pub truncated: bool,
}

/// Run an invocation under `timeout`, capturing at most `max_output_bytes`
/// of each stream.
///
/// The child is spawned into its own process group; on expiry the whole
/// group is killed so pipelines cannot leave orphans behind.
pub async fn run(
    invocation: &Invocation,
    timeout: Duration,
    max_output_bytes: usize,
) -> RawExec {
    let mut cmd = match invocation {
        Invocation::Shell(command) => {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        }
        Invocation::Argv(args) => {
            let Some((program, rest)) = args.split_first() else {
                return launch_failure("empty invocation");
            };
            let mut c = Command::new(program);
            c.args(rest);
            c
        }
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(error = %e, "Failed to spawn command");
            return launch_failure(&e.to_string());
        }
    };
    let pid = child.id();

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            let truncated =
                output.stdout.len() > max_output_bytes || output.stderr.len() > max_output_bytes;
            let mut stdout = output.stdout;
            let mut stderr = output.stderr;
            stdout.truncate(max_output_bytes);
            stderr.truncate(max_output_bytes);
            RawExec {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code,
                timed_out: false,
                errored: false,
                truncated,
            }
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Subprocess wait failed");
            launch_failure(&e.to_string())
        }
        Err(_) => {
            // Deadline hit: the dropped wait future kills the child via
            // kill_on_drop; the group kill below reaps its descendants.
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            info!(
                command = %invocation.describe(),
                timeout_secs = timeout.as_secs(),
                "Command exceeded deadline and was terminated"
            );
            RawExec {
                stdout: String::new(),
                stderr: format!("Command timed out after {}s", timeout.as_secs()),
                exit_code: TIMEOUT_EXIT_CODE,
                timed_out: true,
                errored: false,
                truncated: false,
            }
        }
    }
}

fn launch_failure(detail: &str) -> RawExec {
    RawExec {
        stdout: String::new(),
        stderr: format!("Execution failed: {detail}"),
        exit_code: FAILURE_EXIT_CODE,
        timed_out: false,
        errored: true,
        truncated: false,
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // The child leads its own group (process_group(0)), so its pid is the
    // group id.
    unsafe {
        libc::killpg(pid as i32, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
