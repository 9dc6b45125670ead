//! `bash -c` runner on `tokio::process`.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::ToolError;
use crate::traits::{ProcessOptions, ProcessOutput, ProcessRunner};

/// Runs commands through `bash -c` in the requested directory.
///
/// The child is killed when its wait future is dropped, which is how both
/// the timeout and cancellation stop it.
pub struct TokioProcessRunner;

enum Stopped {
    TimedOut,
    Cancelled,
}

fn stopped_output(why: &Stopped, started: Instant) -> ProcessOutput {
    let (stderr, timed_out) = match why {
        Stopped::TimedOut => ("Process timed out", true),
        Stopped::Cancelled => ("Process cancelled", false),
    };
    ProcessOutput {
        stderr: stderr.into(),
        exit_code: -1,
        duration_ms: millis_since(started),
        timed_out,
        interrupted: !timed_out,
        ..ProcessOutput::default()
    }
}

fn millis_since(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run_command(&self, command: &str, opts: &ProcessOptions) -> Result<ProcessOutput, ToolError> {
        let started = Instant::now();
        let mut cmd = Command::new("bash");
        let _ = cmd
            .args(["-c", command])
            .current_dir(&opts.working_directory)
            .envs(&opts.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command, working_directory = %opts.working_directory, "spawning process");
        let wait = cmd.spawn()?.wait_with_output();

        let output = tokio::select! {
            biased;
            () = opts.cancellation.cancelled() => {
                debug!(command, "process cancelled");
                return Ok(stopped_output(&Stopped::Cancelled, started));
            }
            () = tokio::time::sleep(Duration::from_millis(opts.timeout_ms)) => {
                warn!(command, timeout_ms = opts.timeout_ms, "process timed out");
                return Ok(stopped_output(&Stopped::TimedOut, started));
            }
            output = wait => output?,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let duration_ms = millis_since(started);
        debug!(command, exit_code, duration_ms, "process exited");
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
            duration_ms,
            timed_out: false,
            interrupted: false,
        })
    }
}
