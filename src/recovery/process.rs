//! External process execution for hardware recovery actions
//!
//! The only shell-out surface of the controller. Waiting is a bounded poll
//! loop that also gives up as soon as the controller is stopped.

use crate::error::{GsmPanicError, Result};
use crate::logging::get_logger;
use crate::reactor::RunningFlag;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Bounds for waiting on a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessPoll {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for ProcessPoll {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_polls: 100,
        }
    }
}

/// How a waited-for process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Not waited for
    Detached,
    /// Exited with the given code (None when killed by a signal)
    Exited(Option<i32>),
    /// Poll budget ran out; the process was killed and reaped
    TimedOut,
    /// The run flag was cleared while waiting; the process was killed and reaped
    Cancelled,
}

#[cfg(windows)]
fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", cmd]);
    command
}

#[cfg(not(windows))]
fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.args(["-c", cmd]);
    command
}

/// Start `cmd` through the platform shell, optionally waiting for it.
///
/// While waiting, the child is polled every `poll.interval` at most
/// `poll.max_polls` times, and only while `running` is set.
pub fn start_external_process(
    cmd: &str,
    wait: bool,
    running: &RunningFlag,
    poll: ProcessPoll,
) -> Result<ProcessOutcome> {
    let logger = get_logger("process");
    let mut child = shell_command(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| GsmPanicError::process(format!("Failed to start '{}': {}", cmd, e)))?;

    if !wait {
        return Ok(ProcessOutcome::Detached);
    }

    let outcome = match wait_for_child(&mut child, running, poll) {
        Ok(outcome) => outcome,
        Err(e) => {
            terminate(&mut child);
            return Err(e);
        }
    };
    if matches!(outcome, ProcessOutcome::TimedOut | ProcessOutcome::Cancelled) {
        terminate(&mut child);
    }
    match outcome {
        ProcessOutcome::Exited(Some(0)) | ProcessOutcome::Detached => {}
        ProcessOutcome::Exited(code) => {
            logger.warn(&format!("'{}' exited with status {:?}", cmd, code));
        }
        ProcessOutcome::TimedOut => {
            logger.warn(&format!(
                "'{}' still running after {} polls, killed",
                cmd, poll.max_polls
            ));
        }
        ProcessOutcome::Cancelled => {
            logger.debug(&format!("Killed '{}' on shutdown", cmd));
        }
    }
    Ok(outcome)
}

/// Kill an abandoned child and reap it so no zombie is left behind
fn terminate(child: &mut Child) {
    // Fails only when the child already exited; wait() reaps it either way
    let _ = child.kill();
    if let Err(e) = child.wait() {
        get_logger("process").warn(&format!("Failed to reap child {}: {}", child.id(), e));
    }
}

fn wait_for_child(
    child: &mut Child,
    running: &RunningFlag,
    poll: ProcessPoll,
) -> Result<ProcessOutcome> {
    let mut polls = 0u32;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| GsmPanicError::process(format!("Failed to poll child: {}", e)))?
        {
            return Ok(ProcessOutcome::Exited(status.code()));
        }
        if !running.is_set() {
            return Ok(ProcessOutcome::Cancelled);
        }
        if polls >= poll.max_polls {
            return Ok(ProcessOutcome::TimedOut);
        }
        polls += 1;
        std::thread::sleep(poll.interval);
    }
}
