//! Child process supervision.
//!
//! Spawns the child with stdin/stdout inherited and stderr piped through a
//! [`tee_reader`] into the crash classifier, relays signals to it, runs the
//! alert pipeline when a crash is detected, and reports the child's exit
//! code.

use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::classifier::{self, ClassifyError, CrashSignal};
use crate::report::{ReportOutcome, Reporter};
use crate::signals::SignalRelay;
use crate::tee::tee_reader;

/// Errors from supervising a child process.
#[derive(Debug, thiserror::Error)]
pub enum SuperviseError {
    /// The child could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The child's stderr pipe was not available.
    #[error("failed to capture stderr of {0}")]
    NoStderr(String),

    /// Waiting for the child failed.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),
}

/// Result of one supervised run.
#[derive(Debug)]
pub struct SupervisedRun {
    /// Exit code to propagate to the caller.
    pub exit_code: i32,
    /// Crash captured from stderr, if any.
    pub crash: Option<CrashSignal>,
    /// Alert pipeline result when a crash was captured.
    pub report: Option<ReportOutcome>,
}

/// Program and arguments to supervise.
#[derive(Debug, Clone)]
pub struct ChildCommand {
    /// Executable name or path.
    pub program: OsString,
    /// Arguments passed verbatim.
    pub args: Vec<OsString>,
}

impl ChildCommand {
    /// Build a command from a program and its arguments.
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn display_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// Run `command` to completion, alerting through `reporter` on a crash.
///
/// # Errors
///
/// Returns an error if the child cannot be spawned or waited on. Alerting
/// failures never surface here.
pub async fn supervise(
    command: &ChildCommand,
    reporter: &Reporter,
) -> Result<SupervisedRun, SuperviseError> {
    let program = command.display_name();

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SuperviseError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SuperviseError::NoStderr(program.clone()))?;

    let relay = match child.id() {
        Some(pid) => {
            info!(program = %program, pid, "child started");
            Some(SignalRelay::start(pid))
        }
        None => None,
    };

    let classification = classifier::spawn_classifier(tee_reader(stderr, std::io::stderr()));

    let crash = match classification.await.unwrap_or(Err(ClassifyError::Dropped)) {
        Ok(crash) => crash,
        Err(e) => {
            warn!(error = %e, "treating aborted classification as no crash");
            None
        }
    };

    let report = match &crash {
        Some(signal) => {
            info!(bytes = signal.as_bytes().len(), "fatal crash detected");
            let outcome = reporter.report(signal).await;
            info!(outcome = ?outcome, "crash report finished");
            Some(outcome)
        }
        None => {
            debug!("no crash detected");
            None
        }
    };

    let status = child.wait().await.map_err(SuperviseError::Wait)?;
    drop(relay);

    let code = exit_code(status);
    info!(program = %program, exit_code = code, "child exited");

    Ok(SupervisedRun {
        exit_code: code,
        crash,
        report,
    })
}

/// Exit code to propagate for `status`.
///
/// Children killed by a signal map to `128 + signal`, like a shell.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    status
        .signal()
        .and_then(|sig| sig.checked_add(128))
        .unwrap_or(1)
}
