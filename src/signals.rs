//! Forwarding of supervisor signals to the child process.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Signals relayed to the child.
///
/// Termination, user, job-control and timer signals. SIGCHLD drives child
/// reaping and SIGPIPE stays ignored, so neither is relayed.
pub const RELAYED: [Signal; 10] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGHUP,
    Signal::SIGQUIT,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGWINCH,
    Signal::SIGTSTP,
    Signal::SIGCONT,
    Signal::SIGALRM,
];

/// Background task forwarding signals to one child pid.
///
/// Stops forwarding when dropped or [`SignalRelay::stop`] is called.
#[derive(Debug)]
pub struct SignalRelay {
    tasks: Vec<JoinHandle<()>>,
}

impl SignalRelay {
    /// Start forwarding to `pid`.
    ///
    /// Signals whose handler cannot be installed are skipped with a warning.
    pub fn start(pid: u32) -> Self {
        let Ok(raw_pid) = i32::try_from(pid) else {
            warn!(pid, "child pid out of range, signals will not be forwarded");
            return Self { tasks: Vec::new() };
        };
        let target = Pid::from_raw(raw_pid);

        let tasks = RELAYED
            .into_iter()
            .filter_map(|sig| match signal(SignalKind::from_raw(sig as i32)) {
                Ok(mut stream) => Some(tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        match kill(target, sig) {
                            Ok(()) => debug!(signal = sig.as_str(), pid = raw_pid, "signal forwarded"),
                            Err(e) => {
                                debug!(signal = sig.as_str(), error = %e, "failed to forward signal");
                            }
                        }
                    }
                })),
                Err(e) => {
                    warn!(signal = sig.as_str(), error = %e, "cannot install signal handler");
                    None
                }
            })
            .collect();

        Self { tasks }
    }

    /// Number of signals being relayed.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no signals are being relayed.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop forwarding.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
