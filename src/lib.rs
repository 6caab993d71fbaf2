//! crashwatch: supervise a process and alert when it crashes.
//!
//! Runs a child process, mirrors its stderr to the terminal, and watches
//! that stream for a fatal `panic:` / `fatal error:` report. When the child
//! dies right after printing one, a throttled alert is fanned out to the
//! configured notification channels. The child's exit code is always
//! passed through unchanged.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod config;
pub mod logging;
pub mod notify;
pub mod report;
pub mod signals;
pub mod supervisor;
pub mod tee;
pub mod throttle;
