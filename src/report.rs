//! Crash alert pipeline: throttle check, fan-out, record update.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::classifier::CrashSignal;
use crate::config::Config;
use crate::notify::{self, Alert, Notifier};
use crate::throttle::ThrottleGate;

/// What happened to a crash alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// An alert was delivered recently; nothing was sent.
    Throttled,
    /// Every channel finished in time and the record was advanced.
    Delivered,
    /// The deadline elapsed before every channel finished. The record was
    /// left untouched so the next crash may alert again sooner.
    TimedOut,
}

/// Sends throttled crash alerts.
pub struct Reporter {
    gate: ThrottleGate,
    channels: Vec<Arc<dyn Notifier>>,
    deadline: Duration,
    host: String,
}

impl Reporter {
    /// Create a reporter from its parts.
    pub fn new(gate: ThrottleGate, channels: Vec<Arc<dyn Notifier>>, deadline: Duration) -> Self {
        Self {
            gate,
            channels,
            deadline,
            host: notify::hostname().to_owned(),
        }
    }

    /// Create a reporter for a loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ThrottleGate::new(config.report.record_file.clone(), config.report.throttle()),
            notify::build_channels(&config.channels),
            config.report.deadline(),
        )
    }

    /// Override the host name shown in alert titles.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Throttle gate used by this reporter.
    pub fn gate(&self) -> &ThrottleGate {
        &self.gate
    }

    /// Run the alert pipeline for `signal`.
    pub async fn report(&self, signal: &CrashSignal) -> ReportOutcome {
        if !self.gate.allow().await {
            info!(
                record = %self.gate.record_file().display(),
                "crash detected but alert throttled"
            );
            return ReportOutcome::Throttled;
        }

        let alert = Alert::new(&self.host, signal);
        info!(
            channels = self.channels.len(),
            title = %alert.title,
            "sending crash alert"
        );

        if notify::dispatch(&alert, &self.channels, self.deadline).await {
            self.gate.record_now().await;
            ReportOutcome::Delivered
        } else {
            ReportOutcome::TimedOut
        }
    }
}
