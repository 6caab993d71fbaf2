//! Crash alert fan-out to notification channels.
//!
//! Every configured [`Notifier`] gets its own task. The caller only learns
//! whether all of them finished before the deadline, which decides whether
//! the throttle record may advance.

pub mod dingtalk;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::classifier::CrashSignal;
use crate::config::ChannelConfig;

/// Default time budget for one fan-out.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Maximum number of crash lines included in a message.
pub const MAX_EXCERPT_LINES: usize = 20;

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

/// A formatted crash alert ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Short title, e.g. `Panic from web-01`.
    pub title: String,
    /// Indented excerpt of the crash output.
    pub excerpt: String,
}

impl Alert {
    /// Build an alert for `signal` raised on `host`.
    pub fn new(host: &str, signal: &CrashSignal) -> Self {
        Self {
            title: format!("Panic from {host}"),
            excerpt: excerpt(&signal.to_text(), MAX_EXCERPT_LINES),
        }
    }

    /// Markdown body: the title as a heading followed by the excerpt.
    pub fn markdown(&self) -> String {
        format!("### {}\n\n{}", self.title, self.excerpt)
    }
}

/// Indent the first `max_lines` lines of `text` by four spaces.
///
/// When lines were dropped, `...` is appended to the last kept line.
pub fn excerpt(text: &str, max_lines: usize) -> String {
    let mut lines = text.split('\n');
    let kept: Vec<String> = lines
        .by_ref()
        .take(max_lines)
        .map(|line| format!("    {line}"))
        .collect();

    let mut out = kept.join("\n");
    if lines.next().is_some() {
        out.push_str("...");
    }
    out
}

/// Host name of this machine, resolved once.
pub fn hostname() -> &'static str {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME.get_or_init(|| {
        nix::unistd::gethostname()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_owned())
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by notification channels.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP transport failure.
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// An outbound alert sink.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Deliver `alert` to the sink.
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Build notifiers for every configured channel.
pub fn build_channels(configs: &[ChannelConfig]) -> Vec<Arc<dyn Notifier>> {
    let client = reqwest::Client::new();
    configs
        .iter()
        .map(|config| -> Arc<dyn Notifier> {
            match config {
                ChannelConfig::DingTalk { webhook } => Arc::new(
                    dingtalk::DingTalkNotifier::with_client(webhook.clone(), client.clone()),
                ),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Send `alert` to every channel concurrently, waiting at most `deadline`.
///
/// Returns `true` if every channel finished in time (successfully or not),
/// `false` if the deadline elapsed first. Channels still in flight at the
/// deadline are left running in the background.
pub async fn dispatch(
    alert: &Alert,
    channels: &[Arc<dyn Notifier>],
    deadline: Duration,
) -> bool {
    if channels.is_empty() {
        debug!("no notification channels configured");
        return true;
    }

    let alert = Arc::new(alert.clone());
    let handles: Vec<JoinHandle<()>> = channels
        .iter()
        .map(|channel| {
            let channel = Arc::clone(channel);
            let alert = Arc::clone(&alert);
            tokio::spawn(async move {
                match channel.notify(&alert).await {
                    Ok(()) => debug!(channel = channel.name(), "alert sent"),
                    Err(e) => warn!(channel = channel.name(), error = %e, "failed to send alert"),
                }
            })
        })
        .collect();

    let all_done = async {
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "notification task failed");
            }
        }
    };

    match tokio::time::timeout(deadline, all_done).await {
        Ok(()) => true,
        Err(_) => {
            warn!(
                deadline_secs = deadline.as_secs_f64(),
                "notification deadline exceeded"
            );
            false
        }
    }
}
