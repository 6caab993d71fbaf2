//! DingTalk custom-robot webhook channel.

use serde::Serialize;

use super::{Alert, Notifier, NotifyError};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Webhook request body.
#[derive(Debug, Serialize)]
pub struct DingTalkMessage {
    /// Message kind, always `markdown`.
    pub msgtype: &'static str,
    /// Markdown payload.
    pub markdown: DingTalkMarkdown,
}

/// Markdown payload of a webhook message.
#[derive(Debug, Serialize)]
pub struct DingTalkMarkdown {
    /// Title shown in the conversation list.
    pub title: String,
    /// Markdown message body.
    pub text: String,
}

/// Build the webhook body for `alert`.
pub fn build_message(alert: &Alert) -> DingTalkMessage {
    DingTalkMessage {
        msgtype: "markdown",
        markdown: DingTalkMarkdown {
            title: alert.title.clone(),
            text: alert.markdown(),
        },
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Posts markdown alerts to a DingTalk webhook.
#[derive(Debug, Clone)]
pub struct DingTalkNotifier {
    webhook: String,
    client: reqwest::Client,
}

impl DingTalkNotifier {
    /// Create a notifier with its own HTTP client.
    pub fn new(webhook: String) -> Self {
        Self::with_client(webhook, reqwest::Client::new())
    }

    /// Create a notifier sharing an existing HTTP client.
    pub fn with_client(webhook: String, client: reqwest::Client) -> Self {
        Self { webhook, client }
    }
}

#[async_trait::async_trait]
impl Notifier for DingTalkNotifier {
    fn name(&self) -> &str {
        "dingtalk"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        // The robot answers 200 even for rejected payloads; the response
        // carries nothing worth acting on.
        self.client
            .post(&self.webhook)
            .json(&build_message(alert))
            .send()
            .await?;
        Ok(())
    }
}
