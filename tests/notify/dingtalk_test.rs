//! DingTalk webhook channel against a local HTTP server.

use std::sync::Arc;
use std::time::Duration;

use crashwatch::classifier::CrashSignal;
use crashwatch::config::ChannelConfig;
use crashwatch::notify::dingtalk::DingTalkNotifier;
use crashwatch::notify::{build_channels, dispatch, Alert, Notifier};

use super::webhook;

#[tokio::test]
async fn posts_markdown_payload() {
    let (url, mut bodies) = webhook::serve("200 OK").await;
    let notifier = DingTalkNotifier::new(url);

    let signal = CrashSignal::new(b"panic: boom\ngoroutine 1 [running]:\n".to_vec());
    let alert = Alert::new("web-01", &signal);
    notifier.notify(&alert).await.expect("notify");

    let body = bodies.recv().await.expect("one request");
    let json: serde_json::Value = serde_json::from_str(&body).expect("json body");
    assert_eq!(json["msgtype"], "markdown");
    assert_eq!(json["markdown"]["title"], "Panic from web-01");
    assert_eq!(
        json["markdown"]["text"],
        "### Panic from web-01\n\n    panic: boom\n    goroutine 1 [running]:\n    "
    );
}

#[tokio::test]
async fn error_status_is_ignored() {
    let (url, mut bodies) = webhook::serve("500 Internal Server Error").await;
    let notifier = DingTalkNotifier::new(url);

    let alert = Alert::new("h", &CrashSignal::new(b"panic: x".to_vec()));
    assert!(notifier.notify(&alert).await.is_ok());
    assert!(bodies.recv().await.is_some());
}

#[tokio::test]
async fn unreachable_webhook_is_an_error() {
    let notifier = DingTalkNotifier::new("http://127.0.0.1:1/robot/send".to_owned());
    let alert = Alert::new("h", &CrashSignal::new(b"panic: x".to_vec()));
    assert!(notifier.notify(&alert).await.is_err());
}

#[tokio::test]
async fn configured_channels_each_receive_one_post() {
    let (first_url, mut first) = webhook::serve("200 OK").await;
    let (second_url, mut second) = webhook::serve("200 OK").await;

    let channels: Vec<Arc<dyn Notifier>> = build_channels(&[
        ChannelConfig::DingTalk { webhook: first_url },
        ChannelConfig::DingTalk {
            webhook: second_url,
        },
    ]);
    assert_eq!(channels.len(), 2);

    let alert = Alert::new("h", &CrashSignal::new(b"panic: x".to_vec()));
    assert!(dispatch(&alert, &channels, Duration::from_secs(5)).await);

    assert!(first.recv().await.is_some());
    assert!(second.recv().await.is_some());
    assert!(first.try_recv().is_err());
    assert!(second.try_recv().is_err());
}
