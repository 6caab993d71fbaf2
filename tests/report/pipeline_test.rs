//! Throttle, fan-out and record update working together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crashwatch::classifier::CrashSignal;
use crashwatch::config::{ChannelConfig, Config};
use crashwatch::notify::{Alert, Notifier, NotifyError};
use crashwatch::report::{ReportOutcome, Reporter};
use crashwatch::throttle::ThrottleGate;

/// Channel that counts deliveries and remembers the last alert.
#[derive(Default)]
struct Recorder {
    calls: AtomicUsize,
    last: std::sync::Mutex<Option<Alert>>,
}

#[async_trait::async_trait]
impl Notifier for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last.lock() {
            *last = Some(alert.clone());
        }
        Ok(())
    }
}

/// Channel that never finishes.
struct Stuck;

#[async_trait::async_trait]
impl Notifier for Stuck {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn notify(&self, _alert: &Alert) -> Result<(), NotifyError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

fn signal() -> CrashSignal {
    CrashSignal::new(b"panic: boom\ngoroutine 1 [running]:\n".to_vec())
}

#[tokio::test]
async fn delivered_alert_advances_record_and_throttles_next() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("record");
    let recorder = Arc::new(Recorder::default());

    let reporter = Reporter::new(
        ThrottleGate::new(&record, Duration::from_secs(600)),
        vec![recorder.clone()],
        Duration::from_secs(5),
    )
    .with_host("web-01");

    assert_eq!(reporter.report(&signal()).await, ReportOutcome::Delivered);
    assert!(record.exists());
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);

    let sent = recorder
        .last
        .lock()
        .expect("lock")
        .clone()
        .expect("alert recorded");
    assert_eq!(sent.title, "Panic from web-01");
    assert!(sent.excerpt.starts_with("    panic: boom"));

    assert_eq!(reporter.report(&signal()).await, ReportOutcome::Throttled);
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_alert_leaves_record_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("record");

    let reporter = Reporter::new(
        ThrottleGate::new(&record, Duration::from_secs(600)),
        vec![Arc::new(Stuck)],
        Duration::from_secs(5),
    );

    assert_eq!(reporter.report(&signal()).await, ReportOutcome::TimedOut);
    assert!(!record.exists());
    assert!(reporter.gate().allow().await);
}

#[tokio::test]
async fn no_channels_still_advances_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let record = dir.path().join("record");

    let reporter = Reporter::new(
        ThrottleGate::new(&record, Duration::from_secs(60)),
        Vec::new(),
        Duration::from_secs(5),
    );

    assert_eq!(reporter.report(&signal()).await, ReportOutcome::Delivered);
    assert!(record.exists());
}

#[tokio::test]
async fn from_config_uses_record_file_and_channels() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.report.record_file = dir.path().join("crashwatch");
    config.report.throttle_secs = 5;
    config.channels = vec![ChannelConfig::DingTalk {
        webhook: "http://127.0.0.1:1/robot/send".to_owned(),
    }];

    let reporter = Reporter::from_config(&config);
    assert_eq!(reporter.gate().record_file(), dir.path().join("crashwatch"));
    assert_eq!(reporter.gate().min_interval(), Duration::from_secs(60));

    // The only channel is unreachable; it fails fast and still counts as done.
    assert_eq!(reporter.report(&signal()).await, ReportOutcome::Delivered);
}
