//! Streaming crash detection over a child's stderr.
//!
//! A fatal Go-style crash prints a header (`panic:` or `fatal error:`) and
//! the process dies almost immediately afterwards. Output that keeps
//! flowing long after a header is a recovered panic or an unrelated log
//! line, so a detection window that outlives [`DEFAULT_WINDOW`] is dropped.
//!
//! Headers are matched per chunk only. A header split across two reads is
//! not detected.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Tokens that open a detection window, tried in order.
pub const CRASH_HEADERS: &[&[u8]] = &[b"panic:", b"fatal error:"];

/// How long a detection window may stay open before it is treated as a
/// false positive.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300);

/// Read size for the stderr stream.
pub const CHUNK_SIZE: usize = 2048;

/// Captured text of a fatal crash, from the header through end-of-stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashSignal(Vec<u8>);

impl CrashSignal {
    /// Wrap raw crash output.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw captured bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Captured text with invalid UTF-8 replaced.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

/// Errors that abort classification.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The stream failed with something other than end-of-input.
    #[error("failed to read crash stream: {0}")]
    Read(#[from] std::io::Error),

    /// The classifier task ended without reporting an outcome.
    #[error("classifier task ended without a result")]
    Dropped,
}

/// Result of classifying one stream.
pub type ClassifyOutcome = Result<Option<CrashSignal>, ClassifyError>;

/// Find the position of the first crash header present in `chunk`.
pub fn find_header(chunk: &[u8]) -> Option<usize> {
    CRASH_HEADERS
        .iter()
        .find_map(|header| find_subslice(chunk, header))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Open detection window.
#[derive(Debug)]
struct DetectionWindow {
    started_at: Instant,
    accumulated: Vec<u8>,
}

/// Clock-driven crash detection state machine.
///
/// Feed it chunks in arrival order with the time they were read, then call
/// [`Detector::finish`] once the stream has ended.
#[derive(Debug)]
pub struct Detector {
    window_len: Duration,
    window: Option<DetectionWindow>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Create a detector with the default 300ms window.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Create a detector with a custom window length.
    pub fn with_window(window_len: Duration) -> Self {
        Self {
            window_len,
            window: None,
        }
    }

    /// Whether a header has been seen and not yet aged out.
    pub fn is_active(&self) -> bool {
        self.window.is_some()
    }

    /// Process one chunk read at `now`.
    pub fn feed(&mut self, chunk: &[u8], now: Instant) {
        match self.window.as_mut() {
            Some(window) => window.accumulated.extend_from_slice(chunk),
            None => {
                if let Some(pos) = find_header(chunk) {
                    debug!(offset = pos, "crash header detected");
                    self.window = Some(DetectionWindow {
                        started_at: now,
                        accumulated: chunk.get(pos..).unwrap_or_default().to_vec(),
                    });
                }
            }
        }

        let expired = self
            .window
            .as_ref()
            .is_some_and(|w| now.saturating_duration_since(w.started_at) > self.window_len);
        if expired {
            debug!("output continued past crash header, discarding window");
            self.window = None;
        }
    }

    /// Close the stream and return the captured crash, if any.
    pub fn finish(self) -> Option<CrashSignal> {
        self.window.map(|w| CrashSignal::new(w.accumulated))
    }
}

/// Classify a stream until end-of-input.
///
/// Returns the crash text when a header was seen and the stream ended
/// within the detection window.
///
/// # Errors
///
/// Returns [`ClassifyError::Read`] if the stream fails before end-of-input.
pub async fn classify<R>(reader: R) -> ClassifyOutcome
where
    R: AsyncRead + Unpin,
{
    classify_with(reader, Detector::new()).await
}

/// Classify a stream using a pre-configured [`Detector`].
///
/// # Errors
///
/// Returns [`ClassifyError::Read`] if the stream fails before end-of-input.
pub async fn classify_with<R>(mut reader: R, mut detector: Detector) -> ClassifyOutcome
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0_u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(detector.finish());
        }
        detector.feed(buf.get(..n).unwrap_or_default(), Instant::now());
    }
}

/// Run [`classify`] on a background task.
///
/// The receiver always resolves: read failures arrive as errors instead of
/// leaving the caller waiting.
pub fn spawn_classifier<R>(reader: R) -> oneshot::Receiver<ClassifyOutcome>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let outcome = classify(reader).await;
        if let Err(e) = &outcome {
            warn!(error = %e, "crash classification aborted");
        }
        let _ = tx.send(outcome);
    });
    rx
}
