//! Pass-through duplication of a stream to a blocking writer.

use std::io::Write;

use tokio::io::AsyncRead;
use tokio_util::io::InspectReader;
use tracing::debug;

/// Wrap `reader` so everything read from it is also written to `sink`.
///
/// Used to keep the child's stderr visible on the terminal while the
/// classifier consumes it. A failing sink is disabled; reads continue.
///
/// Sink writes happen inline on the reading task. Each one is at most a
/// single classifier chunk, and the classifier task is the only reader.
pub fn tee_reader<R, W>(reader: R, sink: W) -> InspectReader<R, impl FnMut(&[u8])>
where
    R: AsyncRead,
    W: Write,
{
    let mut sink = Some(sink);
    InspectReader::new(reader, move |fresh: &[u8]| {
        if fresh.is_empty() {
            return;
        }
        if let Some(out) = sink.as_mut() {
            if let Err(e) = out.write_all(fresh).and_then(|()| out.flush()) {
                debug!(error = %e, "tee sink failed, no longer duplicating output");
                sink = None;
            }
        }
    })
}
