use std::time::Duration;

use bytes::Bytes;
use tokio::{runtime::Handle, sync::mpsc};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::SinkError;

/// Receives the container byte stream, one chunk per call, in production order.
///
/// `send` must take the whole chunk or fail; there is no partial acceptance.
/// Blocking inside `send` is how a slow consumer throttles the encoder.
pub trait ChunkSink: Send + 'static {
    fn send(&mut self, chunk: Bytes) -> Result<(), SinkError>;
}

impl<F> ChunkSink for F
where
    F: FnMut(Bytes) -> Result<(), SinkError> + Send + 'static,
{
    fn send(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self(chunk)
    }
}

pub type ChunkStream = ReceiverStream<Bytes>;

/// Producer half of a bounded chunk handoff.
///
/// `send` blocks the calling (encode) thread while the channel is full, so
/// at most `capacity` chunks are ever queued. Must not be used from inside
/// an async task; run the session on a blocking worker.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    stall_timeout: Option<Duration>,
    runtime: Option<Handle>,
}

/// Creates a bounded chunk channel. The stall timeout needs a tokio runtime
/// to be current when this is called; without one it is ignored.
pub fn channel(capacity: usize, stall_timeout: Option<Duration>) -> (ChannelSink, ChunkStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let runtime = Handle::try_current().ok();
    if stall_timeout.is_some() && runtime.is_none() {
        log::warn!("chunk channel created outside a tokio runtime, stall timeout disabled");
    }
    (
        ChannelSink {
            tx,
            stall_timeout,
            runtime,
        },
        ReceiverStream::new(rx),
    )
}

impl ChunkSink for ChannelSink {
    fn send(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        match (self.stall_timeout, self.runtime.as_ref()) {
            (Some(timeout), Some(runtime)) => {
                let tx = &self.tx;
                runtime.block_on(async {
                    match tx.send_timeout(chunk, timeout).await {
                        Ok(()) => Ok(()),
                        Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                            Err(SinkError::Stalled(timeout))
                        }
                        Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(SinkError::Closed),
                    }
                })
            }
            _ => self.tx.blocking_send(chunk).map_err(|_| SinkError::Closed),
        }
    }
}
