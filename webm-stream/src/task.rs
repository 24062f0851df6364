use tokio_util::sync::CancellationToken;

use crate::{
    error::Error,
    session::{Session, SessionStats},
    settings::Settings,
    sink::ChunkSink,
    source::FrameSource,
};

/// Runs one [`Session`] on a blocking worker until the source ends or the
/// task is stopped. The container is always finalized before the worker exits.
pub struct EncodeTask {
    cancel: CancellationToken,
    handle: Option<tokio::task::JoinHandle<Result<SessionStats, Error>>>,
}

impl EncodeTask {
    /// Must be called from within a tokio runtime.
    pub fn spawn<S, K>(settings: Settings, source: S, sink: K) -> Self
    where
        S: FrameSource + Send + 'static,
        K: ChunkSink,
    {
        Self::spawn_with_cancel(settings, source, sink, CancellationToken::new())
    }

    /// Like [`EncodeTask::spawn`], stopping when `cancel` (or a parent of it) is cancelled.
    pub fn spawn_with_cancel<S, K>(
        settings: Settings,
        source: S,
        sink: K,
        cancel: CancellationToken,
    ) -> Self
    where
        S: FrameSource + Send + 'static,
        K: ChunkSink,
    {
        let cancel_clone = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            Self::encode_loop(settings, source, sink, cancel_clone)
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Waits for the worker. Returns the first fatal error, if any.
    pub async fn join(mut self) -> anyhow::Result<SessionStats> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow::anyhow!("encode task already joined"))?;
        let stats = handle
            .await
            .map_err(|e| anyhow::anyhow!("encode worker panicked: {}", e))??;
        Ok(stats)
    }

    fn encode_loop<S, K>(
        settings: Settings,
        mut source: S,
        sink: K,
        cancel: CancellationToken,
    ) -> Result<SessionStats, Error>
    where
        S: FrameSource,
        K: ChunkSink,
    {
        let mut session = Session::new(settings, sink)?;
        log::info!("encode loop started");

        let mut fatal = None;
        while !cancel.is_cancelled() {
            let Some(frame) = source.next_frame() else {
                log::debug!("frame source exhausted");
                break;
            };
            if let Err(e) = session.submit_frame(&frame) {
                if e.is_fatal() {
                    fatal = Some(e);
                    break;
                }
            }
        }
        if cancel.is_cancelled() {
            log::info!("encode loop cancelled, finalizing");
        }

        let finished = session.finish();
        log::info!("end of encode loop: {:?}", session.stats());
        match fatal {
            Some(e) => Err(e),
            None => finished,
        }
    }
}

impl Drop for EncodeTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;
    use crate::{
        error::SinkError,
        metadata::probe,
        sink,
        source::ColorSweep,
        test_util::{collector, concat, vp8_available, write_temp},
    };

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_source_to_completion() -> anyhow::Result<()> {
        if !vp8_available() {
            return Ok(());
        }
        let (sink, chunks) = collector();
        let source = ColorSweep::new(64, 48, 30).take(30);
        let task = EncodeTask::spawn(Settings::new(64, 48), source, sink);
        let stats = task.join().await?;

        assert_eq!(stats.frames_submitted, 30);
        assert!(stats.packets_written > 0);
        assert_eq!(stats.bytes_emitted, concat(&chunks).len() as u64);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_still_finalizes_the_stream() -> anyhow::Result<()> {
        if !vp8_available() {
            return Ok(());
        }
        let (sink, stream) = sink::channel(4, None);
        // paced so the stop lands mid-stream
        let source = ColorSweep::new(64, 48, 30).inspect(|_| {
            std::thread::sleep(Duration::from_millis(5));
        });
        let task = EncodeTask::spawn(Settings::new(64, 48), source, sink);

        let consumer = tokio::spawn(async move {
            stream
                .fold(Vec::new(), |mut acc, chunk| async move {
                    acc.extend_from_slice(&chunk);
                    acc
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        task.stop();
        let stats = task.join().await?;
        let bytes = consumer.await?;

        assert!(stats.frames_submitted > 0);
        assert_eq!(bytes.len() as u64, stats.bytes_emitted);
        let path = write_temp("stopped", &bytes);
        let info = probe(path.to_str().unwrap())?;
        assert_eq!(
            info.video().map(|v| v.packets),
            Some(stats.packets_written)
        );
        std::fs::remove_file(path)?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_sink_ends_task_with_error() -> anyhow::Result<()> {
        if !vp8_available() {
            return Ok(());
        }
        let (sink, stream) = sink::channel(4, None);
        drop(stream);
        let source = ColorSweep::new(64, 48, 30);
        let task = EncodeTask::spawn(Settings::new(64, 48), source, sink);

        let err = task.join().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Sink(SinkError::Closed))
        ));
        Ok(())
    }
}
