use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single session call.
///
/// Configuration and sink errors are fatal: the session stops accepting
/// frames and performs no further container writes. Everything else
/// concerns one frame (or one packet) and the session keeps going.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid settings: {0}")]
    Config(String),

    #[error("encoder {0} is not available in this ffmpeg build")]
    EncoderUnavailable(&'static str),

    #[error("ffmpeg setup failed: {0}")]
    Setup(#[source] ffmpeg_next::Error),

    #[error("frame buffer is {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    #[error("color conversion failed: {0}")]
    Convert(#[source] ffmpeg_next::Error),

    #[error("encode failed: {0}")]
    Encode(#[source] ffmpeg_next::Error),

    #[error("mux failed: {0}")]
    Mux(#[source] ffmpeg_next::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::EncoderUnavailable(_) | Error::Setup(_) | Error::Sink(_)
        )
    }
}

/// The external consumer could not take a chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The consumer is gone (peer dropped, channel closed, sink panicked).
    #[error("sink closed")]
    Closed,

    /// The consumer did not accept a chunk within the configured stall timeout.
    #[error("sink stalled for {0:?}")]
    Stalled(Duration),
}

/// A call that is not allowed in the current pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("container header already written")]
    HeaderAlreadyWritten,

    #[error("packet written before container header")]
    PacketBeforeHeader,

    #[error("trailer written before container header")]
    TrailerBeforeHeader,

    #[error("write after container trailer")]
    WriteAfterTrailer,

    #[error("container output is broken after a sink failure")]
    OutputBroken,

    #[error("frame submitted after encoder flush")]
    SubmitAfterFlush,

    #[error("session already finished")]
    SessionFinished,

    #[error("session failed earlier and accepts no more frames")]
    SessionFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_errors_are_fatal() {
        assert!(Error::from(SinkError::Closed).is_fatal());
        assert!(Error::from(SinkError::Stalled(Duration::from_millis(5))).is_fatal());
        assert!(Error::Config("zero width".into()).is_fatal());
    }

    #[test]
    fn frame_errors_are_not_fatal() {
        let err = Error::FrameSize {
            expected: 16,
            actual: 4,
        };
        assert!(!err.is_fatal());
        assert!(!Error::Encode(ffmpeg_next::Error::Bug).is_fatal());
        assert!(!Error::from(LifecycleError::SubmitAfterFlush).is_fatal());
    }

    #[test]
    fn display_names_the_cause() {
        let err = Error::from(SinkError::Stalled(Duration::from_millis(500)));
        assert_eq!(err.to_string(), "sink stalled for 500ms");
        let err = Error::FrameSize {
            expected: 307200,
            actual: 10,
        };
        assert_eq!(err.to_string(), "frame buffer is 10 bytes, expected 307200");
    }
}
