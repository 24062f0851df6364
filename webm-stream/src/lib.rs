//! Live RGBA → VP8/WebM encoder that pushes the container byte stream to a
//! caller-supplied sink as it is produced.

pub use ffmpeg_next::util::log::Level as LogLevel;

/// Process-wide library setup, passed explicitly at startup.
#[derive(Debug, Clone, Copy)]
pub struct LibraryConfig {
    /// Verbosity of ffmpeg's own logging (printed to stderr by libav*).
    pub log_level: LogLevel,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Error,
        }
    }
}

/// Initializes ffmpeg with the given config. Safe to call more than once.
pub fn init(config: &LibraryConfig) -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))?;
    ffmpeg_next::util::log::set_level(config.log_level);
    Ok(())
}

pub mod converter;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod io;
pub mod metadata;
pub mod output;
pub mod packet;
pub mod session;
pub mod settings;
pub mod sink;
pub mod source;
pub mod stream;
pub mod task;

pub use error::{Error, LifecycleError, SinkError};
pub use frame::RawFrame;
pub use session::{Session, SessionStats};
pub use settings::Settings;
pub use sink::{ChannelSink, ChunkSink, ChunkStream};
pub use source::{ColorSweep, FrameSource};
pub use task::EncodeTask;

#[cfg(test)]
mod test_util;
