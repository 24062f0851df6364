//! One live encode: RGBA frames in, a WebM byte stream out through a sink.
//!
//! ```text
//! submit(rgba, pts) ─► ColorConverter ─► Encoder ─► drain ─► Muxer ─► ChunkIo ─► ChunkSink
//! ```
//!
//! The container header goes out with the first submitted frame. `finish`
//! (or dropping the session) flushes the encoder, writes the remaining
//! packets and the trailer, then releases everything in reverse order of
//! acquisition.

use crate::{
    converter::ColorConverter,
    encoder::Encoder,
    error::{Error, LifecycleError, Result},
    frame::RawFrame,
    output::Muxer,
    settings::Settings,
    sink::ChunkSink,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    /// A fatal error was reported; the container is no longer written.
    Failed,
    Finished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_submitted: u64,
    /// `submit` calls that returned an error
    pub frames_skipped: u64,
    pub packets_written: u64,
    pub chunks_emitted: u64,
    pub bytes_emitted: u64,
}

pub struct Session {
    // fields drop top to bottom: converter, encoder, then the muxer and its io buffer
    converter: ColorConverter,
    encoder: Encoder,
    muxer: Muxer,
    settings: Settings,
    state: SessionState,
    last_pts: Option<i64>,
    frames_submitted: u64,
    frames_skipped: u64,
}

impl Session {
    /// Validates `settings` and allocates the whole pipeline. Nothing is
    /// written to `sink` until the first frame (or `finish`).
    pub fn new(settings: Settings, sink: impl ChunkSink) -> Result<Self> {
        settings.validate()?;

        let mut muxer = Muxer::new(
            Box::new(sink),
            settings.io_buffer_size,
            &settings.container_options,
        )?;
        let encoder = Encoder::open(&settings, muxer.needs_global_header())?;
        muxer.add_track(&encoder)?;
        let converter = ColorConverter::new(settings.width, settings.height)?;

        log::info!(
            "session ready: {}x{} @ {} fps",
            settings.width,
            settings.height,
            settings.frame_rate
        );
        Ok(Self {
            converter,
            encoder,
            muxer,
            settings,
            state: SessionState::Open,
            last_pts: None,
            frames_submitted: 0,
            frames_skipped: 0,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn has_failed(&self) -> bool {
        self.state == SessionState::Failed
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_submitted: self.frames_submitted,
            frames_skipped: self.frames_skipped,
            packets_written: self.muxer.packets_written(),
            chunks_emitted: self.muxer.chunks_written(),
            bytes_emitted: self.muxer.bytes_written(),
        }
    }

    /// Converts, encodes and muxes one frame synchronously.
    ///
    /// `rgba` is fully consumed before this returns. On a non-fatal error the
    /// frame is skipped and the session stays usable; on a fatal one (sink
    /// failure, rejected container header) every later call is rejected.
    pub fn submit(&mut self, rgba: &[u8], pts: i64) -> Result<()> {
        match self.state {
            SessionState::Open => {}
            SessionState::Failed => return Err(LifecycleError::SessionFailed.into()),
            SessionState::Finished => return Err(LifecycleError::SessionFinished.into()),
        }

        let result = self.pump(rgba, pts);
        if let Err(ref e) = result {
            self.frames_skipped += 1;
            self.record(e);
        }
        result
    }

    pub fn submit_frame(&mut self, frame: &RawFrame) -> Result<()> {
        self.submit(&frame.data, frame.pts)
    }

    fn pump(&mut self, rgba: &[u8], pts: i64) -> Result<()> {
        if !self.muxer.header_written() {
            self.muxer.write_header()?;
        }

        let decoded = self.converter.convert(rgba)?;
        if let Some(last) = self.last_pts {
            if pts < last {
                log::warn!("timestamp went backwards: {} after {}", pts, last);
            }
        }
        self.encoder.send_frame(decoded, pts)?;
        self.last_pts = Some(pts);
        self.frames_submitted += 1;

        self.drain()
    }

    /// Muxes every packet the encoder has ready. A rejected packet does not
    /// stop the drain, only a sink failure does.
    fn drain(&mut self) -> Result<()> {
        let mut rejected = None;
        while let Some(packet) = self.encoder.receive_packet()? {
            log::trace!("muxing {:?}", packet);
            if let Err(e) = self.muxer.write_packet(packet) {
                if e.is_fatal() {
                    return Err(e);
                }
                log::warn!("packet dropped: {}", e);
                rejected.get_or_insert(e);
            }
        }
        rejected.map_or(Ok(()), Err)
    }

    fn record(&mut self, e: &Error) {
        if e.is_fatal() {
            log::error!("session failed: {}", e);
            self.state = SessionState::Failed;
        } else {
            log::warn!("frame skipped: {}", e);
        }
    }

    /// Flushes the encoder and finalizes the container. Safe to call more
    /// than once; only the first call writes anything.
    ///
    /// After a fatal error nothing more is written, the container is left as is.
    pub fn finish(&mut self) -> Result<SessionStats> {
        let state = self.state;
        self.state = SessionState::Finished;
        match state {
            SessionState::Open => {}
            SessionState::Failed | SessionState::Finished => return Ok(self.stats()),
        }

        if let Err(e) = self.flush() {
            if e.is_fatal() {
                log::error!("flush failed: {}", e);
                return Err(e);
            }
            log::warn!("flush incomplete: {}", e);
        }

        if self.muxer.is_writable() {
            if !self.muxer.header_written() {
                self.muxer.write_header()?;
            }
            self.muxer.write_trailer()?;
        }

        let stats = self.stats();
        log::info!(
            "session finished: {} frames, {} skipped, {} packets, {} bytes",
            stats.frames_submitted,
            stats.frames_skipped,
            stats.packets_written,
            stats.bytes_emitted
        );
        Ok(stats)
    }

    fn flush(&mut self) -> Result<()> {
        self.encoder.send_eof()?;
        if !self.muxer.header_written() {
            // nothing was ever sent to the encoder
            return Ok(());
        }
        self.drain()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("session teardown: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
