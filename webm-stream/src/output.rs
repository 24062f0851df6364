use std::{
    ffi::{CString, c_int, c_void},
    ptr,
};

use ffmpeg_next::{Dictionary, ffi, format::context::Output};

use crate::{
    encoder::Encoder,
    error::{Error, LifecycleError, Result},
    io::ChunkIo,
    packet::EncodedPacket,
    sink::ChunkSink,
    stream::TrackInfo,
};

pub const CONTAINER_FORMAT: &str = "webm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerState {
    Unopened,
    HeaderWritten,
    Finalized,
    /// The sink failed or the header was rejected; nothing more may be written.
    Broken,
}

/// WebM writer that streams through a [`ChunkSink`] instead of a file.
pub struct Muxer {
    // dropped before `io`, the format context writes through it
    inner: Output,
    io: ChunkIo,
    track: Option<TrackInfo>,
    state: MuxerState,
    packets_written: u64,
}

impl Muxer {
    /// Allocates the WebM context and applies `options` to it (and to the
    /// muxer's private options). A rejected or unknown option is a
    /// configuration error.
    pub fn new(
        sink: Box<dyn ChunkSink>,
        io_buffer_size: usize,
        options: &[(String, String)],
    ) -> Result<Self> {
        let mut io = ChunkIo::new(sink, io_buffer_size)?;

        let format = CString::new(CONTAINER_FORMAT).map_err(|e| Error::Config(e.to_string()))?;
        let mut inner = unsafe {
            let mut context: *mut ffi::AVFormatContext = ptr::null_mut();
            let ret = ffi::avformat_alloc_output_context2(
                &mut context,
                ptr::null(),
                format.as_ptr(),
                ptr::null(),
            );
            if ret < 0 || context.is_null() {
                return Err(Error::Setup(ffmpeg_next::Error::from(ret)));
            }
            Output::wrap(context)
        };

        // pb is still null here, so an early return frees the context cleanly
        apply_options(&mut inner, options)?;

        unsafe {
            let context = inner.as_mut_ptr();
            (*context).pb = io.as_mut_ptr();
            (*context).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as i32;
        }

        Ok(Self {
            inner,
            io,
            track: None,
            state: MuxerState::Unopened,
            packets_written: 0,
        })
    }

    pub fn state(&self) -> MuxerState {
        self.state
    }

    pub fn header_written(&self) -> bool {
        self.state != MuxerState::Unopened
    }

    /// Whether another header/packet/trailer write is allowed.
    pub fn is_writable(&self) -> bool {
        matches!(self.state, MuxerState::Unopened | MuxerState::HeaderWritten)
    }

    pub fn needs_global_header(&self) -> bool {
        self.inner
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER)
    }

    pub fn track(&self) -> Option<&TrackInfo> {
        self.track.as_ref()
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.io.bytes_written()
    }

    pub fn chunks_written(&self) -> u64 {
        self.io.chunks_written()
    }

    /// Declares the single video track from an opened encoder.
    pub fn add_track(&mut self, encoder: &Encoder) -> Result<()> {
        if self.state != MuxerState::Unopened || self.track.is_some() {
            return Err(LifecycleError::HeaderAlreadyWritten.into());
        }
        let mut stream = self
            .inner
            .add_stream(ffmpeg_next::encoder::find(encoder.codec().id()))
            .map_err(Error::Setup)?;
        stream.set_time_base(encoder.time_base());
        stream.set_parameters(encoder.codec());
        self.track = Some(TrackInfo::from(&*stream));
        Ok(())
    }

    pub fn write_header(&mut self) -> Result<()> {
        match self.state {
            MuxerState::Unopened => {}
            MuxerState::Broken => return Err(LifecycleError::OutputBroken.into()),
            MuxerState::HeaderWritten | MuxerState::Finalized => {
                return Err(LifecycleError::HeaderAlreadyWritten.into());
            }
        }

        let result = self.inner.write_header();
        if let Err(e) = self.check(result) {
            // a header cannot be retried on a stream that may already hold bytes
            self.state = MuxerState::Broken;
            return Err(match e {
                Error::Mux(e) => Error::Setup(e),
                other => other,
            });
        }
        self.state = MuxerState::HeaderWritten;

        // the muxer may adjust the track timebase while writing the header
        if let Some(track) = self.track.as_mut() {
            if let Some(stream) = self.inner.stream(track.index) {
                track.time_base = stream.time_base();
            }
        }
        log::debug!(
            "{} header written, {} bytes emitted",
            CONTAINER_FORMAT,
            self.io.bytes_written()
        );
        Ok(())
    }

    pub fn write_packet(&mut self, mut packet: EncodedPacket) -> Result<()> {
        match self.state {
            MuxerState::HeaderWritten => {}
            MuxerState::Unopened => return Err(LifecycleError::PacketBeforeHeader.into()),
            MuxerState::Finalized => return Err(LifecycleError::WriteAfterTrailer.into()),
            MuxerState::Broken => return Err(LifecycleError::OutputBroken.into()),
        }
        let (index, out_time_base) = match self.track.as_ref() {
            Some(track) => (track.index, track.time_base),
            None => return Err(Error::Config("no track declared".to_string())),
        };

        let time_base = packet.time_base();
        let p = packet.get_mut();
        p.set_stream(index);
        p.set_position(-1);
        p.rescale_ts(time_base, out_time_base);
        let result = p.write_interleaved(&mut self.inner);
        self.check(result)?;
        self.packets_written += 1;
        Ok(())
    }

    pub fn write_trailer(&mut self) -> Result<()> {
        match self.state {
            MuxerState::HeaderWritten => {}
            MuxerState::Unopened => return Err(LifecycleError::TrailerBeforeHeader.into()),
            MuxerState::Finalized => return Err(LifecycleError::WriteAfterTrailer.into()),
            MuxerState::Broken => return Err(LifecycleError::OutputBroken.into()),
        }
        let result = self.inner.write_trailer();
        self.check(result)?;
        self.state = MuxerState::Finalized;
        log::debug!(
            "{} trailer written, {} packets, {} bytes in {} chunks",
            CONTAINER_FORMAT,
            self.packets_written,
            self.io.bytes_written(),
            self.io.chunks_written()
        );
        Ok(())
    }

    /// Maps an ffmpeg write failure to a sink failure when the sink caused it.
    fn check(&mut self, result: std::result::Result<(), ffmpeg_next::Error>) -> Result<()> {
        // a sink failure can surface later than the write that hit it, always look
        if let Some(e) = self.io.sink_error() {
            self.state = MuxerState::Broken;
            return Err(Error::Sink(e));
        }
        result.map_err(Error::Mux)
    }
}

fn apply_options(output: &mut Output, options: &[(String, String)]) -> Result<()> {
    let mut opts = Dictionary::new();
    // push every packet straight to the sink instead of waiting for a full buffer
    opts.set("flush_packets", "1");
    for (key, value) in options {
        opts.set(key, value);
    }

    let (ret, unused) = unsafe {
        let mut raw = opts.disown();
        let ret = ffi::av_opt_set_dict2(
            output.as_mut_ptr() as *mut c_void,
            &mut raw,
            ffi::AV_OPT_SEARCH_CHILDREN as c_int,
        );
        (ret, Dictionary::own(raw))
    };
    if ret < 0 {
        return Err(Error::Config(format!(
            "invalid {} option: {}",
            CONTAINER_FORMAT,
            ffmpeg_next::Error::from(ret)
        )));
    }
    if let Some((key, _)) = unused.iter().next() {
        return Err(Error::Config(format!(
            "unknown {} option: {}",
            CONTAINER_FORMAT, key
        )));
    }
    Ok(())
}

impl Drop for Muxer {
    fn drop(&mut self) {
        // `Output` would avio_close() a pb it does not own
        unsafe {
            (*self.inner.as_mut_ptr()).pb = ptr::null_mut();
        }
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod output_test;
