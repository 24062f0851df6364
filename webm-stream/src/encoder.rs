use ffmpeg_next::{Dictionary, Rational, codec, frame, picture};

use crate::{
    converter::ColorConverter,
    error::{Error, LifecycleError, Result},
    packet::EncodedPacket,
    settings::{Settings, TIME_BASE},
};

pub const CODEC_ID: codec::Id = codec::Id::VP8;
pub const CODEC_NAME: &str = "libvpx";

pub struct Encoder {
    inner: ffmpeg_next::codec::encoder::Video,
    time_base: Rational,
    frame_duration: i64,
    keyframe_interval: u64,
    frame_index: u64,
    flushed: bool,
}

impl Encoder {
    /// Opens the VP8 encoder. `global_header` comes from the container format flags.
    pub fn open(settings: &Settings, global_header: bool) -> Result<Self> {
        let codec = ffmpeg_next::encoder::find(CODEC_ID)
            .ok_or(Error::EncoderUnavailable(CODEC_NAME))?;

        let context = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = context.encoder().video().map_err(Error::Setup)?;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(ColorConverter::OUTPUT_FORMAT);
        encoder.set_time_base(TIME_BASE);
        encoder.set_frame_rate(Some(Rational(settings.frame_rate as i32, 1)));
        encoder.set_gop(settings.keyframe_interval);
        encoder.set_max_b_frames(0);
        if let Some(bit_rate) = settings.bit_rate {
            encoder.set_bit_rate(bit_rate);
        }
        if global_header {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        for (key, value) in &settings.codec_options {
            opts.set(key, value);
        }
        let encoder = encoder.open_with(opts).map_err(Error::Setup)?;
        log::info!(
            "encoder opened: {} {}x{} gop {}",
            CODEC_NAME,
            settings.width,
            settings.height,
            settings.keyframe_interval
        );

        Ok(Self {
            inner: encoder,
            time_base: TIME_BASE,
            frame_duration: settings.frame_duration(),
            keyframe_interval: settings.keyframe_interval as u64,
            frame_index: 0,
            flushed: false,
        })
    }

    pub fn codec(&self) -> &ffmpeg_next::codec::encoder::Video {
        &self.inner
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn send_frame(&mut self, frame: &mut frame::Video, pts: i64) -> Result<()> {
        if self.flushed {
            return Err(LifecycleError::SubmitAfterFlush.into());
        }
        frame.set_pts(Some(pts));
        let kind = if self.frame_index % self.keyframe_interval == 0 {
            picture::Type::I
        } else {
            picture::Type::None
        };
        frame.set_kind(kind);
        self.inner.send_frame(frame).map_err(Error::Encode)?;
        self.frame_index += 1;
        Ok(())
    }

    /// Signals end of stream. Only the first call reaches the codec.
    pub fn send_eof(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        self.inner.send_eof().map_err(Error::Encode)
    }

    /// Next buffered packet, or None when the codec needs more input (or is drained).
    pub fn receive_packet(&mut self) -> Result<Option<EncodedPacket>> {
        let mut packet = ffmpeg_next::codec::packet::Packet::empty();
        match self.inner.receive_packet(&mut packet) {
            Ok(()) => {
                let mut packet = EncodedPacket::from((packet, self.time_base));
                if packet.duration() <= 0 {
                    packet.set_duration(self.frame_duration);
                }
                Ok(Some(packet))
            }
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(None)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(err) => Err(Error::Encode(err)),
        }
    }
}
