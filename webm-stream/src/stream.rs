use ffmpeg_next::{Rational, Rescale, codec, format::stream};

/// Descriptor of the container's single video track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub index: usize,
    pub codec_id: codec::Id,
    pub width: u32,
    pub height: u32,
    pub time_base: Rational,
}

impl TrackInfo {
    /// Converts a track timestamp to milliseconds.
    pub fn to_millis(&self, ts: i64) -> i64 {
        ts.rescale(self.time_base, crate::settings::TIME_BASE)
    }
}

impl From<&stream::Stream<'_>> for TrackInfo {
    fn from(stream: &stream::Stream<'_>) -> Self {
        let parameters = stream.parameters();
        let (width, height) = unsafe {
            let ptr = parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            ((*ptr).width.max(0) as u32, (*ptr).height.max(0) as u32)
        };
        Self {
            index: stream.index(),
            codec_id: parameters.id(),
            width,
            height,
            time_base: stream.time_base(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_track_ticks_to_millis() {
        let mut track = TrackInfo {
            index: 0,
            codec_id: codec::Id::VP8,
            width: 320,
            height: 240,
            time_base: Rational(1, 1000),
        };
        assert_eq!(track.to_millis(9999), 9999);
        track.time_base = Rational(1, 90000);
        assert_eq!(track.to_millis(90000), 1000);
    }
}
