//! Container inspection (similar to ffprobe -count_packets).

use std::fmt;

use crate::stream::TrackInfo;

/// Per-stream info.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub track: TrackInfo,
    /// Codec name, e.g. "vp8"
    pub codec_name: String,
    /// Demuxed packets in this stream.
    pub packets: u64,
    /// Packets flagged as keyframes.
    pub key_packets: u64,
    /// Earliest packet pts, in ms.
    pub first_pts_ms: Option<i64>,
    /// End of the last packet (pts + duration), in ms.
    pub end_ms: Option<i64>,
}

impl StreamInfo {
    /// Presentation span covered by the packets, in ms.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.first_pts_ms, self.end_ms) {
            (Some(first), Some(end)) => Some(end - first),
            _ => None,
        }
    }
}

/// Probe result.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Format name, e.g. "matroska,webm"
    pub format_name: String,
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn video(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.track.codec_id.medium() == ffmpeg_next::media::Type::Video)
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[FORMAT]")?;
        writeln!(f, "format_name={}", self.format_name)?;
        writeln!(f, "nb_streams={}", self.streams.len())?;
        writeln!(f, "[/FORMAT]")?;
        for s in &self.streams {
            writeln!(f, "[STREAM]")?;
            writeln!(f, "index={}", s.track.index)?;
            writeln!(f, "codec_name={}", s.codec_name)?;
            writeln!(
                f,
                "time_base={}/{}",
                s.track.time_base.numerator(),
                s.track.time_base.denominator()
            )?;
            writeln!(f, "width={}", s.track.width)?;
            writeln!(f, "height={}", s.track.height)?;
            writeln!(f, "nb_read_packets={}", s.packets)?;
            writeln!(f, "key_packets={}", s.key_packets)?;
            if let Some(d) = s.duration_ms() {
                writeln!(f, "duration_ms={}", d)?;
            }
            writeln!(f, "[/STREAM]")?;
        }
        Ok(())
    }
}

/// Opens a container file and reads every packet.
///
/// # Example
///
/// ```ignore
/// let info = webm_stream::metadata::probe("live.webm")?;
/// println!("{}", info);
/// ```
pub fn probe(path: &str) -> anyhow::Result<MediaInfo> {
    let mut input = ffmpeg_next::format::input(path)?;
    let format_name = input.format().name().to_string();

    let mut streams = Vec::with_capacity(input.nb_streams() as usize);
    for stream in input.streams() {
        let track = TrackInfo::from(&stream);
        streams.push(StreamInfo {
            codec_name: format!("{:?}", track.codec_id).to_lowercase(),
            track,
            packets: 0,
            key_packets: 0,
            first_pts_ms: None,
            end_ms: None,
        });
    }

    for (stream, packet) in input.packets() {
        let Some(info) = streams.get_mut(stream.index()) else {
            continue;
        };
        info.packets += 1;
        if packet.is_key() {
            info.key_packets += 1;
        }
        if let Some(pts) = packet.pts() {
            let pts_ms = info.track.to_millis(pts);
            let end_ms = info.track.to_millis(pts + packet.duration().max(0));
            info.first_pts_ms = Some(info.first_pts_ms.map_or(pts_ms, |v| v.min(pts_ms)));
            info.end_ms = Some(info.end_ms.map_or(end_ms, |v| v.max(end_ms)));
        }
    }

    Ok(MediaInfo {
        format_name,
        streams,
    })
}
