use ffmpeg_next::Rational;

use crate::error::{Error, Result};

/// Timebase shared by frames, encoder and container track: one tick per millisecond.
pub const TIME_BASE: Rational = Rational(1, 1000);

/// Highest frame rate whose frame spacing is still a whole millisecond or more.
pub const MAX_FRAME_RATE: u32 = 1000;

/// Scratch buffer handed to the container writer.
pub const DEFAULT_IO_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub width: u32,
    pub height: u32,
    /// Nominal frames per second; only used for packet durations and encoder rate hints.
    pub frame_rate: u32,
    pub keyframe_interval: u32,
    /// bps, None = encoder default
    pub bit_rate: Option<usize>,
    pub codec_options: Vec<(String, String)>,
    pub container_options: Vec<(String, String)>,
    pub io_buffer_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            frame_rate: 30,
            keyframe_interval: 25,
            bit_rate: None,
            codec_options: vec![
                ("deadline".to_string(), "realtime".to_string()),
                ("cpu-used".to_string(), "8".to_string()),
            ],
            container_options: Vec::new(),
            io_buffer_size: DEFAULT_IO_BUFFER_SIZE,
        }
    }
}

impl Settings {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: usize) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    pub fn with_codec_option(mut self, key: &str, value: &str) -> Self {
        self.codec_options.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_container_option(mut self, key: &str, value: &str) -> Self {
        self.container_options
            .push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_io_buffer_size(mut self, size: usize) -> Self {
        self.io_buffer_size = size;
        self
    }

    /// Bytes of one interleaved RGBA frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Nominal frame spacing in timebase ticks (ms).
    pub fn frame_duration(&self) -> i64 {
        if self.frame_rate == 0 {
            return 0;
        }
        1000 / self.frame_rate as i64
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "invalid video size {}x{}",
                self.width, self.height
            )));
        }
        // 4:2:0 chroma planes are half size in both directions
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(Error::Config(format!(
                "video size {}x{} must be even for yuv420p",
                self.width, self.height
            )));
        }
        if self.width > i32::MAX as u32 / 4 || self.height > i32::MAX as u32 / 4 {
            return Err(Error::Config(format!(
                "video size {}x{} is too large",
                self.width, self.height
            )));
        }
        if self.frame_rate == 0 {
            return Err(Error::Config("frame rate must be positive".to_string()));
        }
        // one frame must span at least one timebase tick
        if self.frame_rate > MAX_FRAME_RATE {
            return Err(Error::Config(format!(
                "frame rate {} exceeds {} fps",
                self.frame_rate, MAX_FRAME_RATE
            )));
        }
        if self.keyframe_interval == 0 {
            return Err(Error::Config(
                "keyframe interval must be positive".to_string(),
            ));
        }
        if self.io_buffer_size == 0 || self.io_buffer_size > i32::MAX as usize {
            return Err(Error::Config(format!(
                "invalid io buffer size {}",
                self.io_buffer_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_live_preview() {
        let settings = Settings::default();
        assert_eq!((settings.width, settings.height), (320, 240));
        assert_eq!(settings.keyframe_interval, 25);
        assert_eq!(settings.io_buffer_size, 32768);
        assert_eq!(settings.frame_len(), 320 * 240 * 4);
        assert_eq!(settings.frame_duration(), 33);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_zero_and_odd_sizes() {
        assert!(matches!(
            Settings::new(0, 240).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::new(320, 0).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::new(321, 240).validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn rejects_bad_rates_and_buffers() {
        assert!(Settings::default().with_frame_rate(0).validate().is_err());
        assert!(Settings::default().with_frame_rate(1001).validate().is_err());
        let fastest = Settings::default().with_frame_rate(MAX_FRAME_RATE);
        assert!(fastest.validate().is_ok());
        assert_eq!(fastest.frame_duration(), 1);
        assert!(Settings::default().with_io_buffer_size(0).validate().is_err());
        let mut settings = Settings::default();
        settings.keyframe_interval = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn builder_appends_options() {
        let settings = Settings::new(64, 48)
            .with_bit_rate(500_000)
            .with_codec_option("lag-in-frames", "0")
            .with_container_option("cluster_time_limit", "1000");
        assert_eq!(settings.bit_rate, Some(500_000));
        assert!(
            settings
                .codec_options
                .contains(&("lag-in-frames".to_string(), "0".to_string()))
        );
        assert_eq!(settings.container_options.len(), 1);
    }
}
