use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// Interleaved 8-bit RGBA pixels with a presentation timestamp in milliseconds.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub pts: i64,
}

impl RawFrame {
    pub fn new(data: impl Into<Bytes>, pts: i64) -> Self {
        Self {
            data: data.into(),
            pts,
        }
    }

    /// Single color frame, mostly for tests and placeholders.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], pts: i64) -> Self {
        let data: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(data, pts)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Display for RawFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "RawFrame data_len: {}, pts: {}", self.data.len(), self.pts)
    }
}
