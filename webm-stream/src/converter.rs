use ffmpeg_next::{
    format::Pixel,
    frame,
    software::scaling::{self, flag::Flags},
};

use crate::error::{Error, Result};

/// Packed RGBA in, planar YUV420P out, same size.
pub struct ColorConverter {
    context: scaling::Context,
    width: u32,
    height: u32,
    // caller bytes are copied here so the scaler sees ffmpeg-aligned rows
    staging: frame::Video,
    output: frame::Video,
}

impl ColorConverter {
    pub const INPUT_FORMAT: Pixel = Pixel::RGBA;
    pub const OUTPUT_FORMAT: Pixel = Pixel::YUV420P;

    pub fn new(width: u32, height: u32) -> Result<Self> {
        let context = scaling::Context::get(
            Self::INPUT_FORMAT,
            width,
            height,
            Self::OUTPUT_FORMAT,
            width,
            height,
            Flags::BILINEAR,
        )
        .map_err(Error::Setup)?;

        Ok(Self {
            context,
            width,
            height,
            staging: frame::Video::new(Self::INPUT_FORMAT, width, height),
            output: frame::Video::new(Self::OUTPUT_FORMAT, width, height),
        })
    }

    pub fn input_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Converts one frame into the reused output frame.
    ///
    /// The returned frame is overwritten by the next call; `rgba` is not
    /// referenced after this returns.
    pub fn convert(&mut self, rgba: &[u8]) -> Result<&mut frame::Video> {
        let expected = self.input_len();
        if rgba.len() != expected {
            return Err(Error::FrameSize {
                expected,
                actual: rgba.len(),
            });
        }

        let row_len = self.width as usize * 4;
        let stride = self.staging.stride(0);
        let plane = self.staging.data_mut(0);
        for (y, row) in rgba.chunks_exact(row_len).enumerate() {
            let start = y * stride;
            plane[start..start + row_len].copy_from_slice(row);
        }

        self.context
            .run(&self.staging, &mut self.output)
            .map_err(Error::Convert)?;
        Ok(&mut self.output)
    }
}
