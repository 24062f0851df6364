use bytes::Bytes;

use crate::frame::RawFrame;

/// Pull side of the pipeline. `None` ends the session.
///
/// Timestamps are expected to be non-decreasing; the pipeline does not reorder.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<RawFrame>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = RawFrame>,
{
    fn next_frame(&mut self) -> Option<RawFrame> {
        self.next()
    }
}

/// Synthetic red to green sweep, cycled at a fixed frame spacing.
pub struct ColorSweep {
    frames: Vec<Bytes>,
    index: usize,
    pts: i64,
    step_ms: i64,
    end_ms: Option<i64>,
}

impl ColorSweep {
    pub const STEPS: usize = 100;

    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        let step = 256.0 / Self::STEPS as f64;
        let frames = (0..Self::STEPS)
            .map(|i| {
                let level = i as f64 * step;
                let pixel = [(255.0 - level) as u8, level as u8, 0, 255];
                RawFrame::solid(width, height, pixel, 0).data
            })
            .collect();
        Self {
            frames,
            index: 0,
            pts: 0,
            step_ms: 1000 / fps.max(1) as i64,
            end_ms: None,
        }
    }

    /// Stops before the first frame whose timestamp reaches `end_ms`.
    pub fn until(mut self, end_ms: i64) -> Self {
        self.end_ms = Some(end_ms);
        self
    }

    pub fn step_ms(&self) -> i64 {
        self.step_ms
    }
}

impl Iterator for ColorSweep {
    type Item = RawFrame;

    fn next(&mut self) -> Option<RawFrame> {
        if let Some(end) = self.end_ms {
            if self.pts >= end {
                return None;
            }
        }
        let frame = RawFrame::new(self.frames[self.index].clone(), self.pts);
        self.pts += self.step_ms;
        self.index = (self.index + 1) % self.frames.len();
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweeps_from_red_to_green() {
        let mut sweep = ColorSweep::new(4, 2, 30);
        let first = sweep.next_frame().unwrap();
        assert_eq!(first.len(), 4 * 2 * 4);
        assert_eq!(&first.data[..4], &[255, 0, 0, 255]);

        let last = sweep.nth(ColorSweep::STEPS - 2).unwrap();
        assert!(last.data[0] < 10);
        assert!(last.data[1] > 245);
        assert_eq!(last.data[2], 0);
    }

    #[test]
    fn ten_seconds_at_thirty_fps() {
        let frames: Vec<RawFrame> = ColorSweep::new(2, 2, 30).until(10_000).collect();
        assert_eq!(frames.len(), 304);
        assert_eq!(frames[1].pts, 33);
        assert_eq!(frames.last().unwrap().pts, 9999);
        assert!(frames.windows(2).all(|w| w[0].pts <= w[1].pts));
        // colors repeat after a full sweep
        assert_eq!(frames[0].data, frames[ColorSweep::STEPS].data);
    }
}
