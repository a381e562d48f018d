/// Number of samples averaged before the published timings change.
pub const TIMING_WINDOW: u32 = 100;

/// Average cost of each pass in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    /// Edge detection.
    pub pass1_ms: f32,
    /// Edge length accumulation.
    pub pass2_ms: f32,
    /// Color blending.
    pub pass3_ms: f32,
    /// Sum of the three passes.
    pub total_ms: f32,
}

/// Rolling average of per-pass timings over fixed windows of
/// [`TIMING_WINDOW`] samples.
#[derive(Debug, Clone, Default)]
pub struct TimingAccumulator {
    sums: [f32; 3],
    count: u32,
    published: FrameTiming,
}

impl TimingAccumulator {
    /// Empty accumulator publishing zeros.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one frame worth of pass timings. `None` means the readback was not
    /// ready yet and the frame is skipped entirely.
    pub fn record(&mut self, sample: Option<[f32; 3]>) {
        let Some(sample) = sample else {
            return;
        };
        for (sum, value) in self.sums.iter_mut().zip(sample) {
            *sum += value;
        }
        self.count += 1;

        if self.count == TIMING_WINDOW {
            let n = self.count as f32;
            let [p1, p2, p3] = self.sums.map(|sum| sum / n);
            self.published = FrameTiming {
                pass1_ms: p1,
                pass2_ms: p2,
                pass3_ms: p3,
                total_ms: p1 + p2 + p3,
            };
            log::trace!("mlaa timings: {:?}", self.published);
            self.sums = [0.0; 3];
            self.count = 0;
        }
    }

    /// Drop everything, including the published averages.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Samples collected in the current window.
    pub fn pending(&self) -> u32 {
        self.count
    }

    /// Averages of the last complete window.
    pub fn last_frame_timing(&self) -> FrameTiming {
        self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_after_full_window() {
        let mut acc = TimingAccumulator::new();
        for _ in 0..TIMING_WINDOW - 1 {
            acc.record(Some([0.5, 0.25, 1.0]));
        }
        assert_eq!(acc.last_frame_timing(), FrameTiming::default());

        acc.record(Some([0.5, 0.25, 1.0]));
        let timing = acc.last_frame_timing();
        assert!((timing.pass1_ms - 0.5).abs() < 1e-5);
        assert!((timing.pass2_ms - 0.25).abs() < 1e-5);
        assert!((timing.pass3_ms - 1.0).abs() < 1e-5);
        assert!((timing.total_ms - 1.75).abs() < 1e-5);
        assert_eq!(acc.pending(), 0);
    }

    #[test]
    fn missing_samples_do_not_advance() {
        let mut acc = TimingAccumulator::new();
        acc.record(Some([1.0; 3]));
        acc.record(None);
        acc.record(None);
        assert_eq!(acc.pending(), 1);
    }

    #[test]
    fn reset_zeroes_published_values() {
        let mut acc = TimingAccumulator::new();
        for _ in 0..TIMING_WINDOW {
            acc.record(Some([2.0; 3]));
        }
        assert_ne!(acc.last_frame_timing(), FrameTiming::default());
        acc.reset();
        assert_eq!(acc.last_frame_timing(), FrameTiming::default());
    }
}
