use crate::config::{EdgeThreshold, FrameParameters, MlaaConfig};
use crate::pass::{frame_passes, PassDescriptor, PassKind};
use crate::timing::{FrameTiming, TimingAccumulator};
use crate::Error;

/// Where a frame currently is. Frames move strictly forward, one stage at a
/// time, and end up back in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStage {
    /// No frame in flight.
    #[default]
    Idle,
    /// The caller's scene is in the scene image.
    SceneRendered,
    /// Pass 1 recorded.
    EdgesDetected,
    /// Pass 2 recorded.
    EdgesMeasured,
    /// Pass 3 recorded; waiting for submission.
    Presented,
}

impl FrameStage {
    fn next(self) -> FrameStage {
        match self {
            FrameStage::Idle => FrameStage::SceneRendered,
            FrameStage::SceneRendered => FrameStage::EdgesDetected,
            FrameStage::EdgesDetected => FrameStage::EdgesMeasured,
            FrameStage::EdgesMeasured => FrameStage::Presented,
            FrameStage::Presented => FrameStage::Idle,
        }
    }

    /// Move to `to`, which must be the immediate successor.
    pub fn transition(self, to: FrameStage) -> Result<FrameStage, Error> {
        if self.next() == to {
            Ok(to)
        } else {
            Err(Error::OutOfOrder { from: self, to })
        }
    }

    /// The stage reached once `kind` has been submitted.
    pub fn after(kind: PassKind) -> FrameStage {
        match kind {
            PassKind::DetectEdges => FrameStage::EdgesDetected,
            PassKind::MeasureEdges => FrameStage::EdgesMeasured,
            PassKind::BlendColors => FrameStage::Presented,
        }
    }
}

/// State shared by both controllers: the configuration, the frame stage and
/// the timing averages.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    config: MlaaConfig,
    stage: FrameStage,
    timing: TimingAccumulator,
}

impl PipelineState {
    /// Idle state with zero timings.
    pub fn new(config: MlaaConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &MlaaConfig {
        &self.config
    }

    /// Disabling also clears the timing averages.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        if !enabled {
            self.timing.reset();
        }
    }

    /// Choose between the stencil and plain variants of passes 1 and 2.
    pub fn set_use_stencil(&mut self, use_stencil: bool) {
        self.config.use_stencil = use_stencil;
    }

    /// Rejects values outside `1..=64`, keeping the previous threshold.
    pub fn set_edge_threshold(&mut self, threshold: u32) -> Result<(), Error> {
        self.config.edge_threshold = EdgeThreshold::new(threshold)?;
        Ok(())
    }

    /// Toggle the edge visualization.
    pub fn set_show_edges(&mut self, show_edges: bool) {
        self.config.show_edges = show_edges;
    }

    /// Where the current frame is.
    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Uniform contents for a frame of the given size.
    pub fn frame_parameters(&self, width: u32, height: u32) -> FrameParameters {
        FrameParameters::new(width, height, self.config.edge_threshold)
    }

    /// The passes for the current configuration, in order.
    pub fn passes(&self) -> [PassDescriptor; 3] {
        frame_passes(&self.config)
    }

    /// The scene has been rendered and the passes are about to be recorded.
    pub fn begin_frame(&mut self) -> Result<(), Error> {
        self.stage = self.stage.transition(FrameStage::SceneRendered)?;
        Ok(())
    }

    /// A pass has been recorded.
    pub fn complete(&mut self, kind: PassKind) -> Result<(), Error> {
        self.stage = self.stage.transition(FrameStage::after(kind))?;
        Ok(())
    }

    /// All passes were submitted; record whatever timing sample is available.
    pub fn end_frame(&mut self, sample: Option<[f32; 3]>) -> Result<(), Error> {
        self.stage = self.stage.transition(FrameStage::Idle)?;
        self.timing.record(sample);
        Ok(())
    }

    /// Throw away a frame that failed half way.
    pub fn abandon_frame(&mut self) {
        if self.stage != FrameStage::Idle {
            log::debug!("abandoning mlaa frame at {:?}", self.stage);
        }
        self.stage = FrameStage::Idle;
    }

    /// MLAA is off: the scene went straight to the presentation target.
    pub fn present_unmodified(&mut self) {
        self.stage = FrameStage::Idle;
        self.timing.reset();
    }

    /// Averages of the last complete timing window.
    pub fn last_frame_timing(&self) -> FrameTiming {
        self.timing.last_frame_timing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_cycle() {
        let mut state = PipelineState::default();
        state.begin_frame().unwrap();
        for pass in state.passes() {
            state.complete(pass.kind).unwrap();
        }
        assert_eq!(state.stage(), FrameStage::Presented);
        state.end_frame(None).unwrap();
        assert_eq!(state.stage(), FrameStage::Idle);
    }

    #[test]
    fn skipping_a_pass_is_rejected() {
        let mut state = PipelineState::default();
        state.begin_frame().unwrap();
        let err = state.complete(PassKind::MeasureEdges).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfOrder {
                from: FrameStage::SceneRendered,
                to: FrameStage::EdgesMeasured
            }
        ));
    }

    #[test]
    fn overlapping_frames_are_rejected() {
        let mut state = PipelineState::default();
        state.begin_frame().unwrap();
        assert!(state.begin_frame().is_err());
        state.abandon_frame();
        assert!(state.begin_frame().is_ok());
    }

    #[test]
    fn disabling_resets_timing() {
        let mut state = PipelineState::default();
        for _ in 0..crate::timing::TIMING_WINDOW {
            state.begin_frame().unwrap();
            for pass in state.passes() {
                state.complete(pass.kind).unwrap();
            }
            state.end_frame(Some([1.0, 1.0, 1.0])).unwrap();
        }
        assert!(state.last_frame_timing().total_ms > 0.0);
        state.set_enabled(false);
        assert_eq!(state.last_frame_timing(), FrameTiming::default());
    }

    #[test]
    fn threshold_validation() {
        let mut state = PipelineState::default();
        assert!(state.set_edge_threshold(0).is_err());
        assert_eq!(state.config().edge_threshold.get(), 12);
        state.set_edge_threshold(64).unwrap();
        assert_eq!(state.frame_parameters(4, 4).edge_threshold_inverse, 1.0 / 64.0);
    }
}
