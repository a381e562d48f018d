//! Software execution of the three passes.
//!
//! [`SoftwarePipeline`] runs the same [`PassDescriptor`](crate::PassDescriptor)s
//! as [`MlaaTarget`](crate::MlaaTarget), pixel for pixel the way the shaders
//! do, on images held in memory.

use std::time::Instant;

use crate::pass::{PassKind, StencilUsage};
use crate::shader::ShaderStage;
use crate::{Error, FrameTiming, MlaaConfig, PipelineState};

mod blend;
mod detect;
mod image;
mod measure;

pub use blend::{blend_colors, coverage};
pub use detect::{detect_edges, edge_flags};
pub use image::{ColorImage, EdgeLengthImage, EdgeMaskImage, Image, StencilBuffer};
pub use measure::{measure_pixel, unpack, EdgeLengthAccumulator, FullScreen, StencilRejected};

/// The in-memory counterpart of [`RenderTargetSet`](crate::RenderTargetSet).
#[derive(Debug, Clone)]
pub struct SoftwareTargets {
    edge_mask: EdgeMaskImage,
    edge_length: EdgeLengthImage,
    stencil: StencilBuffer,
    generation: u64,
}

impl SoftwareTargets {
    /// Allocate images of the given size.
    pub fn new(width: u32, height: u32, sample_count: u32) -> Result<Self, Error> {
        Self::validate(width, height, sample_count)?;
        Ok(Self::allocate(width, height, 0))
    }

    fn validate(width: u32, height: u32, sample_count: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResolution { width, height });
        }
        if sample_count != 1 {
            return Err(Error::UnsupportedSampleCount(sample_count));
        }
        Ok(())
    }

    fn allocate(width: u32, height: u32, generation: u64) -> Self {
        log::debug!("allocated software mlaa targets {}x{}", width, height);
        Self {
            edge_mask: EdgeMaskImage::new(width, height),
            edge_length: EdgeLengthImage::new(width, height),
            stencil: StencilBuffer::new(width, height),
            generation,
        }
    }

    /// Reallocate every image, unless the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32, sample_count: u32) -> Result<(), Error> {
        Self::validate(width, height, sample_count)?;
        if (width, height) == (self.width(), self.height()) {
            return Ok(());
        }
        *self = Self::allocate(width, height, self.generation + 1);
        Ok(())
    }

    /// Width of every image in the set.
    pub fn width(&self) -> u32 {
        self.edge_mask.width()
    }

    /// Height of every image in the set.
    pub fn height(&self) -> u32 {
        self.edge_mask.height()
    }

    /// Bumped on every reallocation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Output of pass 1 for the last frame.
    pub fn edge_mask(&self) -> &EdgeMaskImage {
        &self.edge_mask
    }

    /// Output of pass 2 for the last frame.
    pub fn edge_length(&self) -> &EdgeLengthImage {
        &self.edge_length
    }

    /// Stencil marks. Only written on the stencil path.
    pub fn stencil(&self) -> &StencilBuffer {
        &self.stencil
    }
}

/// Runs frames through the three passes on the CPU.
///
/// ```
/// use mlaa::cpu::{ColorImage, SoftwarePipeline};
/// use mlaa::MlaaConfig;
///
/// let scene = ColorImage::from_fn(8, 8, |x, y| {
///     if x >= 4 && y >= 4 { [255; 4] } else { [0, 0, 0, 255] }
/// });
/// let mut pipeline = SoftwarePipeline::new(8, 8, MlaaConfig::default()).unwrap();
/// let output = pipeline.run_frame(&scene).unwrap();
/// assert_ne!(output, scene);
/// ```
#[derive(Debug, Clone)]
pub struct SoftwarePipeline {
    state: PipelineState,
    targets: SoftwareTargets,
}

impl SoftwarePipeline {
    /// Allocate targets for `width` by `height` frames.
    pub fn new(width: u32, height: u32, config: MlaaConfig) -> Result<Self, Error> {
        Ok(Self {
            state: PipelineState::new(config),
            targets: SoftwareTargets::new(width, height, 1)?,
        })
    }

    /// See [`SoftwareTargets::resize`]. Always single sampled.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        self.targets.resize(width, height, 1)
    }

    /// Configuration, frame stage and timing.
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Mutable access for the configuration setters.
    pub fn state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    /// Current configuration.
    pub fn config(&self) -> &MlaaConfig {
        self.state.config()
    }

    /// Intermediate images of the last frame.
    pub fn targets(&self) -> &SoftwareTargets {
        &self.targets
    }

    /// Wall clock time of each pass, averaged like the GPU timestamps.
    pub fn last_frame_timing(&self) -> FrameTiming {
        self.state.last_frame_timing()
    }

    /// Antialias `scene`, which must match the target size. Returns the
    /// presented image.
    pub fn run_frame(&mut self, scene: &ColorImage) -> Result<ColorImage, Error> {
        if (scene.width(), scene.height()) != (self.targets.width(), self.targets.height()) {
            return Err(Error::InvalidResolution {
                width: scene.width(),
                height: scene.height(),
            });
        }
        if !self.state.config().enabled {
            self.state.present_unmodified();
            return Ok(scene.clone());
        }

        self.state.begin_frame()?;
        match self.run_passes(scene) {
            Ok((output, millis)) => {
                self.state.end_frame(Some(millis))?;
                log::trace!("software mlaa frame took {:?} ms", millis);
                Ok(output)
            }
            Err(e) => {
                self.state.abandon_frame();
                Err(e)
            }
        }
    }

    fn run_passes(&mut self, scene: &ColorImage) -> Result<(ColorImage, [f32; 3]), Error> {
        let params = self
            .state
            .frame_parameters(self.targets.width(), self.targets.height());
        let targets = &mut self.targets;
        let mut output = None;
        let mut millis = [0.0; 3];

        for (index, pass) in self.state.passes().iter().enumerate() {
            let started = Instant::now();
            match pass.kind {
                PassKind::DetectEdges => detect_edges(
                    scene,
                    params.edge_threshold_inverse,
                    pass.stencil,
                    &mut targets.edge_mask,
                    &mut targets.stencil,
                ),
                PassKind::MeasureEdges => {
                    let accumulator: Box<dyn EdgeLengthAccumulator> = match pass.stencil {
                        StencilUsage::Test(rule) => Box::new(StencilRejected { rule }),
                        _ => Box::new(FullScreen),
                    };
                    accumulator.accumulate(&targets.edge_mask, &targets.stencil, &mut targets.edge_length);
                }
                PassKind::BlendColors => {
                    let show_edges = pass.stage == ShaderStage::ShowEdges;
                    output = Some(blend_colors(scene, &targets.edge_length, show_edges));
                }
            }
            millis[index] = started.elapsed().as_secs_f32() * 1000.0;
            self.state.complete(pass.kind)?;
        }

        let output = output.ok_or(Error::OutOfOrder {
            from: self.state.stage(),
            to: crate::FrameStage::Presented,
        })?;
        Ok((output, millis))
    }
}
