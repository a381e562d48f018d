//! A library for post process antialiasing for the wgpu graphics API, based on
//! [Morphological Antialiasing (MLAA)](https://www.realtimerendering.com/blog/morphological-antialiasing/).
//!
//! The scene is rendered into an offscreen image owned by an [`MlaaTarget`].
//! Resolving a frame then runs three full screen passes: edge detection, edge
//! length accumulation and color blending, the last of which writes into the
//! presentation target.
//!
//! # Example
//!
//! ```no_run
//! # use mlaa::{MlaaConfig, MlaaTarget};
//! # fn frame(device: &wgpu::Device, queue: &wgpu::Queue, surface: &wgpu::Surface) -> Result<(), mlaa::Error> {
//! let mut target = MlaaTarget::new(
//!     device,
//!     queue,
//!     640,
//!     480,
//!     1,
//!     wgpu::TextureFormat::Bgra8Unorm,
//!     MlaaConfig::default(),
//! )?;
//!
//! // main loop
//! # let output = surface.get_current_texture().unwrap();
//! let view = output.texture.create_view(&Default::default());
//! let frame = target.start_frame(device, queue, &view)?;
//!
//! // Render the scene into `frame.color_attachment(..)`.
//! // [...]
//!
//! // Perform the actual antialiasing and write the result to `view`.
//! frame.resolve()?;
//! output.present();
//! # Ok(())
//! # }
//! ```
//!
//! The [`cpu`] module runs the same passes in software, which is how the
//! passes are tested without a graphics device.

#![deny(missing_docs)]

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod config;
pub mod cpu;
mod error;
pub mod pass;
mod pipelines;
mod shader;
mod state;
mod targets;
mod timer;
mod timing;

pub use config::{EdgeThreshold, FrameParameters, MlaaConfig};
pub use error::Error;
pub use pass::{frame_passes, PassDescriptor, PassKind, Resource, StencilRule, StencilUsage};
pub use shader::ShaderStage;
pub use state::{FrameStage, PipelineState};
pub use targets::{RenderTargetSet, DEPTH_STENCIL_FORMAT, EDGE_LENGTH_FORMAT, EDGE_MASK_FORMAT};
pub use timing::{FrameTiming, TimingAccumulator, TIMING_WINDOW};

use pipelines::{FrameBindings, Pipelines};
use timer::GpuTimer;

fn is_device_loss(reason: &wgpu::DeviceLostReason) -> bool {
    !matches!(
        reason,
        wgpu::DeviceLostReason::ReplacedCallback | wgpu::DeviceLostReason::Dropped
    )
}

struct FrameResources {
    targets: RenderTargetSet,
    bindings: FrameBindings,
}

/// Wraps a color and depth buffer, which it can resolve into an antialiased
/// image using MLAA.
pub struct MlaaTarget {
    state: PipelineState,
    format: wgpu::TextureFormat,

    pipelines: Pipelines,
    params_buffer: wgpu::Buffer,
    // None until the first successful resize, and again after a failed one.
    resources: Option<FrameResources>,
    timer: Option<GpuTimer>,

    lost: Arc<AtomicBool>,
}

impl MlaaTarget {
    /// Create a new `MlaaTarget`.
    ///
    /// `format` is the format of the presentation target passed to
    /// [`start_frame`](Self::start_frame). The scene is rendered in the same
    /// format. It should not be an sRGB format, because the passes work on the
    /// stored values.
    ///
    /// This claims the device lost callback slot of `device`: installing
    /// another callback afterwards leaves this target unaware of device loss.
    /// Replacing the callback or dropping the device does not count as a loss.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        sample_count: u32,
        format: wgpu::TextureFormat,
        config: MlaaConfig,
    ) -> Result<Self, Error> {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            if is_device_loss(&reason) {
                log::error!("mlaa device lost ({:?}): {}", reason, message);
                flag.store(true, Ordering::Release);
            } else {
                log::debug!("mlaa device lost callback released ({:?})", reason);
            }
        });

        let pipelines = Pipelines::new(device, format)?;
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mlaa_frame_parameters"),
            size: std::mem::size_of::<FrameParameters>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut target = Self {
            state: PipelineState::new(config),
            format,
            pipelines,
            params_buffer,
            resources: None,
            timer: GpuTimer::new(device, queue),
            lost,
        };
        target.resize(device, width, height, sample_count)?;
        Ok(target)
    }

    /// Resize the internal images. Resizing to the current size is free.
    ///
    /// On failure the target holds no images and [`start_frame`](Self::start_frame)
    /// returns [`Error::NotReady`] until a resize succeeds.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Result<(), Error> {
        if let Some(resources) = &self.resources {
            if resources.targets.matches(width, height, sample_count) {
                return Ok(());
            }
        }

        self.resources = None;
        let targets = RenderTargetSet::new(device, width, height, sample_count, self.format)?;
        // Sampled inputs are the same for every configuration, so the bind
        // groups only follow the targets.
        let bindings = FrameBindings::new(
            device,
            &self.pipelines,
            &targets,
            &self.params_buffer,
            &self.state.passes(),
        );
        self.resources = Some(FrameResources { targets, bindings });
        Ok(())
    }

    /// Turn the passes on or off. While off the scene goes straight to the
    /// presentation target and the timings read zero.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    /// Select the stencil accelerated variant of the first two passes.
    pub fn set_use_stencil(&mut self, use_stencil: bool) {
        self.state.set_use_stencil(use_stencil);
    }

    /// Set the edge detection threshold, in `1..=64`.
    pub fn set_edge_threshold(&mut self, threshold: u32) -> Result<(), Error> {
        self.state.set_edge_threshold(threshold)
    }

    /// Visualize detected edges instead of blending.
    pub fn set_show_edges(&mut self, show_edges: bool) {
        self.state.set_show_edges(show_edges);
    }

    /// Current configuration.
    pub fn config(&self) -> &MlaaConfig {
        self.state.config()
    }

    /// Per pass GPU time averaged over the last complete window of
    /// [`TIMING_WINDOW`] frames. All zero without timestamp query support.
    pub fn last_frame_timing(&self) -> FrameTiming {
        self.state.last_frame_timing()
    }

    /// The current images, if allocated.
    pub fn targets(&self) -> Option<&RenderTargetSet> {
        self.resources.as_ref().map(|r| &r.targets)
    }

    /// Start rendering a frame. The scene should be rendered into the returned
    /// frame, which resolves into `output_view` when dropped or when
    /// [`MlaaFrame::resolve`] is called.
    pub fn start_frame<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        output_view: &'a wgpu::TextureView,
    ) -> Result<MlaaFrame<'a>, Error> {
        if self.lost.load(Ordering::Acquire) {
            return Err(Error::DeviceLost);
        }
        let resources = self.resources.as_ref().ok_or(Error::NotReady)?;
        log::trace!("starting mlaa frame");

        Ok(MlaaFrame {
            state: &mut self.state,
            pipelines: &self.pipelines,
            params_buffer: &self.params_buffer,
            resources,
            timer: self.timer.as_mut(),
            lost: &self.lost,
            device,
            queue,
            output_view,
            resolved: false,
        })
    }
}

/// Frame that the scene should be rendered into; can be created by an
/// [`MlaaTarget`].
///
/// Derefs to the view the scene should be rendered into. With a multisampled
/// target use [`color_attachment`](Self::color_attachment), which also sets up
/// the resolve.
pub struct MlaaFrame<'a> {
    state: &'a mut PipelineState,
    pipelines: &'a Pipelines,
    params_buffer: &'a wgpu::Buffer,
    resources: &'a FrameResources,
    timer: Option<&'a mut GpuTimer>,
    lost: &'a AtomicBool,

    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    output_view: &'a wgpu::TextureView,
    resolved: bool,
}

impl<'a> MlaaFrame<'a> {
    fn renders_offscreen(&self) -> bool {
        self.state.config().enabled || self.resources.targets.sample_count() > 1
    }

    /// Color attachment for the scene render pass.
    pub fn color_attachment(
        &self,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> wgpu::RenderPassColorAttachment<'_> {
        let targets = &self.resources.targets;
        let resolve_target = if targets.sample_count() == 1 {
            None
        } else if self.state.config().enabled {
            targets.resolve_target()
        } else {
            Some(self.output_view)
        };
        wgpu::RenderPassColorAttachment {
            view: self.deref(),
            resolve_target,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        }
    }

    /// Depth/stencil view for the scene render pass. Its stencil contents do
    /// not survive the frame.
    pub fn depth_stencil_view(&self) -> &wgpu::TextureView {
        self.resources.targets.depth_stencil_view()
    }

    /// Run the passes now and report any failure.
    pub fn resolve(mut self) -> Result<(), Error> {
        self.run()
    }

    fn run(&mut self) -> Result<(), Error> {
        self.resolved = true;

        if self.lost.load(Ordering::Acquire) {
            self.state.abandon_frame();
            return Err(Error::DeviceLost);
        }
        if !self.state.config().enabled {
            self.state.present_unmodified();
            return Ok(());
        }

        let targets = &self.resources.targets;
        let params = self.state.frame_parameters(targets.width(), targets.height());
        self.queue
            .write_buffer(self.params_buffer, 0, bytemuck::bytes_of(&params));

        self.state.begin_frame()?;
        if let Err(e) = self.encode_and_submit() {
            self.state.abandon_frame();
            if let Some(timer) = self.timer.as_deref_mut() {
                timer.cancel();
            }
            return Err(e);
        }
        Ok(())
    }

    fn encode_and_submit(&mut self) -> Result<(), Error> {
        let targets = &self.resources.targets;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mlaa"),
            });

        for (index, pass) in self.state.passes().iter().enumerate() {
            let (view, load) = match pass.output {
                Resource::EdgeMask => (
                    targets.edge_mask_view(),
                    wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                ),
                Resource::EdgeLength => (
                    targets.edge_length_view(),
                    wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                ),
                _ => (self.output_view, wgpu::LoadOp::Load),
            };
            let bind_group = self
                .resources
                .bindings
                .select(pass.kind)
                .ok_or(Error::NotReady)?;
            let stencil_ops = match pass.stencil {
                StencilUsage::None => None,
                StencilUsage::Mark(_) => Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
                StencilUsage::Test(_) => Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Discard,
                }),
            };

            {
                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(pass.label),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: stencil_ops.map(|stencil_ops| {
                        wgpu::RenderPassDepthStencilAttachment {
                            view: targets.stencil_view(),
                            depth_ops: None,
                            stencil_ops: Some(stencil_ops),
                        }
                    }),
                    timestamp_writes: self.timer.as_deref().map(|t| t.pass_writes(index)),
                    occlusion_query_set: None,
                });
                rpass.set_pipeline(self.pipelines.select(pass));
                rpass.set_bind_group(0, bind_group, &[]);
                if let Some(rule) = pass.stencil.rule() {
                    rpass.set_stencil_reference(rule.reference);
                }
                rpass.draw(0..3, 0..1);
            }

            self.state.complete(pass.kind)?;
        }

        if let Some(timer) = self.timer.as_deref_mut() {
            timer.resolve(&mut encoder);
        }
        self.queue.submit(Some(encoder.finish()));

        let sample = match self.timer.as_deref_mut() {
            Some(timer) => {
                timer.after_submit();
                timer.collect(self.device)
            }
            None => None,
        };
        self.state.end_frame(sample)?;
        log::trace!("resolved mlaa frame, timing sample: {:?}", sample);
        Ok(())
    }
}

impl<'a> Deref for MlaaFrame<'a> {
    type Target = wgpu::TextureView;
    fn deref(&self) -> &Self::Target {
        if self.renders_offscreen() {
            self.resources.targets.scene_color_view()
        } else {
            self.output_view
        }
    }
}

impl<'a> Drop for MlaaFrame<'a> {
    fn drop(&mut self) {
        if !self.resolved {
            if let Err(e) = self.run() {
                log::error!("failed to resolve mlaa frame: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_real_loss_disables_the_target() {
        assert!(is_device_loss(&wgpu::DeviceLostReason::Unknown));
        assert!(is_device_loss(&wgpu::DeviceLostReason::Destroyed));
        assert!(!is_device_loss(&wgpu::DeviceLostReason::ReplacedCallback));
        assert!(!is_device_loss(&wgpu::DeviceLostReason::Dropped));
    }
}
