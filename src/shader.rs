use std::borrow::Cow;

use crate::pass::{EDGE_LEFT, EDGE_TOP, MAX_RUN_LENGTH};
use crate::Error;

/// Every fragment shader variant used by the pipeline. Each variant is
/// compiled into its own module together with the shared fullscreen vertex
/// shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Pass 1, writing flags for every pixel.
    DetectEdges,
    /// Pass 1, discarding pixels without edges so the stencil marks only
    /// edge pixels.
    DetectEdgesStencil,
    /// Pass 2. The stencil test lives in the pipeline, not the shader.
    MeasureEdges,
    /// Pass 3.
    BlendColors,
    /// Pass 3, painting run pixels instead of blending.
    ShowEdges,
}

impl ShaderStage {
    /// Every variant.
    pub const ALL: [ShaderStage; 5] = [
        ShaderStage::DetectEdges,
        ShaderStage::DetectEdgesStencil,
        ShaderStage::MeasureEdges,
        ShaderStage::BlendColors,
        ShaderStage::ShowEdges,
    ];

    /// Vertex entry point, shared by all variants.
    pub const VERTEX_ENTRY: &'static str = "vs_fullscreen";
    /// Fragment entry point of every variant.
    pub const FRAGMENT_ENTRY: &'static str = "fs_main";

    fn use_stencil(&self) -> bool {
        matches!(*self, ShaderStage::DetectEdgesStencil)
    }

    fn show_edges(&self) -> bool {
        matches!(*self, ShaderStage::ShowEdges)
    }

    fn as_str(&self) -> &'static str {
        match *self {
            ShaderStage::DetectEdges | ShaderStage::DetectEdgesStencil => {
                include_str!("shaders/detect_edges.wgsl")
            }
            ShaderStage::MeasureEdges => include_str!("shaders/measure_edges.wgsl"),
            ShaderStage::BlendColors | ShaderStage::ShowEdges => {
                include_str!("shaders/blend_colors.wgsl")
            }
        }
    }

    /// Debug label of the module and pipeline.
    pub fn label(&self) -> &'static str {
        match *self {
            ShaderStage::DetectEdges => "mlaa_detect_edges",
            ShaderStage::DetectEdgesStencil => "mlaa_detect_edges_stencil",
            ShaderStage::MeasureEdges => "mlaa_measure_edges",
            ShaderStage::BlendColors => "mlaa_blend_colors",
            ShaderStage::ShowEdges => "mlaa_show_edges",
        }
    }

    /// Full WGSL source: variant constants, shared declarations and the stage body.
    pub fn source(&self) -> String {
        format!(
            "const USE_STENCIL: bool = {0};
const SHOW_EDGES: bool = {1};
const EDGE_LEFT: u32 = {2}u;
const EDGE_TOP: u32 = {3}u;
const MAX_RUN: u32 = {4}u;
{5}
{6}",
            self.use_stencil(),
            self.show_edges(),
            EDGE_LEFT,
            EDGE_TOP,
            MAX_RUN_LENGTH,
            include_str!("shaders/common.wgsl"),
            self.as_str(),
        )
    }

    /// Parse and validate the source with naga. Returns the source on success.
    pub fn validate(&self) -> Result<String, Error> {
        let source = self.source();
        let module = naga::front::wgsl::parse_str(&source).map_err(|e| Error::ShaderBinding {
            stage: *self,
            message: e.emit_to_string(&source),
        })?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .map_err(|e| Error::ShaderBinding {
            stage: *self,
            message: e.emit_to_string(&source),
        })?;
        Ok(source)
    }

    pub(crate) fn create_module(&self, device: &wgpu::Device) -> Result<wgpu::ShaderModule, Error> {
        let source = self.validate()?;
        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.label()),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        }))
    }
}
