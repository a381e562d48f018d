//! Render pipelines and bind groups for the three passes.

use crate::pass::{PassDescriptor, PassKind, Resource, StencilUsage, MARK_EDGES, REJECT_UNMARKED};
use crate::shader::ShaderStage;
use crate::targets::{RenderTargetSet, DEPTH_STENCIL_FORMAT, EDGE_LENGTH_FORMAT, EDGE_MASK_FORMAT};
use crate::Error;

fn uniform_entry() -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

const COLOR: wgpu::TextureSampleType = wgpu::TextureSampleType::Float { filterable: false };
const UINT: wgpu::TextureSampleType = wgpu::TextureSampleType::Uint;

/// Pipeline state objects for every pass variant.
pub(crate) struct Pipelines {
    detect_layout: wgpu::BindGroupLayout,
    measure_layout: wgpu::BindGroupLayout,
    blend_layout: wgpu::BindGroupLayout,

    detect_edges: wgpu::RenderPipeline,
    detect_edges_stencil: wgpu::RenderPipeline,
    measure_edges: wgpu::RenderPipeline,
    measure_edges_stencil: wgpu::RenderPipeline,
    blend_colors: wgpu::RenderPipeline,
    show_edges: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat) -> Result<Self, Error> {
        let detect_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mlaa_detect_edges"),
            entries: &[uniform_entry(), texture_entry(1, COLOR)],
        });
        let measure_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mlaa_measure_edges"),
            entries: &[uniform_entry(), texture_entry(1, UINT)],
        });
        let blend_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mlaa_blend_colors"),
            entries: &[uniform_entry(), texture_entry(1, COLOR), texture_entry(2, UINT)],
        });

        let detect_edges = create_pipeline(
            device,
            ShaderStage::DetectEdges,
            &detect_layout,
            EDGE_MASK_FORMAT,
            None,
        )?;
        let detect_edges_stencil = create_pipeline(
            device,
            ShaderStage::DetectEdgesStencil,
            &detect_layout,
            EDGE_MASK_FORMAT,
            Some(MARK_EDGES.state()),
        )?;
        let measure_edges = create_pipeline(
            device,
            ShaderStage::MeasureEdges,
            &measure_layout,
            EDGE_LENGTH_FORMAT,
            None,
        )?;
        let measure_edges_stencil = create_pipeline(
            device,
            ShaderStage::MeasureEdges,
            &measure_layout,
            EDGE_LENGTH_FORMAT,
            Some(REJECT_UNMARKED.state()),
        )?;
        let blend_colors = create_pipeline(
            device,
            ShaderStage::BlendColors,
            &blend_layout,
            output_format,
            None,
        )?;
        let show_edges = create_pipeline(
            device,
            ShaderStage::ShowEdges,
            &blend_layout,
            output_format,
            None,
        )?;

        log::debug!("created mlaa pipelines for {:?}", output_format);

        Ok(Self {
            detect_layout,
            measure_layout,
            blend_layout,
            detect_edges,
            detect_edges_stencil,
            measure_edges,
            measure_edges_stencil,
            blend_colors,
            show_edges,
        })
    }

    fn layout(&self, kind: PassKind) -> &wgpu::BindGroupLayout {
        match kind {
            PassKind::DetectEdges => &self.detect_layout,
            PassKind::MeasureEdges => &self.measure_layout,
            PassKind::BlendColors => &self.blend_layout,
        }
    }

    pub fn select(&self, pass: &PassDescriptor) -> &wgpu::RenderPipeline {
        let stencil = pass.stencil != StencilUsage::None;
        match (pass.stage, stencil) {
            (ShaderStage::DetectEdges, _) => &self.detect_edges,
            (ShaderStage::DetectEdgesStencil, _) => &self.detect_edges_stencil,
            (ShaderStage::MeasureEdges, false) => &self.measure_edges,
            (ShaderStage::MeasureEdges, true) => &self.measure_edges_stencil,
            (ShaderStage::BlendColors, _) => &self.blend_colors,
            (ShaderStage::ShowEdges, _) => &self.show_edges,
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    stage: ShaderStage,
    bind_group_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    stencil: Option<wgpu::StencilState>,
) -> Result<wgpu::RenderPipeline, Error> {
    let module = stage.create_module(device)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(stage.label()),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(stage.label()),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some(ShaderStage::VERTEX_ENTRY),
            compilation_options: Default::default(),
            buffers: &[],
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: stencil.map(|stencil| wgpu::DepthStencilState {
            format: DEPTH_STENCIL_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil,
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some(ShaderStage::FRAGMENT_ENTRY),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    });

    match futures::executor::block_on(device.pop_error_scope()) {
        Some(error) => Err(Error::ShaderBinding {
            stage,
            message: error.to_string(),
        }),
        None => Ok(pipeline),
    }
}

fn input_view(targets: &RenderTargetSet, input: Resource) -> Option<&wgpu::TextureView> {
    match input {
        Resource::SceneColor => Some(targets.scene_input_view()),
        Resource::EdgeMask => Some(targets.edge_mask_view()),
        Resource::EdgeLength => Some(targets.edge_length_view()),
        Resource::Stencil | Resource::Presentation => None,
    }
}

/// Bind groups tying the pipelines to one [`RenderTargetSet`]. Rebuilt
/// together with the targets.
pub(crate) struct FrameBindings {
    groups: Vec<(PassKind, wgpu::BindGroup)>,
}

impl FrameBindings {
    /// One bind group per pass: the frame parameters at binding 0, then the
    /// sampled inputs of the descriptor.
    pub fn new(
        device: &wgpu::Device,
        pipelines: &Pipelines,
        targets: &RenderTargetSet,
        params: &wgpu::Buffer,
        passes: &[PassDescriptor],
    ) -> Self {
        let groups = passes
            .iter()
            .map(|pass| {
                let mut entries = vec![wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                }];
                for (binding, view) in pass
                    .sampled_inputs()
                    .filter_map(|input| input_view(targets, input))
                    .enumerate()
                {
                    entries.push(wgpu::BindGroupEntry {
                        binding: binding as u32 + 1,
                        resource: wgpu::BindingResource::TextureView(view),
                    });
                }
                let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(pass.label),
                    layout: pipelines.layout(pass.kind),
                    entries: &entries,
                });
                (pass.kind, group)
            })
            .collect();
        Self { groups }
    }

    pub fn select(&self, kind: PassKind) -> Option<&wgpu::BindGroup> {
        self.groups
            .iter()
            .find(|(bound, _)| *bound == kind)
            .map(|(_, group)| group)
    }
}
