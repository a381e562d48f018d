//! Auxiliary images sized to the back buffer.

use crate::Error;

/// Edge flags, see [`EDGE_LEFT`](crate::pass::EDGE_LEFT) and [`EDGE_TOP`](crate::pass::EDGE_TOP).
pub const EDGE_MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Uint;
/// Packed horizontal and vertical run lengths.
pub const EDGE_LENGTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg8Uint;
/// Depth/stencil of the scene render; the stencil half is reused by passes 1 and 2.
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Target {
    fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        sample_count: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Scene color, edge mask, edge length and depth/stencil images, all with
/// the same dimensions.
///
/// A set is never resized in place: the controller drops it and allocates a
/// new one, so the images can never disagree about their size.
pub struct RenderTargetSet {
    width: u32,
    height: u32,
    sample_count: u32,
    color_format: wgpu::TextureFormat,

    scene_color: Target,
    resolved_color: Option<Target>,
    edge_mask: Target,
    edge_length: Target,
    depth_stencil: Target,
    // Passes 1 and 2 are single-sampled, so a multisampled scene needs its own stencil.
    mlaa_stencil: Option<Target>,
}

impl RenderTargetSet {
    pub(crate) fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        sample_count: u32,
        color_format: wgpu::TextureFormat,
    ) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResolution { width, height });
        }
        if sample_count == 0 {
            return Err(Error::UnsupportedSampleCount(sample_count));
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let sampled = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;
        let multisampled = sample_count > 1;

        let scene_color = Target::new(
            device,
            "mlaa_scene_color",
            width,
            height,
            sample_count,
            color_format,
            if multisampled {
                wgpu::TextureUsages::RENDER_ATTACHMENT
            } else {
                sampled | wgpu::TextureUsages::COPY_DST
            },
        );
        let resolved_color = multisampled.then(|| {
            Target::new(
                device,
                "mlaa_resolved_color",
                width,
                height,
                1,
                color_format,
                sampled,
            )
        });
        let edge_mask = Target::new(
            device,
            "mlaa_edge_mask",
            width,
            height,
            1,
            EDGE_MASK_FORMAT,
            sampled,
        );
        let edge_length = Target::new(
            device,
            "mlaa_edge_length",
            width,
            height,
            1,
            EDGE_LENGTH_FORMAT,
            sampled,
        );
        let depth_stencil = Target::new(
            device,
            "mlaa_depth_stencil",
            width,
            height,
            sample_count,
            DEPTH_STENCIL_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let mlaa_stencil = multisampled.then(|| {
            Target::new(
                device,
                "mlaa_stencil",
                width,
                height,
                1,
                DEPTH_STENCIL_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
        });

        let out_of_memory = futures::executor::block_on(device.pop_error_scope());
        let invalid = futures::executor::block_on(device.pop_error_scope());
        if let Some(error) = out_of_memory.or(invalid) {
            return Err(Error::AllocationFailed(error.to_string()));
        }

        log::debug!(
            "allocated mlaa targets {}x{} with {} sample(s)",
            width,
            height,
            sample_count
        );

        Ok(Self {
            width,
            height,
            sample_count,
            color_format,
            scene_color,
            resolved_color,
            edge_mask,
            edge_length,
            depth_stencil,
            mlaa_stencil,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel of the scene color and depth.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Format of the scene color image, identical to the presentation format.
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Whether a resize to these parameters would be a no-op.
    pub fn matches(&self, width: u32, height: u32, sample_count: u32) -> bool {
        (self.width, self.height, self.sample_count) == (width, height, sample_count)
    }

    /// The image the scene is rendered into (multisampled if requested).
    pub fn scene_color_view(&self) -> &wgpu::TextureView {
        &self.scene_color.view
    }

    /// Resolve destination for a multisampled scene.
    pub fn resolve_target(&self) -> Option<&wgpu::TextureView> {
        self.resolved_color.as_ref().map(|t| &t.view)
    }

    /// Single-sampled scene color, as read by the passes.
    pub fn scene_input_texture(&self) -> &wgpu::Texture {
        match &self.resolved_color {
            Some(resolved) => &resolved.texture,
            None => &self.scene_color.texture,
        }
    }

    pub(crate) fn scene_input_view(&self) -> &wgpu::TextureView {
        match &self.resolved_color {
            Some(resolved) => &resolved.view,
            None => &self.scene_color.view,
        }
    }

    /// Pass 1 output, in [`EDGE_MASK_FORMAT`].
    pub fn edge_mask_texture(&self) -> &wgpu::Texture {
        &self.edge_mask.texture
    }

    pub(crate) fn edge_mask_view(&self) -> &wgpu::TextureView {
        &self.edge_mask.view
    }

    /// Pass 2 output, in [`EDGE_LENGTH_FORMAT`].
    pub fn edge_length_texture(&self) -> &wgpu::Texture {
        &self.edge_length.texture
    }

    pub(crate) fn edge_length_view(&self) -> &wgpu::TextureView {
        &self.edge_length.view
    }

    /// Depth/stencil for the scene render.
    pub fn depth_stencil_view(&self) -> &wgpu::TextureView {
        &self.depth_stencil.view
    }

    /// Stencil attachment used by the first two passes.
    pub(crate) fn stencil_view(&self) -> &wgpu::TextureView {
        match &self.mlaa_stencil {
            Some(stencil) => &stencil.view,
            None => &self.depth_stencil.view,
        }
    }
}
