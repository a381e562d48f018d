use crate::Error;

/// Sensitivity of the edge detector.
///
/// The detector compares luma differences against the reciprocal of this
/// value, so larger thresholds detect fainter edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeThreshold(u32);

impl EdgeThreshold {
    /// Smallest accepted threshold.
    pub const MIN: u32 = 1;
    /// Largest accepted threshold.
    pub const MAX: u32 = 64;

    /// Validate a threshold coming from the UI.
    pub fn new(value: u32) -> Result<Self, Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidThreshold(value))
        }
    }

    /// The raw slider value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// The luma difference an edge has to exceed.
    pub fn inverse(self) -> f32 {
        1.0 / self.0 as f32
    }
}

impl Default for EdgeThreshold {
    fn default() -> Self {
        Self(12)
    }
}

/// User facing switches of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MlaaConfig {
    /// Run the three passes. When false the scene is presented as rendered.
    pub enabled: bool,
    /// Flag edge pixels in the stencil buffer so the second pass can skip
    /// everything else.
    pub use_stencil: bool,
    /// Edge detection sensitivity.
    pub edge_threshold: EdgeThreshold,
    /// Replace the blended image with a visualization of the detected edges.
    pub show_edges: bool,
}

impl Default for MlaaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_stencil: true,
            edge_threshold: EdgeThreshold::default(),
            show_edges: false,
        }
    }
}

/// Uniform block shared by all three passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameParameters {
    /// Width and height of the render targets in pixels.
    pub target_size: [f32; 2],
    /// Reciprocal of the edge threshold.
    pub edge_threshold_inverse: f32,
    _padding: f32,
}

impl FrameParameters {
    /// Parameters for targets of `width` by `height` pixels.
    pub fn new(width: u32, height: u32, threshold: EdgeThreshold) -> Self {
        Self {
            target_size: [width as f32, height as f32],
            edge_threshold_inverse: threshold.inverse(),
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_bounds() {
        assert!(matches!(EdgeThreshold::new(0), Err(Error::InvalidThreshold(0))));
        assert!(matches!(EdgeThreshold::new(65), Err(Error::InvalidThreshold(65))));
        assert_eq!(EdgeThreshold::new(1).unwrap().get(), 1);
        assert_eq!(EdgeThreshold::new(64).unwrap().get(), 64);
    }

    #[test]
    fn parameters_carry_inverse_threshold() {
        let params = FrameParameters::new(640, 480, EdgeThreshold::new(8).unwrap());
        assert_eq!(params.target_size, [640.0, 480.0]);
        assert_eq!(params.edge_threshold_inverse, 0.125);
        assert_eq!(std::mem::size_of::<FrameParameters>(), 16);
    }
}
