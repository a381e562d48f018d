use thiserror::Error;

use crate::shader::ShaderStage;
use crate::state::FrameStage;

/// Errors produced while building or running the antialiasing pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A render target, view or buffer could not be created.
    #[error("failed to allocate MLAA resources: {0}")]
    AllocationFailed(String),

    /// A shader failed to parse, validate or bind into a pipeline.
    #[error("shader {stage:?} failed to build: {message}")]
    ShaderBinding {
        /// The stage that failed.
        stage: ShaderStage,
        /// Diagnostic from naga or wgpu.
        message: String,
    },

    /// The device went away. Everything must be recreated from scratch.
    #[error("graphics device was lost")]
    DeviceLost,

    /// A frame was requested while no valid set of render targets exists.
    #[error("render targets are not allocated; call resize first")]
    NotReady,

    /// Render targets cannot have a zero dimension.
    #[error("invalid target resolution {width}x{height}")]
    InvalidResolution {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Sample counts start at one.
    #[error("unsupported sample count {0}")]
    UnsupportedSampleCount(u32),

    /// The edge threshold must lie in `1..=64`.
    #[error("edge threshold {0} is outside 1..=64")]
    InvalidThreshold(u32),

    /// Passes were run out of order.
    #[error("frame cannot move from {from:?} to {to:?}")]
    OutOfOrder {
        /// Stage the frame was in.
        from: FrameStage,
        /// Stage that was requested.
        to: FrameStage,
    },
}
