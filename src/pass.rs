//! The fixed three pass topology, described as data so that every backend
//! executes exactly the same sequence.

use wgpu::{CompareFunction, StencilOperation};

use crate::config::MlaaConfig;
use crate::shader::ShaderStage;

/// Edge with the pixel to the left.
pub const EDGE_LEFT: u8 = 1;
/// Edge with the pixel above.
pub const EDGE_TOP: u8 = 2;
/// Longest run counted in either direction. Counts are packed into nibbles.
pub const MAX_RUN_LENGTH: u8 = 15;

/// The three passes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Pass 1, writes the edge mask.
    DetectEdges,
    /// Pass 2, writes the edge lengths.
    MeasureEdges,
    /// Pass 3, writes the presented image.
    BlendColors,
}

/// Images a pass reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// The rendered scene, resolved when multisampled.
    SceneColor,
    /// Per pixel [`EDGE_LEFT`] and [`EDGE_TOP`] flags.
    EdgeMask,
    /// Packed run lengths, horizontal in R and vertical in G.
    EdgeLength,
    /// Stencil marks of the edge pixels. Tested by the attachment, never
    /// sampled.
    Stencil,
    /// The caller's output view.
    Presentation,
}

/// How a pass uses the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilUsage {
    /// No depth/stencil attachment.
    None,
    /// Clear the stencil and mark every pixel that reaches the output.
    Mark(StencilRule),
    /// Reject pixels that fail the rule, without writing.
    Test(StencilRule),
}

impl StencilUsage {
    /// The rule to apply, if the pass has a stencil attachment.
    pub fn rule(&self) -> Option<&StencilRule> {
        match self {
            StencilUsage::None => None,
            StencilUsage::Mark(rule) | StencilUsage::Test(rule) => Some(rule),
        }
    }
}

/// Stencil comparison and update applied to both faces.
///
/// Comparisons follow the wgpu convention: `reference <op> stored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilRule {
    /// Comparison between the reference and the stored value.
    pub compare: CompareFunction,
    /// Update applied when the comparison passes.
    pub pass_op: StencilOperation,
    /// Reference value, set per pass.
    pub reference: u32,
    /// Bits the update may change.
    pub write_mask: u32,
}

/// Pass 1: stencil is cleared to 0, so every surviving edge pixel becomes 1.
pub const MARK_EDGES: StencilRule = StencilRule {
    compare: CompareFunction::NotEqual,
    pass_op: StencilOperation::IncrementClamp,
    reference: 1,
    write_mask: 0xff,
};

/// Pass 2: only pixels marked by pass 1 run the shader.
pub const REJECT_UNMARKED: StencilRule = StencilRule {
    compare: CompareFunction::NotEqual,
    pass_op: StencilOperation::Keep,
    reference: 0,
    write_mask: 0,
};

impl StencilRule {
    /// Whether a pixel holding `stored` survives the test.
    pub fn test(&self, stored: u8) -> bool {
        let reference = (self.reference & 0xff) as u8;
        match self.compare {
            CompareFunction::Never => false,
            CompareFunction::Less => reference < stored,
            CompareFunction::Equal => reference == stored,
            CompareFunction::LessEqual => reference <= stored,
            CompareFunction::Greater => reference > stored,
            CompareFunction::NotEqual => reference != stored,
            CompareFunction::GreaterEqual => reference >= stored,
            CompareFunction::Always => true,
        }
    }

    /// The stencil value after a pixel passed the test.
    pub fn apply(&self, stored: u8) -> u8 {
        let reference = (self.reference & 0xff) as u8;
        let updated = match self.pass_op {
            StencilOperation::Keep => stored,
            StencilOperation::Zero => 0,
            StencilOperation::Replace => reference,
            StencilOperation::Invert => !stored,
            StencilOperation::IncrementClamp => stored.saturating_add(1),
            StencilOperation::DecrementClamp => stored.saturating_sub(1),
            StencilOperation::IncrementWrap => stored.wrapping_add(1),
            StencilOperation::DecrementWrap => stored.wrapping_sub(1),
        };
        let mask = (self.write_mask & 0xff) as u8;
        (stored & !mask) | (updated & mask)
    }

    pub(crate) fn state(&self) -> wgpu::StencilState {
        let face = wgpu::StencilFaceState {
            compare: self.compare,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: self.pass_op,
        };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: 0xff,
            write_mask: self.write_mask,
        }
    }
}

/// Everything a backend needs to know to execute one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassDescriptor {
    /// Which of the three passes this is.
    pub kind: PassKind,
    /// Debug label for the GPU pass.
    pub label: &'static str,
    /// Images read by the pass. Sampled inputs are bound in this order.
    pub inputs: &'static [Resource],
    /// The single color output.
    pub output: Resource,
    /// Shader variant to run.
    pub stage: ShaderStage,
    /// Stencil attachment usage.
    pub stencil: StencilUsage,
}

impl PassDescriptor {
    /// Inputs read through texture bindings, in binding order starting at 1.
    pub fn sampled_inputs(&self) -> impl Iterator<Item = Resource> + '_ {
        self.inputs
            .iter()
            .copied()
            .filter(|&input| input != Resource::Stencil)
    }
}

/// The passes to run this frame for the given configuration.
pub fn frame_passes(config: &MlaaConfig) -> [PassDescriptor; 3] {
    let detect = if config.use_stencil {
        PassDescriptor {
            kind: PassKind::DetectEdges,
            label: "mlaa detect edges (stencil)",
            inputs: &[Resource::SceneColor],
            output: Resource::EdgeMask,
            stage: ShaderStage::DetectEdgesStencil,
            stencil: StencilUsage::Mark(MARK_EDGES),
        }
    } else {
        PassDescriptor {
            kind: PassKind::DetectEdges,
            label: "mlaa detect edges",
            inputs: &[Resource::SceneColor],
            output: Resource::EdgeMask,
            stage: ShaderStage::DetectEdges,
            stencil: StencilUsage::None,
        }
    };

    let measure = if config.use_stencil {
        PassDescriptor {
            kind: PassKind::MeasureEdges,
            label: "mlaa measure edges (stencil)",
            inputs: &[Resource::EdgeMask, Resource::Stencil],
            output: Resource::EdgeLength,
            stage: ShaderStage::MeasureEdges,
            stencil: StencilUsage::Test(REJECT_UNMARKED),
        }
    } else {
        PassDescriptor {
            kind: PassKind::MeasureEdges,
            label: "mlaa measure edges",
            inputs: &[Resource::EdgeMask],
            output: Resource::EdgeLength,
            stage: ShaderStage::MeasureEdges,
            stencil: StencilUsage::None,
        }
    };

    let blend = PassDescriptor {
        kind: PassKind::BlendColors,
        label: if config.show_edges {
            "mlaa show edges"
        } else {
            "mlaa blend colors"
        },
        inputs: &[Resource::SceneColor, Resource::EdgeLength],
        output: Resource::Presentation,
        stage: if config.show_edges {
            ShaderStage::ShowEdges
        } else {
            ShaderStage::BlendColors
        },
        stencil: StencilUsage::None,
    };

    [detect, measure, blend]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_chain_outputs_into_inputs() {
        for use_stencil in [false, true] {
            let config = MlaaConfig {
                use_stencil,
                ..Default::default()
            };
            let passes = frame_passes(&config);
            assert_eq!(
                passes.map(|p| p.kind),
                [PassKind::DetectEdges, PassKind::MeasureEdges, PassKind::BlendColors]
            );
            assert!(passes[1].inputs.contains(&passes[0].output));
            assert!(passes[2].inputs.contains(&passes[1].output));
            assert_eq!(passes[2].output, Resource::Presentation);
        }
    }

    #[test]
    fn bindings_do_not_depend_on_config() {
        let expected = [
            vec![Resource::SceneColor],
            vec![Resource::EdgeMask],
            vec![Resource::SceneColor, Resource::EdgeLength],
        ];
        for use_stencil in [false, true] {
            for show_edges in [false, true] {
                let config = MlaaConfig {
                    use_stencil,
                    show_edges,
                    ..Default::default()
                };
                let passes = frame_passes(&config);
                for (pass, expected) in passes.iter().zip(&expected) {
                    assert_eq!(&pass.sampled_inputs().collect::<Vec<_>>(), expected);
                }
                assert_eq!(passes[1].inputs.contains(&Resource::Stencil), use_stencil);
            }
        }
    }

    #[test]
    fn stencil_only_in_first_two_passes() {
        let config = MlaaConfig::default();
        let passes = frame_passes(&config);
        assert!(matches!(passes[0].stencil, StencilUsage::Mark(_)));
        assert!(matches!(passes[1].stencil, StencilUsage::Test(_)));
        assert_eq!(passes[2].stencil, StencilUsage::None);

        let plain = frame_passes(&MlaaConfig {
            use_stencil: false,
            ..config
        });
        assert!(plain.iter().all(|p| p.stencil == StencilUsage::None));
    }

    #[test]
    fn marking_then_rejecting() {
        let cleared = 0;
        assert!(MARK_EDGES.test(cleared));
        let marked = MARK_EDGES.apply(cleared);
        assert_eq!(marked, 1);

        assert!(REJECT_UNMARKED.test(marked));
        assert!(!REJECT_UNMARKED.test(cleared));
        assert_eq!(REJECT_UNMARKED.apply(marked), marked);
    }

    #[test]
    fn increment_saturates() {
        assert_eq!(MARK_EDGES.apply(255), 255);
    }
}
