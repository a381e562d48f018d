use super::{ColorImage, EdgeMaskImage, StencilBuffer};
use crate::pass::{StencilUsage, EDGE_LEFT, EDGE_TOP};

const LUMA_WEIGHTS: [f32; 3] = [0.30, 0.59, 0.11];

fn luma(color: [u8; 4]) -> f32 {
    let [r, g, b, _] = color.map(|c| c as f32 / 255.0);
    r * LUMA_WEIGHTS[0] + g * LUMA_WEIGHTS[1] + b * LUMA_WEIGHTS[2]
}

/// Edge flags of the pixel at `(x, y)`.
pub fn edge_flags(scene: &ColorImage, x: u32, y: u32, threshold_inverse: f32) -> u8 {
    let center = luma(scene.get(x, y));
    let mut mask = 0;
    if x > 0 && (center - luma(scene.get(x - 1, y))).abs() > threshold_inverse {
        mask |= EDGE_LEFT;
    }
    if y > 0 && (center - luma(scene.get(x, y - 1))).abs() > threshold_inverse {
        mask |= EDGE_TOP;
    }
    mask
}

/// Pass 1. Clears `mask` and writes the flags of every pixel.
///
/// With [`StencilUsage::Mark`] the stencil is cleared as well and pixels
/// without edges are discarded, so only edge pixels are marked.
pub fn detect_edges(
    scene: &ColorImage,
    threshold_inverse: f32,
    stencil_usage: StencilUsage,
    mask: &mut EdgeMaskImage,
    stencil: &mut StencilBuffer,
) {
    mask.clear();
    let mark = match stencil_usage {
        StencilUsage::Mark(rule) => {
            stencil.clear();
            Some(rule)
        }
        _ => None,
    };

    for y in 0..scene.height() {
        for x in 0..scene.width() {
            let flags = edge_flags(scene, x, y, threshold_inverse);
            match mark {
                None => mask.set(x, y, flags),
                Some(_) if flags == 0 => {}
                Some(rule) => {
                    let stored = stencil.get(x, y);
                    if rule.test(stored) {
                        stencil.set(x, y, rule.apply(stored));
                        mask.set(x, y, flags);
                    }
                }
            }
        }
    }
}
