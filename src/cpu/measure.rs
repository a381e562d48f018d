use super::{EdgeLengthImage, EdgeMaskImage, StencilBuffer};
use crate::pass::{StencilRule, EDGE_LEFT, EDGE_TOP, MAX_RUN_LENGTH};

fn has_edge(mask: &EdgeMaskImage, x: i64, y: i64, bit: u8) -> bool {
    mask.get_signed(x, y).map_or(false, |flags| flags & bit != 0)
}

fn pack(back: u8, ahead: u8) -> u8 {
    (back << 4) | ahead
}

/// Run along the top boundary of `(x, y)`. A step across a column boundary
/// is blocked by a left edge on either side of the run.
fn horizontal_run(mask: &EdgeMaskImage, x: i64, y: i64) -> u8 {
    if !has_edge(mask, x, y, EDGE_TOP) {
        return 0;
    }
    let crossed = |b: i64| has_edge(mask, b, y, EDGE_LEFT) || has_edge(mask, b, y - 1, EDGE_LEFT);

    let mut back = 1;
    let mut cx = x;
    while back < MAX_RUN_LENGTH && !crossed(cx) && has_edge(mask, cx - 1, y, EDGE_TOP) {
        cx -= 1;
        back += 1;
    }

    let mut ahead = 0;
    let mut cx = x + 1;
    while ahead < MAX_RUN_LENGTH && !crossed(cx) && has_edge(mask, cx, y, EDGE_TOP) {
        cx += 1;
        ahead += 1;
    }
    pack(back, ahead)
}

/// Run along the left boundary of `(x, y)`.
fn vertical_run(mask: &EdgeMaskImage, x: i64, y: i64) -> u8 {
    if !has_edge(mask, x, y, EDGE_LEFT) {
        return 0;
    }
    let crossed = |b: i64| has_edge(mask, x, b, EDGE_TOP) || has_edge(mask, x - 1, b, EDGE_TOP);

    let mut back = 1;
    let mut cy = y;
    while back < MAX_RUN_LENGTH && !crossed(cy) && has_edge(mask, x, cy - 1, EDGE_LEFT) {
        cy -= 1;
        back += 1;
    }

    let mut ahead = 0;
    let mut cy = y + 1;
    while ahead < MAX_RUN_LENGTH && !crossed(cy) && has_edge(mask, x, cy, EDGE_LEFT) {
        cy += 1;
        ahead += 1;
    }
    pack(back, ahead)
}

/// Both packed runs of the pixel at `(x, y)`.
pub fn measure_pixel(mask: &EdgeMaskImage, x: u32, y: u32) -> [u8; 2] {
    let (x, y) = (x as i64, y as i64);
    [horizontal_run(mask, x, y), vertical_run(mask, x, y)]
}

/// Unpack a run channel into `(back, ahead)`.
pub fn unpack(run: u8) -> (u8, u8) {
    (run >> 4, run & 0x0f)
}

/// Pass 2. Implementations differ in which pixels they visit but must leave
/// identical images behind.
pub trait EdgeLengthAccumulator {
    /// Clear `lengths` and fill in the runs of the visited pixels.
    fn accumulate(&self, mask: &EdgeMaskImage, stencil: &StencilBuffer, lengths: &mut EdgeLengthImage);
}

/// Visits every pixel.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullScreen;

impl EdgeLengthAccumulator for FullScreen {
    fn accumulate(&self, mask: &EdgeMaskImage, _: &StencilBuffer, lengths: &mut EdgeLengthImage) {
        lengths.clear();
        for y in 0..mask.height() {
            for x in 0..mask.width() {
                lengths.set(x, y, measure_pixel(mask, x, y));
            }
        }
    }
}

/// Visits only the pixels whose stencil passes `rule`.
#[derive(Debug, Clone, Copy)]
pub struct StencilRejected {
    /// Test applied to each stored stencil value.
    pub rule: StencilRule,
}

impl EdgeLengthAccumulator for StencilRejected {
    fn accumulate(&self, mask: &EdgeMaskImage, stencil: &StencilBuffer, lengths: &mut EdgeLengthImage) {
        lengths.clear();
        for y in 0..mask.height() {
            for x in 0..mask.width() {
                if self.rule.test(stencil.get(x, y)) {
                    lengths.set(x, y, measure_pixel(mask, x, y));
                }
            }
        }
    }
}
