use super::measure::unpack;
use super::{ColorImage, EdgeLengthImage};
use crate::pass::MAX_RUN_LENGTH;

type Color = [f32; 4];

fn color_at(scene: &ColorImage, x: i64, y: i64) -> Color {
    let x = x.clamp(0, scene.width() as i64 - 1) as u32;
    let y = y.clamp(0, scene.height() as i64 - 1) as u32;
    scene.get(x, y).map(|c| c as f32 / 255.0)
}

fn runs_at(lengths: &EdgeLengthImage, x: i64, y: i64) -> [u8; 2] {
    lengths.get_signed(x, y).unwrap_or([0, 0])
}

fn end_height(into_first: bool, into_second: bool) -> f32 {
    0.5 * (into_first as u8 as f32 - into_second as u8 as f32)
}

/// Blend weights of one pixel of a run: `[first, second]`, where the first
/// side is above (or left of) the boundary.
pub fn coverage(run: u8, rise_start: f32, rise_end: f32) -> [f32; 2] {
    let (back, ahead) = unpack(run);
    if back == 0 {
        return [0.0, 0.0];
    }
    let half_len = (back + ahead) as f32 * 0.5;
    let cell = (back - 1) as f32;

    let (mut lead, mut trail) = (0.0, 0.0);
    if cell + 1.0 <= half_len {
        lead = rise_start * (half_len - cell - 0.5) / half_len;
    } else if cell >= half_len {
        trail = rise_end * (cell + 0.5 - half_len) / half_len;
    } else {
        lead = rise_start * 0.125 / half_len;
        trail = rise_end * 0.125 / half_len;
    }

    let first = lead.max(0.0) + trail.max(0.0);
    let second = (-lead).max(0.0) + (-trail).max(0.0);
    [first, second]
}

fn horizontal_coverage(lengths: &EdgeLengthImage, run: u8, x: i64, y: i64) -> [f32; 2] {
    let (back, ahead) = unpack(run);
    let height_at = |end: i64| {
        end_height(
            runs_at(lengths, end, y - 1)[1] != 0,
            runs_at(lengths, end, y)[1] != 0,
        )
    };
    let rise_start = if back < MAX_RUN_LENGTH {
        height_at(x - back as i64 + 1)
    } else {
        0.0
    };
    let rise_end = if ahead < MAX_RUN_LENGTH {
        height_at(x + ahead as i64 + 1)
    } else {
        0.0
    };
    coverage(run, rise_start, rise_end)
}

fn vertical_coverage(lengths: &EdgeLengthImage, run: u8, x: i64, y: i64) -> [f32; 2] {
    let (back, ahead) = unpack(run);
    let height_at = |end: i64| {
        end_height(
            runs_at(lengths, x - 1, end)[0] != 0,
            runs_at(lengths, x, end)[0] != 0,
        )
    };
    let rise_start = if back < MAX_RUN_LENGTH {
        height_at(y - back as i64 + 1)
    } else {
        0.0
    };
    let rise_end = if ahead < MAX_RUN_LENGTH {
        height_at(y + ahead as i64 + 1)
    } else {
        0.0
    };
    coverage(run, rise_start, rise_end)
}

fn mix_toward(blended: &mut Color, weight: f32, neighbour: Color, color: Color) {
    for ((out, n), c) in blended.iter_mut().zip(neighbour).zip(color) {
        *out += weight * (n - c);
    }
}

fn to_unorm(color: Color) -> [u8; 4] {
    color.map(|c| (c * 255.0).round() as u8)
}

fn blend_pixel(scene: &ColorImage, lengths: &EdgeLengthImage, x: i64, y: i64) -> Color {
    let color = color_at(scene, x, y);
    let own = runs_at(lengths, x, y);
    let mut blended = color;

    if own[0] != 0 {
        let weight = horizontal_coverage(lengths, own[0], x, y)[1];
        mix_toward(&mut blended, weight, color_at(scene, x, y - 1), color);
    }
    let below = runs_at(lengths, x, y + 1)[0];
    if below != 0 {
        let weight = horizontal_coverage(lengths, below, x, y + 1)[0];
        mix_toward(&mut blended, weight, color_at(scene, x, y + 1), color);
    }
    if own[1] != 0 {
        let weight = vertical_coverage(lengths, own[1], x, y)[1];
        mix_toward(&mut blended, weight, color_at(scene, x - 1, y), color);
    }
    let right = runs_at(lengths, x + 1, y)[1];
    if right != 0 {
        let weight = vertical_coverage(lengths, right, x + 1, y)[0];
        mix_toward(&mut blended, weight, color_at(scene, x + 1, y), color);
    }
    blended.map(|c| c.clamp(0.0, 1.0))
}

/// Diagnostic color of a run pixel. Red and green flag the horizontal and
/// vertical runs, blue is on the far side of the blended blue.
fn edge_marker([horizontal, vertical]: [u8; 2], blended: Color) -> [u8; 4] {
    let on = |set: bool| if set { 255 } else { 0 };
    [on(horizontal != 0), on(vertical != 0), on(blended[2] < 0.5), 255]
}

/// Pass 3. Produces the presented image from the scene and the runs.
///
/// With `show_edges` every pixel on a run is replaced by a marker color
/// which never equals the blended color of that pixel. Everything else is
/// copied.
pub fn blend_colors(scene: &ColorImage, lengths: &EdgeLengthImage, show_edges: bool) -> ColorImage {
    ColorImage::from_fn(scene.width(), scene.height(), |x, y| {
        let blended = blend_pixel(scene, lengths, x as i64, y as i64);
        match lengths.get(x, y) {
            [0, 0] if show_edges => scene.get(x, y),
            runs if show_edges => edge_marker(runs, blended),
            _ => to_unorm(blended),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_ends_give_no_coverage() {
        let run = (3 << 4) | 2;
        assert_eq!(coverage(run, 0.0, 0.0), [0.0, 0.0]);
    }

    #[test]
    fn coverage_falls_off_toward_the_middle() {
        // Run of four with the silhouette dropping into the second side at the start.
        let weights: Vec<_> = (1..=4u8)
            .map(|back| coverage((back << 4) | (4 - back), -0.5, 0.0)[1])
            .collect();
        assert_eq!(weights, vec![0.375, 0.125, 0.0, 0.0]);
    }

    #[test]
    fn straddling_pixel_splits_both_ends() {
        // Odd run: the middle pixel gets an eighth of each end height.
        let run = (2 << 4) | 1;
        let [first, second] = coverage(run, 0.5, -0.5);
        assert!((first - 0.5 * 0.125 / 1.5).abs() < 1e-6);
        assert!((second - 0.5 * 0.125 / 1.5).abs() < 1e-6);
    }

    #[test]
    fn empty_runs_copy_the_scene() {
        let scene = ColorImage::from_fn(4, 4, |x, y| [x as u8 * 40, y as u8 * 40, 7, 255]);
        let lengths = EdgeLengthImage::new(4, 4);
        assert_eq!(blend_colors(&scene, &lengths, false), scene);
        assert_eq!(blend_colors(&scene, &lengths, true), scene);
    }

    #[test]
    fn markers_never_match_the_blended_pixel() {
        // Red over black: the bottom row keeps its red when blended, so a
        // plain red marker would be indistinguishable.
        let scene = ColorImage::from_fn(4, 2, |_, y| {
            if y == 1 {
                [255, 0, 0, 255]
            } else {
                [0, 0, 0, 255]
            }
        });
        let mut lengths = EdgeLengthImage::new(4, 2);
        for x in 0..4u32 {
            lengths.set(x, 1, [((x as u8 + 1) << 4) | (3 - x as u8), 0]);
        }
        let blended = blend_colors(&scene, &lengths, false);
        let shown = blend_colors(&scene, &lengths, true);
        for x in 0..4 {
            assert_eq!(blended.get(x, 1), [255, 0, 0, 255]);
            assert_eq!(shown.get(x, 1), [255, 0, 255, 255]);
        }
        assert_eq!(shown.get(0, 0), scene.get(0, 0));
    }

    #[test]
    fn marker_blue_flips_with_the_blended_blue() {
        assert_eq!(edge_marker([1, 0], [0.0, 0.0, 0.2, 1.0]), [255, 0, 255, 255]);
        assert_eq!(edge_marker([0, 3], [0.0, 0.0, 0.5, 1.0]), [0, 255, 0, 255]);
        assert_eq!(edge_marker([1, 3], [1.0, 1.0, 0.9, 1.0]), [255, 255, 0, 255]);
    }
}
