use mlaa::cpu::{unpack, ColorImage, SoftwarePipeline, SoftwareTargets};
use mlaa::pass::{EDGE_LEFT, EDGE_TOP};
use mlaa::{Error, FrameTiming, MlaaConfig, TimingAccumulator, TIMING_WINDOW};

const BLACK: [u8; 4] = [0, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

fn pipeline(width: u32, height: u32, config: MlaaConfig) -> SoftwarePipeline {
    SoftwarePipeline::new(width, height, config).unwrap()
}

fn vertical_boundary(width: u32, height: u32, a: [u8; 4], b: [u8; 4]) -> ColorImage {
    ColorImage::from_fn(width, height, |x, _| if x < width / 2 { a } else { b })
}

fn corner(size: u32) -> ColorImage {
    ColorImage::from_fn(size, size, |x, y| {
        if x >= size / 2 && y >= size / 2 {
            WHITE
        } else {
            BLACK
        }
    })
}

fn noise(width: u32, height: u32, seed: u32) -> ColorImage {
    let mut state = seed;
    ColorImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let v = (state >> 24) as u8;
        // Quantize so that flat areas and long runs appear as well.
        let v = v & 0xc0;
        [v, v / 2, 255 - v, 255]
    })
}

fn scenes() -> Vec<ColorImage> {
    vec![
        vertical_boundary(12, 12, BLACK, WHITE),
        corner(8),
        ColorImage::from_fn(20, 9, |x, y| if (x + y) % 2 == 0 { BLACK } else { WHITE }),
        ColorImage::from_fn(24, 24, |x, y| if y > x / 3 + 2 { WHITE } else { BLACK }),
        noise(33, 17, 1),
        noise(16, 40, 7),
    ]
}

#[test]
fn resize_matches_requested_dimensions() {
    let mut targets = SoftwareTargets::new(4, 4, 1).unwrap();
    for (w, h) in [(1, 1), (640, 480), (3, 1000), (17, 5)] {
        targets.resize(w, h, 1).unwrap();
        for (iw, ih) in [
            (targets.edge_mask().width(), targets.edge_mask().height()),
            (targets.edge_length().width(), targets.edge_length().height()),
            (targets.stencil().width(), targets.stencil().height()),
        ] {
            assert_eq!((iw, ih), (w, h));
        }

        let generation = targets.generation();
        targets.resize(w, h, 1).unwrap();
        assert_eq!(targets.generation(), generation);
        assert_eq!((targets.width(), targets.height()), (w, h));
    }
}

#[test]
fn resize_rejects_empty_targets() {
    let mut targets = SoftwareTargets::new(4, 4, 1).unwrap();
    assert!(matches!(
        targets.resize(0, 4, 1),
        Err(Error::InvalidResolution { width: 0, height: 4 })
    ));
    assert!(matches!(
        SoftwareTargets::new(4, 0, 1),
        Err(Error::InvalidResolution { .. })
    ));
    assert!(matches!(
        targets.resize(4, 4, 0),
        Err(Error::UnsupportedSampleCount(0))
    ));
    assert_eq!((targets.width(), targets.height()), (4, 4));
}

#[test]
fn frame_size_must_match_targets() {
    let mut pipeline = pipeline(8, 8, MlaaConfig::default());
    assert!(pipeline.run_frame(&corner(4)).is_err());
    pipeline.resize(4, 4).unwrap();
    assert!(pipeline.run_frame(&corner(4)).is_ok());
}

#[test]
fn uniform_image_has_no_edges() {
    let scene = ColorImage::filled(16, 16, [90, 30, 200, 255]);
    for threshold in 1..=64 {
        for use_stencil in [false, true] {
            let mut config = MlaaConfig {
                use_stencil,
                ..Default::default()
            };
            config.edge_threshold = mlaa::EdgeThreshold::new(threshold).unwrap();
            let mut pipeline = pipeline(16, 16, config);
            let output = pipeline.run_frame(&scene).unwrap();

            assert!(pipeline.targets().edge_mask().pixels().iter().all(|&m| m == 0));
            assert_eq!(output, scene);
        }
    }
}

#[test]
fn vertical_boundary_flags_one_column() {
    let (width, height) = (12, 12);
    let scene = vertical_boundary(width, height, BLACK, WHITE);
    let mut pipeline = pipeline(width, height, MlaaConfig::default());
    let output = pipeline.run_frame(&scene).unwrap();

    let mask = pipeline.targets().edge_mask();
    let lengths = pipeline.targets().edge_length();
    for y in 0..height {
        for x in 0..width {
            let expected = if x == width / 2 { EDGE_LEFT } else { 0 };
            assert_eq!(mask.get(x, y), expected, "mask at ({x}, {y})");
        }

        let [horizontal, vertical] = lengths.get(width / 2, y);
        assert_eq!(horizontal, 0);
        let (back, ahead) = unpack(vertical);
        assert_eq!((back + ahead) as u32, height);
        assert_eq!(back as u32, y + 1);
    }

    // No perpendicular edge at either end of the run: nothing to reconstruct.
    assert_eq!(output, scene);
}

#[test]
fn jogged_boundary_is_smoothed_inside_the_band() {
    // The boundary steps one column right halfway down.
    let (width, height) = (12, 12);
    let scene = ColorImage::from_fn(width, height, |x, y| {
        let split = if y < height / 2 { width / 2 } else { width / 2 + 1 };
        if x < split {
            BLACK
        } else {
            WHITE
        }
    });
    let mut pipeline = pipeline(width, height, MlaaConfig::default());
    let output = pipeline.run_frame(&scene).unwrap();

    let mask = pipeline.targets().edge_mask();
    assert_eq!(mask.get(6, 5), EDGE_LEFT);
    assert_eq!(mask.get(6, 6), EDGE_TOP);
    assert_eq!(mask.get(7, 6), EDGE_LEFT);

    for (x, y) in [(6, 5), (6, 6)] {
        let [r, g, b, a] = output.get(x, y);
        assert!(r > 0 && r < 255, "({x}, {y}) not blended: {r}");
        assert_eq!((g, b, a), (r, r, 255));
    }
    for y in 0..height {
        for x in (0..5).chain(8..width) {
            assert_eq!(output.get(x, y), scene.get(x, y), "outside the band at ({x}, {y})");
        }
    }
}

#[test]
fn staircase_corner_is_smoothed() {
    let scene = corner(8);
    let mut pipeline = pipeline(8, 8, MlaaConfig::default());
    let output = pipeline.run_frame(&scene).unwrap();

    let mask = pipeline.targets().edge_mask();
    assert_eq!(mask.get(4, 4), EDGE_LEFT | EDGE_TOP);
    assert_eq!(mask.get(5, 4), EDGE_TOP);
    assert_eq!(mask.get(4, 5), EDGE_LEFT);

    // A quarter of the corner pixel is covered from each side.
    assert_eq!(output.get(4, 4), [64, 64, 64, 255]);
    assert!(output.get(5, 4)[0] < 255);
    assert!(output.get(4, 5)[0] < 255);
    assert_eq!(output.get(0, 0), BLACK);
    assert_eq!(output.get(7, 7), WHITE);
}

#[test]
fn stencil_path_matches_plain_path() {
    for scene in scenes() {
        let (w, h) = (scene.width(), scene.height());
        let mut plain = pipeline(
            w,
            h,
            MlaaConfig {
                use_stencil: false,
                ..Default::default()
            },
        );
        let mut stencil = pipeline(w, h, MlaaConfig::default());

        let plain_output = plain.run_frame(&scene).unwrap();
        let stencil_output = stencil.run_frame(&scene).unwrap();

        assert_eq!(plain.targets().edge_mask(), stencil.targets().edge_mask());
        assert_eq!(plain.targets().edge_length(), stencil.targets().edge_length());
        assert_eq!(plain_output, stencil_output);

        for (&marked, &flags) in stencil
            .targets()
            .stencil()
            .pixels()
            .iter()
            .zip(stencil.targets().edge_mask().pixels())
        {
            assert_eq!(marked != 0, flags != 0);
        }
    }
}

#[test]
fn show_edges_differs_only_when_edges_exist() {
    let show = MlaaConfig {
        show_edges: true,
        ..Default::default()
    };
    let red_under_black = ColorImage::from_fn(8, 8, |_, y| {
        if y < 4 {
            BLACK
        } else {
            [255, 0, 0, 255]
        }
    });
    for scene in scenes().into_iter().chain([red_under_black]) {
        let (w, h) = (scene.width(), scene.height());
        let blended = pipeline(w, h, MlaaConfig::default()).run_frame(&scene).unwrap();
        let mut edges = pipeline(w, h, show);
        let shown = edges.run_frame(&scene).unwrap();
        assert!(edges.targets().edge_mask().pixels().iter().any(|&m| m != 0));
        assert_ne!(blended, shown);

        let lengths = edges.targets().edge_length();
        for y in 0..h {
            for x in 0..w {
                if lengths.get(x, y) == [0, 0] {
                    assert_eq!(shown.get(x, y), scene.get(x, y), "copied at ({x}, {y})");
                } else {
                    assert_ne!(shown.get(x, y), blended.get(x, y), "marked at ({x}, {y})");
                }
            }
        }
    }

    let flat = ColorImage::filled(10, 6, [10, 20, 30, 255]);
    let blended = pipeline(10, 6, MlaaConfig::default()).run_frame(&flat).unwrap();
    let shown = pipeline(10, 6, show).run_frame(&flat).unwrap();
    assert_eq!(blended, shown);
    assert_eq!(shown, flat);
}

#[test]
fn previous_frame_leaves_no_trace() {
    let config = MlaaConfig {
        use_stencil: true,
        ..Default::default()
    };
    let first = noise(24, 16, 5);
    let second = ColorImage::from_fn(24, 16, |x, y| if y * 2 > x + 3 { WHITE } else { BLACK });

    let mut reused = pipeline(24, 16, config);
    reused.run_frame(&first).unwrap();
    let reused_output = reused.run_frame(&second).unwrap();

    let mut fresh = pipeline(24, 16, config);
    let fresh_output = fresh.run_frame(&second).unwrap();

    assert_eq!(reused.targets().edge_mask(), fresh.targets().edge_mask());
    assert_eq!(reused.targets().edge_length(), fresh.targets().edge_length());
    assert_eq!(reused.targets().stencil(), fresh.targets().stencil());
    assert_eq!(reused_output, fresh_output);
}

#[test]
fn disabled_pipeline_passes_scene_through() {
    let scene = corner(8);
    let mut pipeline = pipeline(8, 8, MlaaConfig::default());
    for _ in 0..TIMING_WINDOW {
        pipeline.run_frame(&scene).unwrap();
    }

    pipeline.state_mut().set_enabled(false);
    let output = pipeline.run_frame(&scene).unwrap();
    assert_eq!(output, scene);
    assert_eq!(pipeline.last_frame_timing(), FrameTiming::default());

    for _ in 0..TIMING_WINDOW {
        pipeline.run_frame(&scene).unwrap();
    }
    assert_eq!(pipeline.last_frame_timing(), FrameTiming::default());

    pipeline.state_mut().set_enabled(true);
    assert_ne!(pipeline.run_frame(&scene).unwrap(), scene);
}

#[test]
fn timing_averages_over_one_window() {
    let (p1, p2, p3) = (0.25, 1.5, 0.75);
    let mut timing = TimingAccumulator::new();
    for _ in 0..TIMING_WINDOW {
        timing.record(Some([p1, p2, p3]));
    }
    let average = timing.last_frame_timing();
    assert!((average.pass1_ms - p1).abs() < 1e-5);
    assert!((average.pass2_ms - p2).abs() < 1e-5);
    assert!((average.pass3_ms - p3).abs() < 1e-5);
    assert!((average.total_ms - (p1 + p2 + p3)).abs() < 1e-5);
    assert_eq!(timing.pending(), 0);

    // The next window starts from scratch.
    for _ in 0..TIMING_WINDOW {
        timing.record(Some([1.0, 1.0, 1.0]));
    }
    assert!((timing.last_frame_timing().total_ms - 3.0).abs() < 1e-5);
}

#[test]
fn software_timings_publish_after_a_window() {
    let scene = noise(32, 32, 3);
    let mut pipeline = pipeline(32, 32, MlaaConfig::default());
    for _ in 0..TIMING_WINDOW - 1 {
        pipeline.run_frame(&scene).unwrap();
    }
    assert_eq!(pipeline.last_frame_timing(), FrameTiming::default());
    assert_eq!(pipeline.state().stage(), mlaa::FrameStage::Idle);

    pipeline.run_frame(&scene).unwrap();
    let timing = pipeline.last_frame_timing();
    let sum = timing.pass1_ms + timing.pass2_ms + timing.pass3_ms;
    assert!((timing.total_ms - sum).abs() < 1e-4);
}
