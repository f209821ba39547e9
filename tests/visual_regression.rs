/// Visual regression tests for the canvas.
///
/// These tests replay the shared scene on each backend, read the canvas
/// content back, and validate specific pixel locations against expected
/// colors.
///
/// Run with:   cargo test --test visual_regression
use canvas_test_scenes::{
    build_main_scene, check_pixels, headless_gpu_backend, prepare_canvas, PixelExpectation,
    CANVAS_HEIGHT, CANVAS_WIDTH,
};
use deferred_canvas::backend::Backend;
use deferred_canvas::{Canvas, Color, CommandWriter, SoftBackend};

fn render_scene<B: Backend>(canvas: &mut Canvas<B>) -> (Vec<u32>, Vec<PixelExpectation>) {
    prepare_canvas(canvas);
    let mut writer = CommandWriter::new();
    let expectations = build_main_scene(&mut writer);
    canvas.update_rendering(writer.finish());
    let pixels = canvas.render_to_pixels().expect("scene renders");
    (pixels, expectations)
}

fn assert_no_failures(failures: Vec<String>) {
    if !failures.is_empty() {
        panic!(
            "{} pixel expectation(s) failed:\n{}",
            failures.len(),
            failures.join("\n"),
        );
    }
}

/// Renders all 16 tiles on the CPU backend.
#[test]
fn main_scene_pixel_expectations_soft() {
    let mut canvas = Canvas::new(SoftBackend::new());
    let (pixels, expectations) = render_scene(&mut canvas);
    assert_eq!(pixels.len(), (CANVAS_WIDTH * CANVAS_HEIGHT) as usize);
    assert_no_failures(check_pixels(&pixels, CANVAS_WIDTH, CANVAS_HEIGHT, &expectations));
    assert_eq!(canvas.clip_depth(), 0);
}

/// Same scene on wgpu. Skipped on machines without an adapter.
#[test]
fn main_scene_pixel_expectations_gpu() {
    let Some(backend) = headless_gpu_backend() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };
    let mut canvas = Canvas::new(backend);
    let (pixels, expectations) = render_scene(&mut canvas);
    assert_no_failures(check_pixels(&pixels, CANVAS_WIDTH, CANVAS_HEIGHT, &expectations));
}

/// An empty stream should produce a cleared canvas.
#[test]
fn empty_stream_renders_transparent() {
    let mut canvas = Canvas::new(SoftBackend::new());
    prepare_canvas(&mut canvas);
    let pixels = canvas.render_to_pixels().expect("empty canvas renders");
    assert_eq!(pixels.len(), (CANVAS_WIDTH * CANVAS_HEIGHT) as usize);
    assert!(pixels.iter().all(|&pixel| pixel == 0));
}

/// Content from an earlier frame survives later frames.
#[test]
fn content_persists_across_frames() {
    let mut canvas = Canvas::new(SoftBackend::new());
    prepare_canvas(&mut canvas);

    let mut first = CommandWriter::new();
    first
        .set_fill_paint(Color::rgb(200, 50, 50))
        .fill_rect(10.0, 10.0, 20.0, 20.0);
    canvas.update_rendering(first.finish());
    canvas.render_to_pixels().expect("first frame renders");

    let mut second = CommandWriter::new();
    second
        .set_fill_paint(Color::rgb(0, 0, 200))
        .fill_rect(50.0, 50.0, 20.0, 20.0);
    canvas.update_rendering(second.finish());
    let pixels = canvas.render_to_pixels().expect("second frame renders");

    let expectations = vec![
        PixelExpectation::opaque(20, 20, 200, 50, 50, "first_frame_rect"),
        PixelExpectation::opaque(60, 60, 0, 0, 200, "second_frame_rect"),
        PixelExpectation::transparent(40, 40, "between_rects"),
    ];
    assert_no_failures(check_pixels(&pixels, CANVAS_WIDTH, CANVAS_HEIGHT, &expectations));
}
