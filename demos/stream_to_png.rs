/// Records the regression scene, replays it on a canvas and writes a PNG.
///
/// Run with:    cargo run --example stream_to_png -- [output.png] [--soft]
///
/// Uses the wgpu backend when an adapter is available and falls back to the
/// CPU backend otherwise (or when `--soft` is passed). Set `RUST_LOG=debug`
/// to see buffer allocation and compositing traces.
use canvas_test_scenes::{
    build_main_scene, check_pixels, headless_gpu_backend, prepare_canvas, CANVAS_HEIGHT,
    CANVAS_WIDTH,
};
use deferred_canvas::backend::Backend;
use deferred_canvas::{Canvas, Color, CommandWriter, SoftBackend};
use tracing_subscriber::EnvFilter;

fn render<B: Backend>(backend: B) -> Vec<u32> {
    let mut canvas = Canvas::new(backend);
    prepare_canvas(&mut canvas);

    let mut writer = CommandWriter::new();
    let expectations = build_main_scene(&mut writer);
    canvas.update_rendering(writer.finish());

    let pixels = match canvas.render_to_pixels() {
        Ok(pixels) => pixels,
        Err(error) => {
            tracing::error!(%error, "canvas render failed");
            std::process::exit(1);
        }
    };
    let failures = check_pixels(&pixels, CANVAS_WIDTH, CANVAS_HEIGHT, &expectations);
    for failure in &failures {
        tracing::warn!("{failure}");
    }
    tracing::info!(
        checked = expectations.len(),
        failed = failures.len(),
        "pixel expectations evaluated"
    );
    pixels
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let force_soft = args.iter().any(|arg| arg == "--soft");
    let output = args
        .iter()
        .find(|arg| !arg.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| "canvas.png".to_string());

    let gpu = if force_soft { None } else { headless_gpu_backend() };
    let pixels = match gpu {
        Some(backend) => {
            tracing::info!("rendering on wgpu");
            render(backend)
        }
        None => {
            tracing::info!("rendering on the CPU backend");
            render(SoftBackend::new())
        }
    };

    // PNG wants straight alpha.
    let rgba: Vec<u8> = pixels
        .iter()
        .flat_map(|&word| Color::from_argb_pre(word).to_array())
        .collect();
    let Some(image) = image::RgbaImage::from_raw(CANVAS_WIDTH, CANVAS_HEIGHT, rgba) else {
        tracing::error!("pixel buffer does not match the canvas size");
        std::process::exit(1);
    };
    if let Err(error) = image.save(&output) {
        tracing::error!(%error, output = %output, "failed to write png");
        std::process::exit(1);
    }
    tracing::info!(output = %output, "wrote canvas");
}
