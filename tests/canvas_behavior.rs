/// End-to-end canvas behavior on the CPU backend: clipping, blend
/// isolation, stream errors, device loss and effects.
///
/// Run with:   cargo test --test canvas_behavior
use canvas_test_scenes::{check_pixels, PixelExpectation};
use deferred_canvas::{
    rect_path, BlendMode, Canvas, CanvasError, Color, CommandBuffer, CommandWriter, Effect,
    SoftBackend,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;

fn canvas() -> Canvas<SoftBackend> {
    let mut canvas = Canvas::new(SoftBackend::new());
    canvas.update_bounds(WIDTH as f32, HEIGHT as f32);
    canvas
}

fn replay(canvas: &mut Canvas<SoftBackend>, writer: CommandWriter) -> Vec<u32> {
    canvas.update_rendering(writer.finish());
    canvas.render_to_pixels().expect("stream replays")
}

fn assert_pixels(pixels: &[u32], expectations: &[PixelExpectation]) {
    let failures = check_pixels(pixels, WIDTH, HEIGHT, expectations);
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[test]
fn popping_a_clip_restores_unclipped_drawing() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .push_clip(rect_path(0.0, 0.0, 16.0, 16.0))
        .set_fill_paint(Color::rgb(0, 0, 255))
        .fill_rect(0.0, 0.0, 32.0, 32.0)
        .pop_clip()
        .set_fill_paint(Color::rgb(255, 0, 0))
        .fill_rect(40.0, 40.0, 10.0, 10.0);
    let pixels = replay(&mut canvas, writer);

    assert_pixels(
        &pixels,
        &[
            PixelExpectation::opaque(8, 8, 0, 0, 255, "clipped_fill"),
            PixelExpectation::transparent(24, 24, "cut_by_clip"),
            PixelExpectation::opaque(45, 45, 255, 0, 0, "after_pop"),
        ],
    );
    assert_eq!(canvas.clip_depth(), 0);
}

#[test]
fn clips_persist_across_frames_until_popped() {
    let mut canvas = canvas();
    let mut first = CommandWriter::new();
    first.push_clip(rect_path(10.0, 10.0, 10.0, 10.0));
    replay(&mut canvas, first);
    assert_eq!(canvas.clip_depth(), 1);

    let mut second = CommandWriter::new();
    second
        .set_fill_paint(Color::rgb(0, 200, 0))
        .fill_rect(0.0, 0.0, 64.0, 64.0);
    let pixels = replay(&mut canvas, second);
    assert_pixels(
        &pixels,
        &[
            PixelExpectation::opaque(15, 15, 0, 200, 0, "inside_clip"),
            PixelExpectation::transparent(5, 5, "outside_clip"),
        ],
    );
}

#[test]
fn extra_pops_are_ignored() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .pop_clip()
        .pop_clip()
        .set_fill_paint(Color::BLACK)
        .fill_rect(0.0, 0.0, 4.0, 4.0);
    let pixels = replay(&mut canvas, writer);
    assert_eq!(pixels[0], 0xFF00_0000);
    assert_eq!(canvas.clip_depth(), 0);
}

#[test]
fn popping_the_inner_clip_restores_the_outer_clip() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .push_clip(rect_path(0.0, 0.0, 32.0, 32.0))
        .push_clip(rect_path(16.0, 16.0, 32.0, 32.0))
        .pop_clip()
        .set_fill_paint(Color::WHITE)
        .fill_rect(0.0, 0.0, 64.0, 64.0);
    let pixels = replay(&mut canvas, writer);

    assert_pixels(
        &pixels,
        &[
            PixelExpectation::opaque(4, 4, 255, 255, 255, "outer_only"),
            PixelExpectation::opaque(24, 24, 255, 255, 255, "both_clips"),
            PixelExpectation::transparent(40, 40, "popped_clip_only"),
            PixelExpectation::transparent(48, 8, "outside_both"),
        ],
    );
    assert_eq!(canvas.clip_depth(), 1);
}

#[test]
fn huge_fill_under_a_clip_stays_inside_the_clip() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .push_clip(rect_path(5.0, 5.0, 10.0, 10.0))
        .set_fill_paint(Color::rgb(255, 0, 0))
        .fill_rect(-3e9, -3e9, 6e9, 6e9)
        .set_blend_mode(BlendMode::Multiply)
        .fill_rect(-3e9, -3e9, 6e9, 6e9)
        .set_blend_mode(BlendMode::SrcOver)
        .pop_clip()
        .set_fill_paint(Color::rgb(0, 0, 255))
        .fill_rect(40.0, 40.0, 8.0, 8.0);
    let pixels = replay(&mut canvas, writer);

    assert_pixels(
        &pixels,
        &[
            PixelExpectation::opaque(10, 10, 255, 0, 0, "inside_clip"),
            PixelExpectation::transparent(30, 30, "outside_clip"),
            PixelExpectation::transparent(2, 2, "before_clip"),
            PixelExpectation::opaque(44, 44, 0, 0, 255, "drawn_after_pop"),
        ],
    );
}

#[test]
fn blend_only_touches_the_op_bounds() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .set_fill_paint(Color::rgb(100, 100, 100))
        .fill_rect(0.0, 0.0, 64.0, 64.0)
        .set_blend_mode(BlendMode::SrcIn)
        .set_fill_paint(Color::rgb(255, 0, 0))
        .fill_rect(20.0, 20.0, 10.0, 10.0)
        .set_blend_mode(BlendMode::SrcOver);
    let pixels = replay(&mut canvas, writer);

    assert_pixels(
        &pixels,
        &[
            PixelExpectation::opaque(25, 25, 255, 0, 0, "src_in_inside"),
            PixelExpectation::opaque(5, 5, 100, 100, 100, "untouched_outside"),
            PixelExpectation::opaque(40, 25, 100, 100, 100, "untouched_beside"),
        ],
    );
}

#[test]
fn blend_under_a_clip_stays_inside_the_clip() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .set_fill_paint(Color::rgb(200, 200, 200))
        .fill_rect(0.0, 0.0, 64.0, 64.0)
        .push_clip(rect_path(0.0, 0.0, 32.0, 64.0))
        .set_blend_mode(BlendMode::Multiply)
        .set_fill_paint(Color::rgb(255, 0, 0))
        .fill_rect(16.0, 16.0, 32.0, 32.0)
        .set_blend_mode(BlendMode::SrcOver)
        .pop_clip();
    let pixels = replay(&mut canvas, writer);

    assert_pixels(
        &pixels,
        &[
            PixelExpectation::opaque(24, 24, 200, 0, 0, "multiplied_in_clip"),
            PixelExpectation::opaque(40, 24, 200, 200, 200, "outside_clip"),
        ],
    );
}

#[test]
fn unknown_token_aborts_the_stream_but_keeps_earlier_draws() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .set_fill_paint(Color::rgb(255, 0, 0))
        .fill_rect(0.0, 0.0, 8.0, 8.0);
    let mut buffer = writer.finish();
    let offset = buffer.byte_len();
    buffer.append(CommandBuffer::from_parts(vec![0xEE, 0x43], Vec::new()));
    canvas.update_rendering(buffer);

    match canvas.render_to_pixels() {
        Err(CanvasError::UnknownToken { token, offset: at }) => {
            assert_eq!(token, 0xEE);
            assert_eq!(at, offset);
        }
        other => panic!("expected an unknown token error, got {other:?}"),
    }

    // Nothing is pending any more; the earlier draw is still there.
    let pixels = canvas.render_to_pixels().expect("empty frame renders");
    assert_eq!(pixels[0], 0xFFFF_0000);
}

#[test]
fn volatile_content_survives_device_loss() {
    let mut canvas = Canvas::new(SoftBackend::new().with_volatile_targets(true));
    canvas.update_bounds(WIDTH as f32, HEIGHT as f32);
    let mut writer = CommandWriter::new();
    writer
        .set_fill_paint(Color::rgb(0, 128, 255))
        .fill_rect(4.0, 4.0, 8.0, 8.0);
    replay(&mut canvas, writer);

    canvas.backend_mut().simulate_device_loss();
    let pixels = canvas.render_to_pixels().expect("restored frame renders");
    assert_pixels(
        &pixels,
        &[
            PixelExpectation::opaque(8, 8, 0, 128, 255, "restored"),
            PixelExpectation::transparent(20, 20, "still_empty"),
        ],
    );
}

#[test]
fn applied_blur_spreads_the_whole_canvas() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .set_fill_paint(Color::BLACK)
        .fill_rect(20.0, 20.0, 24.0, 24.0)
        .apply_effect(Effect::GaussianBlur { radius: 6.0 });
    let pixels = replay(&mut canvas, writer);

    let alpha = |x: u32, y: u32| pixels[(y * WIDTH + x) as usize] >> 24;
    assert_eq!(alpha(32, 32), 255);
    assert!(alpha(18, 32) > 0, "blur should spread past the edge");
    assert!(alpha(18, 32) < 255);
    assert_eq!(alpha(2, 2), 0);
}

#[test]
fn applied_effect_under_a_clip_clears_outside_the_clip() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .set_fill_paint(Color::WHITE)
        .fill_rect(0.0, 0.0, 64.0, 64.0)
        .push_clip(rect_path(0.0, 0.0, 16.0, 16.0))
        .apply_effect(Effect::GaussianBlur { radius: 2.0 })
        .pop_clip();
    let pixels = replay(&mut canvas, writer);

    let at = |x: u32, y: u32| pixels[(y * WIDTH + x) as usize];
    assert!(at(8, 8) >> 24 > 0, "filtered pixels stay inside the clip");
    assert_eq!(at(8, 8) >> 24, at(8, 8) >> 16 & 0xFF, "premultiplied white keeps r == a");
    assert_eq!(at(20, 20), 0, "outside the clip is cleared");
    assert_eq!(at(60, 4), 0, "outside the clip is cleared");
}

#[test]
fn draw_effect_applies_to_a_single_op() {
    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .set_effect(Some(Effect::DropShadow {
            radius: 0.0,
            offset_x: 4.0,
            offset_y: 0.0,
            color: Color::rgb(0, 0, 255),
        }))
        .set_fill_paint(Color::rgb(255, 0, 0))
        .fill_rect(10.0, 10.0, 10.0, 10.0)
        .set_effect(None)
        .fill_rect(40.0, 10.0, 10.0, 10.0);
    let pixels = replay(&mut canvas, writer);

    assert_pixels(
        &pixels,
        &[
            PixelExpectation::opaque(15, 15, 255, 0, 0, "shape"),
            PixelExpectation::opaque(22, 15, 0, 0, 255, "shadow"),
            PixelExpectation::opaque(45, 15, 255, 0, 0, "no_effect_shape"),
            PixelExpectation::transparent(52, 15, "no_effect_shadow"),
        ],
    );
}

#[test]
fn appended_buffers_replay_in_one_frame() {
    let mut canvas = canvas();
    let mut first = CommandWriter::new();
    first.set_fill_paint(Color::rgb(255, 0, 0));
    let mut second = CommandWriter::new();
    second.fill_rect(0.0, 0.0, 2.0, 2.0);
    canvas.update_rendering(first.finish());
    canvas.update_rendering(second.finish());
    let pixels = canvas.render_to_pixels().expect("both buffers replay");
    assert_eq!(pixels[0], 0xFFFF_0000);
}

#[test]
fn triangle_path_fills_with_default_state() {
    let mut canvas = Canvas::new(SoftBackend::new());
    canvas.update_bounds(20.0, 20.0);
    let mut writer = CommandWriter::new();
    writer
        .begin_path()
        .move_to(0.0, 0.0)
        .line_to(10.0, 0.0)
        .line_to(10.0, 10.0)
        .close_path()
        .fill_path();
    canvas.update_rendering(writer.finish());
    let pixels = canvas.render_to_pixels().expect("triangle renders");

    let at = |x: usize, y: usize| pixels[y * 20 + x];
    assert_eq!(at(8, 2), 0xFF00_0000, "inside the triangle");
    assert_eq!(at(2, 8), 0, "below the diagonal");
    assert_eq!(at(15, 5), 0, "right of the triangle");
    assert_eq!(at(5, 15), 0, "below the triangle");
}

#[test]
fn clip_rect_limits_fill_to_its_pixels() {
    let mut canvas = Canvas::new(SoftBackend::new());
    canvas.update_bounds(20.0, 20.0);
    let mut writer = CommandWriter::new();
    writer
        .push_clip(rect_path(5.0, 5.0, 10.0, 10.0))
        .fill_rect(0.0, 0.0, 20.0, 20.0);
    canvas.update_rendering(writer.finish());
    let pixels = canvas.render_to_pixels().expect("clipped fill renders");

    for y in 0..20 {
        for x in 0..20 {
            let inside = (5..15).contains(&x) && (5..15).contains(&y);
            let expected = if inside { 0xFF00_0000 } else { 0 };
            assert_eq!(pixels[y * 20 + x], expected, "pixel ({x},{y})");
        }
    }
}

#[test]
fn translucent_darken_matches_the_blend_formula() {
    let background = Color::rgb(60, 200, 120);
    let shape = Color::rgba(200, 40, 160, 128);

    let mut canvas = canvas();
    let mut writer = CommandWriter::new();
    writer
        .set_fill_paint(background)
        .fill_rect(0.0, 0.0, 64.0, 64.0)
        .set_blend_mode(BlendMode::Darken)
        .set_fill_paint(shape)
        .fill_rect(16.0, 16.0, 32.0, 32.0);
    let pixels = replay(&mut canvas, writer);

    let unit = |c: Color| c.premultiplied().map(|v| v as f32 / 255.0);
    let expected = BlendMode::Darken.blend_premultiplied(unit(shape), unit(background));
    let over = BlendMode::SrcOver.blend_premultiplied(unit(shape), unit(background));
    let [a, r, g, b] = pixels[32 * WIDTH as usize + 32].to_be_bytes();
    let actual = [r, g, b, a].map(|v| v as f32 / 255.0);

    for channel in 0..4 {
        assert!(
            (actual[channel] - expected[channel]).abs() <= 2.0 / 255.0,
            "channel {channel}: got {actual:?}, expected {expected:?}"
        );
    }
    // Red differs between darken and plain over for these colors.
    assert!((expected[0] - over[0]).abs() > 10.0 / 255.0);
}
