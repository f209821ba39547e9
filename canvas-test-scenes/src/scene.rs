use deferred_canvas::backend::Backend;
use deferred_canvas::lyon::math::point;
use deferred_canvas::{
    rect_path, BlendMode, Canvas, Color, CommandWriter, Effect, Font, GradientStop, Image, Paint,
};

use crate::expectations::PixelExpectation;
use crate::shaper::BlockShaper;

// ── Grid layout constants ────────────────────────────────────────────────────

const TILE_SIZE: u32 = 40;
const COLUMNS: u32 = 4;
const ROWS: u32 = 4;

pub const CANVAS_WIDTH: u32 = TILE_SIZE * COLUMNS;
pub const CANVAS_HEIGHT: u32 = TILE_SIZE * ROWS;

/// Returns the pixel origin (top-left corner) of tile number `n` (1-based).
fn tile_origin(tile_number: u32) -> (u32, u32) {
    let index = tile_number - 1;
    ((index % COLUMNS) * TILE_SIZE, (index / COLUMNS) * TILE_SIZE)
}

/// Sizes `canvas` for the main scene and installs the block shaper the text
/// tile relies on.
pub fn prepare_canvas<B: Backend>(canvas: &mut Canvas<B>) {
    canvas.update_bounds(CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32);
    canvas.set_text_shaper(BlockShaper);
}

/// Records the main test scene into `writer` and returns the pixel
/// expectations for the rendered output.
///
/// Every tile leaves the state it touched (transform, alpha, blend mode,
/// effect, clip) back at its default, so tiles are independent.
pub fn build_main_scene(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let mut expectations: Vec<PixelExpectation> = Vec::new();

    expectations.extend(tile_01_solid_rect(writer));
    expectations.extend(tile_02_path_triangle(writer));
    expectations.extend(tile_03_clip_rect(writer));
    expectations.extend(tile_04_nested_clips(writer));
    expectations.extend(tile_05_darken(writer));
    expectations.extend(tile_06_multiply(writer));
    expectations.extend(tile_07_global_alpha(writer));
    expectations.extend(tile_08_translated_rect(writer));
    expectations.extend(tile_09_scaled_rect(writer));
    expectations.extend(tile_10_linear_gradient(writer));
    expectations.extend(tile_11_scaled_image(writer));
    expectations.extend(tile_12_put_argb(writer));
    expectations.extend(tile_13_clear_rect(writer));
    expectations.extend(tile_14_blurred_rect(writer));
    expectations.extend(tile_15_drop_shadow(writer));
    expectations.extend(tile_16_block_text(writer));

    expectations
}

fn f(v: u32) -> f32 {
    v as f32
}

fn tile_01_solid_rect(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(1);
    writer
        .set_fill_paint(Color::rgb(200, 50, 50))
        .fill_rect(f(ox + 5), f(oy + 5), 30.0, 30.0);
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 200, 50, 50, "t01_center"),
        PixelExpectation::transparent(ox + 2, oy + 2, "t01_outside"),
    ]
}

fn tile_02_path_triangle(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(2);
    writer
        .set_fill_paint(Color::BLACK)
        .begin_path()
        .move_to(f(ox + 5), f(oy + 5))
        .line_to(f(ox + 35), f(oy + 5))
        .line_to(f(ox + 35), f(oy + 35))
        .close_path()
        .fill_path();
    vec![
        PixelExpectation::opaque(ox + 30, oy + 10, 0, 0, 0, "t02_inside"),
        PixelExpectation::transparent(ox + 10, oy + 30, "t02_below_diagonal"),
    ]
}

fn tile_03_clip_rect(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(3);
    writer
        .push_clip(rect_path(f(ox + 10), f(oy + 10), 20.0, 20.0))
        .set_fill_paint(Color::rgb(0, 160, 0))
        .fill_rect(f(ox), f(oy), 40.0, 40.0)
        .pop_clip();
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 0, 160, 0, "t03_inside_clip"),
        PixelExpectation::opaque(ox + 10, oy + 10, 0, 160, 0, "t03_clip_corner"),
        PixelExpectation::transparent(ox + 5, oy + 5, "t03_outside_clip"),
        PixelExpectation::transparent(ox + 30, oy + 30, "t03_clip_far_edge"),
    ]
}

fn tile_04_nested_clips(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(4);
    writer
        .push_clip(rect_path(f(ox + 5), f(oy + 5), 25.0, 25.0))
        .push_clip(rect_path(f(ox + 15), f(oy + 15), 20.0, 20.0))
        .set_fill_paint(Color::rgb(0, 0, 200))
        .fill_rect(f(ox), f(oy), 40.0, 40.0)
        .pop_clip()
        .pop_clip();
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 0, 0, 200, "t04_intersection"),
        PixelExpectation::transparent(ox + 10, oy + 10, "t04_outer_only"),
        PixelExpectation::transparent(ox + 32, oy + 32, "t04_inner_only"),
    ]
}

fn tile_05_darken(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(5);
    writer
        .set_fill_paint(Color::rgb(100, 200, 100))
        .fill_rect(f(ox), f(oy), 40.0, 40.0)
        .set_blend_mode(BlendMode::Darken)
        .set_fill_paint(Color::rgb(200, 100, 50))
        .fill_rect(f(ox + 10), f(oy + 10), 20.0, 20.0)
        .set_blend_mode(BlendMode::SrcOver);
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 100, 100, 50, "t05_darkened"),
        PixelExpectation::opaque(ox + 5, oy + 5, 100, 200, 100, "t05_background"),
    ]
}

fn tile_06_multiply(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(6);
    writer
        .set_fill_paint(Color::rgb(200, 200, 200))
        .fill_rect(f(ox), f(oy), 40.0, 40.0)
        .set_blend_mode(BlendMode::Multiply)
        .set_fill_paint(Color::rgb(255, 0, 128))
        .fill_rect(f(ox + 10), f(oy + 10), 20.0, 20.0)
        .set_blend_mode(BlendMode::SrcOver);
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 200, 0, 100, "t06_multiplied"),
        PixelExpectation::opaque(ox + 5, oy + 5, 200, 200, 200, "t06_background"),
    ]
}

fn tile_07_global_alpha(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(7);
    writer
        .set_global_alpha(0.5)
        .set_fill_paint(Color::rgb(0, 0, 255))
        .fill_rect(f(ox + 5), f(oy + 5), 30.0, 30.0)
        .set_global_alpha(1.0);
    vec![
        PixelExpectation::new(ox + 20, oy + 20, 0, 0, 128, 128, "t07_half_alpha"),
        PixelExpectation::transparent(ox + 2, oy + 2, "t07_outside"),
    ]
}

fn tile_08_translated_rect(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(8);
    writer
        .set_transform(1.0, 0.0, f64::from(ox + 10), 0.0, 1.0, f64::from(oy + 10))
        .set_fill_paint(Color::rgb(255, 128, 0))
        .fill_rect(0.0, 0.0, 20.0, 20.0)
        .set_transform(1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 255, 128, 0, "t08_translated"),
        PixelExpectation::transparent(ox + 5, oy + 5, "t08_origin_untouched"),
    ]
}

fn tile_09_scaled_rect(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(9);
    writer
        .set_transform(2.0, 0.0, f64::from(ox + 10), 0.0, 2.0, f64::from(oy + 10))
        .set_fill_paint(Color::rgb(120, 0, 160))
        .fill_rect(0.0, 0.0, 10.0, 10.0)
        .set_transform(1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
    vec![
        PixelExpectation::opaque(ox + 27, oy + 27, 120, 0, 160, "t09_scaled_far_corner"),
        PixelExpectation::transparent(ox + 35, oy + 35, "t09_past_scaled_edge"),
    ]
}

fn tile_10_linear_gradient(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(10);
    let paint = Paint::linear(
        point(f(ox + 5), 0.0),
        point(f(ox + 35), 0.0),
        [
            GradientStop::new(0.0, Color::BLACK),
            GradientStop::new(1.0, Color::WHITE),
        ],
    );
    writer
        .set_fill_paint(paint)
        .fill_rect(f(ox + 5), f(oy + 5), 30.0, 30.0);
    vec![
        PixelExpectation::opaque(ox + 6, oy + 20, 13, 13, 13, "t10_dark_end").with_tolerance(8),
        PixelExpectation::opaque(ox + 20, oy + 20, 132, 132, 132, "t10_middle").with_tolerance(8),
        PixelExpectation::opaque(ox + 34, oy + 20, 251, 251, 251, "t10_light_end").with_tolerance(8),
    ]
}

fn tile_11_scaled_image(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(11);
    let image = Image::solid(4, 4, Color::rgb(20, 180, 220));
    writer.draw_image(image, f(ox + 10), f(oy + 10), 20.0, 20.0);
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 20, 180, 220, "t11_image_center"),
        PixelExpectation::transparent(ox + 5, oy + 20, "t11_left_of_image"),
    ]
}

fn tile_12_put_argb(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(12);
    // Transform, alpha and blend mode do not apply to raw pixel puts.
    writer
        .set_global_alpha(0.25)
        .put_argb((ox + 20) as i32, (oy + 20) as i32, 0xFFFF_00FF)
        .set_global_alpha(1.0);
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 255, 0, 255, "t12_put_pixel"),
        PixelExpectation::transparent(ox + 21, oy + 20, "t12_neighbour"),
    ]
}

fn tile_13_clear_rect(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(13);
    writer
        .set_fill_paint(Color::rgb(120, 120, 120))
        .fill_rect(f(ox), f(oy), 40.0, 40.0)
        .clear_rect(f(ox + 10), f(oy + 10), 20.0, 20.0);
    vec![
        PixelExpectation::transparent(ox + 20, oy + 20, "t13_cleared"),
        PixelExpectation::opaque(ox + 5, oy + 5, 120, 120, 120, "t13_kept"),
    ]
}

fn tile_14_blurred_rect(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(14);
    writer
        .set_effect(Some(Effect::GaussianBlur { radius: 4.0 }))
        .set_fill_paint(Color::BLACK)
        .fill_rect(f(ox + 10), f(oy + 10), 20.0, 20.0)
        .set_effect(None);
    vec![
        PixelExpectation::opaque(ox + 20, oy + 20, 0, 0, 0, "t14_blur_core"),
        PixelExpectation::transparent(ox + 3, oy + 3, "t14_beyond_radius"),
    ]
}

fn tile_15_drop_shadow(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(15);
    writer
        .set_effect(Some(Effect::DropShadow {
            radius: 0.0,
            offset_x: 5.0,
            offset_y: 5.0,
            color: Color::BLACK,
        }))
        .set_fill_paint(Color::WHITE)
        .fill_rect(f(ox + 5), f(oy + 5), 20.0, 20.0)
        .set_effect(None);
    vec![
        PixelExpectation::opaque(ox + 15, oy + 15, 255, 255, 255, "t15_shape_over_shadow"),
        PixelExpectation::opaque(ox + 28, oy + 28, 0, 0, 0, "t15_shadow"),
        PixelExpectation::transparent(ox + 7, oy + 28, "t15_no_shadow"),
    ]
}

fn tile_16_block_text(writer: &mut CommandWriter) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(16);
    // Blocks are 8px wide every 10px, standing 16px tall on the baseline.
    writer
        .set_font(Font::new("Block", 20.0))
        .set_fill_paint(Color::rgb(10, 90, 10))
        .fill_text("ab", f(ox + 5), f(oy + 30), 0.0);
    vec![
        PixelExpectation::opaque(ox + 8, oy + 22, 10, 90, 10, "t16_first_glyph"),
        PixelExpectation::opaque(ox + 18, oy + 22, 10, 90, 10, "t16_second_glyph"),
        PixelExpectation::transparent(ox + 14, oy + 22, "t16_glyph_gap"),
        PixelExpectation::transparent(ox + 8, oy + 32, "t16_below_baseline"),
    ]
}
