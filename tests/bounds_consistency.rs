/// Measured op bounds must contain every pixel the op renders.
///
/// Every drawing op kind is executed in `Both` mode on the CPU backend under
/// several transforms; any touched pixel outside the rounded-out bounds
/// means the compositor would crop part of the draw.
///
/// Run with:   cargo test --test bounds_consistency
use std::num::NonZeroUsize;

use canvas_test_scenes::BlockShaper;
use deferred_canvas::backend::{Backend, Graphics, RenderTarget};
use deferred_canvas::lyon::math::{vector, Angle, Transform};
use deferred_canvas::{
    execute_op, ArcType, Color, ExecMode, IRect, Image, ImageCache, OpResources, RectArgs,
    RenderOp, RenderState, SoftBackend, TextSupport,
};

const SIZE: u32 = 96;

/// One op to check, with the state it needs beyond the defaults.
struct Case {
    label: &'static str,
    op: RenderOp,
    arc_type: ArcType,
    /// Start from an opaque target so erasing ops leave a trace.
    prefill: bool,
}

impl Case {
    fn new(label: &'static str, op: RenderOp) -> Self {
        Self {
            label,
            op,
            arc_type: ArcType::Open,
            prefill: false,
        }
    }

    fn arc(label: &'static str, op: RenderOp, arc_type: ArcType) -> Self {
        Self {
            arc_type,
            ..Self::new(label, op)
        }
    }
}

fn transforms() -> Vec<(&'static str, Transform)> {
    vec![
        ("identity", Transform::identity()),
        ("translation", Transform::translation(3.5, 7.25)),
        (
            "rotation_and_scale",
            Transform::rotation(Angle::degrees(30.0))
                .then_scale(1.5, 1.5)
                .then_translate(vector(40.0, 10.0)),
        ),
    ]
}

fn cases() -> Vec<Case> {
    let rect = RectArgs::new(8.0, 4.0, 24.0, 16.0);
    let arc = |start, extent| RenderOp::FillArc { rect, start, extent };
    let stroke_arc = |start, extent| RenderOp::StrokeArc { rect, start, extent };
    let image = Image::solid(4, 4, Color::rgb(30, 90, 200));
    vec![
        Case::new("fill_path", RenderOp::FillPath),
        Case::new("stroke_path", RenderOp::StrokePath),
        Case::new("fill_rect", RenderOp::FillRect(RectArgs::new(5.0, 5.0, 20.0, 10.0))),
        Case {
            prefill: true,
            ..Case::new("clear_rect", RenderOp::ClearRect(RectArgs::new(6.0, 3.0, 14.0, 9.0)))
        },
        Case::new("stroke_rect", RenderOp::StrokeRect(RectArgs::new(6.0, 6.0, 18.0, 12.0))),
        Case::new("fill_oval", RenderOp::FillOval(rect)),
        Case::new("stroke_oval", RenderOp::StrokeOval(rect)),
        Case::new(
            "fill_round_rect",
            RenderOp::FillRoundRect {
                rect,
                arc_w: 8.0,
                arc_h: 6.0,
            },
        ),
        Case::new(
            "stroke_round_rect",
            RenderOp::StrokeRoundRect {
                rect,
                arc_w: 8.0,
                arc_h: 6.0,
            },
        ),
        Case::arc("fill_arc_open", arc(30.0, 240.0), ArcType::Open),
        Case::arc("fill_arc_chord", arc(30.0, 240.0), ArcType::Chord),
        Case::arc("fill_arc_pie", arc(-45.0, 90.0), ArcType::Pie),
        Case::arc("stroke_arc_open", stroke_arc(30.0, 240.0), ArcType::Open),
        Case::arc("stroke_arc_chord", stroke_arc(30.0, 240.0), ArcType::Chord),
        Case::arc("stroke_arc_pie", stroke_arc(-45.0, 90.0), ArcType::Pie),
        Case::new(
            "stroke_line",
            RenderOp::StrokeLine {
                x1: 30.0,
                y1: 4.0,
                x2: 4.0,
                y2: 20.0,
            },
        ),
        Case::new(
            "draw_image",
            RenderOp::DrawImage {
                image: image.clone(),
                dst: RectArgs::new(10.0, 12.0, 20.0, 16.0),
                src: None,
            },
        ),
        Case::new(
            "draw_sub_image",
            RenderOp::DrawImage {
                image,
                dst: RectArgs::new(4.0, 6.0, 12.0, 12.0),
                src: Some(RectArgs::new(1.0, 1.0, 2.0, 2.0)),
            },
        ),
        Case::new(
            "fill_text",
            RenderOp::FillText {
                text: "Hi".into(),
                x: 10.0,
                y: 24.0,
                max_width: 0.0,
            },
        ),
        Case::new(
            "stroke_text",
            RenderOp::StrokeText {
                text: "Hi".into(),
                x: 10.0,
                y: 24.0,
                max_width: 0.0,
            },
        ),
    ]
}

/// State for `case` under `transform`. The current path is given in device
/// space, as the stream's path tokens are.
fn state_for(case: &Case, transform: Transform) -> RenderState {
    let mut state = RenderState::default();
    state.set_transform(transform);
    state.set_line_width(3.0);
    state.arc_type = case.arc_type;
    state.path.move_to(12.0, 30.0);
    state.path.line_to(60.0, 36.0);
    state.path.cubic_to(70.0, 50.0, 40.0, 70.0, 30.0, 58.0);
    state.path.line_to(20.0, 44.0);
    state
}

fn measure_only(case: &Case, transform: Transform) -> Option<IRect> {
    let mut backend = SoftBackend::new();
    let mut state = state_for(case, transform);
    let mut images = ImageCache::new(NonZeroUsize::new(4).expect("non-zero"));
    let mut text = TextSupport::new(Some(Box::new(BlockShaper)));
    let mut resources = OpResources {
        backend: &mut backend,
        images: &mut images,
        text: &mut text,
    };
    execute_op::<SoftBackend>(&case.op, &mut state, &mut resources, ExecMode::Measure)
        .expect("op measures")
        .map(|bounds| IRect::round_out(&bounds))
}

/// Renders `case` and returns its rounded-out bounds plus every pixel the
/// draw changed.
fn render_and_measure(case: &Case, transform: Transform) -> (IRect, Vec<(i32, i32)>) {
    let mut backend = SoftBackend::new();
    let target = backend.create_render_target(SIZE, SIZE).expect("target allocates");
    let mut graphics = backend.create_graphics(&target).expect("graphics binds");
    if case.prefill {
        graphics.set_paint(&Color::WHITE.into());
        graphics.fill_rect(0.0, 0.0, SIZE as f32, SIZE as f32);
    }
    let mut before = Vec::new();
    target.read_pixels(&mut before).expect("pixels read back");
    graphics.set_transform(transform);

    let mut state = state_for(case, transform);
    let mut images = ImageCache::new(NonZeroUsize::new(4).expect("non-zero"));
    let mut text = TextSupport::new(Some(Box::new(BlockShaper)));
    let mut resources = OpResources {
        backend: &mut backend,
        images: &mut images,
        text: &mut text,
    };

    let bounds = execute_op(&case.op, &mut state, &mut resources, ExecMode::Both(&mut graphics))
        .expect("op executes")
        .expect("op covers something");

    let mut after = Vec::new();
    target.read_pixels(&mut after).expect("pixels read back");
    let touched = before
        .iter()
        .zip(&after)
        .enumerate()
        .filter(|(_, (old, new))| old != new)
        .map(|(index, _)| ((index as u32 % SIZE) as i32, (index as u32 / SIZE) as i32))
        .collect();
    (IRect::round_out(&bounds), touched)
}

#[test]
fn rendered_pixels_stay_inside_measured_bounds() {
    let mut failures = Vec::new();
    for (label, transform) in transforms() {
        for case in cases() {
            let (bounds, touched) = render_and_measure(&case, transform);
            assert!(!touched.is_empty(), "{} under {label} drew nothing", case.label);
            let escaped: Vec<_> = touched
                .iter()
                .filter(|(x, y)| {
                    *x < bounds.x || *y < bounds.y || *x >= bounds.right() || *y >= bounds.bottom()
                })
                .collect();
            if !escaped.is_empty() {
                failures.push(format!(
                    "{} under {label}: {} pixel(s) outside {:?}, first {:?}",
                    case.label,
                    escaped.len(),
                    bounds,
                    escaped[0],
                ));
            }
        }
    }
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[test]
fn measure_mode_matches_both_mode() {
    for (label, transform) in transforms() {
        for case in cases() {
            let measured = measure_only(&case, transform);
            let (rendered, _) = render_and_measure(&case, transform);
            assert_eq!(measured, Some(rendered), "{} under {label}", case.label);
        }
    }
}
