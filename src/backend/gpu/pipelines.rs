use super::*;

/// Gradient colors are looked up from a ramp of this many entries.
pub(super) const RAMP_SIZE: usize = 256;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(super) struct PaintVertex {
    pub(super) position: [f32; 2],
}

impl PaintVertex {
    pub(super) fn at(p: Point) -> Self {
        Self {
            position: [p.x, p.y],
        }
    }

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PaintVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(super) struct BlitVertex {
    pub(super) position: [f32; 2],
    pub(super) uv: [f32; 2],
}

impl BlitVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<BlitVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Paint parameters. `inv_x`/`inv_y` map device positions back to user
/// space; the ramp holds premultiplied gradient colors.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(super) struct PaintUniforms {
    viewport: [f32; 2],
    kind: u32,
    cycle: u32,
    color: [f32; 4],
    inv_x: [f32; 4],
    inv_y: [f32; 4],
    geometry: [f32; 4],
    extra: [f32; 4],
    ramp: [[f32; 4]; RAMP_SIZE],
}

impl PaintUniforms {
    pub(super) fn new(paint: &Paint, alpha: f32, transform: &Transform, viewport: [f32; 2]) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.viewport = viewport;
        let (stops, cycle) = match paint {
            Paint::Solid(color) => {
                uniforms.color = premultiplied_unit(color).map(|c| c * alpha);
                return uniforms;
            }
            Paint::Linear(gradient) => {
                uniforms.kind = 1;
                uniforms.geometry = [gradient.start.x, gradient.start.y, gradient.end.x, gradient.end.y];
                (&gradient.stops[..], gradient.cycle)
            }
            Paint::Radial(gradient) => {
                uniforms.kind = 2;
                let focus = clamp_focus(gradient.center, gradient.focus, gradient.radius);
                uniforms.geometry = [gradient.center.x, gradient.center.y, focus.x, focus.y];
                uniforms.extra[0] = gradient.radius.max(f32::EPSILON);
                (&gradient.stops[..], gradient.cycle)
            }
        };
        uniforms.cycle = match cycle {
            CycleMethod::Pad => 0,
            CycleMethod::Reflect => 1,
            CycleMethod::Repeat => 2,
        };
        uniforms.extra[1] = alpha;
        let inverse = inverse_or_degenerate(transform);
        uniforms.inv_x = [inverse.m11, inverse.m21, inverse.m31, 0.0];
        uniforms.inv_y = [inverse.m12, inverse.m22, inverse.m32, 0.0];
        fill_ramp(&mut uniforms.ramp, stops);
        uniforms
    }
}

fn fill_ramp(ramp: &mut [[f32; 4]; RAMP_SIZE], stops: &[GradientStop]) {
    for (i, entry) in ramp.iter_mut().enumerate() {
        let t = i as f32 / (RAMP_SIZE - 1) as f32;
        *entry = premultiplied_unit(&Paint::color_at(stops, t));
    }
}

/// Keeps the focus strictly inside the circle so every pixel maps to a
/// single gradient position.
fn clamp_focus(center: Point, focus: Point, radius: f32) -> Point {
    let offset = focus - center;
    let limit = radius * 0.99;
    let length = offset.length();
    if length <= limit || length == 0.0 {
        focus
    } else {
        center + offset * (limit / length)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(super) struct BlitUniforms {
    pub(super) viewport: [f32; 2],
    pub(super) alpha: f32,
    pub(super) _pad: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(super) struct BlendUniforms {
    pub(super) out_origin: [i32; 2],
    pub(super) top_origin: [i32; 2],
    pub(super) top_size: [i32; 2],
    pub(super) bottom_origin: [i32; 2],
    pub(super) bottom_size: [i32; 2],
    pub(super) mode: u32,
    pub(super) _pad: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(super) struct BlurUniforms {
    pub(super) offset: [i32; 2],
    pub(super) direction: [i32; 2],
    pub(super) source_size: [i32; 2],
    pub(super) radius: i32,
    pub(super) mode: u32,
    pub(super) sigma: f32,
    pub(super) _pad: [f32; 3],
    pub(super) tint: [f32; 4],
}

/// Slot of a composite mode in the per-mode pipeline arrays.
pub(super) fn composite_slot(mode: CompositeMode) -> usize {
    match mode {
        CompositeMode::Clear => 0,
        CompositeMode::Src => 1,
        CompositeMode::SrcOver => 2,
    }
}

fn composite_blend_state(mode: CompositeMode) -> Option<wgpu::BlendState> {
    match mode {
        CompositeMode::SrcOver => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        }),
        CompositeMode::Clear => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
        }),
        CompositeMode::Src => None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable },
        },
        count: None,
    }
}

struct PipelineDesc<'a> {
    label: &'static str,
    layout: &'a wgpu::BindGroupLayout,
    module: &'a wgpu::ShaderModule,
    vertex_entry: &'static str,
    fragment_entry: &'static str,
    buffers: &'a [wgpu::VertexBufferLayout<'static>],
    blend: Option<wgpu::BlendState>,
}

fn create_pipeline(device: &wgpu::Device, desc: PipelineDesc<'_>) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(desc.label),
        bind_group_layouts: &[desc.layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: desc.module,
            entry_point: Some(desc.vertex_entry),
            compilation_options: Default::default(),
            buffers: desc.buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.module,
            entry_point: Some(desc.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: SURFACE_FORMAT,
                blend: desc.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Every pipeline the device draws with, compiled once per device.
pub(super) struct Pipelines {
    paint_layout: wgpu::BindGroupLayout,
    pub(super) paint: [wgpu::RenderPipeline; 3],
    blit_layout: wgpu::BindGroupLayout,
    pub(super) blit: [wgpu::RenderPipeline; 3],
    blend_layout: wgpu::BindGroupLayout,
    pub(super) blend: wgpu::RenderPipeline,
    blur_layout: wgpu::BindGroupLayout,
    pub(super) blur: wgpu::RenderPipeline,
}

const COMPOSITE_MODES: [CompositeMode; 3] = [CompositeMode::Clear, CompositeMode::Src, CompositeMode::SrcOver];

impl Pipelines {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        let shader = |label: &'static str, source: String| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let paint_shader = shader("paint_shader", shaders::PAINT.to_string());
        let blit_shader = shader("blit_shader", shaders::BLIT.to_string());
        let blend_shader = shader(
            "blend_shader",
            format!("{}\n{}", shaders::FULLSCREEN_VS, shaders::BLEND_FS),
        );
        let blur_shader = shader(
            "blur_shader",
            format!("{}\n{}", shaders::FULLSCREEN_VS, shaders::BLUR_FS),
        );

        let paint_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("paint_bgl"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_bgl"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                texture_entry(1, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let blend_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blend_bgl"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1, false),
                texture_entry(2, false),
            ],
        });
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blur_bgl"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT), texture_entry(1, false)],
        });

        let paint_buffers = [PaintVertex::desc()];
        let paint = COMPOSITE_MODES.map(|mode| {
            create_pipeline(
                device,
                PipelineDesc {
                    label: "paint_pipeline",
                    layout: &paint_layout,
                    module: &paint_shader,
                    vertex_entry: "vs_paint",
                    fragment_entry: "fs_paint",
                    buffers: &paint_buffers,
                    blend: composite_blend_state(mode),
                },
            )
        });
        let blit_buffers = [BlitVertex::desc()];
        let blit = COMPOSITE_MODES.map(|mode| {
            create_pipeline(
                device,
                PipelineDesc {
                    label: "blit_pipeline",
                    layout: &blit_layout,
                    module: &blit_shader,
                    vertex_entry: "vs_blit",
                    fragment_entry: "fs_blit",
                    buffers: &blit_buffers,
                    blend: composite_blend_state(mode),
                },
            )
        });
        let blend = create_pipeline(
            device,
            PipelineDesc {
                label: "blend_pipeline",
                layout: &blend_layout,
                module: &blend_shader,
                vertex_entry: "vs_fullscreen",
                fragment_entry: "fs_blend",
                buffers: &[],
                blend: None,
            },
        );
        let blur = create_pipeline(
            device,
            PipelineDesc {
                label: "blur_pipeline",
                layout: &blur_layout,
                module: &blur_shader,
                vertex_entry: "vs_fullscreen",
                fragment_entry: "fs_blur",
                buffers: &[],
                blend: None,
            },
        );

        Self {
            paint_layout,
            paint,
            blit_layout,
            blit,
            blend_layout,
            blend,
            blur_layout,
            blur,
        }
    }

    pub(super) fn paint_bind_group(&self, device: &wgpu::Device, uniforms: &wgpu::Buffer) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("paint_bg"),
            layout: &self.paint_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        })
    }

    pub(super) fn blit_bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        source: &GpuTexture,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bg"),
            layout: &self.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    pub(super) fn blend_bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        top: &GpuTexture,
        bottom: &GpuTexture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blend_bg"),
            layout: &self.blend_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(top.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(bottom.view()),
                },
            ],
        })
    }

    pub(super) fn blur_bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        source: &GpuTexture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blur_bg"),
            layout: &self.blur_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source.view()),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<PaintUniforms>(), 96 + 16 * RAMP_SIZE);
        assert_eq!(std::mem::size_of::<BlitUniforms>(), 16);
        assert_eq!(std::mem::size_of::<BlendUniforms>(), 48);
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 64);
    }

    #[test]
    fn solid_paint_is_premultiplied_and_faded() {
        let uniforms = PaintUniforms::new(
            &Paint::Solid(Color::rgba(255, 0, 0, 255)),
            0.5,
            &Transform::identity(),
            [4.0, 4.0],
        );
        assert_eq!(uniforms.kind, 0);
        assert_eq!(uniforms.color, [0.5, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn gradient_ramp_spans_the_stops() {
        let paint = Paint::linear(
            point(0.0, 0.0),
            point(10.0, 0.0),
            [
                GradientStop::new(0.0, Color::BLACK),
                GradientStop::new(1.0, Color::WHITE),
            ],
        );
        let uniforms = PaintUniforms::new(&paint, 1.0, &Transform::translation(5.0, 0.0), [4.0, 4.0]);
        assert_eq!(uniforms.kind, 1);
        assert_eq!(uniforms.ramp[0], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(uniforms.ramp[RAMP_SIZE - 1], [1.0, 1.0, 1.0, 1.0]);
        // Device x = 5 maps back to user x = 0.
        assert_eq!(uniforms.inv_x[2], -5.0);
    }

    #[test]
    fn focus_outside_the_circle_is_pulled_in() {
        let focus = clamp_focus(point(0.0, 0.0), point(20.0, 0.0), 10.0);
        assert!((focus.x - 9.9).abs() < 1e-4);
        assert_eq!(focus.y, 0.0);
    }
}
