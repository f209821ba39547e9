use super::*;
use pipelines::{composite_slot, BlitUniforms, BlitVertex, PaintUniforms, PaintVertex};

/// Drawing context over a [`GpuTarget`].
pub struct GpuGraphics {
    ctx: Arc<GpuContext>,
    target: GpuTexture,
    transform: Transform,
    alpha: f32,
    mode: CompositeMode,
    paint: Paint,
}

impl std::fmt::Debug for GpuGraphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuGraphics")
            .field("target", &self.target)
            .field("transform", &self.transform)
            .field("alpha", &self.alpha)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Flattening tolerance in user units, tight enough for sub-pixel error
/// after `transform`.
fn tolerance_for(transform: &Transform) -> f32 {
    let scale = transform.determinant().abs().sqrt();
    if scale > f32::EPSILON {
        (FillOptions::DEFAULT_TOLERANCE / scale).max(1e-4)
    } else {
        FillOptions::DEFAULT_TOLERANCE
    }
}

fn tessellate_fill(path: &Path, rule: FillRule, transform: &Transform) -> VertexBuffers<PaintVertex, u32> {
    let mut geometry = VertexBuffers::new();
    let options = FillOptions::tolerance(tolerance_for(transform)).with_fill_rule(rule.into());
    let result = FillTessellator::new().tessellate_path(
        path,
        &options,
        &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| {
            PaintVertex::at(transform.transform_point(vertex.position()))
        }),
    );
    if let Err(error) = result {
        warn!(?error, "fill tessellation failed");
    }
    geometry
}

fn tessellate_stroke(path: &Path, stroke: &Stroke, transform: &Transform) -> VertexBuffers<PaintVertex, u32> {
    let mut geometry = VertexBuffers::new();
    let options = stroke
        .to_stroke_options()
        .with_tolerance(tolerance_for(transform));
    let result = StrokeTessellator::new().tessellate_path(
        path,
        &options,
        &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| {
            PaintVertex::at(transform.transform_point(vertex.position()))
        }),
    );
    if let Err(error) = result {
        warn!(?error, "stroke tessellation failed");
    }
    geometry
}

impl GpuGraphics {
    pub(super) fn new(ctx: Arc<GpuContext>, target: GpuTexture) -> Self {
        Self {
            ctx,
            target,
            transform: Transform::identity(),
            alpha: 1.0,
            mode: CompositeMode::SrcOver,
            paint: Paint::default(),
        }
    }

    fn viewport(&self) -> [f32; 2] {
        [self.target.width() as f32, self.target.height() as f32]
    }

    fn submit_draw(
        &self,
        label: &'static str,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
        vertices: &wgpu::Buffer,
        indices: &wgpu::Buffer,
        index_count: u32,
    ) {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.target.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_geometry(&self, geometry: VertexBuffers<PaintVertex, u32>) {
        if geometry.indices.is_empty() {
            return;
        }
        let device = &self.ctx.device;
        let uniforms = PaintUniforms::new(&self.paint, self.alpha, &self.transform, self.viewport());
        let uniform_buffer = self.ctx.uniform_buffer("paint_uniforms", &uniforms);
        let bind_group = self.ctx.pipelines.paint_bind_group(device, &uniform_buffer);
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("paint_vertices"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("paint_indices"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.submit_draw(
            "paint_draw",
            &self.ctx.pipelines.paint[composite_slot(self.mode)],
            &bind_group,
            &vertices,
            &indices,
            geometry.indices.len() as u32,
        );
    }

    /// Copies `texture` when it shares storage with the target; a pass
    /// cannot sample the attachment it writes.
    fn detach_source(&self, texture: &GpuTexture) -> Option<GpuTexture> {
        if !texture.same_storage(&self.target) {
            return Some(texture.clone());
        }
        let copy = match self
            .ctx
            .allocate(texture.width(), texture.height(), "aliased_blit_source")
        {
            Ok(copy) => copy,
            Err(error) => {
                warn!(%error, "could not copy aliased blit source");
                return None;
            }
        };
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("aliased_blit_copy"),
            });
        encoder.copy_texture_to_texture(
            texture.raw().as_image_copy(),
            copy.raw().as_image_copy(),
            wgpu::Extent3d {
                width: texture.width(),
                height: texture.height(),
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Some(copy)
    }
}

impl Graphics for GpuGraphics {
    type Texture = GpuTexture;

    fn transform(&self) -> Transform {
        self.transform
    }

    fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    fn set_extra_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_composite_mode(&mut self, mode: CompositeMode) {
        self.mode = mode;
    }

    fn set_paint(&mut self, paint: &Paint) {
        self.paint = paint.clone();
    }

    fn fill_path(&mut self, path: &Path, rule: FillRule) {
        let geometry = tessellate_fill(path, rule, &self.transform);
        self.draw_geometry(geometry);
    }

    fn stroke_path(&mut self, path: &Path, stroke: &Stroke) {
        if stroke.width <= 0.0 {
            return;
        }
        let geometry = tessellate_stroke(path, stroke, &self.transform);
        self.draw_geometry(geometry);
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let bounds = crate::geometry::rect_bounds(x, y, width, height);
        if bounds.is_empty() {
            return;
        }
        let path = crate::shape::rect_path(bounds.min.x, bounds.min.y, bounds.width(), bounds.height());
        self.fill_path(&path, FillRule::NonZero);
    }

    fn draw_texture(&mut self, texture: &GpuTexture, dst: Box2D, src: Box2D) {
        if dst.is_empty() || src.is_empty() {
            return;
        }
        let Some(source) = self.detach_source(texture) else {
            return;
        };

        let (tw, th) = (source.width() as f32, source.height() as f32);
        let corners = [
            (point(dst.min.x, dst.min.y), [src.min.x / tw, src.min.y / th]),
            (point(dst.max.x, dst.min.y), [src.max.x / tw, src.min.y / th]),
            (point(dst.max.x, dst.max.y), [src.max.x / tw, src.max.y / th]),
            (point(dst.min.x, dst.max.y), [src.min.x / tw, src.max.y / th]),
        ];
        let vertices: Vec<BlitVertex> = corners
            .iter()
            .map(|(p, uv)| {
                let device = self.transform.transform_point(*p);
                BlitVertex {
                    position: [device.x, device.y],
                    uv: *uv,
                }
            })
            .collect();
        let indices: [u32; 6] = [0, 1, 2, 0, 2, 3];

        let unscaled = dst.width() == src.width() && dst.height() == src.height();
        let sampler = if unscaled && classify(&self.transform) != TransformKind::General {
            &self.ctx.nearest_sampler
        } else {
            &self.ctx.linear_sampler
        };

        let device = &self.ctx.device;
        let uniforms = BlitUniforms {
            viewport: self.viewport(),
            alpha: self.alpha,
            _pad: 0.0,
        };
        let uniform_buffer = self.ctx.uniform_buffer("blit_uniforms", &uniforms);
        let bind_group = self
            .ctx
            .pipelines
            .blit_bind_group(device, &uniform_buffer, &source, sampler);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blit_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blit_indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.submit_draw(
            "blit_draw",
            &self.ctx.pipelines.blit[composite_slot(self.mode)],
            &bind_group,
            &vertex_buffer,
            &index_buffer,
            indices.len() as u32,
        );
    }
}
