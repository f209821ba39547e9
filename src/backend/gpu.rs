//! wgpu device.
//!
//! Every surface is an `Rgba8Unorm` texture holding premultiplied color.
//! Paths are tessellated with lyon on the CPU and drawn with one of three
//! pipelines per composite mode; blend modes and blurs run as fullscreen
//! fragment passes that reproduce [`BlendMode::blend_premultiplied`] and
//! the CPU gaussian.
//!
//! Drawing is immediate: each call records and submits its own command
//! encoder, so a [`GpuGraphics`] never holds GPU state between calls.
//! Textures owned by this device are never volatile.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use lyon::math::{point, Box2D, Point, Transform};
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, StrokeTessellator, StrokeVertex,
    VertexBuffers,
};
use tracing::{debug, error, warn};
use wgpu::util::DeviceExt;
use wgpu::InstanceDescriptor;

use super::{Backend, Graphics, RenderTarget};
use crate::effect::{blur_sigma, BlendMode, CompositeMode, ImageData};
use crate::error::CanvasError;
use crate::geometry::{classify, inverse_or_degenerate, IRect, TransformKind};
use crate::paint::{CycleMethod, GradientStop, Paint};
use crate::shape::FillRule;
use crate::stroke::Stroke;
use crate::Color;

mod graphics;
mod pipelines;
mod readback;
mod shaders;

pub use graphics::GpuGraphics;
use pipelines::{BlendUniforms, BlurUniforms, Pipelines};

/// Texture format of every surface on this device.
pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Device, queue and compiled pipelines, shared by the backend, its
/// targets and every drawing context.
pub(crate) struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: Pipelines,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
}

impl GpuContext {
    fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        device.on_uncaptured_error(Box::new(|gpu_error: wgpu::Error| {
            error!(%gpu_error, "uncaptured wgpu error");
        }));
        let pipelines = Pipelines::new(&device);
        let sampler = |filter: wgpu::FilterMode, label: &'static str| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear_sampler = sampler(wgpu::FilterMode::Linear, "canvas_linear_sampler");
        let nearest_sampler = sampler(wgpu::FilterMode::Nearest, "canvas_nearest_sampler");
        Self {
            device,
            queue,
            pipelines,
            linear_sampler,
            nearest_sampler,
        }
    }

    fn allocate(&self, width: u32, height: u32, label: &'static str) -> Result<GpuTexture, CanvasError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(CanvasError::TargetAllocation { width, height });
        }
        let (width, height) = (width.max(1), height.max(1));
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Ok(GpuTexture::new(texture, width, height))
    }

    /// Records a single pass that overwrites `output` with a fullscreen
    /// triangle.
    fn run_fullscreen_pass(
        &self,
        label: &'static str,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
        output: &GpuTexture,
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn uniform_buffer<T: Pod>(&self, label: &'static str, uniforms: &T) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }
}

/// wgpu backend.
pub struct GpuBackend {
    ctx: Arc<GpuContext>,
    allocations: usize,
}

impl std::fmt::Debug for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBackend")
            .field("max_texture_dimension", &self.ctx.device.limits().max_texture_dimension_2d)
            .field("allocations", &self.allocations)
            .finish()
    }
}

impl GpuBackend {
    /// Wraps an existing device, e.g. the one an application already
    /// renders its window with.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            ctx: Arc::new(GpuContext::new(device, queue)),
            allocations: 0,
        }
    }

    /// Requests an adapter and device without a surface.
    ///
    /// Returns `None` when no suitable adapter is available, so callers
    /// running without a GPU (CI, containers) can skip instead of panicking.
    pub async fn try_new_headless() -> Option<Self> {
        let instance = wgpu::Instance::new(&InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;
        debug!(adapter = ?adapter.get_info().name, "using wgpu adapter");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("deferred_canvas_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .ok()?;
        Some(Self::from_device(device, queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.ctx.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.ctx.queue
    }

    /// Render targets allocated so far.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    fn blur(
        &mut self,
        input: &ImageData<GpuTexture>,
        radius: f32,
        tint: Option<Color>,
    ) -> Result<ImageData<GpuTexture>, CanvasError> {
        let pad = radius.max(0.0).ceil() as i32;
        let bounds = input.bounds.outset(pad);
        let (width, height) = (bounds.width.max(0) as u32, bounds.height.max(0) as u32);
        let horizontal = self.ctx.allocate(width, height, "blur_horizontal")?;
        let output = self.ctx.allocate(width, height, "blur_output")?;
        if bounds.is_empty() {
            return Ok(ImageData::new(output, bounds));
        }

        let sigma = blur_sigma(radius);
        let tint_rgba = tint.as_ref().map(premultiplied_unit).unwrap_or([0.0; 4]);
        let passes = [
            (
                &input.texture,
                &horizontal,
                BlurUniforms {
                    offset: [-pad, -pad],
                    direction: [1, 0],
                    source_size: input.texture.size_i32(),
                    radius: pad,
                    mode: if tint.is_some() { 1 } else { 0 },
                    sigma,
                    _pad: [0.0; 3],
                    tint: tint_rgba,
                },
            ),
            (
                &horizontal,
                &output,
                BlurUniforms {
                    offset: [0, 0],
                    direction: [0, 1],
                    source_size: horizontal.size_i32(),
                    radius: pad,
                    mode: if tint.is_some() { 2 } else { 0 },
                    sigma,
                    _pad: [0.0; 3],
                    tint: tint_rgba,
                },
            ),
        ];
        for (source, destination, uniforms) in passes {
            let buffer = self.ctx.uniform_buffer("blur_uniforms", &uniforms);
            let bind_group = self.ctx.pipelines.blur_bind_group(&self.ctx.device, &buffer, source);
            self.ctx
                .run_fullscreen_pass("blur_pass", &self.ctx.pipelines.blur, &bind_group, destination);
        }
        Ok(ImageData::new(output, bounds))
    }
}

struct TextureInner {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// A device texture. Clones share the same GPU storage.
#[derive(Clone)]
pub struct GpuTexture {
    inner: Arc<TextureInner>,
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTexture")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .finish()
    }
}

impl GpuTexture {
    fn new(texture: wgpu::Texture, width: u32, height: u32) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            inner: Arc::new(TextureInner {
                texture,
                view,
                width,
                height,
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.inner.texture
    }

    fn view(&self) -> &wgpu::TextureView {
        &self.inner.view
    }

    fn size_i32(&self) -> [i32; 2] {
        [self.inner.width as i32, self.inner.height as i32]
    }

    fn same_storage(&self, other: &GpuTexture) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A render target on the GPU. Its content survives until dropped.
pub struct GpuTarget {
    texture: GpuTexture,
    ctx: Arc<GpuContext>,
}

impl std::fmt::Debug for GpuTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GpuTarget").field(&self.texture).finish()
    }
}

impl RenderTarget for GpuTarget {
    type Texture = GpuTexture;

    fn content_width(&self) -> u32 {
        self.texture.width()
    }

    fn content_height(&self) -> u32 {
        self.texture.height()
    }

    fn is_volatile(&self) -> bool {
        false
    }

    fn is_lost(&self) -> bool {
        false
    }

    fn texture(&self) -> GpuTexture {
        self.texture.clone()
    }

    fn read_pixels(&self, out: &mut Vec<u32>) -> Result<(), CanvasError> {
        let rgba = readback::read_texture(&self.ctx, &self.texture)?;
        out.clear();
        out.extend(
            rgba.chunks_exact(4)
                .map(|px| u32::from_be_bytes([px[3], px[0], px[1], px[2]])),
        );
        Ok(())
    }
}

impl Backend for GpuBackend {
    type Texture = GpuTexture;
    type Target = GpuTarget;
    type Graphics = GpuGraphics;

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<GpuTarget, CanvasError> {
        if width == 0 || height == 0 {
            return Err(CanvasError::TargetAllocation { width, height });
        }
        let texture = self.ctx.allocate(width, height, "canvas_render_target")?;
        self.allocations += 1;
        Ok(GpuTarget {
            texture,
            ctx: Arc::clone(&self.ctx),
        })
    }

    fn create_graphics(&mut self, target: &GpuTarget) -> Option<GpuGraphics> {
        Some(GpuGraphics::new(Arc::clone(&self.ctx), target.texture.clone()))
    }

    fn create_texture(&mut self, width: u32, height: u32, argb_pre: &[u32]) -> Result<GpuTexture, CanvasError> {
        let expected = width as usize * height as usize;
        if argb_pre.len() != expected {
            return Err(CanvasError::InvalidTexture(format!(
                "{width}x{height} texture needs {expected} pixels, got {}",
                argb_pre.len()
            )));
        }
        let texture = self.ctx.allocate(width, height, "canvas_uploaded_texture")?;
        if expected == 0 {
            return Ok(texture);
        }
        let rgba: Vec<u8> = argb_pre
            .iter()
            .flat_map(|word| {
                let [a, r, g, b] = word.to_be_bytes();
                [r.min(a), g.min(a), b.min(a), a]
            })
            .collect();
        self.ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: texture.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(texture)
    }

    fn blend(
        &mut self,
        top: &ImageData<GpuTexture>,
        bottom: &ImageData<GpuTexture>,
        mode: BlendMode,
        clip: Option<IRect>,
    ) -> Result<ImageData<GpuTexture>, CanvasError> {
        let mut bounds = top.bounds.union(&bottom.bounds);
        if let Some(clip) = clip {
            bounds = bounds.intersect(&clip);
        }
        let output = self.ctx.allocate(
            bounds.width.max(0) as u32,
            bounds.height.max(0) as u32,
            "blend_output",
        )?;
        if bounds.is_empty() {
            return Ok(ImageData::new(output, bounds));
        }

        let uniforms = BlendUniforms {
            out_origin: [bounds.x, bounds.y],
            top_origin: [top.bounds.x, top.bounds.y],
            top_size: [top.bounds.width, top.bounds.height],
            bottom_origin: [bottom.bounds.x, bottom.bounds.y],
            bottom_size: [bottom.bounds.width, bottom.bounds.height],
            mode: mode.index(),
            _pad: 0,
        };
        let buffer = self.ctx.uniform_buffer("blend_uniforms", &uniforms);
        let bind_group =
            self.ctx
                .pipelines
                .blend_bind_group(&self.ctx.device, &buffer, &top.texture, &bottom.texture);
        self.ctx
            .run_fullscreen_pass("blend_pass", &self.ctx.pipelines.blend, &bind_group, &output);
        Ok(ImageData::new(output, bounds))
    }

    fn gaussian_blur(
        &mut self,
        input: &ImageData<GpuTexture>,
        radius: f32,
    ) -> Result<ImageData<GpuTexture>, CanvasError> {
        self.blur(input, radius, None)
    }

    fn shadow(
        &mut self,
        input: &ImageData<GpuTexture>,
        radius: f32,
        color: Color,
    ) -> Result<ImageData<GpuTexture>, CanvasError> {
        self.blur(input, radius, Some(color))
    }
}

/// Premultiplied channels of `color` in `[0, 1]`.
fn premultiplied_unit(color: &Color) -> [f32; 4] {
    color.premultiplied().map(|channel| channel as f32 / 255.0)
}
