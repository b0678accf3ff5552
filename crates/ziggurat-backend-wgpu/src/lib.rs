//! wgpu backend for the ziggurat GPU core.
//!
//! Implements [`GpuBackend`] on top of a wgpu device/queue pair. The core
//! has already validated every request, so the hooks here translate
//! directly into wgpu calls. Device acquisition is asynchronous under
//! wgpu; [`WgpuBackend::new_headless`] wraps it with `pollster` for
//! synchronous callers.

mod caps;
mod format;
mod pass;

pub use format::FormatTable;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use ziggurat_gpu::backend::{FenceHandle, GpuBackend, PassCommands};
use ziggurat_gpu::buffer::{BufferUsage, GpuBuffer};
use ziggurat_gpu::caps::Caps;
use ziggurat_gpu::pipeline::{PipelineCache, PipelineFlags};
use ziggurat_gpu::proxy::{SurfaceProxy, SurfaceProxyView};
use ziggurat_gpu::resource::Shared;
use ziggurat_gpu::texture::{BackendTexture, Texture, TextureDesc};
use ziggurat_gpu::types::{
    ColorType, IRect, LoadStoreOps, Ownership, StateBits, SurfaceFlags,
};

use pass::{ClearPipelines, STENCIL_FORMAT, WgpuPassCommands};

/// Backend payload attached to every texture this backend creates.
///
/// Multisampled targets carry a single-sample sibling that MSAA resolves
/// land in.
pub struct WgpuTexture {
    pub texture: wgpu::Texture,
    pub resolve: Option<wgpu::Texture>,
}

/// [`GpuBackend`] over a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    formats: Rc<FormatTable>,
    pipelines: Rc<RefCell<PipelineCache<wgpu::RenderPipeline>>>,
    clear_pipelines: ClearPipelines,
    /// Per-pass transient stencil textures, keyed by size.
    stencil_textures: HashMap<(u32, u32), wgpu::Texture>,
    /// Downsample pipelines for mipmap regeneration, keyed by format.
    mip_pipelines: HashMap<wgpu::TextureFormat, MipBlit>,
    fences: HashMap<FenceHandle, Arc<AtomicBool>>,
    next_fence: FenceHandle,
}

impl WgpuBackend {
    /// Acquires an adapter and device with no surface attached.
    pub async fn new_headless_async() -> Result<(Self, Caps)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;
        // Optional raster modes; pipelines fall back to filled
        // rasterization when the adapter lacks them.
        let optional = wgpu::Features::POLYGON_MODE_LINE
            | wgpu::Features::CONSERVATIVE_RASTERIZATION;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ziggurat device"),
                required_features: adapter.features() & optional,
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        log::info!("wgpu backend on {}", adapter.get_info().name);
        Ok(Self::from_device(device, queue, &adapter.limits()))
    }

    /// Blocking wrapper around [`new_headless_async`](Self::new_headless_async).
    pub fn new_headless() -> Result<(Self, Caps)> {
        pollster::block_on(Self::new_headless_async())
    }

    /// Builds the backend around an existing device, e.g. one shared with
    /// a windowing surface.
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        limits: &wgpu::Limits,
    ) -> (Self, Caps) {
        let formats = Rc::new(FormatTable::new());
        let caps = caps::caps_from_limits(limits, &formats);
        (
            Self {
                device,
                queue,
                formats,
                pipelines: Rc::new(RefCell::new(PipelineCache::new())),
                clear_pipelines: ClearPipelines::default(),
                stencil_textures: HashMap::new(),
                mip_pipelines: HashMap::new(),
                fences: HashMap::new(),
                next_fence: 0,
            },
            caps,
        )
    }

    /// The canonical format table; callers intern their formats through it.
    pub fn formats(&self) -> &FormatTable {
        &self.formats
    }

    fn texture_usage(flags: SurfaceFlags) -> wgpu::TextureUsages {
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        // Mipmapped textures need the attachment bit: regeneration renders
        // each level from the one above it.
        if flags.intersects(SurfaceFlags::RENDERABLE | SurfaceFlags::MIPMAPPED) {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        usage
    }


    fn stencil_view_for(&mut self, width: u32, height: u32) -> wgpu::TextureView {
        let texture = self
            .stencil_textures
            .entry((width, height))
            .or_insert_with(|| {
                self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("pass stencil"),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: STENCIL_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
            });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}

impl GpuBackend for WgpuBackend {
    fn on_reset_context(&mut self, bits: StateBits) {
        // wgpu validates and re-emits all state per pass; nothing external
        // can go stale underneath it.
        log::debug!("context resync requested for {bits:?}");
    }

    fn on_create_texture(&mut self, desc: &TextureDesc) -> Option<Shared<Texture>> {
        let format = self.formats.wgpu_format(&desc.format)?;
        let size = wgpu::Extent3d {
            width: desc.width as u32,
            height: desc.height as u32,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size,
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: Self::texture_usage(desc.flags),
            view_formats: &[],
        });
        let resolve = (desc.sample_count > 1).then(|| {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("msaa resolve"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: Self::texture_usage(desc.flags),
                view_formats: &[],
            })
        });
        Some(Shared::new(Texture::new(
            desc.clone(),
            Ownership::Owned,
            Box::new(WgpuTexture { texture, resolve }),
        )))
    }

    fn on_wrap_renderable_backend_texture(
        &mut self,
        texture: BackendTexture,
        sample_count: u32,
        ownership: Ownership,
    ) -> Option<Shared<Texture>> {
        let wrapped = texture.payload.downcast::<wgpu::Texture>().ok()?;
        let desc = TextureDesc {
            width: texture.width,
            height: texture.height,
            format: texture.format,
            mip_level_count: 1,
            sample_count,
            flags: SurfaceFlags::RENDERABLE,
        };
        Some(Shared::new(Texture::new(
            desc,
            ownership,
            Box::new(WgpuTexture {
                texture: *wrapped,
                resolve: None,
            }),
        )))
    }

    fn on_write_pixels(
        &mut self,
        texture: &Shared<Texture>,
        rect: IRect,
        _dst_color_type: ColorType,
        src_color_type: ColorType,
        row_bytes: usize,
        pixels: &[u8],
    ) -> bool {
        let Some(payload) = texture.backend_as::<WgpuTexture>() else {
            return false;
        };
        let bpp = src_color_type.bytes_per_pixel();
        let width = rect.width() as usize;
        let height = rect.height() as usize;
        // Repack to a tight layout; wgpu wants the data length to match.
        let tight_row = width * bpp;
        let mut data = vec![0u8; tight_row * height];
        for row in 0..height {
            let src = &pixels[row * row_bytes..row * row_bytes + tight_row];
            data[row * tight_row..(row + 1) * tight_row].copy_from_slice(src);
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &payload.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: rect.left as u32,
                    y: rect.top as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(tight_row as u32),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: width as u32,
                height: height as u32,
                depth_or_array_layers: 1,
            },
        );
        true
    }

    fn on_generate_mipmaps(&mut self, texture: &Shared<Texture>) -> bool {
        let Some(format) = self.formats.wgpu_format(texture.format()).or_else(|| {
            log::warn!("mipmap regeneration on a format unknown to this backend");
            None
        }) else {
            return false;
        };
        let Some(payload) = texture.backend_as::<WgpuTexture>() else {
            return false;
        };
        if !self.mip_pipelines.contains_key(&format) {
            let blit = MipBlit::new(&self.device, format);
            self.mip_pipelines.insert(format, blit);
        }
        let blit = &self.mip_pipelines[&format];

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mipmap regen"),
            });
        for level in 1..texture.mip_level_count() {
            blit.downsample(&self.device, &mut encoder, &payload.texture, level);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        true
    }

    fn on_create_buffer(&mut self, size: usize, usage: BufferUsage) -> Option<Shared<GpuBuffer>> {
        let mut wgpu_usage = wgpu::BufferUsages::empty();
        if usage.contains(BufferUsage::VERTEX) {
            wgpu_usage |= wgpu::BufferUsages::VERTEX;
        }
        if usage.contains(BufferUsage::INDEX) {
            wgpu_usage |= wgpu::BufferUsages::INDEX;
        }
        if usage.contains(BufferUsage::TRANSFER_SRC) {
            wgpu_usage |= wgpu::BufferUsages::COPY_SRC;
        }
        if usage.contains(BufferUsage::TRANSFER_DST)
            || usage.intersects(BufferUsage::STREAM | BufferUsage::DYNAMIC)
        {
            wgpu_usage |= wgpu::BufferUsages::COPY_DST;
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: size as u64,
            usage: wgpu_usage,
            mapped_at_creation: false,
        });
        Some(Shared::new(GpuBuffer::new(size, usage, Box::new(buffer))))
    }

    fn on_get_ops_render_pass(
        &mut self,
        write_view: &SurfaceProxyView,
        _content_bounds: IRect,
        color_ops: LoadStoreOps,
        stencil_ops: LoadStoreOps,
        _clear_color: [f32; 4],
        _sampled_textures: &[&SurfaceProxy],
        _pipeline_flags: PipelineFlags,
    ) -> Option<Box<dyn PassCommands>> {
        let proxy = write_view.proxy()?;
        let target = proxy.peek_texture()?;
        let payload = target.backend_as::<WgpuTexture>()?;
        let format = self.formats.wgpu_format(target.format())?;

        let color_view = payload
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let resolve_view = payload
            .resolve
            .as_ref()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));
        let width = target.width() as u32;
        let height = target.height() as u32;
        let stencil_view = target
            .flags()
            .contains(SurfaceFlags::STENCIL_ATTACHMENT)
            .then(|| self.stencil_view_for(width, height));

        Some(Box::new(WgpuPassCommands::new(
            self.device.clone(),
            self.queue.clone(),
            color_view,
            resolve_view,
            stencil_view,
            width,
            height,
            format,
            target.sample_count(),
            color_ops,
            stencil_ops,
            self.formats.clone(),
            self.pipelines.clone(),
            self.clear_pipelines.clone(),
        )))
    }

    fn on_resolve_render_target(&mut self, target: &Shared<Texture>, resolve_rect: IRect) {
        let Some(payload) = target.backend_as::<WgpuTexture>() else {
            return;
        };
        let Some(resolve) = payload.resolve.as_ref() else {
            log::warn!("resolve requested on a target with no resolve texture");
            return;
        };
        // wgpu resolves whole attachments; the rect only informs logging.
        log::trace!("resolving {resolve_rect:?}");
        let msaa_view = payload
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let resolve_view = resolve.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("msaa resolve"),
            });
        // An empty pass whose only effect is the attachment resolve.
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("msaa resolve"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &msaa_view,
                depth_slice: None,
                resolve_target: Some(&resolve_view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Discard,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn insert_fence(&mut self) -> FenceHandle {
        self.next_fence += 1;
        let handle = self.next_fence;
        let flag = Arc::new(AtomicBool::new(false));
        let signal = flag.clone();
        self.queue.on_submitted_work_done(move || {
            signal.store(true, Ordering::Release);
        });
        self.fences.insert(handle, flag);
        handle
    }

    fn check_fence(&mut self, fence: FenceHandle) -> bool {
        // A non-blocking poll gives completed callbacks a chance to run.
        let _ = self.device.poll(wgpu::PollType::Poll);
        self.fences
            .get(&fence)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    fn delete_fence(&mut self, fence: FenceHandle) {
        self.fences.remove(&fence);
    }

    fn wait_for_queue(&mut self) {
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
    }
}

// ── mipmap regeneration ───────────────────────────────────────────────────

const MIP_SHADER: &str = "\
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var samp: sampler;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    var out: VsOut;
    out.position = vec4<f32>(x, y, 0.0, 1.0);
    out.uv = vec2<f32>((x + 1.0) * 0.5, (1.0 - y) * 0.5);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(src, samp, in.uv);
}
";

/// Renders each mip level from the one above it with a bilinear blit.
struct MipBlit {
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl MipBlit {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mip blit"),
            source: wgpu::ShaderSource::Wgsl(MIP_SHADER.into()),
        });
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mip blit"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mip blit"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mip blit"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("mip blit"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            pipeline,
            bind_layout,
            sampler,
        }
    }

    /// Renders mip `level` of `texture` from `level - 1`.
    fn downsample(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        level: u32,
    ) {
        let src = texture.create_view(&wgpu::TextureViewDescriptor {
            base_mip_level: level - 1,
            mip_level_count: Some(1),
            ..Default::default()
        });
        let dst = texture.create_view(&wgpu::TextureViewDescriptor {
            base_mip_level: level,
            mip_level_count: Some(1),
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mip blit"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("mip blit"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &dst,
                depth_slice: None,
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
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, &bind_group, &[]);
        rp.draw(0..3, 0..1);
    }
}
