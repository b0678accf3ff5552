//! Pass command recording and replay.
//!
//! wgpu requires every render-pass attachment decision (load ops, MSAA
//! resolve) up front, while the core hands commands over one at a time. So
//! recording buffers everything: leading clears become attachment load
//! ops, later clears become scissored quad draws, and `end_pass` replays
//! the whole sequence into a single `wgpu::RenderPass` and submits it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use ziggurat_gpu::backend::PassCommands;
use ziggurat_gpu::pipeline::{
    CompareOp, GeometryStep, PipelineCache, PipelineDesc, PipelineFlags, PipelineInfo,
    StencilOp, VertexAttrType,
};
use ziggurat_gpu::pool::PoolSlice;
use ziggurat_gpu::types::{IRect, LoadOp, LoadStoreOps, PrimitiveType, StoreOp};

use crate::format::FormatTable;

pub(crate) const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;

// ── type mapping ──────────────────────────────────────────────────────────

pub(crate) fn vertex_format(ty: VertexAttrType) -> wgpu::VertexFormat {
    match ty {
        VertexAttrType::Float => wgpu::VertexFormat::Float32,
        VertexAttrType::Float2 => wgpu::VertexFormat::Float32x2,
        VertexAttrType::Float3 => wgpu::VertexFormat::Float32x3,
        VertexAttrType::Float4 => wgpu::VertexFormat::Float32x4,
        VertexAttrType::Half => wgpu::VertexFormat::Float16,
        VertexAttrType::Half2 => wgpu::VertexFormat::Float16x2,
        VertexAttrType::Half4 => wgpu::VertexFormat::Float16x4,
        VertexAttrType::Int => wgpu::VertexFormat::Sint32,
        VertexAttrType::Int2 => wgpu::VertexFormat::Sint32x2,
        VertexAttrType::Int4 => wgpu::VertexFormat::Sint32x4,
        VertexAttrType::UInt => wgpu::VertexFormat::Uint32,
        VertexAttrType::Byte4 => wgpu::VertexFormat::Sint8x4,
        VertexAttrType::UByte4 => wgpu::VertexFormat::Uint8x4,
        VertexAttrType::UByte4Norm => wgpu::VertexFormat::Unorm8x4,
        VertexAttrType::Short2 => wgpu::VertexFormat::Sint16x2,
        VertexAttrType::UShort2 => wgpu::VertexFormat::Uint16x2,
        VertexAttrType::UShort2Norm => wgpu::VertexFormat::Unorm16x2,
    }
}

fn wgsl_type(ty: VertexAttrType) -> &'static str {
    match ty {
        VertexAttrType::Float | VertexAttrType::Half => "f32",
        VertexAttrType::Float2
        | VertexAttrType::Half2
        | VertexAttrType::UShort2Norm => "vec2<f32>",
        VertexAttrType::Float3 => "vec3<f32>",
        VertexAttrType::Float4 | VertexAttrType::Half4 | VertexAttrType::UByte4Norm => {
            "vec4<f32>"
        }
        VertexAttrType::Int => "i32",
        VertexAttrType::Int2 | VertexAttrType::Short2 => "vec2<i32>",
        VertexAttrType::Int4 | VertexAttrType::Byte4 => "vec4<i32>",
        VertexAttrType::UInt => "u32",
        VertexAttrType::UByte4 => "vec4<u32>",
        VertexAttrType::UShort2 => "vec2<u32>",
    }
}

pub(crate) fn topology(primitive: PrimitiveType) -> wgpu::PrimitiveTopology {
    match primitive {
        PrimitiveType::PointList => wgpu::PrimitiveTopology::PointList,
        PrimitiveType::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveType::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn compare_function(op: CompareOp) -> wgpu::CompareFunction {
    match op {
        CompareOp::Never => wgpu::CompareFunction::Never,
        CompareOp::Less => wgpu::CompareFunction::Less,
        CompareOp::Equal => wgpu::CompareFunction::Equal,
        CompareOp::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareOp::Greater => wgpu::CompareFunction::Greater,
        CompareOp::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareOp::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareOp::Always => wgpu::CompareFunction::Always,
    }
}

fn stencil_operation(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
        StencilOp::IncWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOp::DecWrap => wgpu::StencilOperation::DecrementWrap,
        StencilOp::IncClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecClamp => wgpu::StencilOperation::DecrementClamp,
    }
}

// ── shader generation ─────────────────────────────────────────────────────

/// Generates the WGSL for a geometry step.
///
/// Positions are expected in clip space from the first vertex attribute; a
/// float4 attribute named `color` is passed through, everything else draws
/// opaque white. Remaining attributes are declared so the vertex layout
/// matches, even when the shader ignores them.
pub(crate) fn generate_shader(step: &GeometryStep) -> String {
    use std::fmt::Write;

    let mut src = String::new();
    src.push_str("struct VsIn {\n");
    let mut location = 0u32;
    for attr in step.vertex_attrs().iter().chain(step.instance_attrs()) {
        let _ = writeln!(
            src,
            "    @location({location}) {}: {},",
            attr.name,
            wgsl_type(attr.ty)
        );
        location += 1;
    }
    src.push_str("}\n\n");

    src.push_str(
        "struct VsOut {\n    @builtin(position) position: vec4<f32>,\n    \
         @location(0) color: vec4<f32>,\n}\n\n",
    );

    let pos = &step.vertex_attrs()[0];
    let position_expr = match pos.ty {
        VertexAttrType::Float | VertexAttrType::Half => {
            format!("vec4<f32>(in.{}, 0.0, 0.0, 1.0)", pos.name)
        }
        VertexAttrType::Float2 | VertexAttrType::Half2 | VertexAttrType::UShort2Norm => {
            format!("vec4<f32>(in.{}, 0.0, 1.0)", pos.name)
        }
        VertexAttrType::Float3 => format!("vec4<f32>(in.{}, 1.0)", pos.name),
        _ => format!("vec4<f32>(in.{})", pos.name),
    };
    let color_expr = step
        .vertex_attrs()
        .iter()
        .chain(step.instance_attrs())
        .find(|a| a.name == "color" && wgsl_type(a.ty) == "vec4<f32>")
        .map(|a| format!("in.{}", a.name))
        .unwrap_or_else(|| "vec4<f32>(1.0, 1.0, 1.0, 1.0)".to_owned());

    let _ = write!(
        src,
        "@vertex\nfn vs_main(in: VsIn) -> VsOut {{\n    var out: VsOut;\n    \
         out.position = {position_expr};\n    out.color = {color_expr};\n    \
         return out;\n}}\n\n\
         @fragment\nfn fs_main(in: VsOut) -> @location(0) vec4<f32> {{\n    \
         return in.color;\n}}\n"
    );
    src
}

fn vertex_attributes(
    attrs: &[ziggurat_gpu::pipeline::VertexAttr],
    first_location: u32,
) -> Vec<wgpu::VertexAttribute> {
    let mut out = Vec::with_capacity(attrs.len());
    let mut offset = 0u64;
    for (i, attr) in attrs.iter().enumerate() {
        out.push(wgpu::VertexAttribute {
            format: vertex_format(attr.ty),
            offset,
            shader_location: first_location + i as u32,
        });
        offset += attr.ty.size() as u64;
    }
    out
}

/// Premultiplied source-over, the engine's default blend.
const BLEND: wgpu::BlendState = wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING;

/// Maps the raster pipeline flags onto wgpu's polygon mode and
/// conservative bit. Both are optional device features; a flag the device
/// cannot honor falls back to plain filled rasterization.
fn raster_state(flags: PipelineFlags, features: wgpu::Features) -> (wgpu::PolygonMode, bool) {
    let polygon_mode = if flags.contains(PipelineFlags::WIREFRAME) {
        if features.contains(wgpu::Features::POLYGON_MODE_LINE) {
            wgpu::PolygonMode::Line
        } else {
            log::warn!("wireframe requested but POLYGON_MODE_LINE is unavailable");
            wgpu::PolygonMode::Fill
        }
    } else {
        wgpu::PolygonMode::Fill
    };
    let conservative = flags.contains(PipelineFlags::CONSERVATIVE_RASTER)
        && if features.contains(wgpu::Features::CONSERVATIVE_RASTERIZATION) {
            true
        } else {
            log::warn!(
                "conservative raster requested but CONSERVATIVE_RASTERIZATION is unavailable"
            );
            false
        };
    (polygon_mode, conservative)
}

pub(crate) fn build_render_pipeline(
    device: &wgpu::Device,
    info: &PipelineInfo,
    target_format: wgpu::TextureFormat,
    has_stencil: bool,
) -> wgpu::RenderPipeline {
    let step = info.geometry();
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(step.name()),
        source: wgpu::ShaderSource::Wgsl(generate_shader(step).into()),
    });

    let (polygon_mode, conservative) = raster_state(info.flags(), device.features());
    let vertex_attrs = vertex_attributes(step.vertex_attrs(), 0);
    let instance_attrs =
        vertex_attributes(step.instance_attrs(), step.vertex_attrs().len() as u32);
    let mut buffers = vec![wgpu::VertexBufferLayout {
        array_stride: step.vertex_stride() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &vertex_attrs,
    }];
    if step.is_instanced() {
        buffers.push(wgpu::VertexBufferLayout {
            array_stride: step.instance_stride() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &instance_attrs,
        });
    }

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(step.name()),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });

    let depth_stencil = has_stencil.then(|| {
        let face = match info.user_stencil() {
            Some(settings) => wgpu::StencilFaceState {
                compare: compare_function(settings.compare),
                fail_op: stencil_operation(settings.fail_op),
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: stencil_operation(settings.pass_op),
            },
            None => wgpu::StencilFaceState::IGNORE,
        };
        let (read_mask, write_mask) = match info.user_stencil() {
            Some(s) => (s.read_mask as u32, s.write_mask as u32),
            None => (!0, !0),
        };
        wgpu::DepthStencilState {
            format: STENCIL_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask,
                write_mask,
            },
            bias: wgpu::DepthBiasState::default(),
        }
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(step.name()),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: Some(BLEND),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: topology(step.primitive()),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode,
            conservative,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: info.sample_count(),
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

// ── clear quads ───────────────────────────────────────────────────────────

const CLEAR_SHADER: &str = "\
struct ClearColor { color: vec4<f32> }
@group(0) @binding(0) var<uniform> clear: ClearColor;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    // One triangle covering clip space; the scissor bounds the clear.
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    return vec4<f32>(x, y, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return clear.color;
}
";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct ClearKey {
    format: wgpu::TextureFormat,
    sample_count: u32,
    has_stencil: bool,
    /// Writes stencil instead of color.
    stencil_write: bool,
}

pub(crate) type ClearPipelines = Rc<RefCell<HashMap<ClearKey, Arc<wgpu::RenderPipeline>>>>;

fn clear_pipeline(
    device: &wgpu::Device,
    cache: &ClearPipelines,
    key: ClearKey,
) -> Arc<wgpu::RenderPipeline> {
    if let Some(found) = cache.borrow().get(&key) {
        return found.clone();
    }
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("clear quad"),
        source: wgpu::ShaderSource::Wgsl(CLEAR_SHADER.into()),
    });
    let bind_layout = device.create_bind_group_layout(&clear_bind_group_layout());
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("clear quad"),
        bind_group_layouts: &[&bind_layout],
        push_constant_ranges: &[],
    });
    let depth_stencil = key.has_stencil.then(|| wgpu::DepthStencilState {
        format: STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: if key.stencil_write {
            wgpu::StencilState {
                front: wgpu::StencilFaceState {
                    compare: wgpu::CompareFunction::Always,
                    fail_op: wgpu::StencilOperation::Replace,
                    depth_fail_op: wgpu::StencilOperation::Replace,
                    pass_op: wgpu::StencilOperation::Replace,
                },
                back: wgpu::StencilFaceState {
                    compare: wgpu::CompareFunction::Always,
                    fail_op: wgpu::StencilOperation::Replace,
                    depth_fail_op: wgpu::StencilOperation::Replace,
                    pass_op: wgpu::StencilOperation::Replace,
                },
                read_mask: !0,
                write_mask: !0,
            }
        } else {
            wgpu::StencilState::default()
        },
        bias: wgpu::DepthBiasState::default(),
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("clear quad"),
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
                format: key.format,
                blend: None,
                write_mask: if key.stencil_write {
                    wgpu::ColorWrites::empty()
                } else {
                    wgpu::ColorWrites::ALL
                },
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: key.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    });
    let pipeline = Arc::new(pipeline);
    cache.borrow_mut().insert(key, pipeline.clone());
    pipeline
}

fn clear_bind_group_layout() -> wgpu::BindGroupLayoutDescriptor<'static> {
    wgpu::BindGroupLayoutDescriptor {
        label: Some("clear quad"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    }
}

// ── recording ─────────────────────────────────────────────────────────────

type ScissorRect = (u32, u32, u32, u32);

enum Cmd {
    Pipeline {
        pipeline: Arc<wgpu::RenderPipeline>,
        stencil_reference: u32,
    },
    VertexData {
        slot: u32,
        data: Vec<u8>,
    },
    IndexData {
        data: Vec<u8>,
    },
    Scissor(ScissorRect),
    ClearQuad {
        scissor: ScissorRect,
        color: [f32; 4],
        stencil_write: bool,
        stencil_value: u32,
    },
    Draw {
        vertex_count: u32,
        base_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        base_index: u32,
        base_vertex: i32,
    },
    DrawInstanced {
        instance_count: u32,
        base_instance: u32,
        vertex_count: u32,
        base_vertex: u32,
    },
}

/// Per-pass recording sink for the wgpu backend.
pub(crate) struct WgpuPassCommands {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_view: wgpu::TextureView,
    resolve_view: Option<wgpu::TextureView>,
    stencil_view: Option<wgpu::TextureView>,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    sample_count: u32,
    color_ops: LoadStoreOps,
    stencil_ops: LoadStoreOps,
    table: Rc<FormatTable>,
    pipelines: Rc<RefCell<PipelineCache<wgpu::RenderPipeline>>>,
    clear_pipelines: ClearPipelines,
    /// Clears received before any draw fold into the attachment load ops.
    leading_color_clear: Option<[f32; 4]>,
    leading_stencil_clear: bool,
    recording_started: bool,
    cmds: Vec<Cmd>,
}

impl WgpuPassCommands {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_view: wgpu::TextureView,
        resolve_view: Option<wgpu::TextureView>,
        stencil_view: Option<wgpu::TextureView>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        sample_count: u32,
        color_ops: LoadStoreOps,
        stencil_ops: LoadStoreOps,
        table: Rc<FormatTable>,
        pipelines: Rc<RefCell<PipelineCache<wgpu::RenderPipeline>>>,
        clear_pipelines: ClearPipelines,
    ) -> Self {
        Self {
            device,
            queue,
            color_view,
            resolve_view,
            stencil_view,
            width,
            height,
            format,
            sample_count,
            color_ops,
            stencil_ops,
            table,
            pipelines,
            clear_pipelines,
            leading_color_clear: None,
            leading_stencil_clear: false,
            recording_started: false,
            cmds: Vec::new(),
        }
    }

    fn clamp_scissor(&self, rect: IRect) -> ScissorRect {
        let x = rect.left.max(0) as u32;
        let y = rect.top.max(0) as u32;
        let right = (rect.right.max(0) as u32).min(self.width);
        let bottom = (rect.bottom.max(0) as u32).min(self.height);
        (x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }

    fn covers_target(&self, scissor: ScissorRect) -> bool {
        scissor == (0, 0, self.width, self.height)
    }

}

fn wgpu_load(op: LoadOp, clear: wgpu::Color) -> wgpu::LoadOp<wgpu::Color> {
    match op {
        LoadOp::Load => wgpu::LoadOp::Load,
        // wgpu has no DontCare; a clear is the cheapest legal stand-in.
        LoadOp::Clear | LoadOp::DontCare => wgpu::LoadOp::Clear(clear),
    }
}

fn wgpu_store(op: StoreOp) -> wgpu::StoreOp {
    match op {
        StoreOp::Store => wgpu::StoreOp::Store,
        StoreOp::DontCare => wgpu::StoreOp::Discard,
    }
}

impl PassCommands for WgpuPassCommands {
    fn clear_color(&mut self, scissor: IRect, color: [f32; 4]) {
        let scissor = self.clamp_scissor(scissor);
        if !self.recording_started && self.covers_target(scissor) {
            self.leading_color_clear = Some(color);
            return;
        }
        self.cmds.push(Cmd::ClearQuad {
            scissor,
            color,
            stencil_write: false,
            stencil_value: 0,
        });
    }

    fn clear_stencil(&mut self, scissor: IRect, inside_mask: bool) {
        let scissor = self.clamp_scissor(scissor);
        if !self.recording_started && self.covers_target(scissor) && !inside_mask {
            self.leading_stencil_clear = true;
            return;
        }
        self.cmds.push(Cmd::ClearQuad {
            scissor,
            color: [0.0; 4],
            stencil_write: true,
            stencil_value: if inside_mask { 1 } else { 0 },
        });
    }

    fn bind_pipeline(
        &mut self,
        info: &PipelineInfo,
        desc: &PipelineDesc,
        _draw_bounds: IRect,
    ) -> bool {
        let Some(target_format) = self.table.wgpu_format(info.target_format()) else {
            log::warn!("pipeline targets a format unknown to the wgpu backend");
            return false;
        };
        let has_stencil = self.stencil_view.is_some();
        let device = self.device.clone();
        let info_ref = info;
        let pipeline = self
            .pipelines
            .borrow_mut()
            .get_or_create(desc, || {
                Some(build_render_pipeline(
                    &device,
                    info_ref,
                    target_format,
                    has_stencil,
                ))
            });
        let Some(pipeline) = pipeline else {
            return false;
        };
        self.recording_started = true;
        self.cmds.push(Cmd::Pipeline {
            pipeline,
            stencil_reference: info.user_stencil().map_or(0, |s| s.reference as u32),
        });
        true
    }

    fn bind_buffers(
        &mut self,
        vertex: Option<(PoolSlice, &[u8])>,
        instance: Option<(PoolSlice, &[u8])>,
        index: Option<(PoolSlice, &[u8])>,
    ) {
        // The carried bytes run from the block start through the slice, so
        // the block-relative bases recorded by later draws index the
        // staged buffer directly.
        self.recording_started = true;
        if let Some((_, data)) = vertex {
            self.cmds.push(Cmd::VertexData {
                slot: 0,
                data: data.to_vec(),
            });
        }
        if let Some((_, data)) = instance {
            self.cmds.push(Cmd::VertexData {
                slot: 1,
                data: data.to_vec(),
            });
        }
        if let Some((_, data)) = index {
            self.cmds.push(Cmd::IndexData {
                data: data.to_vec(),
            });
        }
    }

    fn set_scissor(&mut self, rect: IRect) {
        self.recording_started = true;
        let scissor = self.clamp_scissor(rect);
        self.cmds.push(Cmd::Scissor(scissor));
    }

    fn draw(&mut self, vertex_count: u32, base_vertex: u32) {
        self.recording_started = true;
        self.cmds.push(Cmd::Draw {
            vertex_count,
            base_vertex,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, base_index: u32, base_vertex: i32) {
        self.recording_started = true;
        self.cmds.push(Cmd::DrawIndexed {
            index_count,
            base_index,
            base_vertex,
        });
    }

    fn draw_instanced(
        &mut self,
        instance_count: u32,
        base_instance: u32,
        vertex_count: u32,
        base_vertex: u32,
    ) {
        self.recording_started = true;
        self.cmds.push(Cmd::DrawInstanced {
            instance_count,
            base_instance,
            vertex_count,
            base_vertex,
        });
    }

    fn end_pass(&mut self, color_store: StoreOp, stencil_store: StoreOp) {
        // Stage GPU resources first; the render pass borrows them.
        enum Prepared {
            Buffer(wgpu::Buffer),
            Clear {
                pipeline: Arc<wgpu::RenderPipeline>,
                bind_group: wgpu::BindGroup,
            },
            None,
        }

        let bind_layout = self.device.create_bind_group_layout(&clear_bind_group_layout());
        let prepared: Vec<Prepared> = self
            .cmds
            .iter()
            .map(|cmd| match cmd {
                Cmd::VertexData { data, .. } | Cmd::IndexData { data } => {
                    Prepared::Buffer(self.device.create_buffer_init(
                        &wgpu::util::BufferInitDescriptor {
                            label: Some("pooled pass data"),
                            contents: data,
                            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX,
                        },
                    ))
                }
                Cmd::ClearQuad {
                    color,
                    stencil_write,
                    ..
                } => {
                    let pipeline = clear_pipeline(
                        &self.device,
                        &self.clear_pipelines,
                        ClearKey {
                            format: self.format,
                            sample_count: self.sample_count,
                            has_stencil: self.stencil_view.is_some(),
                            stencil_write: *stencil_write,
                        },
                    );
                    let uniform = self.device.create_buffer_init(
                        &wgpu::util::BufferInitDescriptor {
                            label: Some("clear color"),
                            contents: bytemuck::cast_slice(color),
                            usage: wgpu::BufferUsages::UNIFORM,
                        },
                    );
                    let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("clear color"),
                        layout: &bind_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform.as_entire_binding(),
                        }],
                    });
                    Prepared::Clear {
                        pipeline,
                        bind_group,
                    }
                }
                _ => Prepared::None,
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ops render pass"),
            });

        {
            let color_load = match self.leading_color_clear {
                Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: c[0] as f64,
                    g: c[1] as f64,
                    b: c[2] as f64,
                    a: c[3] as f64,
                }),
                None => wgpu_load(self.color_ops.load_op(), wgpu::Color::TRANSPARENT),
            };
            let depth_stencil_attachment =
                self.stencil_view
                    .as_ref()
                    .map(|view| wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: None,
                        stencil_ops: Some(wgpu::Operations {
                            load: if self.leading_stencil_clear
                                || self.stencil_ops.load_op() != LoadOp::Load
                            {
                                wgpu::LoadOp::Clear(0)
                            } else {
                                wgpu::LoadOp::Load
                            },
                            store: wgpu_store(stencil_store),
                        }),
                    });

            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ops render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    depth_slice: None,
                    resolve_target: self.resolve_view.as_ref(),
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu_store(color_store),
                    },
                })],
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut scissor = (0, 0, self.width, self.height);
            for (cmd, res) in self.cmds.iter().zip(&prepared) {
                match (cmd, res) {
                    (
                        Cmd::Pipeline {
                            pipeline,
                            stencil_reference,
                        },
                        _,
                    ) => {
                        rp.set_pipeline(pipeline);
                        rp.set_stencil_reference(*stencil_reference);
                    }
                    (Cmd::VertexData { slot, .. }, Prepared::Buffer(buffer)) => {
                        rp.set_vertex_buffer(*slot, buffer.slice(..));
                    }
                    (Cmd::IndexData { .. }, Prepared::Buffer(buffer)) => {
                        rp.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint16);
                    }
                    (Cmd::Scissor(rect), _) => {
                        scissor = *rect;
                        rp.set_scissor_rect(rect.0, rect.1, rect.2, rect.3);
                    }
                    (
                        Cmd::ClearQuad {
                            scissor: clear_scissor,
                            stencil_write,
                            stencil_value,
                            ..
                        },
                        Prepared::Clear {
                            pipeline,
                            bind_group,
                        },
                    ) => {
                        rp.set_scissor_rect(
                            clear_scissor.0,
                            clear_scissor.1,
                            clear_scissor.2,
                            clear_scissor.3,
                        );
                        rp.set_pipeline(pipeline);
                        if *stencil_write {
                            rp.set_stencil_reference(*stencil_value);
                        }
                        rp.set_bind_group(0, bind_group, &[]);
                        rp.draw(0..3, 0..1);
                        // Restore the recorded scissor.
                        rp.set_scissor_rect(scissor.0, scissor.1, scissor.2, scissor.3);
                    }
                    (
                        Cmd::Draw {
                            vertex_count,
                            base_vertex,
                        },
                        _,
                    ) => {
                        rp.draw(*base_vertex..base_vertex + vertex_count, 0..1);
                    }
                    (
                        Cmd::DrawIndexed {
                            index_count,
                            base_index,
                            base_vertex,
                        },
                        _,
                    ) => {
                        rp.draw_indexed(
                            *base_index..base_index + index_count,
                            *base_vertex,
                            0..1,
                        );
                    }
                    (
                        Cmd::DrawInstanced {
                            instance_count,
                            base_instance,
                            vertex_count,
                            base_vertex,
                        },
                        _,
                    ) => {
                        rp.draw(
                            *base_vertex..base_vertex + vertex_count,
                            *base_instance..base_instance + instance_count,
                        );
                    }
                    _ => unreachable!("prepared resources out of step with commands"),
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.cmds.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ziggurat_gpu::pipeline::VertexAttr;

    fn quad_step() -> GeometryStep {
        GeometryStep::new(
            "quad",
            PrimitiveType::TriangleStrip,
            vec![
                VertexAttr::new("pos", VertexAttrType::Float2),
                VertexAttr::new("color", VertexAttrType::UByte4Norm),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn shader_declares_every_attribute() {
        let src = generate_shader(&quad_step());
        assert!(src.contains("@location(0) pos: vec2<f32>"));
        assert!(src.contains("@location(1) color: vec4<f32>"));
        assert!(src.contains("@vertex"));
        assert!(src.contains("@fragment"));
    }

    #[test]
    fn shader_passes_color_attribute_through() {
        let src = generate_shader(&quad_step());
        assert!(src.contains("out.color = in.color"));
    }

    #[test]
    fn shader_without_color_attr_draws_white() {
        let step = GeometryStep::new(
            "lines",
            PrimitiveType::LineList,
            vec![VertexAttr::new("pos", VertexAttrType::Float2)],
            Vec::new(),
        );
        let src = generate_shader(&step);
        assert!(src.contains("vec4<f32>(1.0, 1.0, 1.0, 1.0)"));
    }

    #[test]
    fn vertex_formats_match_attr_sizes() {
        for ty in [
            VertexAttrType::Float,
            VertexAttrType::Float2,
            VertexAttrType::Float4,
            VertexAttrType::UByte4Norm,
            VertexAttrType::Short2,
        ] {
            assert_eq!(vertex_format(ty).size() as usize, ty.size());
        }
    }

    #[test]
    fn raster_flags_map_when_the_device_supports_them() {
        let features =
            wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::CONSERVATIVE_RASTERIZATION;
        assert_eq!(
            raster_state(PipelineFlags::WIREFRAME, features),
            (wgpu::PolygonMode::Line, false)
        );
        assert_eq!(
            raster_state(PipelineFlags::CONSERVATIVE_RASTER, features),
            (wgpu::PolygonMode::Fill, true)
        );
    }

    #[test]
    fn raster_flags_fall_back_without_device_support() {
        let flags = PipelineFlags::WIREFRAME | PipelineFlags::CONSERVATIVE_RASTER;
        assert_eq!(
            raster_state(flags, wgpu::Features::empty()),
            (wgpu::PolygonMode::Fill, false)
        );
    }

    #[test]
    fn store_op_mapping() {
        assert_eq!(wgpu_store(StoreOp::Store), wgpu::StoreOp::Store);
        assert_eq!(wgpu_store(StoreOp::DontCare), wgpu::StoreOp::Discard);
    }
}
