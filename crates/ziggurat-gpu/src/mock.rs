//! A backend that draws nothing.
//!
//! Textures live in host memory, pass commands are appended to a log, and
//! fences signal immediately. Tests and the demo binary drive the full
//! engine through [`MockBackend`] and inspect what reached the backend via
//! the paired [`MockHandle`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::{FenceHandle, GpuBackend, PassCommands};
use crate::buffer::{BufferUsage, GpuBuffer};
use crate::caps::{BackendFormat, Caps, CapsConfig, FormatCaps};
use crate::pipeline::{PipelineDesc, PipelineFlags, PipelineInfo};
use crate::pool::PoolSlice;
use crate::proxy::{SurfaceProxy, SurfaceProxyView};
use crate::resource::Shared;
use crate::texture::{BackendTexture, Texture, TextureDesc};
use crate::types::{
    ColorType, IRect, LoadStoreOps, Ownership, StateBits, StoreOp, SurfaceFlags,
};

/// One backend call, as recorded by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    ClearColor {
        scissor: IRect,
        color: [f32; 4],
    },
    ClearStencil {
        scissor: IRect,
        inside_mask: bool,
    },
    BindPipeline {
        key: Vec<u32>,
    },
    BindBuffers {
        /// Each binding pairs the slice with the staged byte length.
        vertex: Option<(PoolSlice, usize)>,
        instance: Option<(PoolSlice, usize)>,
        index: Option<(PoolSlice, usize)>,
    },
    SetScissor(IRect),
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
    EndPass {
        color_store: StoreOp,
        stencil_store: StoreOp,
    },
    Resolve(IRect),
}

/// Host-memory texture payload.
pub struct MockTexture {
    pub pixels: RefCell<Vec<u8>>,
}

#[derive(Default)]
struct MockState {
    commands: RefCell<Vec<MockCommand>>,
    reset_contexts: RefCell<Vec<StateBits>>,
    fail_next_pass: Cell<bool>,
    fail_pipeline_binds: Cell<bool>,
    mipmap_generations: Cell<u32>,
    next_fence: Cell<FenceHandle>,
}

/// Test-side view into a [`MockBackend`] that has been boxed away inside a
/// server. Cheap to clone.
#[derive(Clone)]
pub struct MockHandle {
    state: Rc<MockState>,
}

impl MockHandle {
    /// Everything pass recording has sent to the backend so far.
    pub fn commands(&self) -> Vec<MockCommand> {
        self.state.commands.borrow().clone()
    }

    pub fn clear_commands(&self) {
        self.state.commands.borrow_mut().clear();
    }

    /// The `StateBits` of every context resync, in order.
    pub fn reset_contexts(&self) -> Vec<StateBits> {
        self.state.reset_contexts.borrow().clone()
    }

    /// Makes the next pass-creation request fail, as a driver would.
    pub fn fail_next_pass(&self) {
        self.state.fail_next_pass.set(true);
    }

    /// While set, every pipeline bind is rejected.
    pub fn fail_pipeline_binds(&self, fail: bool) {
        self.state.fail_pipeline_binds.set(fail);
    }

    pub fn mipmap_generations(&self) -> u32 {
        self.state.mipmap_generations.get()
    }
}

/// The API-less backend.
pub struct MockBackend {
    state: Rc<MockState>,
}

impl MockBackend {
    pub fn new() -> (MockBackend, MockHandle) {
        let state = Rc::new(MockState::default());
        (
            MockBackend {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }

    /// The one color format the mock supports.
    pub fn rgba8() -> BackendFormat {
        BackendFormat::new(1, "rgba8", 4, false)
    }

    /// Caps matching what the mock accepts: rgba8, texturable, renderable
    /// at 1/2/4 samples.
    pub fn caps() -> Caps {
        let mut formats = HashMap::new();
        formats.insert(
            Self::rgba8().id(),
            FormatCaps {
                texturable: true,
                color_sample_counts: vec![1, 2, 4],
            },
        );
        Caps::new(CapsConfig {
            formats,
            ..CapsConfig::default()
        })
    }

    fn alloc_pixels(desc: &TextureDesc) -> MockTexture {
        let bytes = desc.width as usize * desc.height as usize * desc.format.bytes_per_block();
        MockTexture {
            pixels: RefCell::new(vec![0; bytes]),
        }
    }
}

impl GpuBackend for MockBackend {
    fn on_reset_context(&mut self, bits: StateBits) {
        self.state.reset_contexts.borrow_mut().push(bits);
    }

    fn on_create_texture(&mut self, desc: &TextureDesc) -> Option<Shared<Texture>> {
        let payload = Self::alloc_pixels(desc);
        Some(Shared::new(Texture::new(
            desc.clone(),
            Ownership::Owned,
            Box::new(payload),
        )))
    }

    fn on_wrap_renderable_backend_texture(
        &mut self,
        texture: BackendTexture,
        sample_count: u32,
        ownership: Ownership,
    ) -> Option<Shared<Texture>> {
        let desc = TextureDesc {
            width: texture.width,
            height: texture.height,
            format: texture.format,
            mip_level_count: 1,
            sample_count,
            flags: SurfaceFlags::RENDERABLE,
        };
        Some(Shared::new(Texture::new(desc, ownership, texture.payload)))
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
        let Some(mock) = texture.backend_as::<MockTexture>() else {
            return false;
        };
        let bpp = src_color_type.bytes_per_pixel();
        if bpp != texture.format().bytes_per_block() {
            // The mock stores raw bytes and performs no conversion.
            return true;
        }
        let mut dst = mock.pixels.borrow_mut();
        let dst_stride = texture.width() as usize * bpp;
        for row in 0..rect.height() as usize {
            let src_start = row * row_bytes;
            let dst_start =
                (rect.top as usize + row) * dst_stride + rect.left as usize * bpp;
            let len = rect.width() as usize * bpp;
            dst[dst_start..dst_start + len].copy_from_slice(&pixels[src_start..src_start + len]);
        }
        true
    }

    fn on_generate_mipmaps(&mut self, _texture: &Shared<Texture>) -> bool {
        self.state
            .mipmap_generations
            .set(self.state.mipmap_generations.get() + 1);
        true
    }

    fn on_create_buffer(&mut self, size: usize, usage: BufferUsage) -> Option<Shared<GpuBuffer>> {
        Some(Shared::new(GpuBuffer::new(
            size,
            usage,
            Box::new(RefCell::new(vec![0u8; size])),
        )))
    }

    fn on_get_ops_render_pass(
        &mut self,
        _write_view: &SurfaceProxyView,
        _content_bounds: IRect,
        _color_ops: LoadStoreOps,
        _stencil_ops: LoadStoreOps,
        _clear_color: [f32; 4],
        _sampled_textures: &[&SurfaceProxy],
        _pipeline_flags: PipelineFlags,
    ) -> Option<Box<dyn PassCommands>> {
        if self.state.fail_next_pass.take() {
            return None;
        }
        Some(Box::new(MockPassCommands {
            state: self.state.clone(),
        }))
    }

    fn on_resolve_render_target(&mut self, _target: &Shared<Texture>, resolve_rect: IRect) {
        self.state
            .commands
            .borrow_mut()
            .push(MockCommand::Resolve(resolve_rect));
    }

    fn insert_fence(&mut self) -> FenceHandle {
        let fence = self.state.next_fence.get() + 1;
        self.state.next_fence.set(fence);
        fence
    }

    fn check_fence(&mut self, _fence: FenceHandle) -> bool {
        // The mock does no GPU work; everything is already done.
        true
    }

    fn delete_fence(&mut self, _fence: FenceHandle) {}

    fn wait_for_queue(&mut self) {}
}

struct MockPassCommands {
    state: Rc<MockState>,
}

impl MockPassCommands {
    fn push(&mut self, command: MockCommand) {
        self.state.commands.borrow_mut().push(command);
    }
}

impl PassCommands for MockPassCommands {
    fn clear_color(&mut self, scissor: IRect, color: [f32; 4]) {
        self.push(MockCommand::ClearColor { scissor, color });
    }

    fn clear_stencil(&mut self, scissor: IRect, inside_mask: bool) {
        self.push(MockCommand::ClearStencil {
            scissor,
            inside_mask,
        });
    }

    fn bind_pipeline(
        &mut self,
        _info: &PipelineInfo,
        desc: &PipelineDesc,
        _draw_bounds: IRect,
    ) -> bool {
        if self.state.fail_pipeline_binds.get() {
            return false;
        }
        self.push(MockCommand::BindPipeline {
            key: desc.full_key().to_vec(),
        });
        true
    }

    fn bind_buffers(
        &mut self,
        vertex: Option<(PoolSlice, &[u8])>,
        instance: Option<(PoolSlice, &[u8])>,
        index: Option<(PoolSlice, &[u8])>,
    ) {
        self.push(MockCommand::BindBuffers {
            vertex: vertex.map(|(s, d)| (s, d.len())),
            instance: instance.map(|(s, d)| (s, d.len())),
            index: index.map(|(s, d)| (s, d.len())),
        });
    }

    fn set_scissor(&mut self, rect: IRect) {
        self.push(MockCommand::SetScissor(rect));
    }

    fn draw(&mut self, vertex_count: u32, base_vertex: u32) {
        self.push(MockCommand::Draw {
            vertex_count,
            base_vertex,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, base_index: u32, base_vertex: i32) {
        self.push(MockCommand::DrawIndexed {
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
        self.push(MockCommand::DrawInstanced {
            instance_count,
            base_instance,
            vertex_count,
            base_vertex,
        });
    }

    fn end_pass(&mut self, color_store: StoreOp, stencil_store: StoreOp) {
        self.push(MockCommand::EndPass {
            color_store,
            stencil_store,
        });
    }
}
