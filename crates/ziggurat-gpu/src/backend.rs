//! The backend trait seam.
//!
//! [`Server`](crate::server::Server) performs all cross-backend validation,
//! then dispatches to a [`GpuBackend`]. Hooks can therefore assume
//! sanitized inputs and must not re-validate them. One implementation
//! exists per 3D API; [`crate::mock`] provides the API-less one.

use crate::buffer::{BufferUsage, GpuBuffer};
use crate::pipeline::{PipelineDesc, PipelineFlags, PipelineInfo};
use crate::pool::PoolSlice;
use crate::proxy::{SurfaceProxy, SurfaceProxyView};
use crate::resource::Shared;
use crate::texture::{BackendTexture, Texture, TextureDesc};
use crate::types::{ColorType, IRect, LoadStoreOps, Ownership, StateBits, StoreOp};

/// Opaque handle to a GPU-side completion token.
pub type FenceHandle = u64;

/// Backend-facing hooks, one per 3D API.
///
/// All methods are render-thread affine. Creation hooks return `None` on
/// driver failure; the server has already filtered invalid parameters.
pub trait GpuBackend {
    /// Re-emit any assumed context state covered by `bits`.
    ///
    /// Called lazily before the next state-dependent operation after
    /// [`Server::mark_context_dirty`](crate::server::Server::mark_context_dirty).
    fn on_reset_context(&mut self, _bits: StateBits) {}

    fn on_create_texture(&mut self, desc: &TextureDesc) -> Option<Shared<Texture>>;

    fn on_wrap_renderable_backend_texture(
        &mut self,
        texture: BackendTexture,
        sample_count: u32,
        ownership: Ownership,
    ) -> Option<Shared<Texture>>;

    fn on_write_pixels(
        &mut self,
        texture: &Shared<Texture>,
        rect: IRect,
        dst_color_type: ColorType,
        src_color_type: ColorType,
        row_bytes: usize,
        pixels: &[u8],
    ) -> bool;

    fn on_generate_mipmaps(&mut self, texture: &Shared<Texture>) -> bool;

    fn on_create_buffer(&mut self, size: usize, usage: BufferUsage) -> Option<Shared<GpuBuffer>>;

    /// Produce the recording sink for one render pass, or `None` if the
    /// driver refuses pass creation.
    #[allow(clippy::too_many_arguments)]
    fn on_get_ops_render_pass(
        &mut self,
        write_view: &SurfaceProxyView,
        content_bounds: IRect,
        color_ops: LoadStoreOps,
        stencil_ops: LoadStoreOps,
        clear_color: [f32; 4],
        sampled_textures: &[&SurfaceProxy],
        pipeline_flags: PipelineFlags,
    ) -> Option<Box<dyn PassCommands>>;

    /// Resolve MSAA content into `resolve_rect`, already in the backend's
    /// native destination space.
    fn on_resolve_render_target(&mut self, target: &Shared<Texture>, resolve_rect: IRect);

    /// Creates a fence and inserts it into the graphics queue.
    fn insert_fence(&mut self) -> FenceHandle;

    /// Non-blocking poll of a fence. Must never wait.
    fn check_fence(&mut self, fence: FenceHandle) -> bool;

    fn delete_fence(&mut self, fence: FenceHandle);

    /// Blocks the calling thread until all outstanding GPU work completes.
    fn wait_for_queue(&mut self);
}

/// Backend sink for the commands of a single render pass.
///
/// [`OpsRenderPass`](crate::pass::OpsRenderPass) owns the ordering and
/// state machine; implementations only translate each call into backend
/// work (or record it for replay at `end_pass`).
pub trait PassCommands {
    /// Clear the color attachment within `scissor`.
    fn clear_color(&mut self, scissor: IRect, color: [f32; 4]);

    /// Clear the stencil attachment within `scissor`; `inside_mask` selects
    /// the clip-bit value written.
    fn clear_stencil(&mut self, scissor: IRect, inside_mask: bool);

    /// Returns false when the pipeline cannot be built/bound; the pass
    /// counts subsequent draws as failed until the next successful bind.
    fn bind_pipeline(&mut self, info: &PipelineInfo, desc: &PipelineDesc, draw_bounds: IRect)
    -> bool;

    /// Binds pooled geometry data. Each binding carries its placement and
    /// the CPU bytes of its block up through the slice; draw bases are
    /// block-relative, so a staged copy of the bytes can be indexed with
    /// them as-is.
    fn bind_buffers(
        &mut self,
        vertex: Option<(PoolSlice, &[u8])>,
        instance: Option<(PoolSlice, &[u8])>,
        index: Option<(PoolSlice, &[u8])>,
    );

    fn set_scissor(&mut self, rect: IRect);

    fn draw(&mut self, vertex_count: u32, base_vertex: u32);

    fn draw_indexed(&mut self, index_count: u32, base_index: u32, base_vertex: i32);

    fn draw_instanced(
        &mut self,
        instance_count: u32,
        base_instance: u32,
        vertex_count: u32,
        base_vertex: u32,
    );

    /// Execute the store operations and finish backend recording.
    fn end_pass(&mut self, color_store: StoreOp, stencil_store: StoreOp);
}
