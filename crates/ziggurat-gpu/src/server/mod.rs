//! The backend façade.
//!
//! [`Server`] is the single point of contact with the GPU backend. It
//! performs all cross-backend validation, so backend hooks can assume
//! sanitized inputs. Validation failures return `None`/`false`; programmer
//! errors (unknown fence handle, wrong thread) are fatal assertions.

mod scratch;
mod stats;

pub use stats::Stats;

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::{FenceHandle, GpuBackend};
use crate::buffer::{BufferUsage, GpuBuffer};
use crate::caps::{BackendFormat, Caps};
use crate::pass::OpsRenderPass;
use crate::pipeline::PipelineFlags;
use crate::pool::BufferAllocPool;
use crate::proxy::{SurfaceProxy, SurfaceProxyView};
use crate::render_thread::ThreadGuard;
use crate::resource::Shared;
use crate::texture::{BackendTexture, Texture, TextureDesc};
use crate::types::{ColorType, IRect, LoadStoreOps, Ownership, StateBits, SurfaceFlags};

use scratch::{ScratchKey, ScratchPool};

/// `floor(log2(v))` for `v >= 1`.
#[inline]
fn floor_log2(v: u32) -> u32 {
    debug_assert!(v >= 1);
    31 - v.leading_zeros()
}

/// Backend façade; owns the backend, the caps it reported, and the
/// per-frame bookkeeping (stats, pooled geometry storage, live fences).
///
/// Render-thread affine: constructed on the render thread and checked on
/// entry to every operation in debug builds.
pub struct Server {
    caps: Arc<Caps>,
    backend: Box<dyn GpuBackend>,
    stats: Stats,
    /// Context state assumed stale; resynced lazily.
    reset_bits: StateBits,
    live_fences: HashSet<FenceHandle>,
    scratch: ScratchPool,
    vertex_pool: BufferAllocPool,
    instance_pool: BufferAllocPool,
    guard: ThreadGuard,
}

impl Server {
    pub fn new(caps: Caps, backend: Box<dyn GpuBackend>) -> Self {
        Self {
            caps: Arc::new(caps),
            backend,
            stats: Stats::new(),
            // Nothing can be assumed about a fresh context.
            reset_bits: StateBits::all(),
            live_fences: HashSet::new(),
            scratch: ScratchPool::new(),
            vertex_pool: BufferAllocPool::new(BufferAllocPool::DEFAULT_BLOCK_SIZE),
            instance_pool: BufferAllocPool::new(BufferAllocPool::DEFAULT_BLOCK_SIZE),
            guard: ThreadGuard::capture(),
        }
    }

    #[inline]
    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.guard.check();
        self.stats.reset();
    }

    pub(crate) fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    pub(crate) fn vertex_pool_mut(&mut self) -> &mut BufferAllocPool {
        &mut self.vertex_pool
    }

    pub(crate) fn instance_pool_mut(&mut self) -> &mut BufferAllocPool {
        &mut self.instance_pool
    }

    pub(crate) fn pools(&self) -> (&BufferAllocPool, &BufferAllocPool) {
        (&self.vertex_pool, &self.instance_pool)
    }

    // ── context dirtiness ─────────────────────────────────────────────────

    /// Declares that outside code mutated backend global state covered by
    /// `bits`. The resync happens lazily, before the next dependent
    /// operation.
    pub fn mark_context_dirty(&mut self, bits: StateBits) {
        self.guard.check();
        self.reset_bits |= bits;
    }

    /// Resyncs any dirty context state and clears the dirty bits.
    pub fn handle_dirty_context(&mut self) {
        self.guard.check();
        if !self.reset_bits.is_empty() {
            let bits = self.reset_bits;
            self.reset_bits = StateBits::empty();
            self.backend.on_reset_context(bits);
        }
    }

    // ── resource creation ─────────────────────────────────────────────────

    /// Creates a texture, or `None` when the parameters are unsupported or
    /// the driver fails.
    ///
    /// Compressed formats take a dedicated upload path and are rejected
    /// here. When `SurfaceFlags::MIPMAPPED` is set, the full chain down to
    /// 1x1 is allocated.
    pub fn create_texture(
        &mut self,
        width: i32,
        height: i32,
        format: BackendFormat,
        sample_count: u32,
        flags: SurfaceFlags,
        label: Option<&str>,
    ) -> Option<Shared<Texture>> {
        self.guard.check();
        if format.is_compressed() {
            return None;
        }
        let sample_count = if flags.contains(SurfaceFlags::RENDERABLE) {
            self.caps.get_render_target_sample_count(sample_count, &format)
        } else {
            sample_count
        };
        if !self
            .caps
            .validate_surface_params(width, height, &format, sample_count, flags)
        {
            return None;
        }
        let mip_level_count = if flags.contains(SurfaceFlags::MIPMAPPED) {
            floor_log2(width.max(height) as u32) + 1
        } else {
            1
        };
        let desc = TextureDesc {
            width,
            height,
            format,
            mip_level_count,
            sample_count,
            flags,
        };
        self.handle_dirty_context();
        let texture = self.backend.on_create_texture(&desc)?;
        // Formats are interned; the backend must hand back the exact object
        // it was asked for.
        debug_assert!(BackendFormat::ptr_eq(texture.format(), &desc.format));
        if let Some(label) = label {
            texture.set_label(label);
        }
        self.scratch.register(&texture);
        self.stats.inc_textures_created();
        Some(texture)
    }

    /// Like [`create_texture`](Self::create_texture), but recycles a free
    /// budgeted texture with identical parameters when one exists.
    pub fn find_or_create_scratch_texture(
        &mut self,
        width: i32,
        height: i32,
        format: BackendFormat,
        sample_count: u32,
        flags: SurfaceFlags,
        label: Option<&str>,
    ) -> Option<Shared<Texture>> {
        self.guard.check();
        let flags = flags | SurfaceFlags::BUDGETED;
        let mip_level_count = if flags.contains(SurfaceFlags::MIPMAPPED) {
            floor_log2(width.max(height).max(1) as u32) + 1
        } else {
            1
        };
        let probe = TextureDesc {
            width,
            height,
            format: format.clone(),
            mip_level_count,
            sample_count,
            flags,
        };
        if let Some(found) = self.scratch.find_free(&ScratchKey::from_desc(&probe)) {
            if found.sample_count() > 1 {
                self.stats.inc_msaa_attachments_reused();
            } else {
                self.stats.inc_scratch_textures_reused();
            }
            if let Some(label) = label {
                found.set_label(label);
            }
            return Some(found);
        }
        self.create_texture(width, height, format, sample_count, flags, label)
    }

    /// Drops scratch entries nobody holds, releasing their GPU memory.
    pub fn purge_free_scratch(&mut self) {
        self.guard.check();
        self.scratch.purge_free();
    }

    /// Wraps an externally created renderable texture.
    ///
    /// `ownership` decides whether the backend object dies with the wrapper
    /// or stays with the caller.
    pub fn wrap_renderable_backend_texture(
        &mut self,
        texture: BackendTexture,
        sample_count: u32,
        ownership: Ownership,
    ) -> Option<Shared<Texture>> {
        self.guard.check();
        if sample_count < 1 {
            return None;
        }
        if !self.caps.is_format_texturable(&texture.format) {
            return None;
        }
        let sample_count = self
            .caps
            .get_render_target_sample_count(sample_count, &texture.format);
        if sample_count == 0 {
            return None;
        }
        let max = self.caps.max_render_target_size();
        if texture.width < 1 || texture.height < 1 || texture.width > max || texture.height > max {
            return None;
        }
        self.handle_dirty_context();
        self.backend
            .on_wrap_renderable_backend_texture(texture, sample_count, ownership)
    }

    /// Creates a GPU buffer of `size` bytes.
    pub fn create_buffer(&mut self, size: usize, usage: BufferUsage) -> Option<Shared<GpuBuffer>> {
        self.guard.check();
        if size == 0 {
            return None;
        }
        // A static buffer is specified once; pairing it with transfer usage
        // is contradictory.
        if usage.contains(BufferUsage::STATIC)
            && usage.intersects(BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST)
        {
            return None;
        }
        self.handle_dirty_context();
        self.backend.on_create_buffer(size, usage)
    }

    // ── uploads ───────────────────────────────────────────────────────────

    /// Uploads `pixels` into `rect` of the texture's base level.
    ///
    /// `pixels` being `None` is a successful no-op; every other validation
    /// failure returns false without touching the backend. On success,
    /// mipmapped destinations get their mips marked dirty.
    pub fn write_pixels(
        &mut self,
        texture: &Shared<Texture>,
        rect: IRect,
        dst_color_type: ColorType,
        src_color_type: ColorType,
        row_bytes: usize,
        pixels: Option<&[u8]>,
    ) -> bool {
        self.guard.check();
        if rect.is_empty() {
            return false;
        }
        if texture.is_read_only() {
            return false;
        }
        let bounds = IRect::from_wh(texture.width(), texture.height());
        if !bounds.contains(&rect) {
            return false;
        }
        let bpp = src_color_type.bytes_per_pixel();
        if bpp == 0 || dst_color_type.bytes_per_pixel() == 0 {
            return false;
        }
        let min_row_bytes = rect.width() as usize * bpp;
        if row_bytes < min_row_bytes || row_bytes % bpp != 0 {
            return false;
        }
        let Some(pixels) = pixels else {
            return true;
        };
        let needed = row_bytes * (rect.height() as usize - 1) + min_row_bytes;
        if pixels.len() < needed {
            return false;
        }
        self.handle_dirty_context();
        if !self.backend.on_write_pixels(
            texture,
            rect,
            dst_color_type,
            src_color_type,
            row_bytes,
            pixels,
        ) {
            return false;
        }
        if texture.is_mipmapped() {
            texture.set_mipmaps_dirty(true);
        }
        self.stats.inc_texture_uploads();
        true
    }

    /// Regenerates the mip chain from the base level if it is stale.
    ///
    /// Returns true without backend work when the mips are already clean;
    /// false for non-mipmapped textures or backend failure.
    pub fn generate_mipmaps(&mut self, texture: &Shared<Texture>) -> bool {
        self.guard.check();
        if !texture.is_mipmapped() {
            return false;
        }
        if !texture.mipmaps_are_dirty() {
            return true;
        }
        self.handle_dirty_context();
        if !self.backend.on_generate_mipmaps(texture) {
            return false;
        }
        texture.set_mipmaps_dirty(false);
        true
    }

    // ── render passes ─────────────────────────────────────────────────────

    /// Obtains the recording object for one render pass over `write_view`.
    ///
    /// The render-pass stat counts attempts, so it is incremented before
    /// the backend gets a say.
    #[allow(clippy::too_many_arguments)]
    pub fn get_ops_render_pass(
        &mut self,
        write_view: &SurfaceProxyView,
        content_bounds: IRect,
        color_ops: LoadStoreOps,
        stencil_ops: LoadStoreOps,
        clear_color: [f32; 4],
        sampled_textures: &[&SurfaceProxy],
        pipeline_flags: PipelineFlags,
    ) -> Option<OpsRenderPass> {
        self.guard.check();
        self.stats.inc_render_passes();
        self.handle_dirty_context();
        let commands = self.backend.on_get_ops_render_pass(
            write_view,
            content_bounds,
            color_ops,
            stencil_ops,
            clear_color,
            sampled_textures,
            pipeline_flags,
        )?;
        let stencil_attached = write_view
            .proxy()
            .is_some_and(|p| p.flags().contains(SurfaceFlags::STENCIL_ATTACHMENT));
        Some(OpsRenderPass::new(
            commands,
            self.caps.clone(),
            write_view.clone(),
            content_bounds,
            color_ops,
            stencil_ops,
            clear_color,
            stencil_attached,
        ))
    }

    /// Resolves multisampled content into `resolve_rect`, given in the
    /// backend's native destination space.
    pub fn resolve_render_target(&mut self, target: &Shared<Texture>, resolve_rect: IRect) {
        self.guard.check();
        debug_assert!(target.sample_count() > 1);
        self.handle_dirty_context();
        self.backend.on_resolve_render_target(target, resolve_rect);
    }

    /// Marks the end of one batch of GPU work: counts the submit and
    /// retires this frame's pooled geometry allocations.
    pub fn submit(&mut self) {
        self.guard.check();
        self.vertex_pool.reset();
        self.instance_pool.reset();
        self.stats.inc_submits();
    }

    // ── fences ────────────────────────────────────────────────────────────

    pub fn insert_fence(&mut self) -> FenceHandle {
        self.guard.check();
        let fence = self.backend.insert_fence();
        self.live_fences.insert(fence);
        fence
    }

    /// Non-blocking poll. Unknown handles are programmer errors.
    pub fn check_fence(&mut self, fence: FenceHandle) -> bool {
        self.guard.check();
        assert!(self.live_fences.contains(&fence), "unknown fence handle");
        self.backend.check_fence(fence)
    }

    pub fn delete_fence(&mut self, fence: FenceHandle) {
        self.guard.check();
        assert!(self.live_fences.remove(&fence), "unknown fence handle");
        self.backend.delete_fence(fence);
    }

    /// Blocks until all outstanding GPU work completes.
    pub fn wait_for_queue(&mut self) {
        self.guard.check();
        self.backend.wait_for_queue();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("stats", &self.stats)
            .field("reset_bits", &self.reset_bits)
            .field("live_fences", &self.live_fences.len())
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    fn server() -> (Server, crate::mock::MockHandle) {
        let (backend, handle) = MockBackend::new();
        (
            Server::new(MockBackend::caps(), Box::new(backend)),
            handle,
        )
    }

    fn rgba() -> BackendFormat {
        MockBackend::rgba8()
    }

    #[test]
    fn mip_level_count_covers_the_full_chain() {
        let (mut server, _) = server();
        let t = server
            .create_texture(64, 40, rgba(), 1, SurfaceFlags::MIPMAPPED, None)
            .unwrap();
        // floor(log2(64)) + 1
        assert_eq!(t.mip_level_count(), 7);
        assert!(t.mipmaps_are_dirty());
    }

    #[test]
    fn create_texture_rejects_unsupported_params() {
        let (mut server, _) = server();
        assert!(server
            .create_texture(0, 10, rgba(), 1, SurfaceFlags::empty(), None)
            .is_none());
        let compressed = BackendFormat::new(7, "bc1", 8, true);
        assert!(server
            .create_texture(16, 16, compressed, 1, SurfaceFlags::empty(), None)
            .is_none());
        assert_eq!(server.stats().num_textures_created(), 0);
    }

    #[test]
    fn created_texture_keeps_format_identity() {
        let (mut server, _) = server();
        let format = rgba();
        let t = server
            .create_texture(16, 16, format.clone(), 1, SurfaceFlags::empty(), None)
            .unwrap();
        assert!(BackendFormat::ptr_eq(t.format(), &format));
    }

    #[test]
    fn write_pixels_validation_ladder() {
        let (mut server, _) = server();
        let t = server
            .create_texture(64, 64, rgba(), 1, SurfaceFlags::empty(), None)
            .unwrap();
        let ct = ColorType::Rgba8888;
        let data = vec![0u8; 64 * 64 * 4];

        // Out of bounds: 60 + 10 > 64.
        assert!(!server.write_pixels(
            &t,
            IRect::from_xywh(60, 60, 10, 10),
            ct,
            ct,
            40,
            Some(&data)
        ));
        // Row stride below the minimum of 40.
        assert!(!server.write_pixels(
            &t,
            IRect::from_xywh(0, 0, 10, 10),
            ct,
            ct,
            39,
            Some(&data)
        ));
        // Stride not a multiple of bytes-per-pixel.
        assert!(!server.write_pixels(
            &t,
            IRect::from_xywh(0, 0, 10, 10),
            ct,
            ct,
            42,
            Some(&data)
        ));
        assert_eq!(server.stats().num_texture_uploads(), 0);

        assert!(server.write_pixels(
            &t,
            IRect::from_xywh(0, 0, 10, 10),
            ct,
            ct,
            40,
            Some(&data)
        ));
        assert_eq!(server.stats().num_texture_uploads(), 1);
    }

    #[test]
    fn write_pixels_null_pointer_is_successful_noop() {
        let (mut server, _) = server();
        let t = server
            .create_texture(64, 64, rgba(), 1, SurfaceFlags::MIPMAPPED, None)
            .unwrap();
        server.generate_mipmaps(&t);
        assert!(!t.mipmaps_are_dirty());

        let ct = ColorType::Rgba8888;
        assert!(server.write_pixels(&t, IRect::from_xywh(0, 0, 10, 10), ct, ct, 40, None));
        assert_eq!(server.stats().num_texture_uploads(), 0);
        assert!(!t.mipmaps_are_dirty(), "no-op does not dirty mips");
    }

    #[test]
    fn write_pixels_rejects_read_only_destination() {
        let (mut server, _) = server();
        let t = server
            .create_texture(16, 16, rgba(), 1, SurfaceFlags::READ_ONLY, None)
            .unwrap();
        let ct = ColorType::Rgba8888;
        let data = vec![0u8; 16 * 16 * 4];
        assert!(!server.write_pixels(&t, IRect::from_xywh(0, 0, 4, 4), ct, ct, 16, Some(&data)));
    }

    #[test]
    fn generate_mipmaps_skips_clean_chains() {
        let (mut server, handle) = server();
        let t = server
            .create_texture(32, 32, rgba(), 1, SurfaceFlags::MIPMAPPED, None)
            .unwrap();
        assert!(server.generate_mipmaps(&t));
        assert!(!t.mipmaps_are_dirty());
        let backend_calls = handle.mipmap_generations();
        assert!(server.generate_mipmaps(&t), "clean chain is a no-op");
        assert_eq!(handle.mipmap_generations(), backend_calls);
    }

    #[test]
    fn render_pass_stat_counts_attempts() {
        let (mut server, handle) = server();
        let t = server
            .create_texture(32, 32, rgba(), 1, SurfaceFlags::RENDERABLE, None)
            .unwrap();
        let view = SurfaceProxyView::new(SurfaceProxy::wrapped(t));
        let bounds = IRect::from_wh(32, 32);

        handle.fail_next_pass();
        assert!(server
            .get_ops_render_pass(
                &view,
                bounds,
                LoadStoreOps::CLEAR_STORE,
                LoadStoreOps::DONT_LOAD_DONT_STORE,
                [0.0; 4],
                &[],
                PipelineFlags::empty(),
            )
            .is_none());
        assert_eq!(server.stats().num_render_passes(), 1, "attempt counted");
    }

    #[test]
    fn scratch_texture_is_reused_when_free() {
        let (mut server, _) = server();
        let first = server
            .find_or_create_scratch_texture(64, 64, rgba(), 1, SurfaceFlags::empty(), None)
            .unwrap();
        assert_eq!(server.stats().num_scratch_textures_reused(), 0);

        // Still held: a second request must allocate fresh.
        let second = server
            .find_or_create_scratch_texture(64, 64, rgba(), 1, SurfaceFlags::empty(), None)
            .unwrap();
        assert!(!Shared::ptr_eq(&first, &second));
        assert_eq!(server.stats().num_scratch_textures_reused(), 0);

        drop(second);
        let third = server
            .find_or_create_scratch_texture(64, 64, rgba(), 1, SurfaceFlags::empty(), None)
            .unwrap();
        assert_eq!(server.stats().num_scratch_textures_reused(), 1);
        assert!(!Shared::ptr_eq(&first, &third));
    }

    #[test]
    fn dirty_context_resync_is_lazy_and_once() {
        let (mut server, handle) = server();
        // Construction leaves everything dirty; first op resyncs all bits.
        let _ = server.create_texture(8, 8, rgba(), 1, SurfaceFlags::empty(), None);
        assert_eq!(handle.reset_contexts(), vec![StateBits::all()]);

        server.mark_context_dirty(StateBits::PIPELINE | StateBits::BLEND);
        assert_eq!(handle.reset_contexts().len(), 1, "resync deferred");
        let _ = server.create_texture(8, 8, rgba(), 1, SurfaceFlags::empty(), None);
        assert_eq!(
            handle.reset_contexts()[1],
            StateBits::PIPELINE | StateBits::BLEND
        );
        // Clean context: no further resync.
        let _ = server.create_texture(8, 8, rgba(), 1, SurfaceFlags::empty(), None);
        assert_eq!(handle.reset_contexts().len(), 2);
    }

    #[test]
    fn fences_track_liveness() {
        let (mut server, _) = server();
        let f = server.insert_fence();
        assert!(server.check_fence(f));
        server.delete_fence(f);
    }

    #[test]
    #[should_panic(expected = "unknown fence handle")]
    fn deleted_fence_handle_is_fatal() {
        let (mut server, _) = server();
        let f = server.insert_fence();
        server.delete_fence(f);
        let _ = server.check_fence(f);
    }

    #[test]
    fn create_buffer_rejects_contradictory_usage() {
        let (mut server, _) = server();
        assert!(server.create_buffer(0, BufferUsage::VERTEX).is_none());
        assert!(server
            .create_buffer(64, BufferUsage::STATIC | BufferUsage::TRANSFER_DST)
            .is_none());
        assert!(server
            .create_buffer(64, BufferUsage::VERTEX | BufferUsage::STREAM)
            .is_some());
    }
}
