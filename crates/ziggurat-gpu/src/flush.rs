//! Per-flush execution state.
//!
//! [`OpFlushState`] is what recorded draw ops see while they execute: it
//! hands out pooled vertex/instance space, owns the at-most-one active
//! render pass, and folds pass results back into the server stats.

use crate::caps::Caps;
use crate::pass::OpsRenderPass;
use crate::pipeline::PipelineFlags;
use crate::pool::{Mesh, PoolSlice};
use crate::proxy::{SurfaceProxy, SurfaceProxyView};
use crate::server::Server;
use crate::types::{IRect, LoadStoreOps};

/// Execution context for one flush.
///
/// Borrows the server for the duration of the flush; ops never talk to the
/// server directly.
pub struct OpFlushState<'a> {
    server: &'a mut Server,
    pass: Option<OpsRenderPass>,
}

impl<'a> OpFlushState<'a> {
    pub fn new(server: &'a mut Server) -> Self {
        Self { server, pass: None }
    }

    #[inline]
    pub fn caps(&self) -> &Caps {
        self.server.caps()
    }

    #[inline]
    pub fn server(&mut self) -> &mut Server {
        self.server
    }

    // ── pooled geometry ───────────────────────────────────────────────────

    /// Reserves pooled vertex space for `mesh` and reports the placement
    /// back through [`Mesh::set_vertex_buffer`]. `None` on pool exhaustion
    /// or an empty mesh.
    pub fn make_vertex_space(&mut self, mesh: &mut dyn Mesh) -> Option<PoolSlice> {
        let stride = mesh.vertex_size();
        let total = stride * mesh.vertex_count();
        if total == 0 {
            return None;
        }
        let slice = self.server.vertex_pool_mut().make_space(total, stride)?;
        let base_vertex = (slice.offset / stride) as u32;
        mesh.set_vertex_buffer(slice, base_vertex);
        Some(slice)
    }

    /// Instance-rate counterpart of [`make_vertex_space`](Self::make_vertex_space).
    pub fn make_instance_space(&mut self, mesh: &mut dyn Mesh) -> Option<PoolSlice> {
        let stride = mesh.instance_size();
        let total = stride * mesh.instance_count();
        if total == 0 {
            return None;
        }
        let slice = self.server.instance_pool_mut().make_space(total, stride)?;
        let base_instance = (slice.offset / stride) as u32;
        mesh.set_instance_buffer(slice, base_instance);
        Some(slice)
    }

    /// Reserves vertex space and returns the CPU-writable bytes for it.
    pub fn make_vertex_writer(&mut self, mesh: &mut dyn Mesh) -> Option<&mut [u8]> {
        let slice = self.make_vertex_space(mesh)?;
        Some(self.server.vertex_pool_mut().writer(slice))
    }

    /// Reserves instance space and returns the CPU-writable bytes for it.
    pub fn make_instance_writer(&mut self, mesh: &mut dyn Mesh) -> Option<&mut [u8]> {
        let slice = self.make_instance_space(mesh)?;
        Some(self.server.instance_pool_mut().writer(slice))
    }

    // ── render pass lifecycle ─────────────────────────────────────────────

    /// Opens a render pass and makes it the active one.
    ///
    /// At most one pass is active per flush state; opening a second without
    /// ending the first is fatal. Returns `None` when the backend refuses
    /// pass creation (the attempt is still counted).
    #[allow(clippy::too_many_arguments)]
    pub fn begin_ops_render_pass(
        &mut self,
        write_view: &SurfaceProxyView,
        content_bounds: IRect,
        color_ops: LoadStoreOps,
        stencil_ops: LoadStoreOps,
        clear_color: [f32; 4],
        sampled_textures: &[&SurfaceProxy],
        pipeline_flags: PipelineFlags,
    ) -> Option<&mut OpsRenderPass> {
        assert!(
            self.pass.is_none(),
            "a render pass is already active in this flush"
        );
        let mut pass = self.server.get_ops_render_pass(
            write_view,
            content_bounds,
            color_ops,
            stencil_ops,
            clear_color,
            sampled_textures,
            pipeline_flags,
        )?;
        pass.begin();
        Some(self.pass.insert(pass))
    }

    /// The active pass, if any.
    #[inline]
    pub fn ops_render_pass(&mut self) -> Option<&mut OpsRenderPass> {
        self.pass.as_mut()
    }

    /// Binds pooled slices on the active pass. Each binding carries the CPU
    /// bytes of its block up through the slice, so the block-relative bases
    /// reported by `make_*_space` stay valid against a backend's staged
    /// copy. Index data is carved out of the vertex pool.
    pub fn bind_buffers(
        &mut self,
        vertex: Option<PoolSlice>,
        instance: Option<PoolSlice>,
        index: Option<PoolSlice>,
    ) {
        let pass = self
            .pass
            .as_mut()
            .expect("bind_buffers without an active pass");
        let (vertex_pool, instance_pool) = self.server.pools();
        pass.bind_buffers(
            vertex.map(|s| (s, vertex_pool.block_contents(s))),
            instance.map(|s| (s, instance_pool.block_contents(s))),
            index.map(|s| (s, vertex_pool.block_contents(s))),
        );
    }

    /// Ends the active pass: applies store ops and folds its draw counters
    /// into the server stats. Fatal when no pass is active.
    pub fn end_ops_render_pass(&mut self) {
        let mut pass = self
            .pass
            .take()
            .expect("end_ops_render_pass without an active pass");
        pass.end();
        let (draws, failed) = pass.draw_counts();
        self.server.stats_mut().add_draws(draws, failed);
    }

    /// Hook run between flushes. Nothing to do at this layer; pooled
    /// storage is retired by [`Server::submit`].
    pub fn reset(&mut self) {
        debug_assert!(self.pass.is_none(), "reset with an active render pass");
    }
}

impl std::fmt::Debug for OpFlushState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpFlushState")
            .field("pass_active", &self.pass.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::pool::QuadMesh;

    fn server() -> Server {
        let (backend, _) = MockBackend::new();
        Server::new(MockBackend::caps(), Box::new(backend))
    }

    #[test]
    fn vertex_space_reports_base_vertex() {
        let mut server = server();
        let mut flush = OpFlushState::new(&mut server);

        let mut first = QuadMesh::new(IRect::from_wh(4, 4));
        let mut second = QuadMesh::new(IRect::from_wh(4, 4));
        flush.make_vertex_space(&mut first).unwrap();
        flush.make_vertex_space(&mut second).unwrap();

        let (_, base_a) = first.vertex_buffer.unwrap();
        let (slice_b, base_b) = second.vertex_buffer.unwrap();
        assert_eq!(base_a, 0);
        assert_eq!(base_b, 4, "second quad starts after the first");
        assert_eq!(slice_b.offset, 4 * 8);
    }

    #[test]
    fn bound_bytes_keep_block_relative_bases_in_range() {
        let (backend, handle) = MockBackend::new();
        let mut server = Server::new(MockBackend::caps(), Box::new(backend));
        let view = render_target_view(&mut server);
        let mut flush = OpFlushState::new(&mut server);

        let mut first = QuadMesh::new(IRect::from_wh(4, 4));
        let mut second = QuadMesh::new(IRect::from_wh(8, 8));
        flush.make_vertex_space(&mut first).unwrap();
        flush.make_vertex_space(&mut second).unwrap();
        let (slice_b, base_b) = second.vertex_buffer.unwrap();
        assert_eq!(base_b, 4);

        flush
            .begin_ops_render_pass(
                &view,
                IRect::from_wh(32, 32),
                LoadStoreOps::LOAD_STORE,
                LoadStoreOps::DONT_LOAD_DONT_STORE,
                [0.0; 4],
                &[],
                PipelineFlags::empty(),
            )
            .unwrap();
        flush.bind_buffers(Some(slice_b), None, None);
        flush.ops_render_pass().unwrap().draw(4, base_b);
        flush.end_ops_render_pass();

        let (bound, staged_len) = handle
            .commands()
            .iter()
            .find_map(|c| match c {
                crate::mock::MockCommand::BindBuffers {
                    vertex: Some(v), ..
                } => Some(*v),
                _ => None,
            })
            .unwrap();
        assert_eq!(bound, slice_b);
        // The staged bytes reach back to the block start, so a draw at
        // base vertex 4 addresses vertices the staging actually holds.
        assert_eq!(staged_len, slice_b.offset + slice_b.size);
        assert!((base_b as usize + 4) * 8 <= staged_len);
    }

    #[test]
    fn vertex_writer_is_sized_to_the_mesh() {
        let mut server = server();
        let mut flush = OpFlushState::new(&mut server);
        let mut mesh = QuadMesh::new(IRect::from_wh(4, 4));
        let writer = flush.make_vertex_writer(&mut mesh).unwrap();
        assert_eq!(writer.len(), 4 * 8);
        writer.fill(0xAB);
    }

    #[test]
    fn pool_exhaustion_leaves_flush_usable() {
        let mut server = server();
        let mut flush = OpFlushState::new(&mut server);

        struct BigMesh(usize);
        impl Mesh for BigMesh {
            fn vertex_size(&self) -> usize {
                16
            }
            fn vertex_count(&self) -> usize {
                self.0
            }
            fn set_vertex_buffer(&mut self, _: PoolSlice, _: u32) {}
        }

        // A limited pool: swap it in through the server's own pool.
        *flush.server().vertex_pool_mut() = crate::pool::BufferAllocPool::with_block_limit(64, 1);
        assert!(flush.make_vertex_space(&mut BigMesh(4)).is_some());
        assert!(flush.make_vertex_space(&mut BigMesh(4)).is_none(), "full");
        flush.server().submit();
        let mut flush = OpFlushState::new(&mut server);
        assert!(flush.make_vertex_space(&mut BigMesh(4)).is_some());
    }

    fn render_target_view(server: &mut Server) -> SurfaceProxyView {
        let target = server
            .create_texture(
                32,
                32,
                MockBackend::rgba8(),
                1,
                crate::types::SurfaceFlags::RENDERABLE,
                None,
            )
            .unwrap();
        SurfaceProxyView::new(crate::proxy::SurfaceProxy::wrapped(target))
    }

    #[test]
    fn ended_pass_folds_draw_counters_into_stats() {
        let (backend, handle) = MockBackend::new();
        let mut server = Server::new(MockBackend::caps(), Box::new(backend));
        let view = render_target_view(&mut server);

        let mut flush = OpFlushState::new(&mut server);
        {
            let pass = flush
                .begin_ops_render_pass(
                    &view,
                    IRect::from_wh(32, 32),
                    LoadStoreOps::CLEAR_STORE,
                    LoadStoreOps::DONT_LOAD_DONT_STORE,
                    [0.0; 4],
                    &[],
                    PipelineFlags::empty(),
                )
                .unwrap();
            // No pipeline bound: both draws fail.
            pass.draw(4, 0);
            pass.draw(4, 0);
        }
        flush.end_ops_render_pass();
        flush.reset();

        assert_eq!(server.stats().num_render_passes(), 1);
        assert_eq!(server.stats().num_draws(), 0);
        assert_eq!(server.stats().num_failed_draws(), 2);
        assert!(matches!(
            handle.commands().last(),
            Some(crate::mock::MockCommand::EndPass { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "already active")]
    fn second_active_pass_is_fatal() {
        let mut server = server();
        let view = render_target_view(&mut server);
        let mut flush = OpFlushState::new(&mut server);
        let args = (
            IRect::from_wh(32, 32),
            LoadStoreOps::LOAD_STORE,
            LoadStoreOps::DONT_LOAD_DONT_STORE,
        );
        flush
            .begin_ops_render_pass(&view, args.0, args.1, args.2, [0.0; 4], &[], PipelineFlags::empty())
            .unwrap();
        let _ = flush.begin_ops_render_pass(
            &view,
            args.0,
            args.1,
            args.2,
            [0.0; 4],
            &[],
            PipelineFlags::empty(),
        );
    }

    #[test]
    fn failed_pass_creation_keeps_flush_open_for_retry() {
        let (backend, handle) = MockBackend::new();
        let mut server = Server::new(MockBackend::caps(), Box::new(backend));
        let view = render_target_view(&mut server);
        let mut flush = OpFlushState::new(&mut server);

        handle.fail_next_pass();
        assert!(flush
            .begin_ops_render_pass(
                &view,
                IRect::from_wh(32, 32),
                LoadStoreOps::LOAD_STORE,
                LoadStoreOps::DONT_LOAD_DONT_STORE,
                [0.0; 4],
                &[],
                PipelineFlags::empty(),
            )
            .is_none());
        assert!(flush.ops_render_pass().is_none());

        // The retry succeeds on the same flush state.
        assert!(flush
            .begin_ops_render_pass(
                &view,
                IRect::from_wh(32, 32),
                LoadStoreOps::LOAD_STORE,
                LoadStoreOps::DONT_LOAD_DONT_STORE,
                [0.0; 4],
                &[],
                PipelineFlags::empty(),
            )
            .is_some());
        flush.end_ops_render_pass();
    }

    #[test]
    fn render_call_queue_drains_in_recording_order() {
        use crate::render_thread::RenderCallQueue;
        use std::sync::Arc;

        let queue = Arc::new(RenderCallQueue::new());
        let recorder = queue.clone();
        std::thread::spawn(move || {
            for i in 0..4u32 {
                recorder.record(move |server: &mut Server| {
                    server
                        .mark_context_dirty(crate::types::StateBits::from_bits_truncate(1 << i));
                    if i == 3 {
                        server.handle_dirty_context();
                    }
                });
            }
        })
        .join()
        .unwrap();

        let (backend, handle) = MockBackend::new();
        let mut server = Server::new(MockBackend::caps(), Box::new(backend));
        server.handle_dirty_context(); // clear the construction-time bits
        assert_eq!(queue.drain(&mut server), 4);
        assert!(queue.is_empty());
        // All four recorded bits arrived before the final resync.
        assert_eq!(
            handle.reset_contexts().last().copied(),
            Some(crate::types::StateBits::from_bits_truncate(0b1111))
        );
    }
}
