//! Render pass recording.
//!
//! [`OpsRenderPass`] wraps the backend's [`PassCommands`] sink with the
//! lifecycle contract: load ops run exactly once at `begin`, recording is
//! legal only while active, and `end` applies the store ops exactly once.
//! Violating the lifecycle is a programmer error and panics; a pipeline
//! the backend rejects is a runtime condition and only downgrades the
//! draws that depended on it to counted failures.

use std::sync::Arc;

use crate::backend::PassCommands;
use crate::caps::Caps;
use crate::pipeline::{PipelineDesc, PipelineInfo};
use crate::pool::PoolSlice;
use crate::proxy::SurfaceProxyView;
use crate::types::{IRect, LoadOp, LoadStoreOps};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum PassState {
    Idle,
    Active,
    Ended,
}

/// Recording object for one render pass over one target.
///
/// Obtained from [`Server::get_ops_render_pass`](crate::server::Server::get_ops_render_pass),
/// normally through [`OpFlushState`](crate::flush::OpFlushState), which
/// enforces the at-most-one-active rule and folds the draw counters into
/// the server stats at the end.
pub struct OpsRenderPass {
    commands: Box<dyn PassCommands>,
    caps: Arc<Caps>,
    write_view: SurfaceProxyView,
    content_bounds: IRect,
    color_ops: LoadStoreOps,
    stencil_ops: LoadStoreOps,
    clear_color: [f32; 4],
    stencil_attached: bool,
    state: PassState,
    desc: PipelineDesc,
    pipeline_bound: bool,
    draws: u32,
    failed_draws: u32,
}

impl OpsRenderPass {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        commands: Box<dyn PassCommands>,
        caps: Arc<Caps>,
        write_view: SurfaceProxyView,
        content_bounds: IRect,
        color_ops: LoadStoreOps,
        stencil_ops: LoadStoreOps,
        clear_color: [f32; 4],
        stencil_attached: bool,
    ) -> Self {
        Self {
            commands,
            caps,
            write_view,
            content_bounds,
            color_ops,
            stencil_ops,
            clear_color,
            stencil_attached,
            state: PassState::Idle,
            desc: PipelineDesc::new(),
            pipeline_bound: false,
            draws: 0,
            failed_draws: 0,
        }
    }

    /// The whole attachment, which load-op clears cover.
    fn target_bounds(&self) -> IRect {
        match self.write_view.proxy() {
            Some(proxy) => IRect::from_wh(proxy.width(), proxy.height()),
            None => self.content_bounds,
        }
    }

    #[track_caller]
    fn check_active(&self) {
        assert!(
            self.state == PassState::Active,
            "render pass recording outside begin()/end()"
        );
    }

    /// Performs the color and stencil load operations and opens recording.
    ///
    /// Calling `begin` twice, or after `end`, is fatal. So is a stencil
    /// clear against a target with no stencil attachment.
    pub fn begin(&mut self) {
        assert!(self.state == PassState::Idle, "begin() called twice");
        if self.color_ops.load_op() == LoadOp::Clear {
            let bounds = self.target_bounds();
            self.commands.clear_color(bounds, self.clear_color);
        }
        if self.stencil_ops.load_op() == LoadOp::Clear {
            assert!(
                self.stencil_attached,
                "stencil clear requested on a target with no stencil attachment"
            );
            let bounds = self.target_bounds();
            self.commands.clear_stencil(bounds, false);
        }
        self.state = PassState::Active;
    }

    /// Binds the pipeline described by `info`; returns false when the
    /// backend rejects it. After a rejection, draws are counted as failed
    /// until a later bind succeeds.
    pub fn bind_pipeline(&mut self, info: &PipelineInfo, draw_bounds: IRect) -> bool {
        self.check_active();
        self.desc.build(info, &self.caps);
        self.pipeline_bound = self.commands.bind_pipeline(info, &self.desc, draw_bounds);
        if !self.pipeline_bound {
            log::warn!("pipeline bind rejected; dropping dependent draws");
        }
        self.pipeline_bound
    }

    /// Binds pooled geometry data. Normally called through
    /// [`OpFlushState::bind_buffers`](crate::flush::OpFlushState::bind_buffers),
    /// which resolves the pool slices to their bytes.
    pub fn bind_buffers(
        &mut self,
        vertex: Option<(PoolSlice, &[u8])>,
        instance: Option<(PoolSlice, &[u8])>,
        index: Option<(PoolSlice, &[u8])>,
    ) {
        self.check_active();
        self.commands.bind_buffers(vertex, instance, index);
    }

    /// Sets the scissor, clipped to the pass's content bounds.
    pub fn set_scissor(&mut self, rect: IRect) {
        self.check_active();
        let clipped = rect.intersect(&self.content_bounds).unwrap_or(IRect::new(
            self.content_bounds.left,
            self.content_bounds.top,
            self.content_bounds.left,
            self.content_bounds.top,
        ));
        self.commands.set_scissor(clipped);
    }

    /// Mid-pass color clear within `scissor`.
    pub fn clear(&mut self, scissor: IRect, color: [f32; 4]) {
        self.check_active();
        let clipped = match scissor.intersect(&self.content_bounds) {
            Some(r) => r,
            None => return,
        };
        self.commands.clear_color(clipped, color);
    }

    /// Mid-pass stencil clear; fatal without a stencil attachment.
    pub fn clear_stencil(&mut self, scissor: IRect, inside_mask: bool) {
        self.check_active();
        assert!(
            self.stencil_attached,
            "stencil clear requested on a target with no stencil attachment"
        );
        let clipped = match scissor.intersect(&self.content_bounds) {
            Some(r) => r,
            None => return,
        };
        self.commands.clear_stencil(clipped, inside_mask);
    }

    pub fn draw(&mut self, vertex_count: u32, base_vertex: u32) {
        self.check_active();
        if !self.pipeline_bound {
            self.failed_draws += 1;
            return;
        }
        self.commands.draw(vertex_count, base_vertex);
        self.draws += 1;
    }

    pub fn draw_indexed(&mut self, index_count: u32, base_index: u32, base_vertex: i32) {
        self.check_active();
        if !self.pipeline_bound {
            self.failed_draws += 1;
            return;
        }
        self.commands.draw_indexed(index_count, base_index, base_vertex);
        self.draws += 1;
    }

    pub fn draw_instanced(
        &mut self,
        instance_count: u32,
        base_instance: u32,
        vertex_count: u32,
        base_vertex: u32,
    ) {
        self.check_active();
        if !self.pipeline_bound {
            self.failed_draws += 1;
            return;
        }
        self.commands
            .draw_instanced(instance_count, base_instance, vertex_count, base_vertex);
        self.draws += 1;
    }

    /// Applies the store operations and closes the pass. Exactly once.
    pub fn end(&mut self) {
        assert!(
            self.state == PassState::Active,
            "end() without a matching begin(), or called twice"
        );
        self.commands
            .end_pass(self.color_ops.store_op(), self.stencil_ops.store_op());
        self.state = PassState::Ended;
    }

    #[inline]
    pub fn write_view(&self) -> &SurfaceProxyView {
        &self.write_view
    }

    #[inline]
    pub fn content_bounds(&self) -> IRect {
        self.content_bounds
    }

    /// Draws recorded so far; folded into server stats by the flush state.
    #[inline]
    pub fn draw_counts(&self) -> (u32, u32) {
        (self.draws, self.failed_draws)
    }
}

impl std::fmt::Debug for OpsRenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsRenderPass")
            .field("state", &self.state)
            .field("content_bounds", &self.content_bounds)
            .field("draws", &self.draws)
            .field("failed_draws", &self.failed_draws)
            .finish_non_exhaustive()
    }
}
