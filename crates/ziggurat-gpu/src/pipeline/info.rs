use std::sync::Arc;

use bitflags::bitflags;

use super::{GeometryStep, StencilSettings};
use crate::caps::BackendFormat;
use crate::types::{SurfaceOrigin, Swizzle};

bitflags! {
    /// Per-pipeline behavior toggles.
    ///
    /// Typed flags with small-integer storage so they can be serialized
    /// into pipeline keys unchanged.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct PipelineFlags: u32 {
        const CONSERVATIVE_RASTER = 1 << 0;
        const WIREFRAME = 1 << 1;
        const SNAP_TO_PIXELS = 1 << 2;
        /// The draw is clipped by a scissor set outside the pipeline.
        const HAS_SCISSOR_CLIP = 1 << 3;
        /// The draw reads the clip from the stencil buffer.
        const HAS_STENCIL_CLIP = 1 << 4;
        /// A blend barrier is required between overlapping draws.
        const RENDER_PASS_BLEND_BARRIER = 1 << 5;
    }
}

/// Immutable description of one draw batch's pipeline configuration.
///
/// All referenced sub-objects are immutable for the life of the info, so
/// the whole structure can be shared freely and used as a caching input.
/// Created per batch at flush time; read-only afterward.
#[derive(Debug, Clone)]
pub struct PipelineInfo {
    target_format: BackendFormat,
    sample_count: u32,
    origin: SurfaceOrigin,
    write_swizzle: Swizzle,
    geometry: Arc<GeometryStep>,
    user_stencil: Option<Arc<StencilSettings>>,
    flags: PipelineFlags,
}

impl PipelineInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        target_format: BackendFormat,
        sample_count: u32,
        origin: SurfaceOrigin,
        write_swizzle: Swizzle,
        geometry: Arc<GeometryStep>,
        user_stencil: Option<Arc<StencilSettings>>,
        flags: PipelineFlags,
    ) -> Self {
        debug_assert!(sample_count >= 1);
        Self {
            target_format,
            sample_count,
            origin,
            write_swizzle,
            geometry,
            user_stencil,
            flags,
        }
    }

    #[inline]
    pub fn target_format(&self) -> &BackendFormat {
        &self.target_format
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    #[inline]
    pub fn origin(&self) -> SurfaceOrigin {
        self.origin
    }

    #[inline]
    pub fn write_swizzle(&self) -> Swizzle {
        self.write_swizzle
    }

    #[inline]
    pub fn geometry(&self) -> &Arc<GeometryStep> {
        &self.geometry
    }

    #[inline]
    pub fn user_stencil(&self) -> Option<&Arc<StencilSettings>> {
        self.user_stencil.as_ref()
    }

    #[inline]
    pub fn flags(&self) -> PipelineFlags {
        self.flags
    }
}
