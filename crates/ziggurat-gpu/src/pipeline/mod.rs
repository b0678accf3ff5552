//! Immutable draw-configuration descriptors and pipeline keying.
//!
//! A [`PipelineInfo`] describes one draw batch's fixed-function and
//! geometry state; a [`PipelineDesc`] flattens it into a deterministic
//! cache key. Compiled pipelines themselves are backend objects, cached
//! backend-side in a [`PipelineCache`].

mod cache;
mod desc;
mod geometry;
mod info;
mod stencil;

pub use cache::PipelineCache;
pub use desc::PipelineDesc;
pub use geometry::{GeometryStep, VertexAttr, VertexAttrType};
pub use info::{PipelineFlags, PipelineInfo};
pub use stencil::{CompareOp, StencilOp, StencilSettings};
