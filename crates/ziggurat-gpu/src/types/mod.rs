//! Small vocabulary types shared across the core.

mod color;
mod flags;
mod ops;
mod rect;
mod swizzle;

pub use color::ColorType;
pub use flags::{StateBits, SurfaceFlags};
pub use ops::{LoadOp, LoadStoreOps, StoreOp};
pub use rect::IRect;
pub use swizzle::Swizzle;

/// Texture-space convention for where (0, 0) lands in content space.
///
/// Vulkan-style targets put the first pixel at the upper left; GL-style
/// framebuffers put it at the lower left.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SurfaceOrigin {
    UpperLeft,
    LowerLeft,
}

/// Geometric primitives used for drawing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveType {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

/// Lifetime policy for backend objects imported from outside the engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Ownership {
    /// The holder does not destroy the backend object; the client keeps it alive.
    Borrowed,
    /// The holder destroys the backend object when the wrapping resource dies.
    Owned,
}
