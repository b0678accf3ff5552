use bitflags::bitflags;

bitflags! {
    /// Creation-time properties of a surface.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct SurfaceFlags: u32 {
        /// Counted against the resource budget; eligible for scratch reuse.
        const BUDGETED = 1 << 0;
        /// Allocate a full mip chain in addition to the base level.
        const MIPMAPPED = 1 << 1;
        /// Usable as a render target.
        const RENDERABLE = 1 << 2;
        /// Backed by protected memory.
        const PROTECTED = 1 << 3;
        /// Writes (including `write_pixels`) are rejected.
        const READ_ONLY = 1 << 4;
        /// Render passes over this target get a stencil attachment.
        const STENCIL_ATTACHMENT = 1 << 5;
    }
}

bitflags! {
    /// Categories of backend context state that outside code may have
    /// mutated behind the server's back.
    ///
    /// Passed to [`Server::mark_context_dirty`](crate::server::Server::mark_context_dirty);
    /// the backend re-emits the matching assumed state lazily, before the
    /// next operation that depends on it.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct StateBits: u32 {
        const RENDER_TARGET = 1 << 0;
        const PIXEL_STORE = 1 << 1;
        /// Shader stages, vertex array and input buffers.
        const PIPELINE = 1 << 2;
        /// Also includes samplers bound to texture units.
        const TEXTURE = 1 << 3;
        const STENCIL = 1 << 4;
        const RASTER = 1 << 5;
        const BLEND = 1 << 6;
        /// Scissor and viewport.
        const VIEW = 1 << 7;
        const MISC = 1 << 8;
    }
}
