//! GPU buffer resources.

use std::any::Any;

use bitflags::bitflags;

bitflags! {
    /// Intended usage of a GPU buffer.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct BufferUsage: u32 {
        /// Vertex buffer (also covers instance streams).
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const TRANSFER_SRC = 1 << 2;
        const TRANSFER_DST = 1 << 3;
        /// Respecified by the host once per frame at most.
        const STREAM = 1 << 4;
        /// Specified once, read repeatedly by the device.
        const STATIC = 1 << 5;
        /// Respecified randomly by host and device.
        const DYNAMIC = 1 << 6;
    }
}

/// A GPU-backed buffer; shared via [`Shared`](crate::resource::Shared).
pub struct GpuBuffer {
    size: usize,
    usage: BufferUsage,
    backend: Box<dyn Any>,
}

impl GpuBuffer {
    pub fn new(size: usize, usage: BufferUsage, backend: Box<dyn Any>) -> Self {
        debug_assert!(size > 0);
        Self {
            size,
            usage,
            backend,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("size", &self.size)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}
