//! Scratch texture recycling.
//!
//! Budgeted textures are registered here at creation. A scratch entry is
//! "free" when the pool holds the only reference; a later request with the
//! same creation parameters gets the existing allocation back instead of a
//! new one.

use crate::resource::Shared;
use crate::texture::{Texture, TextureDesc};
use crate::types::SurfaceFlags;

/// Creation parameters reduced to a comparable key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct ScratchKey {
    width: i32,
    height: i32,
    format_id: u32,
    mip_level_count: u32,
    sample_count: u32,
    flags: u32,
}

impl ScratchKey {
    pub(super) fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format_id: desc.format.id(),
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            flags: desc.flags.bits(),
        }
    }
}

#[derive(Default)]
pub(super) struct ScratchPool {
    entries: Vec<(ScratchKey, Shared<Texture>)>,
}

impl ScratchPool {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Registers a texture for future reuse. Only budgeted textures are
    /// eligible; anything else is ignored.
    pub(super) fn register(&mut self, texture: &Shared<Texture>) {
        if !texture.flags().contains(SurfaceFlags::BUDGETED) {
            return;
        }
        let key = ScratchKey::from_desc(texture.desc());
        self.entries.push((key, texture.clone()));
    }

    /// Finds a free (uniquely held) entry matching `key`.
    pub(super) fn find_free(&self, key: &ScratchKey) -> Option<Shared<Texture>> {
        self.entries
            .iter()
            .find(|(k, t)| k == key && t.unique())
            .map(|(_, t)| t.clone())
    }

    /// Drops all free entries, releasing their GPU memory.
    pub(super) fn purge_free(&mut self) {
        self.entries.retain(|(_, t)| !t.unique());
    }
}

impl std::fmt::Debug for ScratchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchPool")
            .field("entries", &self.entries.len())
            .finish()
    }
}
