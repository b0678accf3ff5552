//! GPU texture resources.
//!
//! A [`Texture`] is created through the [`Server`](crate::server::Server)
//! and shared via [`Shared`](crate::resource::Shared). The backend attaches
//! its native object as an opaque payload; the core never inspects it.

use std::any::Any;
use std::cell::{Cell, RefCell};

use crate::caps::BackendFormat;
use crate::types::{Ownership, SurfaceFlags};

/// Creation parameters for a texture, fully validated by the server before
/// any backend hook sees them.
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub width: i32,
    pub height: i32,
    pub format: BackendFormat,
    /// Base level plus mips; 1 means no mipmapping.
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub flags: SurfaceFlags,
}

/// An externally created backend texture, offered for wrapping.
///
/// The payload is the backend-native object (for wgpu, a `wgpu::Texture`);
/// the wrapping server passes it through untouched.
pub struct BackendTexture {
    pub width: i32,
    pub height: i32,
    pub format: BackendFormat,
    pub payload: Box<dyn Any>,
}

/// A GPU-backed texture.
///
/// Render-thread affine: the interior-mutable bits (mipmap dirtiness,
/// label) are `Cell`/`RefCell`, so a `Shared<Texture>` is deliberately not
/// `Sync`.
pub struct Texture {
    desc: TextureDesc,
    ownership: Ownership,
    read_only: bool,
    mipmaps_dirty: Cell<bool>,
    label: RefCell<Option<String>>,
    backend: Box<dyn Any>,
}

impl Texture {
    /// Called by backends from their creation hooks.
    ///
    /// Freshly allocated mipmapped textures start with dirty mips: the data
    /// is undefined until uploaded and regenerated.
    pub fn new(desc: TextureDesc, ownership: Ownership, backend: Box<dyn Any>) -> Self {
        let mipmapped = desc.mip_level_count > 1;
        let read_only = desc.flags.contains(SurfaceFlags::READ_ONLY);
        Self {
            desc,
            ownership,
            read_only,
            mipmaps_dirty: Cell::new(mipmapped),
            label: RefCell::new(None),
            backend,
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.desc.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.desc.height
    }

    #[inline]
    pub fn format(&self) -> &BackendFormat {
        &self.desc.format
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.desc.sample_count
    }

    #[inline]
    pub fn mip_level_count(&self) -> u32 {
        self.desc.mip_level_count
    }

    #[inline]
    pub fn flags(&self) -> SurfaceFlags {
        self.desc.flags
    }

    #[inline]
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[inline]
    pub fn is_mipmapped(&self) -> bool {
        self.desc.mip_level_count > 1
    }

    #[inline]
    pub fn mipmaps_are_dirty(&self) -> bool {
        self.mipmaps_dirty.get()
    }

    /// Set by the server after base-level writes / regeneration.
    #[inline]
    pub fn set_mipmaps_dirty(&self, dirty: bool) {
        debug_assert!(!dirty || self.is_mipmapped());
        self.mipmaps_dirty.set(dirty);
    }

    pub fn label(&self) -> Option<String> {
        self.label.borrow().clone()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.label.borrow_mut() = Some(label.into());
    }

    /// Downcasts the backend payload.
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("desc", &self.desc)
            .field("ownership", &self.ownership)
            .field("read_only", &self.read_only)
            .field("mipmaps_dirty", &self.mipmaps_dirty.get())
            .field("label", &*self.label.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(mips: u32) -> TextureDesc {
        TextureDesc {
            width: 16,
            height: 16,
            format: BackendFormat::new(1, "rgba8", 4, false),
            mip_level_count: mips,
            sample_count: 1,
            flags: if mips > 1 {
                SurfaceFlags::MIPMAPPED
            } else {
                SurfaceFlags::empty()
            },
        }
    }

    #[test]
    fn fresh_mipmapped_texture_starts_dirty() {
        let t = Texture::new(desc(5), Ownership::Owned, Box::new(()));
        assert!(t.is_mipmapped());
        assert!(t.mipmaps_are_dirty());
    }

    #[test]
    fn single_level_texture_is_not_mipmapped() {
        let t = Texture::new(desc(1), Ownership::Owned, Box::new(()));
        assert!(!t.is_mipmapped());
        assert!(!t.mipmaps_are_dirty());
    }

    #[test]
    fn label_round_trips() {
        let t = Texture::new(desc(1), Ownership::Owned, Box::new(()));
        assert_eq!(t.label(), None);
        t.set_label("atlas");
        assert_eq!(t.label().as_deref(), Some("atlas"));
    }
}
