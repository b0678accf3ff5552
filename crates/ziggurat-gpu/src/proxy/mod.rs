//! Deferred surfaces.
//!
//! A [`SurfaceProxy`] records the parameters of a surface that may not be
//! backed by GPU memory yet. Ops record against proxies; the flush
//! instantiates them just before the backend needs real textures. Views
//! ([`SurfaceProxyView`]) add the sampling interpretation on top.

mod view;

pub use view::SurfaceProxyView;

use std::cell::RefCell;

use crate::caps::BackendFormat;
use crate::resource::Shared;
use crate::server::Server;
use crate::texture::Texture;
use crate::types::SurfaceFlags;

/// What kind of backing a proxy promises.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ProxyKind {
    /// Sampleable texture; `mipmapped` is fixed at creation.
    Texture { mipmapped: bool },
    /// Render attachment only; never sampled, never mipmapped.
    RenderTarget,
}

/// A deferred surface, instantiated at most once.
pub struct SurfaceProxy {
    width: i32,
    height: i32,
    format: BackendFormat,
    sample_count: u32,
    flags: SurfaceFlags,
    kind: ProxyKind,
    backing: RefCell<Option<Shared<Texture>>>,
}

impl SurfaceProxy {
    /// A deferred texture proxy; instantiation happens on first flush.
    pub fn deferred_texture(
        width: i32,
        height: i32,
        format: BackendFormat,
        flags: SurfaceFlags,
    ) -> Shared<SurfaceProxy> {
        debug_assert!(width > 0 && height > 0);
        Shared::new(Self {
            width,
            height,
            format,
            sample_count: 1,
            flags,
            kind: ProxyKind::Texture {
                mipmapped: flags.contains(SurfaceFlags::MIPMAPPED),
            },
            backing: RefCell::new(None),
        })
    }

    /// A deferred render-target-only proxy.
    pub fn deferred_render_target(
        width: i32,
        height: i32,
        format: BackendFormat,
        sample_count: u32,
        flags: SurfaceFlags,
    ) -> Shared<SurfaceProxy> {
        debug_assert!(width > 0 && height > 0);
        debug_assert!(sample_count >= 1);
        Shared::new(Self {
            width,
            height,
            format,
            sample_count,
            flags: flags | SurfaceFlags::RENDERABLE,
            kind: ProxyKind::RenderTarget,
            backing: RefCell::new(None),
        })
    }

    /// Wraps an already-instantiated texture in a proxy.
    pub fn wrapped(texture: Shared<Texture>) -> Shared<SurfaceProxy> {
        let kind = if texture.flags().contains(SurfaceFlags::RENDERABLE)
            && !texture.is_mipmapped()
            && texture.sample_count() > 1
        {
            ProxyKind::RenderTarget
        } else {
            ProxyKind::Texture {
                mipmapped: texture.is_mipmapped(),
            }
        };
        Shared::new(Self {
            width: texture.width(),
            height: texture.height(),
            format: texture.format().clone(),
            sample_count: texture.sample_count(),
            flags: texture.flags(),
            kind,
            backing: RefCell::new(Some(texture)),
        })
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> &BackendFormat {
        &self.format
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    #[inline]
    pub fn flags(&self) -> SurfaceFlags {
        self.flags
    }

    /// Whether the eventual backing has mip levels. Always false for
    /// render-target-only proxies.
    #[inline]
    pub fn is_mipmapped(&self) -> bool {
        matches!(self.kind, ProxyKind::Texture { mipmapped: true })
    }

    #[inline]
    pub fn is_renderable(&self) -> bool {
        self.flags.contains(SurfaceFlags::RENDERABLE)
    }

    #[inline]
    pub fn is_instantiated(&self) -> bool {
        self.backing.borrow().is_some()
    }

    /// The backing texture, if already instantiated.
    pub fn peek_texture(&self) -> Option<Shared<Texture>> {
        self.backing.borrow().clone()
    }

    /// Ensures a backing texture exists, creating it through `server` on
    /// first call. Returns false when allocation fails; the proxy stays
    /// uninstantiated and a later flush may retry.
    pub fn instantiate(&self, server: &mut Server) -> bool {
        if self.backing.borrow().is_some() {
            return true;
        }
        let created = server.create_texture(
            self.width,
            self.height,
            self.format.clone(),
            self.sample_count,
            self.flags,
            None,
        );
        match created {
            Some(texture) => {
                *self.backing.borrow_mut() = Some(texture);
                true
            }
            None => {
                log::warn!(
                    "failed to instantiate {}x{} proxy ({})",
                    self.width,
                    self.height,
                    self.format.name(),
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for SurfaceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceProxy")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sample_count", &self.sample_count)
            .field("kind", &self.kind)
            .field("instantiated", &self.is_instantiated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::TextureDesc;
    use crate::types::Ownership;

    fn format() -> BackendFormat {
        BackendFormat::new(1, "rgba8", 4, false)
    }

    #[test]
    fn render_target_proxy_is_never_mipmapped() {
        let proxy =
            SurfaceProxy::deferred_render_target(64, 64, format(), 4, SurfaceFlags::empty());
        assert!(!proxy.is_mipmapped());
        assert!(proxy.is_renderable());
    }

    #[test]
    fn texture_proxy_reports_mipmapping_from_flags() {
        let proxy = SurfaceProxy::deferred_texture(64, 64, format(), SurfaceFlags::MIPMAPPED);
        assert!(proxy.is_mipmapped());
        assert!(!proxy.is_instantiated());
    }

    #[test]
    fn wrapped_proxy_starts_instantiated() {
        let texture = Shared::new(Texture::new(
            TextureDesc {
                width: 8,
                height: 8,
                format: format(),
                mip_level_count: 1,
                sample_count: 1,
                flags: SurfaceFlags::empty(),
            },
            Ownership::Owned,
            Box::new(()),
        ));
        let proxy = SurfaceProxy::wrapped(texture.clone());
        assert!(proxy.is_instantiated());
        assert!(Shared::ptr_eq(&proxy.peek_texture().unwrap(), &texture));
    }
}
