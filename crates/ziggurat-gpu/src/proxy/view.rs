use crate::resource::Shared;
use crate::types::{SurfaceOrigin, Swizzle};

use super::SurfaceProxy;

/// A proxy plus how to read it: origin convention and channel swizzle.
///
/// The proxy slot is optional so a view can give up its reference
/// ([`detach_proxy`](Self::detach_proxy)) while the origin and swizzle stay
/// observable for key-building that happens after ops are recorded.
#[derive(Debug, Clone)]
pub struct SurfaceProxyView {
    proxy: Option<Shared<SurfaceProxy>>,
    origin: SurfaceOrigin,
    swizzle: Swizzle,
}

impl SurfaceProxyView {
    pub fn new(proxy: Shared<SurfaceProxy>) -> Self {
        Self::with_params(proxy, SurfaceOrigin::UpperLeft, Swizzle::RGBA)
    }

    pub fn with_params(
        proxy: Shared<SurfaceProxy>,
        origin: SurfaceOrigin,
        swizzle: Swizzle,
    ) -> Self {
        Self {
            proxy: Some(proxy),
            origin,
            swizzle,
        }
    }

    /// A view that never held a proxy; useful as a placeholder.
    pub fn empty() -> Self {
        Self {
            proxy: None,
            origin: SurfaceOrigin::UpperLeft,
            swizzle: Swizzle::RGBA,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.proxy.is_some()
    }

    #[inline]
    pub fn proxy(&self) -> Option<&Shared<SurfaceProxy>> {
        self.proxy.as_ref()
    }

    /// Clones out the proxy reference without detaching it.
    pub fn ref_proxy(&self) -> Option<Shared<SurfaceProxy>> {
        self.proxy.clone()
    }

    /// Takes the proxy reference out of the view. After the first call the
    /// view is invalid, but origin and swizzle remain readable.
    pub fn detach_proxy(&mut self) -> Option<Shared<SurfaceProxy>> {
        self.proxy.take()
    }

    #[inline]
    pub fn origin(&self) -> SurfaceOrigin {
        self.origin
    }

    #[inline]
    pub fn swizzle(&self) -> Swizzle {
        self.swizzle
    }

    /// Composes `swizzle` on top of the view's current swizzle.
    ///
    /// Merging only narrows the interpretation; there is deliberately no
    /// setter that replaces the swizzle outright.
    pub fn merge_swizzle(&mut self, swizzle: Swizzle) {
        self.swizzle = Swizzle::concat(self.swizzle, swizzle);
    }

    /// Mipmap status of the underlying proxy; false once detached and for
    /// render-target-only proxies.
    pub fn is_mipmapped(&self) -> bool {
        self.proxy.as_ref().is_some_and(|p| p.is_mipmapped())
    }

    /// Drops the proxy reference and restores default interpretation.
    pub fn reset(&mut self) {
        self.proxy = None;
        self.origin = SurfaceOrigin::UpperLeft;
        self.swizzle = Swizzle::RGBA;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::BackendFormat;
    use crate::types::SurfaceFlags;

    fn proxy(mipmapped: bool) -> Shared<SurfaceProxy> {
        let flags = if mipmapped {
            SurfaceFlags::MIPMAPPED
        } else {
            SurfaceFlags::empty()
        };
        SurfaceProxy::deferred_texture(32, 32, BackendFormat::new(1, "rgba8", 4, false), flags)
    }

    #[test]
    fn detach_is_at_most_once() {
        let mut view = SurfaceProxyView::with_params(
            proxy(false),
            SurfaceOrigin::LowerLeft,
            Swizzle::BGRA,
        );
        assert!(view.detach_proxy().is_some());
        assert!(view.detach_proxy().is_none());
        // Interpretation survives the detach.
        assert_eq!(view.origin(), SurfaceOrigin::LowerLeft);
        assert_eq!(view.swizzle(), Swizzle::BGRA);
        assert!(!view.is_valid());
    }

    #[test]
    fn merge_swizzle_composes_in_order() {
        let mut view = SurfaceProxyView::new(proxy(false));
        view.merge_swizzle(Swizzle::BGRA);
        view.merge_swizzle(Swizzle::BGRA);
        assert_eq!(view.swizzle(), Swizzle::RGBA, "bgra twice is identity");
    }

    #[test]
    fn mipmap_query_follows_the_proxy() {
        let mut view = SurfaceProxyView::new(proxy(true));
        assert!(view.is_mipmapped());
        view.detach_proxy();
        assert!(!view.is_mipmapped());
    }
}
