use super::PipelineInfo;
use crate::caps::Caps;
use crate::types::SurfaceOrigin;

/// Word-oriented pipeline cache key builder.
///
/// [`build`](PipelineDesc::build) serializes every field of a
/// [`PipelineInfo`] that affects compiled pipeline identity and records the
/// resulting *base length*. Backends may append their own suffix words
/// afterward ([`push_suffix`](PipelineDesc::push_suffix)); the base portion
/// stays stable and [`base_key`](PipelineDesc::base_key) comparisons ignore
/// any suffix.
///
/// Determinism: two infos describing behaviorally identical GPU state
/// serialize to identical base keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PipelineDesc {
    key: Vec<u32>,
    base_length: usize,
}

impl PipelineDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the descriptor and serializes `info` under `caps`.
    pub fn build(&mut self, info: &PipelineInfo, caps: &Caps) {
        self.key.clear();
        self.base_length = 0;

        self.key.push(info.target_format().id());
        self.key.push(info.sample_count());
        let origin_bit = match info.origin() {
            SurfaceOrigin::UpperLeft => 0u32,
            SurfaceOrigin::LowerLeft => 1,
        };
        self.key.push(origin_bit | (info.write_swizzle().key() as u32) << 1);

        // A native blend barrier leaves the compiled pipeline unchanged, so
        // the flag must not split the cache on backends that have one.
        let mut flags = info.flags();
        if caps.native_blend_barrier() {
            flags.remove(super::PipelineFlags::RENDER_PASS_BLEND_BARRIER);
        }
        self.key.push(flags.bits());

        let geometry = info.geometry();
        self.key.push(geometry.primitive() as u32);
        self.key.push(geometry.vertex_attrs().len() as u32);
        for attr in geometry.vertex_attrs() {
            self.key.push(attr.ty as u32);
        }
        self.key.push(geometry.instance_attrs().len() as u32);
        for attr in geometry.instance_attrs() {
            self.key.push(attr.ty as u32);
        }

        match info.user_stencil() {
            None => self.key.push(0),
            Some(stencil) => {
                self.key.push(1);
                self.key.push(stencil.key_word());
                self.key
                    .push((stencil.read_mask as u32) | (stencil.write_mask as u32) << 16);
                self.key.push(stencil.reference as u32);
            }
        }

        self.base_length = self.key.len();
    }

    /// Appends a backend-specific word after the base key.
    ///
    /// Only legal once the base key has been built.
    pub fn push_suffix(&mut self, word: u32) {
        assert!(self.base_length > 0, "push_suffix before build");
        self.key.push(word);
    }

    /// The stable prefix serialized by [`build`](PipelineDesc::build).
    #[inline]
    pub fn base_key(&self) -> &[u32] {
        &self.key[..self.base_length]
    }

    /// Base key plus any backend suffix; the full cache lookup key.
    #[inline]
    pub fn full_key(&self) -> &[u32] {
        &self.key
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.base_length > 0
    }

    pub fn clear(&mut self) {
        self.key.clear();
        self.base_length = 0;
    }
}
