use std::collections::HashMap;
use std::sync::Arc;

use super::PipelineDesc;

/// Compiled-pipeline cache keyed by [`PipelineDesc`] full keys.
///
/// Generic over the backend's compiled pipeline type; each backend owns one
/// of these. Hit/miss counters make cache behavior observable from tests
/// and telemetry.
#[derive(Debug)]
pub struct PipelineCache<P> {
    map: HashMap<Box<[u32]>, Arc<P>>,
    hits: u64,
    misses: u64,
}

impl<P> Default for PipelineCache<P> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<P> PipelineCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the pipeline for `desc`, invoking `create` on a miss.
    ///
    /// `create` returning `None` (compile failure) is not cached; the next
    /// lookup retries.
    pub fn get_or_create(
        &mut self,
        desc: &PipelineDesc,
        create: impl FnOnce() -> Option<P>,
    ) -> Option<Arc<P>> {
        debug_assert!(desc.is_built());
        if let Some(found) = self.map.get(desc.full_key()) {
            self.hits += 1;
            return Some(found.clone());
        }
        self.misses += 1;
        let created = Arc::new(create()?);
        self.map
            .insert(desc.full_key().into(), created.clone());
        Some(created)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc as StdArc;

    use super::*;
    use crate::caps::{BackendFormat, Caps, CapsConfig};
    use crate::pipeline::{
        GeometryStep, PipelineFlags, PipelineInfo, VertexAttr, VertexAttrType,
    };
    use crate::types::{PrimitiveType, SurfaceOrigin, Swizzle};

    fn built_desc(format_id: u32) -> PipelineDesc {
        let format = BackendFormat::new(format_id, "rgba8", 4, false);
        let info = PipelineInfo::new(
            format,
            1,
            SurfaceOrigin::UpperLeft,
            Swizzle::RGBA,
            StdArc::new(GeometryStep::new(
                "quad",
                PrimitiveType::TriangleStrip,
                vec![VertexAttr::new("pos", VertexAttrType::Float2)],
                Vec::new(),
            )),
            None,
            PipelineFlags::empty(),
        );
        let mut desc = PipelineDesc::new();
        desc.build(&info, &Caps::new(CapsConfig::default()));
        desc
    }

    #[test]
    fn second_lookup_hits() {
        let mut cache = PipelineCache::<&'static str>::new();
        let desc = built_desc(1);
        let first = cache.get_or_create(&desc, || Some("compiled")).unwrap();
        let second = cache.get_or_create(&desc, || panic!("must not recompile")).unwrap();
        assert!(StdArc::ptr_eq(&first, &second));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn distinct_keys_miss_independently() {
        let mut cache = PipelineCache::<u32>::new();
        let a = built_desc(1);
        let b = built_desc(2);
        cache.get_or_create(&a, || Some(10));
        cache.get_or_create(&b, || Some(20));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn failed_compile_is_not_cached() {
        let mut cache = PipelineCache::<u32>::new();
        let desc = built_desc(1);
        assert!(cache.get_or_create(&desc, || None).is_none());
        assert!(cache.get_or_create(&desc, || Some(1)).is_some());
        assert_eq!(cache.misses(), 2);
    }
}
