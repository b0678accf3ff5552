//! Device capabilities: a read-only oracle describing backend limits.
//!
//! The core queries [`Caps`] before every resource creation so backend
//! hooks never see unsupported parameters. Nothing in this crate mutates a
//! `Caps` after construction.

mod format;

pub use format::BackendFormat;

use std::collections::HashMap;

use crate::types::SurfaceFlags;

/// Per-format support table entry.
#[derive(Debug, Clone, Default)]
pub struct FormatCaps {
    /// The format can be sampled from.
    pub texturable: bool,
    /// Supported color sample counts, ascending. Empty means not renderable.
    pub color_sample_counts: Vec<u32>,
}

/// Raw capability values, normally filled in by a backend at startup.
#[derive(Debug, Clone)]
pub struct CapsConfig {
    pub max_texture_size: i32,
    pub max_render_target_size: i32,
    /// Whether the backend can express a blend barrier natively inside a
    /// render pass. When false, the barrier flag differentiates pipelines.
    pub native_blend_barrier: bool,
    /// Support table keyed by [`BackendFormat::id`].
    pub formats: HashMap<u32, FormatCaps>,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            max_texture_size: 8192,
            max_render_target_size: 8192,
            native_blend_barrier: false,
            formats: HashMap::new(),
        }
    }
}

/// Queried, immutable description of backend limits.
#[derive(Debug)]
pub struct Caps {
    config: CapsConfig,
}

impl Caps {
    pub fn new(mut config: CapsConfig) -> Self {
        // A render target can never exceed the texture dimension limit.
        config.max_render_target_size = config.max_render_target_size.min(config.max_texture_size);
        Self { config }
    }

    #[inline]
    pub fn max_texture_size(&self) -> i32 {
        self.config.max_texture_size
    }

    #[inline]
    pub fn max_render_target_size(&self) -> i32 {
        self.config.max_render_target_size
    }

    #[inline]
    pub fn native_blend_barrier(&self) -> bool {
        self.config.native_blend_barrier
    }

    fn format_caps(&self, format: &BackendFormat) -> Option<&FormatCaps> {
        self.config.formats.get(&format.id())
    }

    pub fn is_format_texturable(&self, format: &BackendFormat) -> bool {
        self.format_caps(format).is_some_and(|c| c.texturable)
    }

    /// True if the format can back a render target at `sample_count`.
    pub fn is_format_renderable(&self, format: &BackendFormat, sample_count: u32) -> bool {
        self.get_render_target_sample_count(sample_count, format) > 0
    }

    /// Normalizes a requested sample count against the format's support.
    ///
    /// Returns the smallest supported count >= `sample_count`, the largest
    /// supported count when the request exceeds everything, or 0 when the
    /// format is not renderable at all (or the request itself is 0).
    pub fn get_render_target_sample_count(&self, sample_count: u32, format: &BackendFormat) -> u32 {
        if sample_count == 0 {
            return 0;
        }
        let Some(caps) = self.format_caps(format) else {
            return 0;
        };
        let counts = &caps.color_sample_counts;
        counts
            .iter()
            .copied()
            .find(|&n| n >= sample_count)
            .or_else(|| counts.last().copied())
            .unwrap_or(0)
    }

    /// Whether a surface can be created with these parameters.
    ///
    /// Merges the texture and render-target validation ladders; which one
    /// applies depends on `SurfaceFlags::RENDERABLE`.
    pub fn validate_surface_params(
        &self,
        width: i32,
        height: i32,
        format: &BackendFormat,
        sample_count: u32,
        flags: SurfaceFlags,
    ) -> bool {
        if width < 1 || height < 1 {
            return false;
        }
        if !self.is_format_texturable(format) {
            return false;
        }
        if flags.contains(SurfaceFlags::RENDERABLE) {
            let max = self.max_render_target_size();
            if width > max || height > max {
                return false;
            }
            self.is_format_renderable(format, sample_count)
        } else {
            let max = self.max_texture_size();
            width <= max && height <= max && sample_count == 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_caps() -> (Caps, BackendFormat, BackendFormat) {
        let rgba = BackendFormat::new(1, "rgba8", 4, false);
        let depth = BackendFormat::new(2, "depth24", 4, false);
        let mut formats = HashMap::new();
        formats.insert(
            rgba.id(),
            FormatCaps {
                texturable: true,
                color_sample_counts: vec![1, 2, 4, 8],
            },
        );
        formats.insert(
            depth.id(),
            FormatCaps {
                texturable: false,
                color_sample_counts: vec![1, 4],
            },
        );
        let caps = Caps::new(CapsConfig {
            max_texture_size: 4096,
            max_render_target_size: 2048,
            formats,
            ..CapsConfig::default()
        });
        (caps, rgba, depth)
    }

    // ── sample count normalization ────────────────────────────────────────

    #[test]
    fn sample_count_rounds_up_to_supported() {
        let (caps, rgba, _) = test_caps();
        assert_eq!(caps.get_render_target_sample_count(1, &rgba), 1);
        assert_eq!(caps.get_render_target_sample_count(3, &rgba), 4);
        assert_eq!(caps.get_render_target_sample_count(8, &rgba), 8);
    }

    #[test]
    fn sample_count_clamps_to_largest() {
        let (caps, rgba, _) = test_caps();
        assert_eq!(caps.get_render_target_sample_count(16, &rgba), 8);
    }

    #[test]
    fn sample_count_zero_for_unknown_format() {
        let (caps, ..) = test_caps();
        let unknown = BackendFormat::new(99, "mystery", 4, false);
        assert_eq!(caps.get_render_target_sample_count(1, &unknown), 0);
        assert!(!caps.is_format_renderable(&unknown, 1));
    }

    // ── validate_surface_params ───────────────────────────────────────────

    #[test]
    fn validate_rejects_zero_dimensions() {
        let (caps, rgba, _) = test_caps();
        assert!(!caps.validate_surface_params(0, 10, &rgba, 1, SurfaceFlags::empty()));
        assert!(!caps.validate_surface_params(10, 0, &rgba, 1, SurfaceFlags::empty()));
        assert!(caps.validate_surface_params(10, 10, &rgba, 1, SurfaceFlags::empty()));
    }

    #[test]
    fn validate_uses_render_target_limit_for_renderable() {
        let (caps, rgba, _) = test_caps();
        // 3000 fits the texture limit but not the render target limit.
        assert!(caps.validate_surface_params(3000, 10, &rgba, 1, SurfaceFlags::empty()));
        assert!(!caps.validate_surface_params(3000, 10, &rgba, 1, SurfaceFlags::RENDERABLE));
    }

    #[test]
    fn validate_rejects_untexturable_format() {
        let (caps, _, depth) = test_caps();
        assert!(!caps.validate_surface_params(10, 10, &depth, 1, SurfaceFlags::empty()));
    }
}
