//! Caps derivation from wgpu limits.

use std::collections::HashMap;

use ziggurat_gpu::caps::{Caps, CapsConfig, FormatCaps};

use crate::format::FormatTable;

/// Sample counts WebGPU guarantees for all renderable color formats.
const GUARANTEED_SAMPLE_COUNTS: &[u32] = &[1, 4];

/// Builds the core caps from device limits and the supported format set.
///
/// wgpu exposes no blend barrier, so overlapping blended draws keep the
/// barrier flag in their pipeline keys.
pub fn caps_from_limits(limits: &wgpu::Limits, table: &FormatTable) -> Caps {
    let max_dimension = limits.max_texture_dimension_2d as i32;
    let mut formats = HashMap::new();
    for (_, backend) in table.iter() {
        formats.insert(
            backend.id(),
            FormatCaps {
                texturable: true,
                color_sample_counts: GUARANTEED_SAMPLE_COUNTS.to_vec(),
            },
        );
    }
    Caps::new(CapsConfig {
        max_texture_size: max_dimension,
        max_render_target_size: max_dimension,
        native_blend_barrier: false,
        formats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ziggurat_gpu::types::SurfaceFlags;

    #[test]
    fn limits_drive_the_size_caps() {
        let table = FormatTable::new();
        let caps = caps_from_limits(&wgpu::Limits::default(), &table);
        assert_eq!(caps.max_texture_size(), 8192);
        assert_eq!(caps.max_render_target_size(), 8192);
    }

    #[test]
    fn supported_formats_are_renderable_at_guaranteed_counts() {
        let table = FormatTable::new();
        let caps = caps_from_limits(&wgpu::Limits::default(), &table);
        let rgba = table.get(wgpu::TextureFormat::Rgba8Unorm).unwrap();
        assert!(caps.validate_surface_params(256, 256, rgba, 4, SurfaceFlags::RENDERABLE));
        // 3 rounds up to the guaranteed 4.
        assert_eq!(caps.get_render_target_sample_count(3, rgba), 4);
    }
}
