//! Interned format objects for the wgpu backend.
//!
//! The core compares formats by identity, so every wgpu format must map to
//! exactly one [`BackendFormat`] allocation for the life of the backend.
//! The table is built once and only handed out by reference.

use std::collections::HashMap;

use ziggurat_gpu::caps::BackendFormat;

/// The wgpu formats this backend exposes to the core.
const SUPPORTED: &[(wgpu::TextureFormat, &str, usize)] = &[
    (wgpu::TextureFormat::Rgba8Unorm, "rgba8", 4),
    (wgpu::TextureFormat::Rgba8UnormSrgb, "rgba8_srgb", 4),
    (wgpu::TextureFormat::Bgra8Unorm, "bgra8", 4),
    (wgpu::TextureFormat::Bgra8UnormSrgb, "bgra8_srgb", 4),
    (wgpu::TextureFormat::R8Unorm, "r8", 1),
    (wgpu::TextureFormat::Rg8Unorm, "rg8", 2),
    (wgpu::TextureFormat::Rgba16Float, "rgba16f", 8),
];

/// One canonical [`BackendFormat`] per supported wgpu format.
pub struct FormatTable {
    by_wgpu: HashMap<wgpu::TextureFormat, BackendFormat>,
    by_id: HashMap<u32, wgpu::TextureFormat>,
}

impl FormatTable {
    pub fn new() -> Self {
        let mut by_wgpu = HashMap::new();
        let mut by_id = HashMap::new();
        for (index, &(format, name, bytes)) in SUPPORTED.iter().enumerate() {
            let id = index as u32 + 1;
            by_wgpu.insert(format, BackendFormat::new(id, name, bytes, false));
            by_id.insert(id, format);
        }
        Self { by_wgpu, by_id }
    }

    /// The canonical core format for `format`; always the same allocation.
    pub fn get(&self, format: wgpu::TextureFormat) -> Option<&BackendFormat> {
        self.by_wgpu.get(&format)
    }

    /// Reverse lookup by format id.
    pub fn wgpu_format(&self, format: &BackendFormat) -> Option<wgpu::TextureFormat> {
        self.by_id.get(&format.id()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&wgpu::TextureFormat, &BackendFormat)> {
        self.by_wgpu.iter()
    }
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_interned() {
        let table = FormatTable::new();
        let a = table.get(wgpu::TextureFormat::Rgba8Unorm).unwrap();
        let b = table.get(wgpu::TextureFormat::Rgba8Unorm).unwrap();
        assert!(BackendFormat::ptr_eq(a, b));
    }

    #[test]
    fn reverse_mapping_round_trips() {
        let table = FormatTable::new();
        for &(format, ..) in SUPPORTED {
            let backend = table.get(format).unwrap();
            assert_eq!(table.wgpu_format(backend), Some(format));
        }
    }

    #[test]
    fn ids_are_distinct() {
        let table = FormatTable::new();
        let mut ids: Vec<_> = table.iter().map(|(_, f)| f.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), SUPPORTED.len());
    }
}
