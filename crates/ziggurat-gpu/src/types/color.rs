/// Interpretation of pixel data in client memory.
///
/// This is the CPU-side half of a transfer: a `ColorType` plus a backend
/// format decide how `write_pixels` lays out texel data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ColorType {
    Unknown,
    Alpha8,
    Rgb565,
    Rgba8888,
    Bgra8888,
    Rg88,
    Gray8,
    AlphaF16,
    RgbaF16,
    RgbaF32,
}

impl ColorType {
    /// Bytes per pixel for tightly packed data of this color type.
    ///
    /// `Unknown` has no defined layout and reports 0; callers treat that as
    /// a validation failure.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ColorType::Unknown => 0,
            ColorType::Alpha8 | ColorType::Gray8 => 1,
            ColorType::Rgb565 | ColorType::Rg88 | ColorType::AlphaF16 => 2,
            ColorType::Rgba8888 | ColorType::Bgra8888 => 4,
            ColorType::RgbaF16 => 8,
            ColorType::RgbaF32 => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel_table() {
        assert_eq!(ColorType::Unknown.bytes_per_pixel(), 0);
        assert_eq!(ColorType::Alpha8.bytes_per_pixel(), 1);
        assert_eq!(ColorType::Rgb565.bytes_per_pixel(), 2);
        assert_eq!(ColorType::Rgba8888.bytes_per_pixel(), 4);
        assert_eq!(ColorType::RgbaF32.bytes_per_pixel(), 16);
    }
}
