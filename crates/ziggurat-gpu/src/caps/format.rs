use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct FormatInfo {
    id: u32,
    name: &'static str,
    bytes_per_block: usize,
    compressed: bool,
}

/// Interned descriptor of a backend texture format.
///
/// Backends create one `BackendFormat` per native format and hand out
/// clones of it; the engine compares formats by identity (`ptr_eq`), never
/// structurally. Cloning shares the interned allocation.
#[derive(Clone)]
pub struct BackendFormat(Arc<FormatInfo>);

impl BackendFormat {
    /// Creates a new canonical format object.
    ///
    /// Intended for backend startup code; call once per native format and
    /// reuse the result, since identity comparison treats two calls with
    /// identical parameters as distinct formats.
    pub fn new(id: u32, name: &'static str, bytes_per_block: usize, compressed: bool) -> Self {
        Self(Arc::new(FormatInfo {
            id,
            name,
            bytes_per_block,
            compressed,
        }))
    }

    /// Stable numeric id, used in capability tables and pipeline keys.
    #[inline]
    pub fn id(&self) -> u32 {
        self.0.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Bytes per pixel (or per block for compressed formats).
    #[inline]
    pub fn bytes_per_block(&self) -> usize {
        self.0.bytes_per_block
    }

    /// Compressed formats take a dedicated upload path and are rejected by
    /// the plain texture factory.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.0.compressed
    }

    /// Identity comparison; formats are canonical objects, not values.
    #[inline]
    pub fn ptr_eq(a: &BackendFormat, b: &BackendFormat) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for BackendFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackendFormat({}, id={})", self.0.name, self.0.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_not_structural_equality() {
        let a = BackendFormat::new(7, "rgba8", 4, false);
        let b = a.clone();
        let c = BackendFormat::new(7, "rgba8", 4, false);
        assert!(BackendFormat::ptr_eq(&a, &b));
        assert!(!BackendFormat::ptr_eq(&a, &c), "same parameters, distinct object");
    }
}
