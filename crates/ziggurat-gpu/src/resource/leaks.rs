//! Debug registry of live ref-counted resources.
//!
//! Active under `cargo test` and with the `leak-tracking` feature;
//! otherwise every entry point compiles to a no-op. A test harness or
//! shutdown hook calls [`assert_empty`] to turn a reference leak into a
//! hard failure instead of a silent GPU memory loss.

#[cfg(any(test, feature = "leak-tracking"))]
mod imp {
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};

    fn registry() -> &'static Mutex<HashMap<usize, &'static str>> {
        static REGISTRY: OnceLock<Mutex<HashMap<usize, &'static str>>> = OnceLock::new();
        REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
    }

    pub(crate) fn register(addr: usize, type_name: &'static str) {
        let mut map = registry().lock().unwrap();
        let prev = map.insert(addr, type_name);
        debug_assert!(prev.is_none(), "address registered twice: {addr:#x}");
    }

    pub(crate) fn unregister(addr: usize) {
        let mut map = registry().lock().unwrap();
        let prev = map.remove(&addr);
        debug_assert!(prev.is_some(), "unregistering unknown address: {addr:#x}");
    }

    pub fn live_count() -> usize {
        registry().lock().unwrap().len()
    }

    pub fn assert_empty() {
        let map = registry().lock().unwrap();
        if !map.is_empty() {
            for (addr, type_name) in map.iter() {
                log::error!("leaked resource {type_name} at {addr:#x}");
            }
            panic!("{} ref-counted resource(s) leaked", map.len());
        }
    }
}

#[cfg(any(test, feature = "leak-tracking"))]
pub use imp::{assert_empty, live_count};

#[cfg(any(test, feature = "leak-tracking"))]
pub(crate) use imp::{register, unregister};

#[cfg(not(any(test, feature = "leak-tracking")))]
mod imp {
    #[inline]
    pub(crate) fn register(_addr: usize, _type_name: &'static str) {}

    #[inline]
    pub(crate) fn unregister(_addr: usize) {}

    /// Always 0 when tracking is compiled out.
    #[inline]
    pub fn live_count() -> usize {
        0
    }

    #[inline]
    pub fn assert_empty() {}
}

#[cfg(not(any(test, feature = "leak-tracking")))]
pub use imp::{assert_empty, live_count};

#[cfg(not(any(test, feature = "leak-tracking")))]
pub(crate) use imp::{register, unregister};
