//! Shared ownership for GPU-backed objects.
//!
//! Everything with a GPU allocation behind it (textures, render targets,
//! buffers) is handled through [`Shared`], an intrusive atomic refcount with
//! RAII semantics. [`leaks`] provides the debug-only live-instance registry
//! used by tests and shutdown hooks.

pub mod leaks;
mod shared;

pub use shared::Shared;
