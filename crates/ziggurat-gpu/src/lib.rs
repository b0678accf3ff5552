//! Ziggurat GPU core.
//!
//! This crate owns the backend-agnostic half of the renderer: ref-counted
//! GPU resources, the validating [`Server`](server::Server) façade, deferred
//! surface proxies, pipeline description/keying, and the per-flush render
//! pass lifecycle. Concrete 3D API behavior (wgpu, GL, ...) is supplied by a
//! [`GpuBackend`](backend::GpuBackend) implementation.
//!
//! Threading convention: unless a type says otherwise, everything here is
//! expected on the one designated render thread. Cross-thread work enters
//! only through [`render_thread::RenderCallQueue`].

pub mod backend;
pub mod buffer;
pub mod caps;
pub mod flush;
pub mod mock;
pub mod pass;
pub mod pipeline;
pub mod pool;
pub mod proxy;
pub mod render_thread;
pub mod resource;
pub mod server;
pub mod texture;
pub mod types;

pub mod logging;
