//! Records one frame against a backend and prints what happened.
//!
//! With `--wgpu` the frame runs on a real headless device; by default it
//! runs on the mock backend, which works everywhere and logs every
//! command it receives.

use std::sync::Arc;

use anyhow::Result;

use ziggurat_gpu::flush::OpFlushState;
use ziggurat_gpu::logging;
use ziggurat_gpu::mock::MockBackend;
use ziggurat_gpu::pipeline::{
    GeometryStep, PipelineFlags, PipelineInfo, VertexAttr, VertexAttrType,
};
use ziggurat_gpu::pool::QuadMesh;
use ziggurat_gpu::proxy::{SurfaceProxy, SurfaceProxyView};
use ziggurat_gpu::server::Server;
use ziggurat_gpu::types::{
    ColorType, IRect, LoadStoreOps, PrimitiveType, SurfaceFlags, SurfaceOrigin, Swizzle,
};

fn main() -> Result<()> {
    logging::init_logging(Default::default());

    let use_wgpu = std::env::args().any(|a| a == "--wgpu");
    let (mut server, format) = if use_wgpu {
        let (backend, caps) = ziggurat_backend_wgpu::WgpuBackend::new_headless()?;
        let format = backend
            .formats()
            .get(wgpu::TextureFormat::Rgba8Unorm)
            .expect("rgba8 is always in the table")
            .clone();
        (Server::new(caps, Box::new(backend)), format)
    } else {
        let (backend, _handle) = MockBackend::new();
        (
            Server::new(MockBackend::caps(), Box::new(backend)),
            MockBackend::rgba8(),
        )
    };

    // A render target and a small uploaded texture.
    let target = server
        .create_texture(
            256,
            256,
            format.clone(),
            1,
            SurfaceFlags::RENDERABLE,
            Some("demo target"),
        )
        .expect("render target creation");
    let atlas = server
        .create_texture(64, 64, format.clone(), 1, SurfaceFlags::empty(), Some("atlas"))
        .expect("texture creation");
    let pixels = vec![0xEEu8; 64 * 64 * 4];
    server.write_pixels(
        &atlas,
        IRect::from_wh(64, 64),
        ColorType::Rgba8888,
        ColorType::Rgba8888,
        64 * 4,
        Some(&pixels),
    );

    let info = PipelineInfo::new(
        format,
        1,
        SurfaceOrigin::UpperLeft,
        Swizzle::RGBA,
        Arc::new(GeometryStep::new(
            "demo quad",
            PrimitiveType::TriangleStrip,
            vec![VertexAttr::new("pos", VertexAttrType::Float2)],
            Vec::new(),
        )),
        None,
        PipelineFlags::empty(),
    );

    // One pass: clear, bind, draw a quad out of pooled vertex space.
    let view = SurfaceProxyView::new(SurfaceProxy::wrapped(target));
    let mut flush = OpFlushState::new(&mut server);

    let mut quad = QuadMesh::new(IRect::from_xywh(32, 32, 128, 128));
    if let Some(writer) = flush.make_vertex_writer(&mut quad) {
        // Clip-space quad corners, x/y interleaved.
        let corners: [f32; 8] = [-0.5, -0.5, 0.5, -0.5, -0.5, 0.5, 0.5, 0.5];
        writer.copy_from_slice(bytemuck::cast_slice(&corners));
    }
    let (vertex_slice, base_vertex) = match quad.vertex_buffer {
        Some((slice, base)) => (Some(slice), base),
        None => (None, 0),
    };

    let opened = flush
        .begin_ops_render_pass(
            &view,
            IRect::from_wh(256, 256),
            LoadStoreOps::CLEAR_STORE,
            LoadStoreOps::DONT_LOAD_DONT_STORE,
            [0.05, 0.05, 0.08, 1.0],
            &[],
            PipelineFlags::empty(),
        )
        .is_some();
    if opened {
        if let Some(pass) = flush.ops_render_pass() {
            pass.bind_pipeline(&info, IRect::from_xywh(32, 32, 128, 128));
        }
        flush.bind_buffers(vertex_slice, None, None);
        if let Some(pass) = flush.ops_render_pass() {
            pass.draw(4, base_vertex);
        }
        flush.end_ops_render_pass();
    } else {
        log::error!("backend refused the render pass");
    }

    server.submit();
    let fence = server.insert_fence();
    server.wait_for_queue();
    log::info!("frame fence signaled: {}", server.check_fence(fence));
    server.delete_fence(fence);

    log::info!("frame stats: {}", server.stats());
    Ok(())
}
