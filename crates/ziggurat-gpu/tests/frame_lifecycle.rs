//! Full-frame flow through the public API, driven by the mock backend.

use std::sync::Arc;

use ziggurat_gpu::flush::OpFlushState;
use ziggurat_gpu::mock::{MockBackend, MockCommand};
use ziggurat_gpu::pipeline::{
    GeometryStep, PipelineFlags, PipelineInfo, VertexAttr, VertexAttrType,
};
use ziggurat_gpu::pool::QuadMesh;
use ziggurat_gpu::proxy::{SurfaceProxy, SurfaceProxyView};
use ziggurat_gpu::server::Server;
use ziggurat_gpu::types::{
    ColorType, IRect, LoadStoreOps, PrimitiveType, SurfaceFlags, SurfaceOrigin, Swizzle,
};

fn quad_info() -> PipelineInfo {
    PipelineInfo::new(
        MockBackend::rgba8(),
        1,
        SurfaceOrigin::UpperLeft,
        Swizzle::RGBA,
        Arc::new(GeometryStep::new(
            "quad",
            PrimitiveType::TriangleStrip,
            vec![VertexAttr::new("pos", VertexAttrType::Float2)],
            Vec::new(),
        )),
        None,
        PipelineFlags::empty(),
    )
}

#[test]
fn one_frame_upload_draw_submit_fence() {
    let (backend, handle) = MockBackend::new();
    let mut server = Server::new(MockBackend::caps(), Box::new(backend));

    let target = server
        .create_texture(
            128,
            128,
            MockBackend::rgba8(),
            1,
            SurfaceFlags::RENDERABLE,
            Some("target"),
        )
        .unwrap();
    let atlas = server
        .create_texture(32, 32, MockBackend::rgba8(), 1, SurfaceFlags::empty(), None)
        .unwrap();
    let pixels = vec![0x7Fu8; 32 * 32 * 4];
    assert!(server.write_pixels(
        &atlas,
        IRect::from_wh(32, 32),
        ColorType::Rgba8888,
        ColorType::Rgba8888,
        32 * 4,
        Some(&pixels),
    ));

    let view = SurfaceProxyView::new(SurfaceProxy::wrapped(target));
    let mut flush = OpFlushState::new(&mut server);

    let mut quad = QuadMesh::new(IRect::from_xywh(8, 8, 64, 64));
    let writer = flush.make_vertex_writer(&mut quad).unwrap();
    writer.fill(0);
    let (slice, base_vertex) = quad.vertex_buffer.unwrap();

    assert!(
        flush
            .begin_ops_render_pass(
                &view,
                IRect::from_wh(128, 128),
                LoadStoreOps::CLEAR_STORE,
                LoadStoreOps::DONT_LOAD_DONT_STORE,
                [0.0, 0.0, 0.0, 1.0],
                &[],
                PipelineFlags::empty(),
            )
            .is_some()
    );
    let info = quad_info();
    flush
        .ops_render_pass()
        .unwrap()
        .bind_pipeline(&info, IRect::from_xywh(8, 8, 64, 64));
    flush.bind_buffers(Some(slice), None, None);
    flush.ops_render_pass().unwrap().draw(4, base_vertex);
    flush.end_ops_render_pass();

    server.submit();
    let fence = server.insert_fence();
    server.wait_for_queue();
    assert!(server.check_fence(fence));
    server.delete_fence(fence);

    let stats = server.stats();
    assert_eq!(stats.num_textures_created(), 2);
    assert_eq!(stats.num_texture_uploads(), 1);
    assert_eq!(stats.num_render_passes(), 1);
    assert_eq!(stats.num_draws(), 1);
    assert_eq!(stats.num_failed_draws(), 0);
    assert_eq!(stats.num_submits(), 1);

    // The backend saw the clear first and the end last, with the draw
    // in between.
    let commands = handle.commands();
    assert!(matches!(commands.first(), Some(MockCommand::ClearColor { .. })));
    assert!(matches!(commands.last(), Some(MockCommand::EndPass { .. })));
    assert!(
        commands
            .iter()
            .any(|c| matches!(c, MockCommand::Draw { vertex_count: 4, .. }))
    );
}

#[test]
fn pooled_space_is_recycled_across_submits() {
    let (backend, _) = MockBackend::new();
    let mut server = Server::new(MockBackend::caps(), Box::new(backend));

    let first = {
        let mut flush = OpFlushState::new(&mut server);
        let mut quad = QuadMesh::new(IRect::from_wh(4, 4));
        flush.make_vertex_space(&mut quad).unwrap()
    };
    server.submit();
    let second = {
        let mut flush = OpFlushState::new(&mut server);
        let mut quad = QuadMesh::new(IRect::from_wh(4, 4));
        flush.make_vertex_space(&mut quad).unwrap()
    };
    assert_eq!(first, second, "same placement after the pool resets");
}
