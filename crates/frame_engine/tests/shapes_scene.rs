//! End-to-end frame loop over the shapes scene on the host backend
//!
//! Recorded commands are "executed" by reading the arenas at the offsets
//! they bind, which is exactly what the device would see.

use std::sync::Arc;

use approx::assert_relative_eq;
use frame_engine::config::FrameResourceConfig;
use frame_engine::foundation::math::{Mat4, Mat4Ext};
use frame_engine::render::backends::{DrawCommand, HostDevice, HostRecorder};
use frame_engine::render::scene::shapes::{
    build_shapes_scene, shapes_geometry_layout, SHAPES_ITEM_COUNT, SHAPES_VERTEX_STRIDE,
};
use frame_engine::render::{
    BufferUsage, DeviceBuffer, DirtyState, FrameResources, IndexFormat, MeshGeometry, ObjectConstants,
    OrbitCamera, PassConstants, UniformSlot,
};

struct ShapesFixture {
    resources: FrameResources<HostDevice>,
    _indices: DeviceBuffer<HostDevice>,
    _vertices: DeviceBuffer<HostDevice>,
    device: Arc<HostDevice>,
}

fn fixture(slots: usize, latency: u64) -> ShapesFixture {
    let device = Arc::new(HostDevice::new(256).with_latency(latency));
    let layout = shapes_geometry_layout().expect("layout");
    let vertices = DeviceBuffer::new(
        device.clone(),
        u64::from(layout.vertex_count()) * u64::from(SHAPES_VERTEX_STRIDE),
        BufferUsage::VERTEX,
    )
    .expect("vertex buffer");
    let indices = DeviceBuffer::new(
        device.clone(),
        u64::from(layout.index_count()) * IndexFormat::U16.size_bytes(),
        BufferUsage::INDEX,
    )
    .expect("index buffer");

    let config = FrameResourceConfig::new("shapes test").with_frame_slot_count(slots);
    let mut resources = FrameResources::new(device.clone(), &config).expect("frame resources");
    resources.validate_pipeline_object_range(256).expect("object range");

    let mesh = resources.register_geometry(MeshGeometry::new(
        "shapes",
        &layout,
        vertices.handle(),
        indices.handle(),
        SHAPES_VERTEX_STRIDE,
        IndexFormat::U16,
    ));
    let count = build_shapes_scene(&mut resources, mesh).expect("scene");
    assert_eq!(count, SHAPES_ITEM_COUNT);

    ShapesFixture { resources, _indices: indices, _vertices: vertices, device }
}

/// What one recorded frame reads from the arenas
struct ExecutedFrame {
    pass: PassConstants,
    worlds: Vec<Mat4>,
    index_counts: Vec<u32>,
}

fn execute(resources: &FrameResources<HostDevice>, recorder: &HostRecorder) -> ExecutedFrame {
    let mut pass = None;
    let mut object_offset = None;
    let mut worlds = Vec::new();
    let mut index_counts = Vec::new();

    for command in recorder.commands() {
        match *command {
            DrawCommand::BindUniform { slot: UniformSlot::Pass, buffer, offset, .. } => {
                assert_eq!(buffer, resources.pass_arena().buffer());
                pass = Some(resources.pass_arena().read_at::<PassConstants>(offset).expect("pass read"));
            }
            DrawCommand::BindUniform { slot: UniformSlot::Object, buffer, offset, range } => {
                assert_eq!(buffer, resources.object_arena().buffer());
                assert_eq!(range, resources.object_arena().stride());
                object_offset = Some(offset);
            }
            DrawCommand::DrawIndexed { index_count, .. } => {
                let offset = object_offset.expect("object range bound before draw");
                let constants: ObjectConstants = resources.object_arena().read_at(offset).expect("object read");
                worlds.push(constants.world_matrix());
                index_counts.push(index_count);
            }
            DrawCommand::BindVertexBuffer { .. } | DrawCommand::BindIndexBuffer { .. } => {}
        }
    }

    ExecutedFrame {
        pass: pass.expect("pass range bound"),
        worlds,
        index_counts,
    }
}

fn box_world(t: f32) -> Mat4 {
    Mat4::translation(0.0, 0.5 + t, 0.0) * Mat4::scaling(2.0, 2.0, 2.0)
}

#[test]
fn test_every_draw_reads_the_latest_transform() {
    let mut fixture = fixture(3, 2);
    let camera = OrbitCamera::default();

    for frame in 0..12u16 {
        let t = f32::from(frame) * 0.25;
        let resources = &mut fixture.resources;
        let ctx = resources.on_frame_begin().expect("begin");

        // Only the box moves, and only on even frames
        if frame % 2 == 0 {
            resources.update_object_transform(0, box_world(t)).expect("move box");
        }
        let pass = PassConstants::from_parameters(&camera.pass_parameters(800, 600, t, 0.25));
        resources.update_pass_constants(ctx, &pass).expect("pass");

        let mut recorder = HostRecorder::new();
        let stats = resources.record_draws(ctx, &mut recorder).expect("record");
        assert_eq!(stats.draws as usize, SHAPES_ITEM_COUNT);

        let executed = execute(resources, &recorder);
        assert_eq!(executed.pass, pass);
        for (item, world) in resources.objects().iter().zip(&executed.worlds) {
            assert_eq!(world, item.world_transform());
        }

        let fence = fixture.device.submit();
        resources.end_frame(ctx, fence).expect("end");
    }

    assert_eq!(fixture.resources.total_fence_waits(), 0);
}

#[test]
fn test_in_flight_slots_are_left_alone() {
    let mut fixture = fixture(3, 2);
    let mut snapshots: Vec<(usize, Mat4)> = Vec::new();

    for frame in 0..9u16 {
        let resources = &mut fixture.resources;
        let ctx = resources.on_frame_begin().expect("begin");
        resources.update_object_transform(0, box_world(f32::from(frame))).expect("move box");

        let mut recorder = HostRecorder::new();
        resources.record_draws(ctx, &mut recorder).expect("record");
        let executed = execute(resources, &recorder);
        snapshots.push((ctx.frame_index(), executed.worlds[0]));

        // The previous two frames may still be executing; their slots must
        // still hold what they were recorded with
        for (slot, world) in snapshots.iter().rev().skip(1).take(2) {
            let held = resources.object_arena().read::<ObjectConstants>(*slot, 0).expect("read");
            assert_eq!(held.world_matrix(), *world);
        }

        let fence = fixture.device.submit();
        resources.end_frame(ctx, fence).expect("end");
    }
}

#[test]
fn test_static_scene_goes_quiet() {
    let mut fixture = fixture(3, 2);
    let mut writes = Vec::new();

    for _ in 0..6 {
        let resources = &mut fixture.resources;
        let ctx = resources.on_frame_begin().expect("begin");
        let mut recorder = HostRecorder::new();
        let stats = resources.record_draws(ctx, &mut recorder).expect("record");
        writes.push(stats.object_writes);
        let fence = fixture.device.submit();
        resources.end_frame(ctx, fence).expect("end");
    }

    assert_eq!(writes, vec![22, 22, 22, 0, 0, 0]);
    for index in 0..SHAPES_ITEM_COUNT {
        assert_eq!(fixture.resources.dirty_state(index).expect("state"), DirtyState::Clean);
    }
}

#[test]
fn test_scene_draw_arguments() {
    let mut fixture = fixture(3, 0);
    let resources = &mut fixture.resources;
    let ctx = resources.on_frame_begin().expect("begin");
    let mut recorder = HostRecorder::new();
    let stats = resources.record_draws(ctx, &mut recorder).expect("record");

    let executed = execute(resources, &recorder);
    assert_eq!(executed.index_counts[0], 36);
    assert_eq!(executed.index_counts[1], 13_806);
    assert_eq!(&executed.index_counts[2..6], &[2520, 2520, 2280, 2280]);
    assert_eq!(stats.indices, 36 + 13_806 + 5 * (2 * 2520 + 2 * 2280));

    // Box origin sits half a unit up
    let origin = executed.worlds[0] * frame_engine::foundation::math::Vec4::new(0.0, 0.0, 0.0, 1.0);
    assert_relative_eq!(origin.y, 0.5);
}

#[test]
fn test_two_slots_stall_behind_a_deep_queue() {
    let mut fixture = fixture(2, 2);

    for _ in 0..8 {
        let resources = &mut fixture.resources;
        let ctx = resources.on_frame_begin().expect("begin");
        let mut recorder = HostRecorder::new();
        resources.record_draws(ctx, &mut recorder).expect("record");
        let fence = fixture.device.submit();
        resources.end_frame(ctx, fence).expect("end");
    }

    assert_eq!(fixture.resources.total_fence_waits(), 6);
    assert_eq!(fixture.device.fence_waits(), 6);
}
