//! Pipeline orchestration tests
//!
//! Drive whole pipelines against the recording backend and assert on the
//! submitted command stream.

use super::*;
use crate::core::RendererConfig;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::api::{BlendMode, FrameState, PolygonMode, TextureKind, UniformValue};
use crate::render::backends::{GpuCommand, RecordingBackend};
use crate::render::primitives::{Camera, CameraView, Light, Material, Mesh, MeshData};
use crate::render::resources::{ResourceKind, ResourceRegistry};
use crate::scene::{Node, Scene};

const SURFACE: (u32, u32) = (640, 480);

struct Harness {
    backend: RecordingBackend,
    registry: ResourceRegistry,
    frame: FrameState,
    settings: RendererConfig,
}

impl Harness {
    fn new() -> Self {
        Self {
            backend: RecordingBackend::new(),
            registry: ResourceRegistry::new(),
            frame: FrameState::default(),
            settings: RendererConfig::default(),
        }
    }

    fn ctx(&mut self) -> RenderContext<'_> {
        RenderContext::new(&mut self.backend, &mut self.registry, &mut self.frame, &self.settings, SURFACE)
    }

    fn draws(&self) -> usize {
        self.backend.count(|c| matches!(c, GpuCommand::DrawIndexed { .. }))
    }

    fn position_of(&self, predicate: impl Fn(&GpuCommand) -> bool) -> Option<usize> {
        self.backend.commands().iter().position(predicate)
    }
}

/// Scene with `lights` lights, two meshes and a camera, already uploaded
fn build_scene(harness: &mut Harness, lights: usize) -> (Scene, CameraView) {
    let mut scene = Scene::new("root");
    let root = scene.root();
    let steel = scene.add_material(Material::new("steel"));

    for i in 0..lights {
        let position = Mat4::new_translation(&Vec3::new(i as f32 * 5.0, 10.0, 0.0));
        scene
            .insert_child(root, Node::light(&format!("light {}", i), Light::new().with_shadow_frustum(90.0, 1.0, 100.0)).with_matrix(position))
            .unwrap();
    }
    scene
        .insert_child(root, Node::mesh("floor", Mesh::new("floor", MeshData::plane(10.0)).with_material(steel)))
        .unwrap();
    scene
        .insert_child(root, Node::mesh("box", Mesh::new("box", MeshData::cube(1.0))))
        .unwrap();
    let eye = scene
        .insert_child(
            root,
            Node::camera("eye", Camera::perspective(45.0, 640.0 / 480.0, 0.1, 500.0))
                .with_matrix(Mat4::new_translation(&Vec3::new(0.0, 2.0, 15.0))),
        )
        .unwrap();

    scene.sync_gpu(&mut harness.ctx()).unwrap();
    let camera = scene.camera_view(eye).unwrap();
    harness.backend.clear_commands();
    (scene, camera)
}

#[test]
fn test_single_light_never_blends() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 1);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut forward = ForwardPipeline::default();
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert!(harness.backend.blend_changes().is_empty());
}

#[test]
fn test_three_lights_blend_bracket() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 3);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut forward = ForwardPipeline::default();
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert_eq!(harness.backend.blend_changes(), vec![BlendMode::Additive, BlendMode::Disabled]);

    // Enabled after the first light's meshes, disabled after the last draw
    let enable = harness
        .position_of(|c| *c == GpuCommand::SetBlendMode(BlendMode::Additive))
        .unwrap();
    let disable = harness
        .position_of(|c| *c == GpuCommand::SetBlendMode(BlendMode::Disabled))
        .unwrap();
    let first_draw = harness
        .position_of(|c| matches!(c, GpuCommand::DrawIndexed { .. }))
        .unwrap();
    let last_draw = harness
        .backend
        .commands()
        .iter()
        .rposition(|c| matches!(c, GpuCommand::DrawIndexed { .. }))
        .unwrap();
    assert!(first_draw < enable);
    assert!(last_draw < disable);

    // Each light: one shadow pass and one lit pass over both meshes
    assert_eq!(harness.draws(), 3 * 2 * 2);
    assert_eq!(harness.backend.uniform_values("lightPosition").len(), 3);
}

#[test]
fn test_lazy_build_fires_once() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 1);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut forward = ForwardPipeline::new("main");
    assert!(forward.is_dirty());

    forward.render(&mut harness.ctx(), &camera, &list).unwrap();
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert!(!forward.is_dirty());
    assert_eq!(forward.build_count(), 1);
    assert_eq!(forward.shadow_pipeline().build_count(), 1);
    assert_eq!(harness.backend.created_programs(), vec!["main", "main shadows"]);
    assert_eq!(harness.registry.count_of(ResourceKind::Pipeline), 2);
}

#[test]
fn test_mark_dirty_rebuilds_and_replaces_program() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 1);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut forward = ForwardPipeline::new("main");
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();
    let first = forward.core().program().handle(&harness.registry).unwrap();

    forward.mark_dirty();
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert_eq!(forward.build_count(), 2);
    assert!(harness.backend.destroyed().contains(&first));
    assert_eq!(harness.registry.count_of(ResourceKind::Pipeline), 2);
}

#[test]
fn test_failed_shadow_pass_degrades() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 2);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();
    harness.backend.fail_programs_matching("shadows");

    let mut forward = ForwardPipeline::new("main");
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert!(forward.shadow_pipeline().is_dirty());
    // Meshes still lit by both lights, with no shadow map bound
    assert_eq!(harness.draws(), 2 * 2);
    assert_eq!(
        harness.backend.count(|c| matches!(c, GpuCommand::BindTexture { unit: SHADOW_MAP_UNIT, .. })),
        0
    );
    assert_eq!(harness.backend.blend_changes(), vec![BlendMode::Additive, BlendMode::Disabled]);
}

#[test]
fn test_failed_light_still_closes_blend_and_wireframe() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 3);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();
    // Light 0 shadow and lit passes, then light 1 shadow pass; light 1's lit pass fails
    harness.backend.fail_draws_after(6);

    let mut forward = ForwardPipeline::default();
    forward.set_wireframe(true);
    let result = forward.render(&mut harness.ctx(), &camera, &list);

    assert!(matches!(result, Err(RenderError::BackendError(_))));
    assert_eq!(harness.draws(), 6);
    assert_eq!(harness.backend.blend_changes(), vec![BlendMode::Additive, BlendMode::Disabled]);
    let modes: Vec<_> = harness
        .backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            GpuCommand::SetPolygonMode(mode) => Some(*mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![PolygonMode::Line, PolygonMode::Fill]);
    // Light 2 was never reached
    assert_eq!(harness.backend.uniform_values("lightPosition").len(), 2);
}

#[test]
fn test_incomplete_shadow_framebuffer_degrades() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 1);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();
    harness.backend.set_incomplete_framebuffers(true);

    let mut forward = ForwardPipeline::new("main");
    assert!(forward.render(&mut harness.ctx(), &camera, &list).is_ok());
    assert!(forward.shadow_pipeline().is_dirty());
    assert_eq!(harness.draws(), 2);
}

#[test]
fn test_build_failure_aborts_then_retries() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 1);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut forward = ForwardPipeline::new("main");
    harness.backend.fail_programs_matching("main");
    let result = forward.render(&mut harness.ctx(), &camera, &list);

    assert!(matches!(result, Err(RenderError::BuildFailed(_))));
    assert!(forward.is_dirty());
    assert_eq!(harness.draws(), 0);
    assert!(forward.core().is_initialized(&harness.registry));

    harness.backend.clear_failures();
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert!(!forward.is_dirty());
    assert_eq!(forward.build_count(), 1);
    // Registration survived the failure; it is not repeated
    assert_eq!(harness.registry.count_of(ResourceKind::Pipeline), 2);
}

#[test]
fn test_empty_list_touches_nothing() {
    let mut harness = Harness::new();
    let camera = CameraView::new(Mat4::identity(), Mat4::identity());
    let list = RenderList::new();

    let mut forward = ForwardPipeline::default();
    let result = forward.render(&mut harness.ctx(), &camera, &list);

    assert!(matches!(result, Err(RenderError::InvalidParams(_))));
    assert!(harness.backend.commands().is_empty());
    assert!(harness.registry.is_empty());
}

#[test]
fn test_wireframe_is_toggled_around_the_pass() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 2);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut forward = ForwardPipeline::default();
    forward.set_wireframe(true);
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();

    let modes: Vec<_> = harness
        .backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            GpuCommand::SetPolygonMode(mode) => Some(*mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![PolygonMode::Line, PolygonMode::Fill]);
}

#[test]
fn test_forward_records_frame_state() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 1);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut forward = ForwardPipeline::default();
    forward.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert_eq!(harness.frame.last_camera(), Some(&camera));
    // The shadow sub-pass started last
    assert_eq!(harness.frame.last_pipeline(), Some(forward.shadow_pipeline().id()));
    assert_eq!(
        harness.frame.last_program(),
        forward.core().program().handle(&harness.registry)
    );
}

#[test]
fn test_point_shadows_use_cubemap() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 2);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut pipeline = PointShadowPipeline::default();
    pipeline.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert_eq!(
        harness.backend.count(|c| matches!(c, GpuCommand::CreateTexture { desc, .. } if desc.kind == TextureKind::Cubemap)),
        1
    );
    assert_eq!(
        harness.backend.count(|c| matches!(c, GpuCommand::BindTexture { unit: SHADOW_CUBE_UNIT, .. })),
        2
    );
    match harness.backend.uniform_values("projections").first() {
        Some(UniformValue::Mat4Array(faces)) => assert_eq!(faces.len(), 6),
        other => panic!("unexpected projections {:?}", other),
    }
    assert!(harness
        .backend
        .uniform_values("farPlane")
        .iter()
        .all(|value| **value == UniformValue::Float(1000.0)));
    assert_eq!(harness.backend.blend_changes(), vec![BlendMode::Additive, BlendMode::Disabled]);
}

#[test]
fn test_failed_cubemap_pass_degrades() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 2);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();
    harness.backend.fail_programs_matching("cubemap");

    let mut pipeline = PointShadowPipeline::default();
    pipeline.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert!(pipeline.shadow_pipeline().is_dirty());
    assert_eq!(harness.draws(), 2 * 2);
    assert_eq!(
        harness.backend.count(|c| matches!(c, GpuCommand::BindTexture { unit: SHADOW_CUBE_UNIT, .. })),
        0
    );
    assert_eq!(harness.backend.blend_changes(), vec![BlendMode::Additive, BlendMode::Disabled]);
}

#[test]
fn test_deferred_requires_a_light() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 0);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut deferred = DeferredPipeline::default();
    let result = deferred.render(&mut harness.ctx(), &camera, &list);
    assert!(matches!(result, Err(RenderError::InvalidParams(_))));
    assert!(harness.backend.commands().is_empty());
}

#[test]
fn test_deferred_runs_stages_in_order() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 2);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut deferred = DeferredPipeline::default();
    deferred.render(&mut harness.ctx(), &camera, &list).unwrap();

    // G-buffer at surface size: three color targets and depth
    assert_eq!(
        harness.backend.count(|c| matches!(c, GpuCommand::CreateFramebuffer { colors: 3, depth: true, .. })),
        1
    );
    let gbuffer = deferred.geometry().targets();
    assert_eq!(gbuffer.position.size(), Some(SURFACE));

    // Geometry and shadow passes draw the meshes, lighting draws one triangle
    assert_eq!(harness.draws(), 2 + 2);
    assert_eq!(harness.backend.count(|c| *c == GpuCommand::DrawFullscreen), 1);
    assert_eq!(harness.backend.commands().last(), Some(&GpuCommand::DrawFullscreen));
    assert_eq!(harness.frame.last_pipeline(), Some(deferred.lighting().id()));

    // Only light 0 casts the shadow
    assert_eq!(harness.backend.uniform_values("lightCol").len(), 1);
    assert!(harness.backend.blend_changes().is_empty());
}

#[test]
fn test_deferred_lights_without_failed_shadow_stage() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 1);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();
    harness.backend.fail_programs_matching("shadows");

    let mut deferred = DeferredPipeline::default();
    deferred.render(&mut harness.ctx(), &camera, &list).unwrap();

    assert!(deferred.shadow_pipeline().is_dirty());
    assert!(!deferred.lighting().is_dirty());
    // Geometry pass only, then the lighting triangle with no shadow map bound
    assert_eq!(harness.draws(), 2);
    assert_eq!(harness.backend.count(|c| *c == GpuCommand::DrawFullscreen), 1);
    assert_eq!(
        harness.backend.count(|c| matches!(c, GpuCommand::BindTexture { unit: SHADOW_MAP_UNIT, .. })),
        0
    );
    assert_eq!(harness.backend.uniform_values("lightCol").len(), 1);
}

#[test]
fn test_geometry_needs_a_camera() {
    let mut harness = Harness::new();
    let (scene, _) = build_scene(&mut harness, 1);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut geometry = GeometryPipeline::default();
    let result = geometry.render(&mut harness.ctx(), &Mat4::identity(), &list);
    assert!(matches!(result, Err(RenderError::MissingCamera)));
}

#[test]
fn test_raytracing_migrates_and_dispatches() {
    let mut harness = Harness::new();
    let (scene, camera) = build_scene(&mut harness, 2);
    let mut list = RenderList::new();
    list.process(&scene, scene.root()).unwrap();

    let mut tracer = RayTracingPipeline::default();
    assert!(matches!(
        tracer.render(&mut harness.ctx(), &camera),
        Err(RenderError::InvalidParams(_))
    ));

    tracer.migrate(&mut harness.ctx(), &list).unwrap();
    assert_eq!(tracer.migrated_counts(), Some([2 + 12, 2, 2]));

    tracer.render(&mut harness.ctx(), &camera).unwrap();

    let commands = harness.backend.commands();
    assert_eq!(commands[commands.len() - 2], GpuCommand::Dispatch([80, 60, 1]));
    assert_eq!(commands.last(), Some(&GpuCommand::MemoryBarrier));
    assert_eq!(harness.backend.count(|c| matches!(c, GpuCommand::BindStorageBuffer { .. })), 3);
    assert_eq!(harness.backend.uniform_values("nrOfTriangles"), vec![&UniformValue::Uint(14)]);
    assert_eq!(harness.draws(), 0);

    // Present the result
    let mut blit = Fullscreen2dPipeline::default();
    blit.render(&mut harness.ctx(), tracer.color_buffer()).unwrap();
    assert_eq!(harness.backend.commands().last(), Some(&GpuCommand::DrawFullscreen));
}

#[test]
fn test_free_releases_everything() {
    let mut harness = Harness::new();
    let (mut scene, camera) = build_scene(&mut harness, 2);

    let mut forward = ForwardPipeline::default();
    let mut deferred = DeferredPipeline::default();
    {
        let mut list = RenderList::new();
        list.process(&scene, scene.root()).unwrap();
        forward.render(&mut harness.ctx(), &camera, &list).unwrap();
        deferred.render(&mut harness.ctx(), &camera, &list).unwrap();
    }

    assert!(forward.free(&mut harness.ctx()));
    assert!(deferred.free(&mut harness.ctx()));
    scene.free_gpu(&mut harness.ctx());

    assert_eq!(harness.registry.check_leaks(), 0);
    assert_eq!(harness.backend.live_objects(), 0);
    // Freeing does not re-arm the lazy build
    assert!(!forward.is_dirty());
    assert!(!forward.free(&mut harness.ctx()));
}
