//! Headless render loop
//!
//! Builds a small scene in code, then renders it for a fixed number of frames
//! against the recording backend, cycling through the forward, point-shadow,
//! deferred and ray-traced techniques. Halfway through, the surface is
//! resized to exercise the rebuild path.
//!
//! ```text
//! lumen_demo [--verbose] [--frames N]
//! ```

use clap::Parser;
use lumen_engine::foundation::collections::NodeId;
use lumen_engine::foundation::logging;
use lumen_engine::foundation::math::{utils, Mat4Ext, Transform};
use lumen_engine::prelude::*;
use rand::Rng;
use thiserror::Error;

const DEFAULT_FRAMES: u64 = 240;
const FRAMES_PER_TECHNIQUE: u64 = 30;
const CRATE_COUNT: usize = 12;
const LIGHT_COUNT: usize = 3;
const RESIZED_SURFACE: (u32, u32) = (800, 600);

#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Parser, Debug, Clone, Copy)]
#[command(name = "lumen_demo")]
#[command(about = "Headless frame loop cycling through the Lumen render techniques")]
struct Options {
    /// Number of frames to render
    #[arg(long, env = "LUMEN_DEMO_FRAMES", default_value_t = DEFAULT_FRAMES)]
    frames: u64,

    /// Log at debug level
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Technique {
    Forward,
    PointShadows,
    Deferred,
    RayTraced,
}

impl Technique {
    const ALL: [Self; 4] = [Self::Forward, Self::PointShadows, Self::Deferred, Self::RayTraced];

    fn for_frame(frame: u64) -> Self {
        let index = (frame / FRAMES_PER_TECHNIQUE) % Self::ALL.len() as u64;
        Self::ALL[index as usize]
    }

    fn label(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::PointShadows => "point shadows",
            Self::Deferred => "deferred",
            Self::RayTraced => "ray traced",
        }
    }
}

/// Scene plus the nodes the loop animates
struct DemoScene {
    scene: Scene,
    turntable: NodeId,
    eye: NodeId,
}

impl DemoScene {
    fn build(aspect: f32, rng: &mut impl Rng) -> Result<Self, DemoError> {
        let mut scene = Scene::new("world");
        let root = scene.root();

        let mut floor_material = Material::new("floor");
        floor_material.set_albedo(Vec3::new(0.6, 0.6, 0.55));
        floor_material.set_roughness(0.9);
        let floor_material = scene.add_material(floor_material);

        let mut crate_material = Material::new("crate");
        crate_material.set_albedo(Vec3::new(0.7, 0.45, 0.2));
        crate_material.set_metalness(0.1);
        let crate_material = scene.add_material(crate_material);

        scene.insert_child(
            root,
            Node::mesh("floor", Mesh::new("floor", MeshData::plane(20.0)).with_material(floor_material)),
        )?;

        let turntable = scene.insert_child(root, Node::group("turntable"))?;
        for i in 0..CRATE_COUNT {
            let transform = Transform::from_position(Vec3::new(
                rng.gen_range(-8.0..8.0),
                rng.gen_range(0.5..3.0),
                rng.gen_range(-8.0..8.0),
            ))
            .with_rotation(Vec3::y(), rng.gen_range(0.0..std::f32::consts::TAU))
            .with_uniform_scale(rng.gen_range(0.5..1.5));

            let name = format!("crate {}", i);
            let mesh = Mesh::new(&name, MeshData::cube(0.5)).with_material(crate_material);
            scene.insert_child(turntable, Node::mesh(&name, mesh).with_matrix(transform.to_matrix()))?;
        }

        for i in 0..LIGHT_COUNT {
            let position = Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(8.0..14.0), rng.gen_range(-10.0..10.0));
            let color = Vec3::new(rng.gen_range(0.4..1.0), rng.gen_range(0.4..1.0), rng.gen_range(0.4..1.0));
            let world = utils::inverse_or_identity(&Mat4::look_at(position, Vec3::zeros(), Vec3::y()));
            let light = Light::new().with_color(color).with_shadow_frustum(70.0, 1.0, 60.0);
            scene.insert_child(root, Node::light(&format!("light {}", i), light).with_matrix(world))?;
        }

        let eye_world = utils::inverse_or_identity(&Mat4::look_at(
            Vec3::new(0.0, 8.0, 22.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::y(),
        ));
        let eye = scene.insert_child(
            root,
            Node::camera("eye", Camera::perspective(45.0, aspect, 0.1, 200.0)).with_matrix(eye_world),
        )?;

        log::debug!("Scene graph:\n{}", scene.tree_as_string(root));
        Ok(Self { scene, turntable, eye })
    }

    /// Spin the turntable to the angle of `frame`
    fn animate(&mut self, frame: u64) {
        let angle = frame as f32 * 0.02;
        if let Some(node) = self.scene.get_mut(self.turntable) {
            node.set_local_matrix(Transform::identity().with_rotation(Vec3::y(), angle).to_matrix());
        }
    }

    fn set_aspect(&mut self, aspect: f32) {
        if let Some(camera) = self.scene.get_mut(self.eye).and_then(Node::as_camera_mut) {
            *camera = Camera::perspective(45.0, aspect, 0.1, 200.0);
        }
    }
}

/// Every top-level technique, built lazily on first use
#[derive(Default)]
struct Techniques {
    forward: ForwardPipeline,
    point_shadows: PointShadowPipeline,
    deferred: DeferredPipeline,
    ray_tracer: RayTracingPipeline,
    present: Fullscreen2dPipeline,
}

impl Techniques {
    fn render(
        &mut self,
        technique: Technique,
        engine: &mut Engine,
        camera: &CameraView,
        list: &RenderList<'_>,
    ) -> Result<(), RenderError> {
        let mut ctx = engine.context();
        match technique {
            Technique::Forward => self.forward.render(&mut ctx, camera, list),
            Technique::PointShadows => self.point_shadows.render(&mut ctx, camera, list),
            Technique::Deferred => self.deferred.render(&mut ctx, camera, list),
            Technique::RayTraced => {
                // Geometry moves every frame, so the migrated copy does too
                self.ray_tracer.migrate(&mut ctx, list)?;
                self.ray_tracer.render(&mut ctx, camera)?;
                self.present.render(&mut ctx, self.ray_tracer.color_buffer())
            }
        }
    }

    /// Rebuild surface-sized targets on next use
    fn surface_changed(&mut self) {
        self.deferred.mark_all_dirty();
        self.ray_tracer.mark_dirty();
    }

    fn free(&mut self, engine: &mut Engine) {
        let mut ctx = engine.context();
        self.forward.free(&mut ctx);
        self.point_shadows.free(&mut ctx);
        self.deferred.free(&mut ctx);
        self.ray_tracer.free(&mut ctx);
        self.present.free(&mut ctx);
    }
}

fn run(options: Options) -> Result<(), DemoError> {
    let config = EngineConfigurer::new().configuration();
    let mut engine = Engine::new(config, Box::new(RecordingBackend::new()))?;

    let (width, height) = engine.surface_size();
    let mut rng = rand::thread_rng();
    let mut demo = DemoScene::build(width as f32 / height as f32, &mut rng)?;
    let mut techniques = Techniques::default();
    let mut failed_frames = 0_u64;
    let stopwatch = Stopwatch::start_new();

    for frame in 0..options.frames {
        // Scripted input: one resize halfway through
        if frame == options.frames / 2 {
            let (width, height) = RESIZED_SURFACE;
            engine.resize(width, height)?;
            demo.set_aspect(width as f32 / height as f32);
            techniques.surface_changed();
        }

        demo.animate(frame);
        demo.scene.sync_gpu(&mut engine.context())?;
        let camera = demo.scene.camera_view(demo.eye)?;

        let technique = Technique::for_frame(frame);
        if frame % FRAMES_PER_TECHNIQUE == 0 {
            log::info!("Frame {}: switching to {} rendering", frame, technique.label());
        }

        engine.clear();
        let mut list = RenderList::new();
        list.process(&demo.scene, demo.scene.root())?;
        if let Err(e) = techniques.render(technique, &mut engine, &camera, &list) {
            log::error!("Frame {} ({}): {}", frame, technique.label(), e);
            failed_frames += 1;
        }
        engine.swap();
    }

    let elapsed = stopwatch.elapsed_millis();
    println!(
        "Rendered {} frame(s) in {:.1} ms ({:.3} ms/frame), {} failed",
        engine.frame_nr(),
        elapsed,
        elapsed / engine.frame_nr().max(1) as f32,
        failed_frames
    );
    println!("Before release: {}", engine.registry().report());

    techniques.free(&mut engine);
    demo.scene.free_gpu(&mut engine.context());
    let summary = engine.shutdown();
    println!(
        "Shutdown released {} leftover object(s), {} backend object(s) destroyed",
        summary.released, summary.destroyed
    );
    Ok(())
}

fn main() {
    let options = Options::parse();

    if options.verbose {
        logging::init_with_level(logging::LevelFilter::Debug);
    } else {
        logging::init();
    }

    log::info!("Starting Lumen demo ({} frames)", options.frames);
    if let Err(e) = run(options) {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = Options::try_parse_from(["lumen_demo"]).unwrap();
        assert_eq!(options.frames, DEFAULT_FRAMES);
        assert!(!options.verbose);
    }

    #[test]
    fn test_options_flags() {
        let options = Options::try_parse_from(["lumen_demo", "--frames=10", "-v"]).unwrap();
        assert_eq!(options.frames, 10);
        assert!(options.verbose);

        let options = Options::try_parse_from(["lumen_demo", "--frames", "3", "--verbose"]).unwrap();
        assert_eq!(options.frames, 3);
        assert!(options.verbose);
    }

    #[test]
    fn test_options_rejects_bad_input() {
        assert!(Options::try_parse_from(["lumen_demo", "--frames", "many"]).is_err());
        assert!(Options::try_parse_from(["lumen_demo", "--bogus"]).is_err());
    }

    #[test]
    fn test_technique_cycle() {
        assert_eq!(Technique::for_frame(0), Technique::Forward);
        assert_eq!(Technique::for_frame(FRAMES_PER_TECHNIQUE), Technique::PointShadows);
        assert_eq!(Technique::for_frame(FRAMES_PER_TECHNIQUE * 4), Technique::Forward);
    }
}
