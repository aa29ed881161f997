//! # Lumen Engine
//!
//! Render orchestration core: a scene graph flattened into a render list,
//! lazily built render pipelines that compose into multi-pass techniques,
//! and a registry that tracks every GPU-resident object until shutdown.
//!
//! ## Features
//!
//! - **Scene graph**: arena-backed node tree with camera, light and mesh nodes
//! - **Render list**: lights first, meshes last, world matrices precomputed
//! - **Pipelines**: forward, point-shadow, deferred and compute ray tracing
//! - **Resource registry**: deterministic release and leak reporting
//! - **Headless backend**: records every GPU call for tests and tooling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumen_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfigurer::new().configuration();
//!     let mut engine = Engine::new(config, Box::new(RecordingBackend::new()))?;
//!
//!     let mut scene = Scene::default();
//!     let root = scene.root();
//!     scene.insert_child(root, Node::light("sun", Light::new()))?;
//!     scene.insert_child(root, Node::mesh("box", Mesh::new("box", MeshData::cube(1.0))))?;
//!     let eye = scene.insert_child(root, Node::camera("eye", Camera::default()))?;
//!
//!     let mut forward = ForwardPipeline::default();
//!     scene.sync_gpu(&mut engine.context())?;
//!     let camera = scene.camera_view(eye)?;
//!
//!     engine.clear();
//!     let mut list = RenderList::new();
//!     list.process(&scene, root)?;
//!     forward.render(&mut engine.context(), &camera, &list)?;
//!     engine.swap();
//!
//!     forward.free(&mut engine.context());
//!     scene.free_gpu(&mut engine.context());
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

mod engine;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::{EngineConfig, EngineConfigurer, Identity, RendererConfig},
        foundation::{
            math::{Mat4, Vec3},
            time::{Stopwatch, Timer},
        },
        render::{
            Camera, CameraView, DeferredPipeline, ForwardPipeline, Fullscreen2dPipeline, Light,
            Material, Mesh, MeshData, Pipeline, PointShadowPipeline, RayTracingPipeline,
            RecordingBackend, RenderContext, RenderError,
        },
        scene::{Node, RenderList, RenderPass, Scene, SceneError},
        Engine, EngineError,
    };
}
