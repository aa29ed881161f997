//! # Rendering System
//!
//! Orchestration of render passes over a flattened scene.
//!
//! ## Architecture
//!
//! - **API**: the [`GpuBackend`] seam and the per-frame [`RenderContext`]
//! - **Backends**: concrete backend implementations (currently a headless recorder)
//! - **Resources**: the GPU resource registry and the object wrappers it tracks
//! - **Primitives**: cameras, lights, meshes and materials
//! - **Pipeline**: the lazily built render passes and their composition
//!
//! ## Frame flow
//!
//! The application mutates the [`Scene`](crate::scene::Scene), rebuilds a
//! [`RenderList`](crate::scene::RenderList) from the root, and hands it to a
//! top-level pipeline. Pipelines build their programs and targets on first
//! use, iterate the lights of the list and draw its mesh segment once per
//! light, accumulating the results additively.

pub mod api;
pub mod backends;
pub mod pipeline;
pub mod primitives;
pub mod resources;

pub use api::{
    BackendResult, BlendMode, BufferUsage, ClearFlags, CullMode, DrawInfo, Drawable, FrameState,
    GpuBackend, GpuHandle, ImageAccess, PolygonMode, RenderContext, ShaderSource, ShaderStage,
    TextureDesc, TextureFormat, TextureKind, UniformValue,
};
pub use backends::{GpuCommand, RecordingBackend};
pub use pipeline::{
    CubemapShadowPipeline, DeferredPipeline, ForwardPipeline, Fullscreen2dPipeline,
    GBufferTargets, GeometryPipeline, GpuBSphere, GpuLight, GpuTriangle, LightingPipeline,
    MigratedScene, Pipeline, PipelineCore, PointShadowPipeline, RayTracingPipeline,
    ShadowMappingPipeline,
};
pub use primitives::{Camera, CameraView, Light, Material, Mesh, MeshData, Vertex};
pub use resources::{ManagedState, ResourceError, ResourceKind, ResourceRegistry};

use thiserror::Error;

/// Rendering errors
///
/// Every render entry point reports failure through this type instead of
/// panicking, so a failed pass costs at most one frame.
#[derive(Error, Debug)]
pub enum RenderError {
    /// An entry point received an unusable argument
    ///
    /// Raised before any GPU state is touched.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// A pipeline's build step failed (program link, target allocation)
    ///
    /// The pipeline stays dirty and retries on its next render call.
    #[error("Build failed: {0}")]
    BuildFailed(String),

    /// A framebuffer did not validate as complete
    #[error("Framebuffer incomplete: {0}")]
    FramebufferIncomplete(String),

    /// A GPU object was used before it was created
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// A pass needed the frame's camera but none was bound yet
    #[error("No camera has been bound in this frame")]
    MissingCamera,

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Resource registry failure
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Scene lookup failure
    #[error(transparent)]
    Scene(#[from] crate::scene::SceneError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
