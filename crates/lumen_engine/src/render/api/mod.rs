//! Public rendering API
//!
//! The [`GpuBackend`] trait every backend implements, and the per-frame
//! [`RenderContext`] threaded through all render calls.

pub mod render_backend;
pub mod frame_data;

// Re-export commonly used types
pub use render_backend::{
    BackendResult, BlendMode, BufferUsage, ClearFlags, CullMode, GpuBackend, GpuHandle,
    ImageAccess, PolygonMode, ShaderSource, ShaderStage, TextureDesc, TextureFormat, TextureKind,
    UniformValue,
};
pub use frame_data::{DrawInfo, Drawable, FrameState, RenderContext};
