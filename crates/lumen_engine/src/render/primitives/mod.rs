//! Core primitive types for rendering
//!
//! The renderable capabilities a scene node can carry (camera, light, mesh)
//! and the materials meshes refer to.

pub mod camera;
pub mod light;
pub mod material;
pub mod mesh;

// Re-export commonly used types
pub use camera::{Camera, CameraView};
pub use light::Light;
pub use material::Material;
pub use mesh::{Mesh, MeshData, Vertex};
