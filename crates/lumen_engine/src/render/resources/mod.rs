//! Resource management
//!
//! The registry of GPU-resident objects and the wrappers it tracks.

pub mod gpu_objects;
pub mod registry;

pub use gpu_objects::{Framebuffer, GeometryBuffer, Program, StorageBuffer, Texture};
pub use registry::{
    ManagedState, RegistryReport, ReleaseSummary, ResourceError, ResourceKind, ResourceRegistry,
};
