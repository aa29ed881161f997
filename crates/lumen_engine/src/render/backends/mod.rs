//! Backend implementations for the render module
//!
//! Only the headless recorder ships with the crate; device-backed
//! implementations plug in through [`GpuBackend`](crate::render::GpuBackend).

/// Headless backend that records every call
pub mod recording;

pub use recording::{GpuCommand, RecordingBackend};
