//! # Core Engine Module
//!
//! Shared abstractions every other subsystem depends on.
//!
//! ## Organization
//!
//! - **Config**: engine configuration and its file lookup
//! - **Entity**: identity, naming and the dirty flag carried by every engine object

pub mod config;
pub mod entity;

pub use config::{
    Config,
    ConfigError,
    EngineConfig,
    EngineConfigurer,
    EngineProperties,
    RendererConfig,
    WindowConfig,
};
pub use entity::{Entity, EntityId, Identity};
