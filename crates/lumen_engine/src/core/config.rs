//! # Engine Configuration
//!
//! Window, presentation and renderer settings, loaded once at startup.
//!
//! ## Lookup order
//!
//! [`EngineConfigurer`] checks, in order:
//! 1. `$HOME/.lumen-config.toml` (a per-user override)
//! 2. `./lumen-config.toml` (the file bundled next to the executable)
//!
//! and falls back to [`EngineConfig::default`] when neither can be read.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::config::{Config, ConfigError};

/// File name looked up in the user's home directory
pub const USER_CONFIG_FILE: &str = ".lumen-config.toml";

/// File name of the bundled default configuration
pub const BUNDLED_CONFIG_FILE: &str = "lumen-config.toml";

/// Output surface settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
    /// Whether to start in fullscreen
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

/// Presentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineProperties {
    /// Synchronize presentation with the display refresh
    pub vsync: bool,
    /// Color the default framebuffer is cleared to
    pub clear_color: [f32; 3],
}

impl Default for EngineProperties {
    fn default() -> Self {
        Self {
            vsync: true,
            clear_color: [0.1, 0.1, 0.1],
        }
    }
}

/// # Renderer Configuration
///
/// Sizes and constants shared by the render pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Edge length of square shadow maps and shadow cubemap faces
    pub shadow_map_size: u32,
    /// Far plane used by omnidirectional shadows
    pub far_plane: f32,
    /// Work-group edge length of the ray-tracing compute program
    pub compute_group_size: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 1024,
            far_plane: 1000.0,
            compute_group_size: 8,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output surface settings
    pub window: WindowConfig,
    /// Presentation settings
    pub engine: EngineProperties,
    /// Render pipeline settings
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Set the output surface size
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    /// Set the clear color
    #[must_use]
    pub fn with_clear_color(mut self, clear_color: [f32; 3]) -> Self {
        self.engine.clear_color = clear_color;
        self
    }

    /// Set the shadow map resolution
    #[must_use]
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.renderer.shadow_map_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(format!(
                "Surface size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            ));
        }
        if self.renderer.shadow_map_size == 0 {
            return Err("Shadow map size must be non-zero".to_string());
        }
        if self.renderer.compute_group_size == 0 {
            return Err("Compute group size must be non-zero".to_string());
        }
        if self.renderer.far_plane <= 1.0 {
            return Err(format!("Far plane must exceed the near plane, got {}", self.renderer.far_plane));
        }
        Ok(())
    }
}

impl Config for EngineConfig {}

/// Locates and loads the engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfigurer {
    candidates: Vec<PathBuf>,
}

impl Default for EngineConfigurer {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfigurer {
    /// Configurer using the standard user and bundled locations
    pub fn new() -> Self {
        let mut candidates = Vec::new();
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(USER_CONFIG_FILE));
        }
        candidates.push(PathBuf::from(".").join(BUNDLED_CONFIG_FILE));
        Self { candidates }
    }

    /// Configurer with an explicit, ordered list of candidate files
    pub fn with_search_paths(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Load the first readable candidate, or defaults if none is usable
    ///
    /// A candidate that exists but fails to parse is reported and skipped.
    pub fn configuration(&self) -> EngineConfig {
        for path in &self.candidates {
            if !path.is_file() {
                continue;
            }
            match EngineConfig::load_from_file(path) {
                Ok(config) => {
                    log::info!("Using configuration file {}", path.display());
                    return config;
                }
                Err(e) => log::error!("Error in configuration file {}: {}", path.display(), e),
            }
        }
        log::info!("No configuration file found, using built-in defaults");
        EngineConfig::default()
    }

    /// Candidate files in lookup order
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lumen-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.renderer.shadow_map_size, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let config = EngineConfig::default().with_size(0, 600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            "[window]\nwidth = 800\nheight = 600\n\n[engine]\nclear_color = [0.0, 0.0, 0.5]\n",
        )
        .expect("valid toml");

        assert_eq!(config.window.width, 800);
        assert!(!config.window.fullscreen);
        assert!(config.engine.vsync);
        assert_eq!(config.engine.clear_color, [0.0, 0.0, 0.5]);
        assert_eq!(config.renderer, RendererConfig::default());
    }

    #[test]
    fn test_save_and_reload_ron() {
        let path = scratch_file("config.ron");
        let config = EngineConfig::default().with_shadow_map_size(2048);
        config.save_to_file(&path).expect("save");

        let loaded = EngineConfig::load_from_file(&path).expect("load");
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.renderer.shadow_map_size, 2048);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = EngineConfig::default().save_to_file(scratch_file("config.yml"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_configurer_picks_first_readable_candidate() {
        let broken = scratch_file("broken.toml");
        let good = scratch_file("good.toml");
        std::fs::write(&broken, "window = 12").expect("write");
        EngineConfig::default().with_size(640, 480).save_to_file(&good).expect("save");

        let configurer = EngineConfigurer::with_search_paths(vec![
            scratch_file("missing.toml"),
            broken.clone(),
            good.clone(),
        ]);
        let config = configurer.configuration();
        std::fs::remove_file(&broken).ok();
        std::fs::remove_file(&good).ok();

        assert_eq!((config.window.width, config.window.height), (640, 480));
    }

    #[test]
    fn test_configurer_without_files_uses_defaults() {
        let configurer = EngineConfigurer::with_search_paths(vec![scratch_file("nowhere.toml")]);
        assert_eq!(configurer.configuration(), EngineConfig::default());
    }

    #[test]
    fn test_standard_candidates() {
        let configurer = EngineConfigurer::new();
        let candidates = configurer.candidates();
        assert_eq!(candidates.last(), Some(&PathBuf::from(".").join(BUNDLED_CONFIG_FILE)));

        match dirs::home_dir() {
            Some(home) => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(candidates[0], home.join(USER_CONFIG_FILE));
            }
            None => assert_eq!(candidates.len(), 1),
        }
    }
}
