//! Engine context
//!
//! Owns the GPU backend, the resource registry and the per-frame state, and
//! lends them to render calls through [`Engine::context`].

use crate::core::EngineConfig;
use crate::foundation::time::Timer;
use crate::render::api::{ClearFlags, FrameState, GpuBackend, RenderContext};
use crate::render::resources::{ReleaseSummary, ResourceRegistry};
use crate::render::RenderError;
use crate::scene::SceneError;
use thiserror::Error;

/// Main engine struct
///
/// Dropping the engine shuts it down; see [`Engine::shutdown`].
pub struct Engine {
    config: EngineConfig,
    backend: Box<dyn GpuBackend>,
    registry: ResourceRegistry,
    frame: FrameState,
    timer: Timer,
    surface: (u32, u32),
    shut_down: bool,
}

impl Engine {
    /// Create a new engine instance on top of `backend`
    pub fn new(config: EngineConfig, backend: Box<dyn GpuBackend>) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InitializationFailed)?;

        let surface = (config.window.width, config.window.height);
        log::info!(
            "Initializing engine on '{}' backend ({}x{})",
            backend.name(),
            surface.0,
            surface.1
        );

        Ok(Self {
            config,
            backend,
            registry: ResourceRegistry::new(),
            frame: FrameState::default(),
            timer: Timer::new(),
            surface,
            shut_down: false,
        })
    }

    /// Borrow everything a render call needs
    pub fn context(&mut self) -> RenderContext<'_> {
        RenderContext::new(
            self.backend.as_mut(),
            &mut self.registry,
            &mut self.frame,
            &self.config.renderer,
            self.surface,
        )
    }

    /// Bind the default framebuffer and clear it to the configured color
    pub fn clear(&mut self) {
        let [r, g, b] = self.config.engine.clear_color;
        let mut ctx = self.context();
        ctx.reset_framebuffer();
        ctx.backend.clear(ClearFlags::COLOR | ClearFlags::DEPTH, [r, g, b, 1.0]);
    }

    /// Present the frame and advance the frame clock
    pub fn swap(&mut self) {
        self.backend.present();
        self.timer.tick();
    }

    /// Number of presented frames
    pub fn frame_nr(&self) -> u64 {
        self.timer.frame_count()
    }

    /// Seconds between the two most recent frames
    pub fn delta_time(&self) -> f32 {
        self.timer.delta_time()
    }

    /// Size of the default framebuffer
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    /// Change the surface size
    ///
    /// Surface-sized pipeline targets are not reallocated here; call
    /// `mark_dirty` on those pipelines so they rebuild on next use.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidSurface(width, height));
        }
        if (width, height) != self.surface {
            log::info!("Surface resized to {}x{}", width, height);
            self.surface = (width, height);
        }
        Ok(())
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resource registry
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Per-frame state
    pub fn frame_state(&self) -> &FrameState {
        &self.frame
    }

    /// Name of the GPU backend
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether [`Engine::shutdown`] already ran
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Release every GPU object that is still registered
    ///
    /// Anything still registered at this point is reported as a leak before
    /// it is released. Running it again is a no-op.
    pub fn shutdown(&mut self) -> ReleaseSummary {
        if self.shut_down {
            return ReleaseSummary::default();
        }
        self.shut_down = true;

        log::info!("Shutting down after {} frame(s)", self.timer.frame_count());
        self.registry.dump_report();
        self.registry.check_leaks();
        let summary = self.registry.force_release(self.backend.as_mut());
        self.frame = FrameState::default();
        log::info!("Engine shutdown complete");
        summary
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend.name())
            .field("surface", &self.surface)
            .field("frame_nr", &self.timer.frame_count())
            .field("registry", &self.registry.report())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Initialization error
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(String),

    /// A surface size with a zero dimension
    #[error("Invalid surface size {0}x{1}")]
    InvalidSurface(u32, u32),

    /// Rendering error
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Scene error
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{TextureDesc, TextureFormat};
    use crate::render::backends::RecordingBackend;
    use crate::render::resources::{ResourceKind, Texture};

    fn engine() -> Engine {
        let config = EngineConfig::default().with_size(320, 200);
        Engine::new(config, Box::new(RecordingBackend::new())).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = EngineConfig::default().with_size(0, 200);
        let result = Engine::new(config, Box::new(RecordingBackend::new()));
        assert!(matches!(result, Err(EngineError::InitializationFailed(_))));
    }

    #[test]
    fn test_swap_counts_frames() {
        let mut engine = engine();
        assert_eq!(engine.frame_nr(), 0);
        engine.clear();
        engine.swap();
        engine.swap();
        assert_eq!(engine.frame_nr(), 2);
        assert_eq!(engine.surface_size(), (320, 200));
    }

    #[test]
    fn test_resize() {
        let mut engine = engine();
        engine.resize(800, 600).unwrap();
        assert_eq!(engine.surface_size(), (800, 600));
        assert_eq!(engine.context().surface_size(), (800, 600));

        assert!(matches!(engine.resize(0, 600), Err(EngineError::InvalidSurface(0, 600))));
        assert_eq!(engine.surface_size(), (800, 600));
    }

    #[test]
    fn test_shutdown_releases_leaks_once() {
        let mut engine = engine();
        let mut texture = Texture::new("leaked");
        texture
            .create(&mut engine.context(), TextureDesc::texture_2d(4, 4, TextureFormat::Rgba8))
            .unwrap();
        assert_eq!(engine.registry().count_of(ResourceKind::Texture), 1);

        let summary = engine.shutdown();
        assert_eq!(summary, ReleaseSummary { released: 1, destroyed: 1 });
        assert!(engine.registry().is_empty());
        assert!(engine.is_shut_down());

        // Second call does nothing, and freeing the stale wrapper is a no-op
        assert_eq!(engine.shutdown(), ReleaseSummary::default());
        assert!(!texture.free(&mut engine.context()));
    }
}
