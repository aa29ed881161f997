//! Per-frame rendering state
//!
//! Collaborators sometimes need "whatever was bound most recently": a mesh
//! sets its per-draw parameters on the active program, the geometry pass
//! reuses the projection of the last bound camera. [`FrameState`] keeps those
//! values and travels with every render call inside a [`RenderContext`].

use crate::core::{EntityId, RendererConfig};
use crate::foundation::math::{Mat3, Mat4, Vec3, Vec4};
use crate::render::api::{GpuBackend, GpuHandle, UniformValue};
use crate::render::primitives::CameraView;
use crate::render::resources::ResourceRegistry;
use crate::render::RenderResult;

/// Most recently bound program, pipeline and camera
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    program: Option<GpuHandle>,
    pipeline: Option<EntityId>,
    camera: Option<CameraView>,
}

impl FrameState {
    /// Program made current last
    pub fn last_program(&self) -> Option<GpuHandle> {
        self.program
    }

    /// Pipeline whose render call started last
    pub fn last_pipeline(&self) -> Option<EntityId> {
        self.pipeline
    }

    /// Camera bound last
    pub fn last_camera(&self) -> Option<&CameraView> {
        self.camera.as_ref()
    }

    /// Record the program that was just made current
    pub fn record_program(&mut self, program: GpuHandle) {
        self.program = Some(program);
    }

    /// Record the pipeline that just started rendering
    pub fn record_pipeline(&mut self, pipeline: EntityId) {
        self.pipeline = Some(pipeline);
    }

    /// Record the camera that was just bound
    pub fn record_camera(&mut self, camera: CameraView) {
        self.camera = Some(camera);
    }

    /// Forget the active program
    ///
    /// Used when the program it refers to is released.
    pub fn forget_program(&mut self, program: GpuHandle) {
        if self.program == Some(program) {
            self.program = None;
        }
    }
}

/// Everything a render call may touch
///
/// Borrowed from the [`Engine`](crate::Engine) for the duration of a frame.
pub struct RenderContext<'a> {
    /// GPU backend
    pub backend: &'a mut dyn GpuBackend,
    /// Resource registry owning every GPU-resident object
    pub registry: &'a mut ResourceRegistry,
    /// Most recently bound program, pipeline and camera
    pub frame: &'a mut FrameState,
    /// Renderer settings
    pub settings: &'a RendererConfig,
    surface: (u32, u32),
}

impl<'a> RenderContext<'a> {
    /// Assemble a context
    ///
    /// # Arguments
    /// * `surface` - Size of the default framebuffer in pixels
    pub fn new(
        backend: &'a mut dyn GpuBackend,
        registry: &'a mut ResourceRegistry,
        frame: &'a mut FrameState,
        settings: &'a RendererConfig,
        surface: (u32, u32),
    ) -> Self {
        Self { backend, registry, frame, settings, surface }
    }

    /// Size of the default framebuffer
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    /// Make a program current and remember it as the active program
    pub fn bind_program(&mut self, program: GpuHandle) {
        self.backend.use_program(program);
        self.frame.record_program(program);
    }

    /// Set a named parameter on the active program
    ///
    /// Without an active program the call is reported and ignored.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match self.frame.last_program() {
            Some(program) => self.backend.set_uniform(program, name, value),
            None => log::error!("No active program, '{}' not set", name),
        }
    }

    /// Set a `mat4` parameter
    pub fn set_mat4(&mut self, name: &str, value: Mat4) {
        self.set_uniform(name, UniformValue::Mat4(value));
    }

    /// Set a `mat3` parameter
    pub fn set_mat3(&mut self, name: &str, value: Mat3) {
        self.set_uniform(name, UniformValue::Mat3(value));
    }

    /// Set a `vec3` parameter
    pub fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.set_uniform(name, UniformValue::Vec3(value));
    }

    /// Set a `vec4` parameter
    pub fn set_vec4(&mut self, name: &str, value: Vec4) {
        self.set_uniform(name, UniformValue::Vec4(value));
    }

    /// Set a `float` parameter
    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    /// Set an `int` parameter
    pub fn set_int(&mut self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    /// Set a `uint` parameter
    pub fn set_uint(&mut self, name: &str, value: u32) {
        self.set_uniform(name, UniformValue::Uint(value));
    }

    /// Bind the default framebuffer at surface size
    pub fn reset_framebuffer(&mut self) {
        self.backend.bind_framebuffer(None, self.surface);
    }
}

/// Matrices forwarded to a drawable by the render list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInfo {
    /// View matrix of the pass
    pub view: Mat4,
    /// World matrix of the drawn object
    pub world: Mat4,
}

impl DrawInfo {
    /// `view * world`
    pub fn model_view(&self) -> Mat4 {
        self.view * self.world
    }
}

/// Anything a render list element can hand control back to
pub trait Drawable {
    /// Issue the draw for this object under the given matrices
    fn draw(&self, ctx: &mut RenderContext<'_>, info: &DrawInfo) -> RenderResult<()>;
}
