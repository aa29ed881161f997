//! Backend abstraction traits for the rendering system
//!
//! The orchestration core never talks to a graphics API directly. Everything
//! it needs from the GPU goes through [`GpuBackend`]: object creation and
//! destruction, binding, fixed-function state and draw/dispatch submission.
//! Backend objects are referred to by opaque [`GpuHandle`]s.

use crate::foundation::math::{Mat3, Mat4, Vec3, Vec4};
use crate::render::RenderError;
use bitflags::bitflags;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Opaque handle to a backend object (program, texture, buffer, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u64);

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Geometry stage
    Geometry,
    /// Fragment stage
    Fragment,
    /// Compute stage
    Compute,
}

/// Source text for one stage of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderSource {
    /// Stage this source compiles to
    pub stage: ShaderStage,
    /// Shading-language source text
    pub source: &'static str,
}

impl ShaderSource {
    /// Pair a stage with its source
    pub const fn new(stage: ShaderStage, source: &'static str) -> Self {
        Self { stage, source }
    }
}

/// Texel formats used by render targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA
    Rgba8,
    /// 32-bit float RGB
    RgbFloat,
    /// 32-bit float RGBA
    RgbaFloat,
    /// Depth component
    Depth,
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Single 2D image
    Texture2d,
    /// Six square faces
    Cubemap,
}

/// Description of a texture to allocate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// 2D texture or cubemap
    pub kind: TextureKind,
}

impl TextureDesc {
    /// A 2D texture
    pub const fn texture_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self { width, height, format, kind: TextureKind::Texture2d }
    }

    /// A cubemap with square faces of `size` texels
    pub const fn cubemap(size: u32, format: TextureFormat) -> Self {
        Self { width: size, height: size, format, kind: TextureKind::Cubemap }
    }
}

/// How a storage buffer is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Shader storage buffer read by compute programs
    Storage,
}

/// Image binding access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAccess {
    /// Read only
    ReadOnly,
    /// Write only
    WriteOnly,
    /// Read and write
    ReadWrite,
}

/// Framebuffer blending state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Blending disabled: fragments overwrite the target
    Disabled,
    /// `src * 1 + dst * 1`
    Additive,
}

/// Polygon rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    /// Normal solid rendering
    Fill,
    /// Wireframe mode
    Line,
}

/// Face culling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

bitflags! {
    /// Buffers affected by a clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Color attachments
        const COLOR = 0b01;
        /// Depth attachment
        const DEPTH = 0b10;
    }
}

/// Value assigned to a named program parameter
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Signed integer (also used for sampler units)
    Int(i32),
    /// Unsigned integer
    Uint(u32),
    /// Float
    Float(f32),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 3x3 matrix
    Mat3(Mat3),
    /// 4x4 matrix
    Mat4(Mat4),
    /// Array of 4x4 matrices
    Mat4Array(Vec<Mat4>),
}

/// Main rendering backend trait
///
/// Implementations own every backend object they create until
/// [`destroy`](GpuBackend::destroy) is called for its handle.
pub trait GpuBackend {
    /// Human-readable backend name
    fn name(&self) -> &str;

    // === Object lifecycle ===

    /// Compile and link a program from its stages
    fn create_program(&mut self, label: &str, stages: &[ShaderSource]) -> BackendResult<GpuHandle>;

    /// Allocate a texture
    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<GpuHandle>;

    /// Create a framebuffer with the given color attachments and optional depth attachment
    fn create_framebuffer(&mut self, colors: &[GpuHandle], depth: Option<GpuHandle>) -> BackendResult<GpuHandle>;

    /// Check framebuffer completeness
    ///
    /// # Returns
    /// `Ok(())` when complete, a [`RenderError::FramebufferIncomplete`] otherwise
    fn validate_framebuffer(&self, framebuffer: GpuHandle) -> BackendResult<()>;

    /// Create a buffer initialized with `data`
    fn create_buffer(&mut self, usage: BufferUsage, data: &[u8]) -> BackendResult<GpuHandle>;

    /// Create a vertex array with interleaved vertex data and a triangle index list
    fn create_vertex_array(&mut self, vertices: &[u8], indices: &[u32]) -> BackendResult<GpuHandle>;

    /// Destroy any backend object
    fn destroy(&mut self, handle: GpuHandle);

    // === Binding ===

    /// Make a program current
    fn use_program(&mut self, program: GpuHandle);

    /// Set a named parameter of a program
    fn set_uniform(&mut self, program: GpuHandle, name: &str, value: UniformValue);

    /// Bind a texture to a sampler unit
    fn bind_texture(&mut self, texture: GpuHandle, unit: u32);

    /// Bind a texture as a storage image
    fn bind_image(&mut self, texture: GpuHandle, unit: u32, access: ImageAccess);

    /// Bind a storage buffer to an indexed binding point
    fn bind_storage_buffer(&mut self, buffer: GpuHandle, binding: u32);

    /// Bind a framebuffer (`None` = default framebuffer) and set the viewport
    fn bind_framebuffer(&mut self, framebuffer: Option<GpuHandle>, viewport: (u32, u32));

    // === Fixed-function state ===

    /// Clear buffers of the bound framebuffer
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]);

    /// Set the blending state
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Set the rasterization mode
    fn set_polygon_mode(&mut self, mode: PolygonMode);

    /// Set face culling
    fn set_cull_mode(&mut self, mode: CullMode);

    /// Enable or disable color writes
    fn set_color_mask(&mut self, enabled: bool);

    // === Submission ===

    /// Draw `index_count` indices of a vertex array as triangles
    fn draw_indexed(&mut self, vertex_array: GpuHandle, index_count: u32) -> BackendResult<()>;

    /// Draw one screen-covering triangle without vertex input
    fn draw_fullscreen_triangle(&mut self);

    /// Dispatch the current compute program
    fn dispatch_compute(&mut self, groups: [u32; 3]);

    /// Full pipeline barrier; compute writes are visible afterwards
    fn memory_barrier(&mut self);

    /// Present the default framebuffer
    fn present(&mut self);
}
