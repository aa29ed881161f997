//! GPU object wrappers
//!
//! Thin owners of backend objects. Each wrapper registers itself with the
//! [`ResourceRegistry`] when its backend object is created and unregisters
//! when freed. Re-creating a wrapper frees the previous object first, so a
//! wrapper owns at most one backend object at a time.
//!
//! Wrappers cannot free themselves on drop because they do not own the
//! backend; whatever their owners forget is caught by the registry's forced
//! release at shutdown.

use super::registry::{ManagedState, ResourceKind, ResourceRegistry};
use crate::render::api::{
    BufferUsage, GpuHandle, ImageAccess, RenderContext, ShaderSource, TextureDesc,
};
use crate::render::primitives::Vertex;
use crate::render::{RenderError, RenderResult};

/// One registered backend object
#[derive(Debug)]
struct GpuObject {
    label: String,
    kind: ResourceKind,
    state: ManagedState,
    handle: Option<GpuHandle>,
}

impl GpuObject {
    fn new(label: &str, kind: ResourceKind) -> Self {
        Self {
            label: label.to_string(),
            kind,
            state: ManagedState::new(),
            handle: None,
        }
    }

    /// Register a freshly created backend object, replacing any previous one
    fn adopt(&mut self, ctx: &mut RenderContext<'_>, handle: GpuHandle) -> RenderResult<()> {
        self.free(ctx);
        let key = self.state.init(ctx.registry, &self.label, self.kind)?;
        ctx.registry.attach(key, handle)?;
        self.handle = Some(handle);
        Ok(())
    }

    fn handle(&self, registry: &ResourceRegistry) -> Option<GpuHandle> {
        if self.state.is_initialized(registry) {
            self.handle
        } else {
            None
        }
    }

    fn require(&self, registry: &ResourceRegistry) -> RenderResult<GpuHandle> {
        self.handle(registry)
            .ok_or_else(|| RenderError::NotInitialized(self.label.clone()))
    }

    fn free(&mut self, ctx: &mut RenderContext<'_>) -> bool {
        self.handle = None;
        self.state.free(ctx.registry, &mut *ctx.backend)
    }
}

/// Linked shader program
#[derive(Debug)]
pub struct Program {
    object: GpuObject,
}

impl Program {
    /// Create an empty program wrapper
    pub fn new(label: &str) -> Self {
        Self { object: GpuObject::new(label, ResourceKind::Program) }
    }

    /// Compile and link the program from its stages
    pub fn build(&mut self, ctx: &mut RenderContext<'_>, stages: &[ShaderSource]) -> RenderResult<()> {
        let handle = ctx
            .backend
            .create_program(&self.object.label, stages)
            .map_err(|e| RenderError::BuildFailed(format!("program '{}': {}", self.object.label, e)))?;
        self.object.adopt(ctx, handle)
    }

    /// Make this program current
    ///
    /// Fails if the program was never built or has been released.
    pub fn bind(&self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        let handle = self.object.require(ctx.registry)?;
        ctx.bind_program(handle);
        Ok(())
    }

    /// Backend handle while the program is alive
    pub fn handle(&self, registry: &ResourceRegistry) -> Option<GpuHandle> {
        self.object.handle(registry)
    }

    /// Whether the program is built and registered
    pub fn is_initialized(&self, registry: &ResourceRegistry) -> bool {
        self.object.state.is_initialized(registry)
    }

    /// Release the program
    pub fn free(&mut self, ctx: &mut RenderContext<'_>) -> bool {
        if let Some(handle) = self.object.handle {
            ctx.frame.forget_program(handle);
        }
        self.object.free(ctx)
    }
}

/// Texture or render target
#[derive(Debug)]
pub struct Texture {
    object: GpuObject,
    desc: Option<TextureDesc>,
}

impl Texture {
    /// Create an empty texture wrapper
    pub fn new(label: &str) -> Self {
        Self {
            object: GpuObject::new(label, ResourceKind::Texture),
            desc: None,
        }
    }

    /// Allocate storage for the texture
    pub fn create(&mut self, ctx: &mut RenderContext<'_>, desc: TextureDesc) -> RenderResult<()> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidParams(format!(
                "texture '{}' needs a non-zero size, got {}x{}",
                self.object.label, desc.width, desc.height
            )));
        }
        let handle = ctx.backend.create_texture(&desc)?;
        self.object.adopt(ctx, handle)?;
        self.desc = Some(desc);
        Ok(())
    }

    /// Bind to a sampler unit
    pub fn bind(&self, ctx: &mut RenderContext<'_>, unit: u32) -> RenderResult<()> {
        let handle = self.object.require(ctx.registry)?;
        ctx.backend.bind_texture(handle, unit);
        Ok(())
    }

    /// Bind as a writable storage image
    pub fn bind_image(&self, ctx: &mut RenderContext<'_>, unit: u32) -> RenderResult<()> {
        let handle = self.object.require(ctx.registry)?;
        ctx.backend.bind_image(handle, unit, ImageAccess::WriteOnly);
        Ok(())
    }

    /// Allocated size, if created
    pub fn size(&self) -> Option<(u32, u32)> {
        self.desc.map(|desc| (desc.width, desc.height))
    }

    /// Allocation parameters, if created
    pub fn desc(&self) -> Option<&TextureDesc> {
        self.desc.as_ref()
    }

    /// Backend handle while the texture is alive
    pub fn handle(&self, registry: &ResourceRegistry) -> Option<GpuHandle> {
        self.object.handle(registry)
    }

    /// Release the texture
    pub fn free(&mut self, ctx: &mut RenderContext<'_>) -> bool {
        self.desc = None;
        self.object.free(ctx)
    }
}

/// Framebuffer object
#[derive(Debug)]
pub struct Framebuffer {
    object: GpuObject,
    size: (u32, u32),
}

impl Framebuffer {
    /// Create an empty framebuffer wrapper
    pub fn new(label: &str) -> Self {
        Self {
            object: GpuObject::new(label, ResourceKind::Framebuffer),
            size: (0, 0),
        }
    }

    /// Create the framebuffer from already allocated textures
    ///
    /// The framebuffer takes the size of its first attachment.
    pub fn create(
        &mut self,
        ctx: &mut RenderContext<'_>,
        colors: &[&Texture],
        depth: Option<&Texture>,
    ) -> RenderResult<()> {
        let size = colors
            .iter()
            .copied()
            .chain(depth)
            .find_map(Texture::size)
            .ok_or_else(|| {
                RenderError::InvalidParams(format!("framebuffer '{}' has no attachments", self.object.label))
            })?;

        let color_handles = colors
            .iter()
            .map(|texture| texture.object.require(ctx.registry))
            .collect::<RenderResult<Vec<_>>>()?;
        let depth_handle = depth.map(|texture| texture.object.require(ctx.registry)).transpose()?;

        let handle = ctx.backend.create_framebuffer(&color_handles, depth_handle)?;
        self.object.adopt(ctx, handle)?;
        self.size = size;
        Ok(())
    }

    /// Check completeness
    pub fn validate(&self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        let handle = self.object.require(ctx.registry)?;
        ctx.backend.validate_framebuffer(handle)
    }

    /// Bind as render target with a viewport covering the attachments
    pub fn bind(&self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        let handle = self.object.require(ctx.registry)?;
        ctx.backend.bind_framebuffer(Some(handle), self.size);
        Ok(())
    }

    /// Attachment size
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Release the framebuffer (attachments are owned separately)
    pub fn free(&mut self, ctx: &mut RenderContext<'_>) -> bool {
        self.object.free(ctx)
    }
}

/// Shader storage buffer
#[derive(Debug)]
pub struct StorageBuffer {
    object: GpuObject,
    len: usize,
}

impl StorageBuffer {
    /// Create an empty buffer wrapper
    pub fn new(label: &str) -> Self {
        Self {
            object: GpuObject::new(label, ResourceKind::StorageBuffer),
            len: 0,
        }
    }

    /// Replace the buffer contents
    pub fn upload(&mut self, ctx: &mut RenderContext<'_>, data: &[u8]) -> RenderResult<()> {
        let handle = ctx.backend.create_buffer(BufferUsage::Storage, data)?;
        self.object.adopt(ctx, handle)?;
        self.len = data.len();
        Ok(())
    }

    /// Bind to an indexed storage binding point
    pub fn bind(&self, ctx: &mut RenderContext<'_>, binding: u32) -> RenderResult<()> {
        let handle = self.object.require(ctx.registry)?;
        ctx.backend.bind_storage_buffer(handle, binding);
        Ok(())
    }

    /// Size of the uploaded data in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no data
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Release the buffer
    pub fn free(&mut self, ctx: &mut RenderContext<'_>) -> bool {
        self.len = 0;
        self.object.free(ctx)
    }
}

/// Vertex array holding a mesh's vertex and index buffers
#[derive(Debug)]
pub struct GeometryBuffer {
    object: GpuObject,
    index_count: u32,
}

impl GeometryBuffer {
    /// Create an empty geometry wrapper
    pub fn new(label: &str) -> Self {
        Self {
            object: GpuObject::new(label, ResourceKind::VertexArray),
            index_count: 0,
        }
    }

    /// Upload vertices and triangle faces
    pub fn upload(&mut self, ctx: &mut RenderContext<'_>, vertices: &[Vertex], faces: &[[u32; 3]]) -> RenderResult<()> {
        let indices: &[u32] = bytemuck::cast_slice(faces);
        let index_count = u32::try_from(indices.len())
            .map_err(|_| RenderError::InvalidParams(format!("'{}' has too many faces", self.object.label)))?;

        let handle = ctx.backend.create_vertex_array(bytemuck::cast_slice(vertices), indices)?;
        self.object.adopt(ctx, handle)?;
        self.index_count = index_count;
        Ok(())
    }

    /// Issue one indexed draw of the whole buffer
    pub fn draw(&self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        let handle = self.object.require(ctx.registry)?;
        ctx.backend.draw_indexed(handle, self.index_count)
    }

    /// Whether the geometry is uploaded and registered
    pub fn is_initialized(&self, registry: &ResourceRegistry) -> bool {
        self.object.state.is_initialized(registry)
    }

    /// Number of indices drawn
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Release the vertex array
    pub fn free(&mut self, ctx: &mut RenderContext<'_>) -> bool {
        self.index_count = 0;
        self.object.free(ctx)
    }
}
