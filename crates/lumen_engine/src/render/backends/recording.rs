//! Headless recording backend
//!
//! Implements [`GpuBackend`] without a device: every call is appended to a
//! command log as a [`GpuCommand`]. Used by the demo for headless runs and by
//! tests to assert on submission order. Failures can be injected to exercise
//! the build-failure paths of the pipelines.

use crate::render::api::{
    BackendResult, BlendMode, BufferUsage, ClearFlags, CullMode, GpuBackend, GpuHandle,
    ImageAccess, PolygonMode, ShaderSource, TextureDesc, UniformValue,
};
use crate::render::RenderError;
use std::collections::HashSet;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Program created
    CreateProgram {
        /// New handle
        handle: GpuHandle,
        /// Program label
        label: String,
    },
    /// Texture allocated
    CreateTexture {
        /// New handle
        handle: GpuHandle,
        /// Allocation parameters
        desc: TextureDesc,
    },
    /// Framebuffer created
    CreateFramebuffer {
        /// New handle
        handle: GpuHandle,
        /// Number of color attachments
        colors: usize,
        /// Whether a depth attachment is present
        depth: bool,
    },
    /// Buffer created
    CreateBuffer {
        /// New handle
        handle: GpuHandle,
        /// Size in bytes
        size: usize,
    },
    /// Vertex array created
    CreateVertexArray {
        /// New handle
        handle: GpuHandle,
        /// Number of indices
        indices: usize,
    },
    /// Object destroyed
    Destroy(GpuHandle),
    /// Program made current
    UseProgram(GpuHandle),
    /// Program parameter set
    SetUniform {
        /// Target program
        program: GpuHandle,
        /// Parameter name
        name: String,
        /// Assigned value
        value: UniformValue,
    },
    /// Texture bound to a unit
    BindTexture {
        /// Texture
        texture: GpuHandle,
        /// Sampler unit
        unit: u32,
    },
    /// Texture bound as image
    BindImage {
        /// Texture
        texture: GpuHandle,
        /// Image unit
        unit: u32,
    },
    /// Storage buffer bound
    BindStorageBuffer {
        /// Buffer
        buffer: GpuHandle,
        /// Binding point
        binding: u32,
    },
    /// Framebuffer bound (`None` = default)
    BindFramebuffer {
        /// Framebuffer
        framebuffer: Option<GpuHandle>,
        /// Viewport size
        viewport: (u32, u32),
    },
    /// Buffers cleared
    Clear(ClearFlags),
    /// Blending changed
    SetBlendMode(BlendMode),
    /// Rasterization mode changed
    SetPolygonMode(PolygonMode),
    /// Culling changed
    SetCullMode(CullMode),
    /// Color writes toggled
    SetColorMask(bool),
    /// Indexed draw
    DrawIndexed {
        /// Vertex array
        vertex_array: GpuHandle,
        /// Number of indices
        count: u32,
    },
    /// Fullscreen triangle drawn
    DrawFullscreen,
    /// Compute dispatched
    Dispatch([u32; 3]),
    /// Memory barrier issued
    MemoryBarrier,
    /// Frame presented
    Present,
}

/// Backend that records instead of rendering
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<GpuCommand>,
    next_handle: u64,
    live: HashSet<GpuHandle>,
    incomplete: HashSet<GpuHandle>,
    failing_programs: Vec<String>,
    incomplete_framebuffers: bool,
    draw_budget: Option<usize>,
}

impl RecordingBackend {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Make builds of programs whose label contains `pattern` fail
    pub fn fail_programs_matching(&mut self, pattern: &str) {
        self.failing_programs.push(pattern.to_string());
    }

    /// Report every framebuffer created from now on as incomplete (or stop doing so)
    pub fn set_incomplete_framebuffers(&mut self, incomplete: bool) {
        self.incomplete_framebuffers = incomplete;
    }

    /// Let the next `draws` indexed draws succeed and fail every one after
    pub fn fail_draws_after(&mut self, draws: usize) {
        self.draw_budget = Some(draws);
    }

    /// Remove all injected failures
    pub fn clear_failures(&mut self) {
        self.failing_programs.clear();
        self.incomplete_framebuffers = false;
        self.draw_budget = None;
    }

    /// Recorded commands, oldest first
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Drop the recorded commands (object bookkeeping is kept)
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of recorded commands matching a predicate
    pub fn count(&self, predicate: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(command)).count()
    }

    /// Blend changes in recording order
    pub fn blend_changes(&self) -> Vec<BlendMode> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::SetBlendMode(mode) => Some(*mode),
                _ => None,
            })
            .collect()
    }

    /// Labels of the programs created so far
    pub fn created_programs(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::CreateProgram { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Handles destroyed so far, in order
    pub fn destroyed(&self) -> Vec<GpuHandle> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::Destroy(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    /// Values assigned to a named parameter, in order
    pub fn uniform_values(&self, name: &str) -> Vec<&UniformValue> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::SetUniform { name: n, value, .. } if n == name => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Number of backend objects created and not yet destroyed
    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    fn allocate(&mut self) -> GpuHandle {
        self.next_handle += 1;
        let handle = GpuHandle(self.next_handle);
        self.live.insert(handle);
        handle
    }
}

impl GpuBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn create_program(&mut self, label: &str, stages: &[ShaderSource]) -> BackendResult<GpuHandle> {
        if stages.is_empty() {
            return Err(RenderError::BackendError(format!("program '{label}' has no stages")));
        }
        if self.failing_programs.iter().any(|pattern| label.contains(pattern.as_str())) {
            return Err(RenderError::BackendError(format!("link error in '{label}'")));
        }
        let handle = self.allocate();
        self.commands.push(GpuCommand::CreateProgram { handle, label: label.to_string() });
        Ok(handle)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<GpuHandle> {
        let handle = self.allocate();
        self.commands.push(GpuCommand::CreateTexture { handle, desc: *desc });
        Ok(handle)
    }

    fn create_framebuffer(&mut self, colors: &[GpuHandle], depth: Option<GpuHandle>) -> BackendResult<GpuHandle> {
        let handle = self.allocate();
        if self.incomplete_framebuffers || (colors.is_empty() && depth.is_none()) {
            self.incomplete.insert(handle);
        }
        self.commands.push(GpuCommand::CreateFramebuffer {
            handle,
            colors: colors.len(),
            depth: depth.is_some(),
        });
        Ok(handle)
    }

    fn validate_framebuffer(&self, framebuffer: GpuHandle) -> BackendResult<()> {
        if !self.live.contains(&framebuffer) {
            return Err(RenderError::BackendError(format!("unknown framebuffer {framebuffer:?}")));
        }
        if self.incomplete.contains(&framebuffer) {
            return Err(RenderError::FramebufferIncomplete(format!("{framebuffer:?} is missing attachments")));
        }
        Ok(())
    }

    fn create_buffer(&mut self, _usage: BufferUsage, data: &[u8]) -> BackendResult<GpuHandle> {
        let handle = self.allocate();
        self.commands.push(GpuCommand::CreateBuffer { handle, size: data.len() });
        Ok(handle)
    }

    fn create_vertex_array(&mut self, _vertices: &[u8], indices: &[u32]) -> BackendResult<GpuHandle> {
        let handle = self.allocate();
        self.commands.push(GpuCommand::CreateVertexArray { handle, indices: indices.len() });
        Ok(handle)
    }

    fn destroy(&mut self, handle: GpuHandle) {
        if !self.live.remove(&handle) {
            log::warn!("Destroying unknown backend object {:?}", handle);
        }
        self.incomplete.remove(&handle);
        self.commands.push(GpuCommand::Destroy(handle));
    }

    fn use_program(&mut self, program: GpuHandle) {
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, program: GpuHandle, name: &str, value: UniformValue) {
        self.commands.push(GpuCommand::SetUniform { program, name: name.to_string(), value });
    }

    fn bind_texture(&mut self, texture: GpuHandle, unit: u32) {
        self.commands.push(GpuCommand::BindTexture { texture, unit });
    }

    fn bind_image(&mut self, texture: GpuHandle, unit: u32, _access: ImageAccess) {
        self.commands.push(GpuCommand::BindImage { texture, unit });
    }

    fn bind_storage_buffer(&mut self, buffer: GpuHandle, binding: u32) {
        self.commands.push(GpuCommand::BindStorageBuffer { buffer, binding });
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GpuHandle>, viewport: (u32, u32)) {
        self.commands.push(GpuCommand::BindFramebuffer { framebuffer, viewport });
    }

    fn clear(&mut self, flags: ClearFlags, _color: [f32; 4]) {
        self.commands.push(GpuCommand::Clear(flags));
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.commands.push(GpuCommand::SetBlendMode(mode));
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.commands.push(GpuCommand::SetPolygonMode(mode));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.commands.push(GpuCommand::SetCullMode(mode));
    }

    fn set_color_mask(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::SetColorMask(enabled));
    }

    fn draw_indexed(&mut self, vertex_array: GpuHandle, index_count: u32) -> BackendResult<()> {
        match &mut self.draw_budget {
            Some(0) => return Err(RenderError::BackendError(format!("draw of {vertex_array:?} rejected"))),
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        self.commands.push(GpuCommand::DrawIndexed { vertex_array, count: index_count });
        Ok(())
    }

    fn draw_fullscreen_triangle(&mut self) {
        self.commands.push(GpuCommand::DrawFullscreen);
    }

    fn dispatch_compute(&mut self, groups: [u32; 3]) {
        self.commands.push(GpuCommand::Dispatch(groups));
    }

    fn memory_barrier(&mut self) {
        self.commands.push(GpuCommand::MemoryBarrier);
    }

    fn present(&mut self) {
        self.commands.push(GpuCommand::Present);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{ShaderStage, TextureFormat};

    const STAGES: [ShaderSource; 1] = [ShaderSource::new(ShaderStage::Compute, "void main() {}")];

    #[test]
    fn test_handles_are_unique_and_tracked() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_program("a", &STAGES).unwrap();
        let b = backend
            .create_texture(&TextureDesc::texture_2d(4, 4, TextureFormat::Rgba8))
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(backend.live_objects(), 2);
        backend.destroy(a);
        assert_eq!(backend.live_objects(), 1);
    }

    #[test]
    fn test_draw_failure_injection() {
        let mut backend = RecordingBackend::new();
        backend.fail_draws_after(2);

        assert!(backend.draw_indexed(GpuHandle(1), 6).is_ok());
        assert!(backend.draw_indexed(GpuHandle(1), 6).is_ok());
        assert!(backend.draw_indexed(GpuHandle(1), 6).is_err());
        assert_eq!(backend.count(|c| matches!(c, GpuCommand::DrawIndexed { .. })), 2);

        backend.clear_failures();
        assert!(backend.draw_indexed(GpuHandle(1), 6).is_ok());
    }

    #[test]
    fn test_program_failure_injection() {
        let mut backend = RecordingBackend::new();
        backend.fail_programs_matching("shadow");

        assert!(backend.create_program("shadow mapping", &STAGES).is_err());
        assert!(backend.create_program("forward", &STAGES).is_ok());
        assert_eq!(backend.created_programs(), vec!["forward"]);
    }

    #[test]
    fn test_incomplete_framebuffer_injection() {
        let mut backend = RecordingBackend::new();
        let depth = backend
            .create_texture(&TextureDesc::texture_2d(4, 4, TextureFormat::Depth))
            .unwrap();

        let complete = backend.create_framebuffer(&[], Some(depth)).unwrap();
        backend.set_incomplete_framebuffers(true);
        let incomplete = backend.create_framebuffer(&[], Some(depth)).unwrap();

        assert!(backend.validate_framebuffer(complete).is_ok());
        assert!(matches!(
            backend.validate_framebuffer(incomplete),
            Err(RenderError::FramebufferIncomplete(_))
        ));
    }
}
