//! Core backend abstraction traits
//!
//! These traits define the GL-style native interface that every backend implements.
//! All calls are synchronous and issued from a single graphics context.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create {0}")]
    ResourceCreationFailed(String),
    #[error("Failed to compile {stage} shader: {log}")]
    ShaderCompilationFailed { stage: ShaderStage, log: String },
    #[error("Failed to link program: {0}")]
    ProgramLinkFailed(String),
    #[error("Framebuffer incomplete: {0}")]
    IncompleteFramebuffer(String),
    #[error("Invalid {0} handle {1}")]
    InvalidHandle(&'static str, u64),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a renderbuffer (attachment storage that is never sampled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderbufferHandle(pub(crate) u64);

/// Handle to a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Vertex attribute location inside a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLocation(pub u32);

/// Uniform location inside a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u64);

/// Storage attached to a framebuffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentHandle {
    Texture(TextureHandle),
    Renderbuffer(RenderbufferHandle),
}

/// Main graphics backend trait
///
/// Object safe so that binding closures and painters can take `&mut dyn GraphicsBackend`.
pub trait GraphicsBackend {
    /// Get the backend name
    fn name(&self) -> &'static str;

    /// Version line prepended to every shader stage
    fn glsl_header(&self) -> &str;

    // Resource creation

    /// Create a buffer with initial data
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle>;

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()>;

    /// Create a 2D texture, optionally uploading RGBA8 pixel data
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> BackendResult<TextureHandle>;

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()>;

    /// Create renderbuffer storage
    fn create_renderbuffer(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> BackendResult<RenderbufferHandle>;

    /// Destroy a renderbuffer
    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) -> BackendResult<()>;

    /// Create a framebuffer from color attachments (in draw-buffer order) and an optional depth attachment
    fn create_framebuffer(
        &mut self,
        colors: &[AttachmentHandle],
        depth: Option<AttachmentHandle>,
    ) -> BackendResult<FramebufferHandle>;

    /// Destroy a framebuffer (attachments are not destroyed)
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()>;

    // Programs

    /// Compile and link a program from final (preprocessed-ready) stage sources
    fn create_program(&mut self, vertex: &str, fragment: &str) -> BackendResult<ProgramHandle>;

    /// Destroy a program
    fn destroy_program(&mut self, program: ProgramHandle) -> BackendResult<()>;

    /// Look up an active vertex attribute
    fn attribute_location(&mut self, program: ProgramHandle, name: &str) -> Option<AttributeLocation>;

    /// Look up an active uniform
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// Make a program current
    fn use_program(&mut self, program: ProgramHandle);

    // Command recording and execution

    /// Bind a framebuffer (`None` = default framebuffer) and set the viewport to its size
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>, width: u32, height: u32);

    /// Clear the bound framebuffer
    fn clear(&mut self, values: &ClearValues);

    /// Apply blend, depth and cull state
    fn set_render_state(&mut self, state: &RenderState);

    /// Point an attribute at a tightly packed vertex buffer
    fn set_attribute(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        components: u32,
        ty: AttributeType,
    );

    /// Upload a uniform value to the current program
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>);

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Draw indexed triangles
    fn draw_indexed(&mut self, indices: BufferHandle, count: u32, format: IndexFormat);
}
