//! OpenGL backend over glow
//!
//! The caller owns window and context creation and hands a ready `glow::Context`
//! to [`GlBackend::new`]. Native objects are kept in id-keyed maps so the rest of
//! the renderer only ever sees the plain handles from [`crate::backend::traits`].

use std::collections::HashMap;

use glow::HasContext;

use crate::backend::traits::*;
use crate::backend::types::*;

type GlBuffer = <glow::Context as HasContext>::Buffer;
type GlTexture = <glow::Context as HasContext>::Texture;
type GlRenderbuffer = <glow::Context as HasContext>::Renderbuffer;
type GlFramebuffer = <glow::Context as HasContext>::Framebuffer;
type GlProgram = <glow::Context as HasContext>::Program;
type GlUniform = <glow::Context as HasContext>::UniformLocation;
type GlVertexArray = <glow::Context as HasContext>::VertexArray;
type GlShader = <glow::Context as HasContext>::Shader;

/// OpenGL 3.3 core / OpenGL ES 3.0 backend
pub struct GlBackend {
    gl: glow::Context,
    header: String,
    vertex_array: Option<GlVertexArray>,
    attributes: AttributeArrays,
    next_id: u64,
    buffers: HashMap<u64, GlBuffer>,
    textures: HashMap<u64, (GlTexture, TextureFormat)>,
    renderbuffers: HashMap<u64, (GlRenderbuffer, TextureFormat)>,
    framebuffers: HashMap<u64, GlFramebuffer>,
    programs: HashMap<u64, GlProgram>,
    uniforms: HashMap<u64, GlUniform>,
}

impl GlBackend {
    /// Wrap a current GL context. `embedded` selects GLSL ES 3.00 sources.
    pub fn new(gl: glow::Context, embedded: bool) -> BackendResult<Self> {
        let header = if embedded {
            "#version 300 es\nprecision highp float;".to_string()
        } else {
            "#version 330 core".to_string()
        };

        // Core profiles refuse attribute pointers without a bound vertex array.
        let vertex_array = unsafe {
            let vao = gl
                .create_vertex_array()
                .map_err(BackendError::ResourceCreationFailed)?;
            gl.bind_vertex_array(Some(vao));
            Some(vao)
        };

        log::info!(
            "GL backend initialized: {} ({})",
            unsafe { gl.get_parameter_string(glow::RENDERER) },
            unsafe { gl.get_parameter_string(glow::VERSION) }
        );

        Ok(Self {
            gl,
            header,
            vertex_array,
            attributes: AttributeArrays::default(),
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            uniforms: HashMap::new(),
        })
    }

    /// The wrapped context, for callers that need to issue raw GL.
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn compile_stage(&self, stage: ShaderStage, source: &str) -> BackendResult<GlShader> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self
                .gl
                .create_shader(kind)
                .map_err(BackendError::ResourceCreationFailed)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(BackendError::ShaderCompilationFailed { stage, log });
            }
            Ok(shader)
        }
    }

    fn attach(&self, slot: u32, attachment: AttachmentHandle) -> BackendResult<()> {
        unsafe {
            match attachment {
                AttachmentHandle::Texture(t) => {
                    let (texture, _) = *self
                        .textures
                        .get(&t.0)
                        .ok_or(BackendError::InvalidHandle("texture", t.0))?;
                    self.gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        slot,
                        glow::TEXTURE_2D,
                        Some(texture),
                        0,
                    );
                }
                AttachmentHandle::Renderbuffer(r) => {
                    let (renderbuffer, _) = *self
                        .renderbuffers
                        .get(&r.0)
                        .ok_or(BackendError::InvalidHandle("renderbuffer", r.0))?;
                    self.gl.framebuffer_renderbuffer(
                        glow::FRAMEBUFFER,
                        slot,
                        glow::RENDERBUFFER,
                        Some(renderbuffer),
                    );
                }
            }
        }
        Ok(())
    }
}

/// (internal format, pixel format, pixel type)
fn texture_format(format: TextureFormat) -> (u32, u32, u32) {
    match format {
        TextureFormat::Rgba8Unorm => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::Rgba8UnormSrgb => (glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::Rgba16Float => (glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT),
        TextureFormat::Rgba32Float => (glow::RGBA32F, glow::RGBA, glow::FLOAT),
        TextureFormat::R32Float => (glow::R32F, glow::RED, glow::FLOAT),
        TextureFormat::Depth24 => (
            glow::DEPTH_COMPONENT24,
            glow::DEPTH_COMPONENT,
            glow::UNSIGNED_INT,
        ),
        TextureFormat::Depth32Float => (
            glow::DEPTH_COMPONENT32F,
            glow::DEPTH_COMPONENT,
            glow::FLOAT,
        ),
        TextureFormat::Depth24Stencil8 => (
            glow::DEPTH24_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::UNSIGNED_INT_24_8,
        ),
    }
}

fn depth_slot(format: TextureFormat) -> u32 {
    if format == TextureFormat::Depth24Stencil8 {
        glow::DEPTH_STENCIL_ATTACHMENT
    } else {
        glow::DEPTH_ATTACHMENT
    }
}

fn compare_function(compare: CompareFunction) -> u32 {
    match compare {
        CompareFunction::Never => glow::NEVER,
        CompareFunction::Less => glow::LESS,
        CompareFunction::Equal => glow::EQUAL,
        CompareFunction::LessEqual => glow::LEQUAL,
        CompareFunction::Greater => glow::GREATER,
        CompareFunction::NotEqual => glow::NOTEQUAL,
        CompareFunction::GreaterEqual => glow::GEQUAL,
        CompareFunction::Always => glow::ALWAYS,
    }
}

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::Src => glow::SRC_COLOR,
        BlendFactor::OneMinusSrc => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::Dst => glow::DST_COLOR,
        BlendFactor::OneMinusDst => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
    }
}

impl GraphicsBackend for GlBackend {
    fn name(&self) -> &'static str {
        "OpenGL (glow)"
    }

    fn glsl_header(&self) -> &str {
        &self.header
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        let target = match kind {
            BufferKind::Vertex => glow::ARRAY_BUFFER,
            BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
        };
        let buffer = unsafe {
            let buffer = self
                .gl
                .create_buffer()
                .map_err(BackendError::ResourceCreationFailed)?;
            self.gl.bind_buffer(target, Some(buffer));
            self.gl.buffer_data_u8_slice(target, data, glow::STATIC_DRAW);
            buffer
        };
        let id = self.next_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()> {
        let native = self
            .buffers
            .remove(&buffer.0)
            .ok_or(BackendError::InvalidHandle("buffer", buffer.0))?;
        unsafe { self.gl.delete_buffer(native) };
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> BackendResult<TextureHandle> {
        let (internal, format, ty) = texture_format(desc.format);
        let filter = match desc.filter {
            FilterMode::Nearest => glow::NEAREST,
            FilterMode::Linear => glow::LINEAR,
        };
        let wrap = match desc.address_mode {
            AddressMode::ClampToEdge => glow::CLAMP_TO_EDGE,
            AddressMode::Repeat => glow::REPEAT,
            AddressMode::MirrorRepeat => glow::MIRRORED_REPEAT,
        };

        let texture = unsafe {
            let texture = self
                .gl
                .create_texture()
                .map_err(BackendError::ResourceCreationFailed)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal as i32,
                desc.width as i32,
                desc.height as i32,
                0,
                format,
                ty,
                data,
            );
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap as i32);
            texture
        };

        let id = self.next_id();
        self.textures.insert(id, (texture, desc.format));
        Ok(TextureHandle(id))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()> {
        let (native, _) = self
            .textures
            .remove(&texture.0)
            .ok_or(BackendError::InvalidHandle("texture", texture.0))?;
        unsafe { self.gl.delete_texture(native) };
        Ok(())
    }

    fn create_renderbuffer(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> BackendResult<RenderbufferHandle> {
        let (internal, _, _) = texture_format(format);
        let renderbuffer = unsafe {
            let renderbuffer = self
                .gl
                .create_renderbuffer()
                .map_err(BackendError::ResourceCreationFailed)?;
            self.gl
                .bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            self.gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                internal,
                width as i32,
                height as i32,
            );
            renderbuffer
        };
        let id = self.next_id();
        self.renderbuffers.insert(id, (renderbuffer, format));
        Ok(RenderbufferHandle(id))
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) -> BackendResult<()> {
        let (native, _) = self
            .renderbuffers
            .remove(&renderbuffer.0)
            .ok_or(BackendError::InvalidHandle("renderbuffer", renderbuffer.0))?;
        unsafe { self.gl.delete_renderbuffer(native) };
        Ok(())
    }

    fn create_framebuffer(
        &mut self,
        colors: &[AttachmentHandle],
        depth: Option<AttachmentHandle>,
    ) -> BackendResult<FramebufferHandle> {
        let framebuffer = unsafe {
            self.gl
                .create_framebuffer()
                .map_err(BackendError::ResourceCreationFailed)?
        };
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer)) };

        let result = (|| {
            let mut draw_buffers = Vec::with_capacity(colors.len());
            for (i, color) in colors.iter().enumerate() {
                let slot = glow::COLOR_ATTACHMENT0 + i as u32;
                self.attach(slot, *color)?;
                draw_buffers.push(slot);
            }
            if let Some(depth) = depth {
                let format = match depth {
                    AttachmentHandle::Texture(t) => self.textures.get(&t.0).map(|(_, f)| *f),
                    AttachmentHandle::Renderbuffer(r) => {
                        self.renderbuffers.get(&r.0).map(|(_, f)| *f)
                    }
                }
                .unwrap_or(TextureFormat::Depth24);
                self.attach(depth_slot(format), depth)?;
            }
            unsafe {
                if draw_buffers.is_empty() {
                    self.gl.draw_buffers(&[glow::NONE]);
                    self.gl.read_buffer(glow::NONE);
                } else {
                    self.gl.draw_buffers(&draw_buffers);
                }
                let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
                if status != glow::FRAMEBUFFER_COMPLETE {
                    return Err(BackendError::IncompleteFramebuffer(format!(
                        "status 0x{status:x}"
                    )));
                }
            }
            Ok(())
        })();

        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, None) };
        if let Err(e) = result {
            unsafe { self.gl.delete_framebuffer(framebuffer) };
            return Err(e);
        }

        let id = self.next_id();
        self.framebuffers.insert(id, framebuffer);
        Ok(FramebufferHandle(id))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()> {
        let native = self
            .framebuffers
            .remove(&framebuffer.0)
            .ok_or(BackendError::InvalidHandle("framebuffer", framebuffer.0))?;
        unsafe { self.gl.delete_framebuffer(native) };
        Ok(())
    }

    fn create_program(&mut self, vertex: &str, fragment: &str) -> BackendResult<ProgramHandle> {
        let vs = self.compile_stage(ShaderStage::Vertex, vertex)?;
        let fs = match self.compile_stage(ShaderStage::Fragment, fragment) {
            Ok(fs) => fs,
            Err(e) => {
                unsafe { self.gl.delete_shader(vs) };
                return Err(e);
            }
        };

        let program = unsafe {
            let program = match self.gl.create_program() {
                Ok(program) => program,
                Err(e) => {
                    self.gl.delete_shader(vs);
                    self.gl.delete_shader(fs);
                    return Err(BackendError::ResourceCreationFailed(e));
                }
            };
            self.gl.attach_shader(program, vs);
            self.gl.attach_shader(program, fs);
            self.gl.link_program(program);
            self.gl.detach_shader(program, vs);
            self.gl.detach_shader(program, fs);
            self.gl.delete_shader(vs);
            self.gl.delete_shader(fs);

            if !self.gl.get_program_link_status(program) {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(BackendError::ProgramLinkFailed(log));
            }
            program
        };

        let id = self.next_id();
        self.programs.insert(id, program);
        Ok(ProgramHandle(id))
    }

    fn destroy_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        let native = self
            .programs
            .remove(&program.0)
            .ok_or(BackendError::InvalidHandle("program", program.0))?;
        unsafe { self.gl.delete_program(native) };
        Ok(())
    }

    fn attribute_location(&mut self, program: ProgramHandle, name: &str) -> Option<AttributeLocation> {
        let native = *self.programs.get(&program.0)?;
        unsafe { self.gl.get_attrib_location(native, name) }.map(AttributeLocation)
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let native = *self.programs.get(&program.0)?;
        let location = unsafe { self.gl.get_uniform_location(native, name) }?;
        let id = self.next_id();
        self.uniforms.insert(id, location);
        Some(UniformLocation(id))
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let native = self.programs.get(&program.0).copied();
        if native.is_none() {
            log::warn!("use_program with unknown program {}", program.0);
        }
        unsafe {
            self.gl.bind_vertex_array(self.vertex_array);
            for location in self.attributes.reset() {
                self.gl.disable_vertex_attrib_array(location);
            }
            self.gl.use_program(native);
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>, width: u32, height: u32) {
        let native = framebuffer.and_then(|f| self.framebuffers.get(&f.0).copied());
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, native);
            self.gl.viewport(0, 0, width as i32, height as i32);
        }
    }

    fn clear(&mut self, values: &ClearValues) {
        let mut mask = 0;
        unsafe {
            if let Some([r, g, b, a]) = values.color {
                self.gl.color_mask(true, true, true, true);
                self.gl.clear_color(r, g, b, a);
                mask |= glow::COLOR_BUFFER_BIT;
            }
            if let Some(depth) = values.depth {
                self.gl.depth_mask(true);
                self.gl.clear_depth_f32(depth);
                mask |= glow::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                self.gl.clear(mask);
            }
        }
    }

    fn set_render_state(&mut self, state: &RenderState) {
        unsafe {
            match state.blend {
                Some(blend) => {
                    self.gl.enable(glow::BLEND);
                    self.gl
                        .blend_func(blend_factor(blend.src_factor), blend_factor(blend.dst_factor));
                }
                None => self.gl.disable(glow::BLEND),
            }
            match state.depth.compare {
                Some(compare) => {
                    self.gl.enable(glow::DEPTH_TEST);
                    self.gl.depth_func(compare_function(compare));
                }
                None => self.gl.disable(glow::DEPTH_TEST),
            }
            self.gl.depth_mask(state.depth.write);
            match state.cull {
                CullMode::None => self.gl.disable(glow::CULL_FACE),
                CullMode::Front => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::FRONT);
                }
                CullMode::Back => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::BACK);
                }
            }
        }
    }

    fn set_attribute(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        components: u32,
        ty: AttributeType,
    ) {
        let Some(native) = self.buffers.get(&buffer.0).copied() else {
            log::warn!("set_attribute with unknown buffer {}", buffer.0);
            return;
        };
        unsafe {
            self.gl.bind_vertex_array(self.vertex_array);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(native));
            if self.attributes.enable(location.0) {
                self.gl.enable_vertex_attrib_array(location.0);
            }
            match ty {
                AttributeType::Float => self.gl.vertex_attrib_pointer_f32(
                    location.0,
                    components as i32,
                    glow::FLOAT,
                    false,
                    0,
                    0,
                ),
                AttributeType::UnsignedByte => self.gl.vertex_attrib_pointer_f32(
                    location.0,
                    components as i32,
                    glow::UNSIGNED_BYTE,
                    true,
                    0,
                    0,
                ),
                AttributeType::Int => {
                    self.gl
                        .vertex_attrib_pointer_i32(location.0, components as i32, glow::INT, 0, 0)
                }
            }
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>) {
        let Some(native) = self.uniforms.get(&location.0) else {
            return;
        };
        let native = Some(native);
        unsafe {
            match value {
                UniformValue::Float(v) => self.gl.uniform_1_f32_slice(native, v),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32_slice(native, v),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32_slice(native, v),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32_slice(native, v),
                UniformValue::Mat3(v) => self.gl.uniform_matrix_3_f32_slice(native, false, v),
                UniformValue::Mat4(v) => self.gl.uniform_matrix_4_f32_slice(native, false, v),
                UniformValue::Int(v) => self.gl.uniform_1_i32_slice(native, v),
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        let native = self.textures.get(&texture.0).map(|(t, _)| *t);
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, native);
        }
    }

    fn draw_indexed(&mut self, indices: BufferHandle, count: u32, format: IndexFormat) {
        let Some(native) = self.buffers.get(&indices.0).copied() else {
            log::warn!("draw_indexed with unknown index buffer {}", indices.0);
            return;
        };
        let element_type = match format {
            IndexFormat::Uint16 => glow::UNSIGNED_SHORT,
            IndexFormat::Uint32 => glow::UNSIGNED_INT,
        };
        unsafe {
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(native));
            self.gl
                .draw_elements(glow::TRIANGLES, count as i32, element_type, 0);
        }
    }
}

impl Drop for GlBackend {
    fn drop(&mut self) {
        let leaked = self.buffers.len()
            + self.textures.len()
            + self.renderbuffers.len()
            + self.framebuffers.len()
            + self.programs.len();
        if leaked > 0 {
            log::warn!("GlBackend dropped with {} live objects", leaked);
        }
        if let Some(vao) = self.vertex_array.take() {
            unsafe { self.gl.delete_vertex_array(vao) };
        }
    }
}
