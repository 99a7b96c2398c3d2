//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. It tracks every handle it hands out,
//! reflects attribute and uniform declarations straight from the GLSL text and
//! records each state change or draw as a [`Command`], so the binding and
//! batching layers can be verified headless.

use std::collections::{HashMap, HashSet};

use crate::backend::traits::*;
use crate::backend::types::*;

/// A uniform upload captured by the dummy backend
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Floats(Vec<f32>),
    Ints(Vec<i32>),
}

/// A recorded native call
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UseProgram(ProgramHandle),
    BindFramebuffer {
        framebuffer: Option<FramebufferHandle>,
        width: u32,
        height: u32,
    },
    Clear(ClearValues),
    SetRenderState(RenderState),
    SetAttribute {
        name: String,
        buffer: BufferHandle,
        components: u32,
    },
    SetUniform {
        name: String,
        value: RecordedUniform,
    },
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    DrawIndexed {
        indices: BufferHandle,
        count: u32,
    },
}

#[derive(Debug)]
struct ProgramRecord {
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct AttachmentSize {
    width: u32,
    height: u32,
}

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_id: u64,
    allocation_budget: Option<usize>,
    buffers: HashMap<u64, (BufferKind, usize)>,
    textures: HashMap<u64, TextureDescriptor>,
    renderbuffers: HashMap<u64, (TextureFormat, AttachmentSize)>,
    framebuffers: HashMap<u64, (Vec<AttachmentHandle>, Option<AttachmentHandle>)>,
    programs: HashMap<u64, ProgramRecord>,
    uniform_locations: Vec<(ProgramHandle, String)>,
    current_program: Option<ProgramHandle>,
    attributes: AttributeArrays,
    commands: Vec<Command>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Let the next `count` allocations succeed and fail every one after that.
    pub fn fail_allocations_after(&mut self, count: usize) {
        self.allocation_budget = Some(count);
    }

    /// Every command recorded so far.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the command log.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Number of indexed draw calls recorded.
    pub fn draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .count()
    }

    /// Number of uploads to uniforms with the given name.
    pub fn uniform_uploads(&self, name: &str) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::SetUniform { name: n, .. } if n == name))
            .count()
    }

    /// The last value uploaded to a uniform.
    pub fn last_uniform(&self, name: &str) -> Option<&RecordedUniform> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::SetUniform { name: n, value } if n == name => Some(value),
            _ => None,
        })
    }

    /// Every texture bound, in order, with its unit.
    pub fn texture_bindings(&self) -> Vec<(u32, TextureHandle)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::BindTexture { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_renderbuffers(&self) -> usize {
        self.renderbuffers.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Descriptor a live texture was created with.
    /// Attribute locations enabled since the last `use_program`.
    pub fn enabled_attributes(&self) -> &[u32] {
        self.attributes.enabled()
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    /// Active uniform names reflected for a live program.
    pub fn program_uniforms(&self, program: ProgramHandle) -> Option<&[String]> {
        self.programs.get(&program.0).map(|p| p.uniforms.as_slice())
    }

    fn allocate(&mut self, what: &str) -> BackendResult<u64> {
        if let Some(budget) = self.allocation_budget.as_mut() {
            if *budget == 0 {
                log::trace!("DummyBackend: refusing allocation of {}", what);
                return Err(BackendError::ResourceCreationFailed(what.to_string()));
            }
            *budget -= 1;
        }
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        Ok(id)
    }

    fn attachment_size(&self, attachment: AttachmentHandle) -> BackendResult<AttachmentSize> {
        match attachment {
            AttachmentHandle::Texture(t) => self
                .textures
                .get(&t.0)
                .map(|d| AttachmentSize {
                    width: d.width,
                    height: d.height,
                })
                .ok_or(BackendError::InvalidHandle("texture", t.0)),
            AttachmentHandle::Renderbuffer(r) => self
                .renderbuffers
                .get(&r.0)
                .map(|(_, size)| *size)
                .ok_or(BackendError::InvalidHandle("renderbuffer", r.0)),
        }
    }
}

impl GraphicsBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn glsl_header(&self) -> &str {
        "#version 330 core"
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        let id = self.allocate("buffer")?;
        log::trace!("DummyBackend: creating {:?} buffer ({} bytes)", kind, data.len());
        self.buffers.insert(id, (kind, data.len()));
        Ok(BufferHandle(id))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()> {
        self.buffers
            .remove(&buffer.0)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle("buffer", buffer.0))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> BackendResult<TextureHandle> {
        let id = self.allocate("texture")?;
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}, {:?}, {} bytes)",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            data.map_or(0, <[u8]>::len)
        );
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()> {
        self.textures
            .remove(&texture.0)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle("texture", texture.0))
    }

    fn create_renderbuffer(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> BackendResult<RenderbufferHandle> {
        let id = self.allocate("renderbuffer")?;
        self.renderbuffers
            .insert(id, (format, AttachmentSize { width, height }));
        Ok(RenderbufferHandle(id))
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) -> BackendResult<()> {
        self.renderbuffers
            .remove(&renderbuffer.0)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle("renderbuffer", renderbuffer.0))
    }

    fn create_framebuffer(
        &mut self,
        colors: &[AttachmentHandle],
        depth: Option<AttachmentHandle>,
    ) -> BackendResult<FramebufferHandle> {
        let mut sizes = Vec::with_capacity(colors.len() + 1);
        for attachment in colors.iter().chain(depth.iter()) {
            sizes.push(self.attachment_size(*attachment)?);
        }
        let Some(first) = sizes.first().copied() else {
            return Err(BackendError::IncompleteFramebuffer(
                "no attachments".to_string(),
            ));
        };
        if sizes
            .iter()
            .any(|s| s.width != first.width || s.height != first.height)
        {
            return Err(BackendError::IncompleteFramebuffer(
                "attachment sizes differ".to_string(),
            ));
        }

        let id = self.allocate("framebuffer")?;
        self.framebuffers.insert(id, (colors.to_vec(), depth));
        Ok(FramebufferHandle(id))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()> {
        self.framebuffers
            .remove(&framebuffer.0)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle("framebuffer", framebuffer.0))
    }

    fn create_program(&mut self, vertex: &str, fragment: &str) -> BackendResult<ProgramHandle> {
        let vertex_lines = preprocess(vertex, ShaderStage::Vertex)?;
        let fragment_lines = preprocess(fragment, ShaderStage::Fragment)?;

        let attributes = declarations(&vertex_lines, &["in", "attribute"]);
        let mut uniforms = declarations(&vertex_lines, &["uniform"]);
        for name in declarations(&fragment_lines, &["uniform"]) {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }

        let id = self.allocate("program")?;
        log::trace!(
            "DummyBackend: linked program {} ({} attributes, {} uniforms)",
            id,
            attributes.len(),
            uniforms.len()
        );
        self.programs.insert(
            id,
            ProgramRecord {
                attributes,
                uniforms,
            },
        );
        Ok(ProgramHandle(id))
    }

    fn destroy_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.programs
            .remove(&program.0)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle("program", program.0))
    }

    fn attribute_location(&mut self, program: ProgramHandle, name: &str) -> Option<AttributeLocation> {
        let record = self.programs.get(&program.0)?;
        record
            .attributes
            .iter()
            .position(|a| a == name)
            .map(|index| AttributeLocation(index as u32))
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let record = self.programs.get(&program.0)?;
        if !record.uniforms.iter().any(|u| u == name) {
            return None;
        }
        self.uniform_locations.push((program, name.to_string()));
        Some(UniformLocation(self.uniform_locations.len() as u64 - 1))
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.attributes.reset();
        self.commands.push(Command::UseProgram(program));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>, width: u32, height: u32) {
        self.commands.push(Command::BindFramebuffer {
            framebuffer,
            width,
            height,
        });
    }

    fn clear(&mut self, values: &ClearValues) {
        self.commands.push(Command::Clear(*values));
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.commands.push(Command::SetRenderState(*state));
    }

    fn set_attribute(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        components: u32,
        _ty: AttributeType,
    ) {
        self.attributes.enable(location.0);
        let name = self
            .current_program
            .and_then(|p| self.programs.get(&p.0))
            .and_then(|p| p.attributes.get(location.0 as usize))
            .cloned()
            .unwrap_or_default();
        self.commands.push(Command::SetAttribute {
            name,
            buffer,
            components,
        });
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>) {
        let name = self
            .uniform_locations
            .get(location.0 as usize)
            .map(|(_, name)| name.clone())
            .unwrap_or_default();
        let value = match value {
            UniformValue::Int(v) => RecordedUniform::Ints(v.to_vec()),
            UniformValue::Float(v)
            | UniformValue::Vec2(v)
            | UniformValue::Vec3(v)
            | UniformValue::Vec4(v)
            | UniformValue::Mat3(v)
            | UniformValue::Mat4(v) => RecordedUniform::Floats(v.to_vec()),
        };
        self.commands.push(Command::SetUniform { name, value });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn draw_indexed(&mut self, indices: BufferHandle, count: u32, _format: IndexFormat) {
        log::trace!("DummyBackend: draw {} indices", count);
        self.commands.push(Command::DrawIndexed { indices, count });
    }
}

/// Run the subset of the GLSL preprocessor needed to find active declarations.
///
/// Returns the active lines. A live `#error` directive fails compilation with its line number.
fn preprocess(source: &str, stage: ShaderStage) -> BackendResult<Vec<String>> {
    let mut defines: HashMap<String, String> = HashMap::new();
    // (parent active, some branch taken, this branch active)
    let mut stack: Vec<(bool, bool, bool)> = Vec::new();
    let mut lines = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        let active = stack.last().map_or(true, |s| s.2);

        let Some(directive) = line.strip_prefix('#') else {
            if active {
                lines.push(line.to_string());
            }
            continue;
        };
        let directive = directive.trim_start();
        let (keyword, rest) = directive
            .split_once(char::is_whitespace)
            .map_or((directive, ""), |(k, r)| (k, r.trim()));

        match keyword {
            "ifdef" | "ifndef" | "if" => {
                let condition = match keyword {
                    "ifdef" => defines.contains_key(rest),
                    "ifndef" => !defines.contains_key(rest),
                    _ => evaluate(rest, &defines),
                };
                stack.push((active, condition, active && condition));
            }
            "elif" => {
                if let Some(top) = stack.last_mut() {
                    let condition = !top.1 && evaluate(rest, &defines);
                    top.1 |= condition;
                    top.2 = top.0 && condition;
                }
            }
            "else" => {
                if let Some(top) = stack.last_mut() {
                    top.2 = top.0 && !top.1;
                    top.1 = true;
                }
            }
            "endif" => {
                stack.pop();
            }
            "define" if active => {
                let (name, value) = rest
                    .split_once(char::is_whitespace)
                    .map_or((rest, "1"), |(n, v)| (n, v.trim()));
                defines.insert(name.to_string(), value.to_string());
            }
            "undef" if active => {
                defines.remove(rest);
            }
            "error" if active => {
                return Err(BackendError::ShaderCompilationFailed {
                    stage,
                    log: format!("ERROR: 0:{}: '#error' : {}", index + 1, rest),
                });
            }
            _ => {}
        }
    }

    Ok(lines)
}

fn evaluate(expression: &str, defines: &HashMap<String, String>) -> bool {
    let expression = expression.trim();
    if let Some(negated) = expression.strip_prefix('!') {
        return !evaluate(negated, defines);
    }
    if let Some(name) = expression.strip_prefix("defined") {
        let name = name.trim().trim_start_matches('(').trim_end_matches(')').trim();
        return defines.contains_key(name);
    }
    let value = defines
        .get(expression)
        .map(String::as_str)
        .unwrap_or(expression);
    match value {
        "true" => true,
        "false" => false,
        v => v.parse::<f64>().map(|n| n != 0.0).unwrap_or(false),
    }
}

/// Names declared with one of `qualifiers` (`uniform`, `in`, ...) in active lines.
fn declarations(lines: &[String], qualifiers: &[&str]) -> Vec<String> {
    const PRECISIONS: [&str; 4] = ["highp", "mediump", "lowp", "flat"];

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for line in lines {
        let code = line.split("//").next().unwrap_or("");
        let code = match code.trim_start().strip_prefix("layout") {
            Some(rest) => rest.split_once(')').map_or("", |(_, r)| r),
            None => code,
        };
        let mut tokens = code.split_whitespace();
        let Some(qualifier) = tokens.next() else {
            continue;
        };
        if !qualifiers.contains(&qualifier) {
            continue;
        }
        let mut tokens = tokens.filter(|t| !PRECISIONS.contains(t));
        let (Some(_ty), Some(name)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let name = name
            .trim_end_matches(';')
            .split('[')
            .next()
            .unwrap_or_default()
            .to_string();
        if !name.is_empty() && seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "#version 330 core
#define USE_NORMALS 1
layout(location = 0) in vec3 points;
#if USE_NORMALS
in vec3 normals;
#else
in vec2 coords;
#endif
uniform mat4 modelMatrix;
uniform highp vec3 lightColors[4];
void main() {}";

    #[test]
    fn test_reflects_active_declarations() {
        let mut backend = DummyBackend::new();
        let program = backend
            .create_program(VERTEX, "uniform sampler2D albedoMap;\nvoid main() {}")
            .unwrap();

        assert!(backend.attribute_location(program, "points").is_some());
        assert!(backend.attribute_location(program, "normals").is_some());
        assert!(backend.attribute_location(program, "coords").is_none());
        assert!(backend.uniform_location(program, "modelMatrix").is_some());
        assert!(backend.uniform_location(program, "lightColors").is_some());
        assert!(backend.uniform_location(program, "albedoMap").is_some());
        assert!(backend.uniform_location(program, "missing").is_none());
    }

    #[test]
    fn test_error_directive_fails_with_line() {
        let mut backend = DummyBackend::new();
        let err = backend
            .create_program("void main() {}", "#ifndef FOO\n#error FOO required\n#endif")
            .unwrap_err();
        match err {
            BackendError::ShaderCompilationFailed { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("0:2:"), "{log}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_program_switch_disables_previous_attributes() {
        let mut backend = DummyBackend::new();
        let lit = backend
            .create_program("in vec3 points;\nin vec3 normals;\nvoid main() {}", "void main() {}")
            .unwrap();
        let depth = backend
            .create_program("in vec3 points;\nvoid main() {}", "void main() {}")
            .unwrap();
        let buffer = backend.create_buffer(BufferKind::Vertex, &[0; 12]).unwrap();

        backend.use_program(lit);
        for name in ["points", "normals"] {
            let location = backend.attribute_location(lit, name).unwrap();
            backend.set_attribute(location, buffer, 3, AttributeType::Float);
        }
        assert_eq!(backend.enabled_attributes().len(), 2);

        backend.use_program(depth);
        assert!(backend.enabled_attributes().is_empty());
        let points = backend.attribute_location(depth, "points").unwrap();
        backend.set_attribute(points, buffer, 3, AttributeType::Float);
        assert_eq!(backend.enabled_attributes(), [points.0]);
    }

    #[test]
    fn test_allocation_budget() {
        let mut backend = DummyBackend::new();
        backend.fail_allocations_after(1);
        assert!(backend.create_buffer(BufferKind::Vertex, &[0; 4]).is_ok());
        assert_eq!(
            backend.create_buffer(BufferKind::Vertex, &[0; 4]),
            Err(BackendError::ResourceCreationFailed("buffer".to_string()))
        );
    }

    #[test]
    fn test_double_destroy_is_rejected() {
        let mut backend = DummyBackend::new();
        let texture = backend
            .create_texture(&TextureDescriptor::default(), None)
            .unwrap();
        assert!(backend.destroy_texture(texture).is_ok());
        assert!(matches!(
            backend.destroy_texture(texture),
            Err(BackendError::InvalidHandle("texture", _))
        ));
    }

    #[test]
    fn test_framebuffer_size_mismatch() {
        let mut backend = DummyBackend::new();
        let color = backend
            .create_texture(
                &TextureDescriptor::attachment("c", 4, 4, TextureFormat::Rgba8Unorm),
                None,
            )
            .unwrap();
        let depth = backend
            .create_renderbuffer(TextureFormat::Depth24, 8, 8)
            .unwrap();
        let result = backend.create_framebuffer(
            &[AttachmentHandle::Texture(color)],
            Some(AttachmentHandle::Renderbuffer(depth)),
        );
        assert!(matches!(result, Err(BackendError::IncompleteFramebuffer(_))));
    }
}
