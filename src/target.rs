//! Render targets
//!
//! A [`Target`] is either the window's default framebuffer or an offscreen
//! framebuffer owning its attachments. Pipelines and painters only ask
//! [`Target::attachment_target`] which framebuffer to bind.

use std::mem;

use crate::backend::*;
use crate::resources::Texture;

/// Storage backing an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Sampleable by later passes
    Texture,
    /// Write-only storage
    Renderbuffer,
}

/// Format and storage of one attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub format: TextureFormat,
    pub kind: AttachmentKind,
}

impl AttachmentSpec {
    pub fn texture(format: TextureFormat) -> Self {
        Self {
            format,
            kind: AttachmentKind::Texture,
        }
    }

    pub fn renderbuffer(format: TextureFormat) -> Self {
        Self {
            format,
            kind: AttachmentKind::Renderbuffer,
        }
    }
}

#[derive(Debug)]
enum Attachment {
    Texture(Texture),
    Renderbuffer(RenderbufferHandle, TextureFormat),
}

impl Attachment {
    fn create(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        spec: AttachmentSpec,
        width: u32,
        height: u32,
    ) -> BackendResult<Self> {
        match spec.kind {
            AttachmentKind::Texture => {
                let desc = TextureDescriptor::attachment(label, width, height, spec.format);
                Ok(Attachment::Texture(Texture::new(backend, desc, None)?))
            }
            AttachmentKind::Renderbuffer => Ok(Attachment::Renderbuffer(
                backend.create_renderbuffer(spec.format, width, height)?,
                spec.format,
            )),
        }
    }

    fn handle(&self) -> AttachmentHandle {
        match self {
            Attachment::Texture(texture) => AttachmentHandle::Texture(texture.handle()),
            Attachment::Renderbuffer(handle, _) => AttachmentHandle::Renderbuffer(*handle),
        }
    }

    fn spec(&self) -> AttachmentSpec {
        match self {
            Attachment::Texture(texture) => AttachmentSpec::texture(texture.format()),
            Attachment::Renderbuffer(_, format) => AttachmentSpec::renderbuffer(*format),
        }
    }

    fn dispose(self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        match self {
            Attachment::Texture(texture) => texture.dispose(backend),
            Attachment::Renderbuffer(handle, _) => backend.destroy_renderbuffer(handle),
        }
    }
}

#[derive(Debug)]
enum TargetKind {
    Offscreen {
        framebuffer: FramebufferHandle,
        colors: Vec<Attachment>,
        depth: Option<Attachment>,
    },
    Default,
}

/// A framebuffer a pass renders into
#[derive(Debug)]
pub struct Target {
    label: String,
    kind: TargetKind,
    width: u32,
    height: u32,
}

impl Target {
    /// The window surface. Owns nothing.
    pub fn default_framebuffer(width: u32, height: u32) -> Self {
        Self {
            label: "default".to_string(),
            kind: TargetKind::Default,
            width,
            height,
        }
    }

    /// Offscreen framebuffer with `colors` in draw-buffer order and an optional depth attachment.
    pub fn offscreen(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        width: u32,
        height: u32,
        colors: &[AttachmentSpec],
        depth: Option<AttachmentSpec>,
    ) -> BackendResult<Self> {
        let kind = Self::create_offscreen(backend, label, width, height, colors, depth)?;
        log::debug!(
            "Created target '{}' ({}x{}, {} color attachments, depth: {})",
            label,
            width,
            height,
            colors.len(),
            depth.is_some()
        );
        Ok(Self {
            label: label.to_string(),
            kind,
            width,
            height,
        })
    }

    fn create_offscreen(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        width: u32,
        height: u32,
        colors: &[AttachmentSpec],
        depth: Option<AttachmentSpec>,
    ) -> BackendResult<TargetKind> {
        let mut created: Vec<Attachment> = Vec::with_capacity(colors.len() + 1);
        let specs = colors.iter().copied().chain(depth);
        for (index, spec) in specs.enumerate() {
            match Attachment::create(backend, &format!("{label}.{index}"), spec, width, height) {
                Ok(attachment) => created.push(attachment),
                Err(err) => {
                    release_all(backend, created);
                    return Err(err);
                }
            }
        }

        let depth = match depth {
            Some(_) => created.pop(),
            None => None,
        };
        let handles: Vec<AttachmentHandle> = created.iter().map(Attachment::handle).collect();
        match backend.create_framebuffer(&handles, depth.as_ref().map(Attachment::handle)) {
            Ok(framebuffer) => Ok(TargetKind::Offscreen {
                framebuffer,
                colors: created,
                depth,
            }),
            Err(err) => {
                release_all(backend, created.into_iter().chain(depth));
                Err(err)
            }
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_default(&self) -> bool {
        matches!(self.kind, TargetKind::Default)
    }

    /// Framebuffer to bind, `None` for the default framebuffer.
    pub fn attachment_target(&self) -> Option<FramebufferHandle> {
        match &self.kind {
            TargetKind::Offscreen { framebuffer, .. } => Some(*framebuffer),
            TargetKind::Default => None,
        }
    }

    /// Bind for drawing and set the viewport to the full target.
    pub fn bind(&self, backend: &mut dyn GraphicsBackend) {
        backend.bind_framebuffer(self.attachment_target(), self.width, self.height);
    }

    pub fn clear(&self, backend: &mut dyn GraphicsBackend, values: &ClearValues) {
        self.bind(backend);
        backend.clear(values);
    }

    /// Texture behind color attachment `index`, if it is sampleable.
    pub fn color_texture(&self, index: usize) -> Option<TextureHandle> {
        match &self.kind {
            TargetKind::Offscreen { colors, .. } => match colors.get(index) {
                Some(Attachment::Texture(texture)) => Some(texture.handle()),
                _ => None,
            },
            TargetKind::Default => None,
        }
    }

    pub fn depth_texture(&self) -> Option<TextureHandle> {
        match &self.kind {
            TargetKind::Offscreen {
                depth: Some(Attachment::Texture(texture)),
                ..
            } => Some(texture.handle()),
            _ => None,
        }
    }

    /// Recreate the attachments at the new size, keeping their formats.
    pub fn resize(&mut self, backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> BackendResult<()> {
        if width == self.width && height == self.height {
            return Ok(());
        }
        if let TargetKind::Offscreen { colors, depth, .. } = &self.kind {
            let colors: Vec<AttachmentSpec> = colors.iter().map(Attachment::spec).collect();
            let depth = depth.as_ref().map(Attachment::spec);
            let kind = Self::create_offscreen(backend, &self.label, width, height, &colors, depth)?;
            let old = mem::replace(&mut self.kind, kind);
            Self::release(backend, old)?;
        }
        log::debug!("Resized target '{}' to {}x{}", self.label, width, height);
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn dispose(mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        let kind = mem::replace(&mut self.kind, TargetKind::Default);
        Self::release(backend, kind)
    }

    fn release(backend: &mut dyn GraphicsBackend, kind: TargetKind) -> BackendResult<()> {
        if let TargetKind::Offscreen {
            framebuffer,
            colors,
            depth,
        } = kind
        {
            backend.destroy_framebuffer(framebuffer)?;
            for attachment in colors.into_iter().chain(depth) {
                attachment.dispose(backend)?;
            }
        }
        Ok(())
    }
}

impl Drop for Target {
    fn drop(&mut self) {
        if let TargetKind::Offscreen { framebuffer, .. } = &self.kind {
            log::warn!("Target '{}' ({:?}) dropped without dispose", self.label, framebuffer);
        }
    }
}

fn release_all(backend: &mut dyn GraphicsBackend, attachments: impl IntoIterator<Item = Attachment>) {
    for attachment in attachments {
        if let Err(err) = attachment.dispose(backend) {
            log::warn!("Failed to release attachment: {}", err);
        }
    }
}
