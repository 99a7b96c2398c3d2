//! Common types shared between backends

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Depth24,
    Depth32Float,
    Depth24Stencil8,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24 | TextureFormat::Depth32Float | TextureFormat::Depth24Stencil8
        )
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::R32Float
            | TextureFormat::Depth24
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24Stencil8 => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

/// Filter mode for texture sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Address mode for texture sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: FilterMode,
    pub address_mode: AddressMode,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
        }
    }
}

impl TextureDescriptor {
    /// Descriptor for a render attachment sampled with texel fetches.
    pub fn attachment(label: &str, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: Some(label.to_string()),
            width,
            height,
            format,
            filter: FilterMode::Nearest,
            address_mode: AddressMode::ClampToEdge,
        }
    }

    /// Same descriptor at a new size.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self.clone()
        }
    }
}

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Index format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn size(&self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Component type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Float,
    Int,
    UnsignedByte,
}

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Value uploaded to a uniform location
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    Float(&'a [f32]),
    Vec2(&'a [f32]),
    Vec3(&'a [f32]),
    Vec4(&'a [f32]),
    Mat3(&'a [f32]),
    Mat4(&'a [f32]),
    Int(&'a [i32]),
}

impl UniformValue<'_> {
    /// Number of scalar components in the upload.
    pub fn len(&self) -> usize {
        match self {
            UniformValue::Float(v)
            | UniformValue::Vec2(v)
            | UniformValue::Vec3(v)
            | UniformValue::Vec4(v)
            | UniformValue::Mat3(v)
            | UniformValue::Mat4(v) => v.len(),
            UniformValue::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cull mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Compare function for depth testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend state (single equation for color and alpha, `src * s + dst * d`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

impl BlendState {
    pub fn alpha_blending() -> Self {
        Self {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        }
    }

    pub fn additive() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
        }
    }

    /// `dst * src`
    pub fn multiplicative() -> Self {
        Self {
            src_factor: BlendFactor::Dst,
            dst_factor: BlendFactor::Zero,
        }
    }
}

/// Depth test configuration. `compare == None` disables the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub compare: Option<CompareFunction>,
    pub write: bool,
}

impl DepthState {
    pub fn disabled() -> Self {
        Self {
            compare: None,
            write: false,
        }
    }

    pub fn read_write(compare: CompareFunction) -> Self {
        Self {
            compare: Some(compare),
            write: true,
        }
    }

    pub fn read_only(compare: CompareFunction) -> Self {
        Self {
            compare: Some(compare),
            write: false,
        }
    }
}

/// Fixed-function state applied before a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    pub blend: Option<BlendState>,
    pub depth: DepthState,
    pub cull: CullMode,
}

impl RenderState {
    /// Depth test and write, no blending, back-face culling.
    pub fn opaque() -> Self {
        Self {
            blend: None,
            depth: DepthState::read_write(CompareFunction::Less),
            cull: CullMode::Back,
        }
    }

    /// No depth, no blending, no culling.
    pub fn fullscreen() -> Self {
        Self {
            blend: None,
            depth: DepthState::disabled(),
            cull: CullMode::None,
        }
    }

    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = Some(blend);
        self
    }

    pub fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_cull(mut self, cull: CullMode) -> Self {
        self.cull = cull;
        self
    }
}

/// Values used when clearing a target. `None` leaves the attachment untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearValues {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
}

impl ClearValues {
    pub fn color_depth(color: [f32; 4], depth: f32) -> Self {
        Self {
            color: Some(color),
            depth: Some(depth),
        }
    }

    pub fn color(color: [f32; 4]) -> Self {
        Self {
            color: Some(color),
            depth: None,
        }
    }

    pub fn depth(depth: f32) -> Self {
        Self {
            color: None,
            depth: Some(depth),
        }
    }
}

/// Attribute arrays enabled on the shared vertex array since the last program switch
///
/// Every program draws through one vertex array, so a program must not see
/// arrays a previous program left enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeArrays {
    enabled: Vec<u32>,
}

impl AttributeArrays {
    /// Mark `location` enabled. True when the caller must enable it natively.
    pub fn enable(&mut self, location: u32) -> bool {
        if self.enabled.contains(&location) {
            return false;
        }
        self.enabled.push(location);
        true
    }

    /// Forget every enabled location, returning the ones to disable natively.
    pub fn reset(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.enabled)
    }

    pub fn enabled(&self) -> &[u32] {
        &self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_arrays_enable_once_and_reset() {
        let mut arrays = AttributeArrays::default();
        assert!(arrays.enable(0));
        assert!(arrays.enable(2));
        assert!(!arrays.enable(0));
        assert_eq!(arrays.enabled(), [0, 2]);
        assert_eq!(arrays.reset(), vec![0, 2]);
        assert!(arrays.enabled().is_empty());
    }

    #[test]
    fn test_depth_formats() {
        assert!(TextureFormat::Depth24.is_depth());
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Rgba16Float.is_depth());
        assert_eq!(TextureFormat::Rgba16Float.bytes_per_pixel(), 8);
    }

    #[test]
    fn test_render_state_builders() {
        let state = RenderState::fullscreen()
            .with_blend(BlendState::multiplicative())
            .with_cull(CullMode::Front);
        assert_eq!(state.depth, DepthState::disabled());
        assert_eq!(state.blend.map(|b| b.src_factor), Some(BlendFactor::Dst));
        assert_eq!(state.cull, CullMode::Front);
    }

    #[test]
    fn test_resized_descriptor_keeps_format() {
        let desc = TextureDescriptor::attachment("depth", 4, 4, TextureFormat::Depth24);
        let resized = desc.resized(8, 2);
        assert_eq!(resized.format, TextureFormat::Depth24);
        assert_eq!((resized.width, resized.height), (8, 2));
        assert_eq!(resized.filter, FilterMode::Nearest);
    }
}
