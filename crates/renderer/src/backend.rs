//! GL-shaped command surface shared by the GPU and headless backends.
//!
//! The pipeline components (`program`, `geometry`, `texture`, `frame`) only
//! talk to a [`GraphicsContext`]. Objects are referred to through small copy
//! handles in the spirit of `glow`, so components can hold on to them without
//! borrowing the context. Uniform writes take an `Option` location: a `None`
//! location is a silent no-op, which is how shaders that do not use one of
//! the background uniforms keep working.

use image::RgbaImage;

use crate::types::StageKind;

/// Handle to a compiled (not yet linked) shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

/// Handle to a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Handle to a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Handle to a 2-D texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Uniforms the background program understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    Resolution,
    Time,
    Mouse,
    Channel0,
}

impl UniformSlot {
    pub const ALL: [UniformSlot; 4] = [
        UniformSlot::Resolution,
        UniformSlot::Time,
        UniformSlot::Mouse,
        UniformSlot::Channel0,
    ];

    /// Name the fragment source uses for this uniform.
    pub fn glsl_name(self) -> &'static str {
        match self {
            UniformSlot::Resolution => "iResolution",
            UniformSlot::Time => "iTime",
            UniformSlot::Mouse => "iMouse",
            UniformSlot::Channel0 => "iChannel0",
        }
    }

    pub fn from_glsl_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.glsl_name() == name)
    }
}

/// Resolved uniform location. Only valid for the program it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub slot: UniformSlot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times.
    Static,
    Dynamic,
}

/// Float attribute layout, mirroring `vertexAttribPointer`.
///
/// A stride of zero means tightly packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
}

impl VertexLayout {
    pub const fn packed(components: u32) -> Self {
        Self {
            components,
            stride: 0,
            offset: 0,
        }
    }

    /// Distance in bytes between two consecutive vertices.
    pub fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.components * std::mem::size_of::<f32>() as u32
        } else {
            self.stride
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Triangles,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

/// Sampler state applied when image data is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mipmaps: bool,
}

impl Sampling {
    /// Linear filtering, clamped on both axes, no mipmaps. Safe for
    /// non-power-of-two images and free of edge seams.
    pub const BACKGROUND: Sampling = Sampling {
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        wrap_s: WrapMode::ClampToEdge,
        wrap_t: WrapMode::ClampToEdge,
        mipmaps: false,
    };
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The presentation surface went away or is out of date. The next frame
    /// reconfigures it.
    #[error("surface lost: {0}")]
    SurfaceLost(String),
    /// The device cannot continue rendering.
    #[error("fatal graphics error: {0}")]
    Fatal(String),
    #[error("unknown {0} handle")]
    UnknownHandle(&'static str),
    /// The context refused a resource, e.g. an image larger than the device
    /// supports. Nothing was changed.
    #[error("resource rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BackendError::SurfaceLost(_))
    }
}

/// Commands the background pipeline issues against a rendering context.
///
/// Compile and link failures return the implementation's info log as the
/// error so callers can surface it verbatim.
pub trait GraphicsContext {
    fn create_shader(&mut self, kind: StageKind, source: &str) -> Result<ShaderId, String>;

    fn delete_shader(&mut self, shader: ShaderId);

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String>;

    fn use_program(&mut self, program: ProgramId);

    /// Returns `None` when the program has no active uniform with that name.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;

    fn create_buffer(&mut self, data: &[f32], usage: BufferUsage) -> Result<BufferId, BackendError>;

    fn vertex_attrib_pointer(&mut self, location: u32, buffer: BufferId, layout: VertexLayout);

    /// Creates an empty texture object. Sampling it before any upload yields
    /// implementation-defined (empty) data.
    fn create_texture(&mut self) -> Result<TextureId, BackendError>;

    fn upload_texture(
        &mut self,
        texture: TextureId,
        image: &RgbaImage,
        sampling: Sampling,
    ) -> Result<(), BackendError>;

    fn viewport(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    /// Writes a uniform on the current program; `None` is a no-op.
    fn uniform(&mut self, location: Option<&UniformLocation>, value: UniformValue);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) -> Result<(), BackendError>;

    /// Hands the finished frame to the host compositor.
    fn present(&mut self) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_layout_stride_matches_components() {
        let layout = VertexLayout::packed(2);
        assert_eq!(layout.effective_stride(), 8);
        let explicit = VertexLayout {
            components: 2,
            stride: 16,
            offset: 0,
        };
        assert_eq!(explicit.effective_stride(), 16);
    }

    #[test]
    fn uniform_slots_round_trip_their_names() {
        for slot in UniformSlot::ALL {
            assert_eq!(UniformSlot::from_glsl_name(slot.glsl_name()), Some(slot));
        }
        assert_eq!(UniformSlot::from_glsl_name("iFrame"), None);
    }
}
