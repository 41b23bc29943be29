//! GPU-less [`GraphicsContext`] that validates shaders with naga and records
//! every command it receives.
//!
//! Used by `backdrop check` to smoke-test a fragment shader without opening a
//! window, and by the test suite to assert on the exact command stream a
//! frame produces.

use std::collections::{HashMap, VecDeque};

use image::RgbaImage;

use crate::backend::{
    BackendError, BufferId, BufferUsage, DrawMode, GraphicsContext, ProgramId, Sampling, ShaderId,
    TextureId, UniformLocation, UniformSlot, UniformValue, VertexLayout,
};
use crate::compile::{prepare_stage, PreparedStage, POSITION_ATTRIBUTE};
use crate::types::StageKind;

/// One command as seen by the headless backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    CreateShader {
        shader: ShaderId,
        kind: StageKind,
    },
    DeleteShader(ShaderId),
    LinkProgram(ProgramId),
    UseProgram(ProgramId),
    CreateBuffer {
        buffer: BufferId,
        floats: usize,
        usage: BufferUsage,
    },
    VertexAttribPointer {
        location: u32,
        buffer: BufferId,
        layout: VertexLayout,
    },
    CreateTexture(TextureId),
    UploadTexture {
        texture: TextureId,
        width: u32,
        height: u32,
        sampling: Sampling,
    },
    Viewport {
        width: u32,
        height: u32,
    },
    Clear,
    Uniform {
        slot: UniformSlot,
        value: UniformValue,
    },
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    Draw {
        mode: DrawMode,
        first: u32,
        count: u32,
    },
    Present,
}

/// Texture edge limit reported by wgpu's default limits.
const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

#[derive(Debug, Default)]
pub struct HeadlessContext {
    max_texture_dimension: Option<u32>,
    next_id: u32,
    shaders: HashMap<ShaderId, PreparedStage>,
    programs: HashMap<ProgramId, Vec<UniformSlot>>,
    current_program: Option<ProgramId>,
    uniforms: HashMap<UniformSlot, UniformValue>,
    buffers: HashMap<BufferId, usize>,
    attribute_bound: bool,
    textures: HashMap<TextureId, Option<(u32, u32)>>,
    bound_textures: HashMap<u32, TextureId>,
    viewport: Option<(u32, u32)>,
    present_failures: VecDeque<BackendError>,
    calls: Vec<RecordedCall>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowers the largest texture edge accepted by `upload_texture`.
    pub fn with_max_texture_dimension(mut self, max: u32) -> Self {
        self.max_texture_dimension = Some(max);
        self
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Every command received so far, in order.
    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Forgets the recorded commands but keeps object state.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Shader stages created and not yet deleted.
    pub fn live_shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Last value written to `slot` on the current program.
    pub fn uniform_value(&self, slot: UniformSlot) -> Option<UniformValue> {
        self.uniforms.get(&slot).copied()
    }

    pub fn current_viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.bound_textures.get(&unit).copied()
    }

    /// Dimensions of the last upload, `None` while the texture is empty.
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied().flatten()
    }

    pub fn draw_count(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::Draw { .. }))
    }

    pub fn upload_count(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::UploadTexture { .. }))
    }

    fn count(&self, predicate: impl Fn(&RecordedCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Makes the next `present` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next_present(&mut self, error: BackendError) {
        self.present_failures.push_back(error);
    }
}

impl GraphicsContext for HeadlessContext {
    fn create_shader(&mut self, kind: StageKind, source: &str) -> Result<ShaderId, String> {
        let stage = prepare_stage(kind, source)?;
        let shader = ShaderId(self.next_id());
        self.shaders.insert(shader, stage);
        self.calls.push(RecordedCall::CreateShader { shader, kind });
        Ok(shader)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if self.shaders.remove(&shader).is_some() {
            self.calls.push(RecordedCall::DeleteShader(shader));
        }
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let vertex_stage = self
            .shaders
            .get(&vertex)
            .ok_or_else(|| format!("unknown vertex shader {}", vertex.0))?;
        let fragment_stage = self
            .shaders
            .get(&fragment)
            .ok_or_else(|| format!("unknown fragment shader {}", fragment.0))?;
        if vertex_stage.kind != StageKind::Vertex || fragment_stage.kind != StageKind::Fragment {
            return Err("link requires one vertex and one fragment stage".to_string());
        }
        let active = fragment_stage.active_uniforms.clone();
        let program = ProgramId(self.next_id());
        self.programs.insert(program, active);
        self.calls.push(RecordedCall::LinkProgram(program));
        Ok(program)
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.current_program != Some(program) {
            self.uniforms.clear();
        }
        self.current_program = Some(program);
        self.calls.push(RecordedCall::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let slot = UniformSlot::from_glsl_name(name)?;
        self.programs
            .get(&program)
            .filter(|active| active.contains(&slot))
            .map(|_| UniformLocation { program, slot })
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        (self.programs.contains_key(&program) && name == POSITION_ATTRIBUTE).then_some(0)
    }

    fn create_buffer(&mut self, data: &[f32], usage: BufferUsage) -> Result<BufferId, BackendError> {
        let buffer = BufferId(self.next_id());
        self.buffers.insert(buffer, data.len());
        self.calls.push(RecordedCall::CreateBuffer {
            buffer,
            floats: data.len(),
            usage,
        });
        Ok(buffer)
    }

    fn vertex_attrib_pointer(&mut self, location: u32, buffer: BufferId, layout: VertexLayout) {
        self.attribute_bound = self.buffers.contains_key(&buffer);
        self.calls.push(RecordedCall::VertexAttribPointer {
            location,
            buffer,
            layout,
        });
    }

    fn create_texture(&mut self) -> Result<TextureId, BackendError> {
        let texture = TextureId(self.next_id());
        self.textures.insert(texture, None);
        self.calls.push(RecordedCall::CreateTexture(texture));
        Ok(texture)
    }

    fn upload_texture(
        &mut self,
        texture: TextureId,
        image: &RgbaImage,
        sampling: Sampling,
    ) -> Result<(), BackendError> {
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or(BackendError::UnknownHandle("texture"))?;
        let max = self
            .max_texture_dimension
            .unwrap_or(DEFAULT_MAX_TEXTURE_DIMENSION);
        let (width, height) = image.dimensions();
        if width > max || height > max {
            return Err(BackendError::Rejected(format!(
                "image is {width}x{height}, device limit is {max}"
            )));
        }
        *slot = Some((width, height));
        self.calls.push(RecordedCall::UploadTexture {
            texture,
            width: image.width(),
            height: image.height(),
            sampling,
        });
        Ok(())
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.viewport = Some((width, height));
        self.calls.push(RecordedCall::Viewport { width, height });
    }

    fn clear(&mut self) {
        self.calls.push(RecordedCall::Clear);
    }

    fn uniform(&mut self, location: Option<&UniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        if self.current_program != Some(location.program) {
            return;
        }
        self.uniforms.insert(location.slot, value);
        self.calls.push(RecordedCall::Uniform {
            slot: location.slot,
            value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.bound_textures.insert(unit, texture);
        self.calls.push(RecordedCall::BindTexture { unit, texture });
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) -> Result<(), BackendError> {
        if self.current_program.is_none() {
            return Err(BackendError::UnknownHandle("program"));
        }
        if !self.attribute_bound {
            return Err(BackendError::UnknownHandle("vertex buffer"));
        }
        self.calls.push(RecordedCall::Draw { mode, first, count });
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        if let Some(error) = self.present_failures.pop_front() {
            return Err(error);
        }
        self.calls.push(RecordedCall::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_fragment_with_log() {
        let mut ctx = HeadlessContext::new();
        let log = ctx
            .create_shader(StageKind::Fragment, "void main() { gl_FragColor = vec4(; }")
            .unwrap_err();
        assert!(!log.is_empty());
        assert_eq!(ctx.live_shader_count(), 0);
    }

    #[test]
    fn draw_without_program_is_an_error() {
        let mut ctx = HeadlessContext::new();
        let err = ctx.draw_arrays(DrawMode::TriangleStrip, 0, 4).unwrap_err();
        assert!(matches!(err, BackendError::UnknownHandle("program")));
    }

    #[test]
    fn injected_present_failures_are_consumed_in_order() {
        let mut ctx = HeadlessContext::new();
        ctx.fail_next_present(BackendError::SurfaceLost("outdated".into()));
        assert!(ctx.present().is_err());
        assert!(ctx.present().is_ok());
        assert_eq!(ctx.calls(), &[RecordedCall::Present]);
    }

    #[test]
    fn upload_to_unknown_texture_fails() {
        let mut ctx = HeadlessContext::new();
        let err = ctx
            .upload_texture(TextureId(42), &RgbaImage::new(1, 1), Sampling::BACKGROUND)
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownHandle("texture")));
    }

    #[test]
    fn upload_beyond_texture_limit_is_rejected() {
        let mut ctx = HeadlessContext::new().with_max_texture_dimension(16);
        let texture = ctx.create_texture().unwrap();
        let err = ctx
            .upload_texture(texture, &RgbaImage::new(17, 1), Sampling::BACKGROUND)
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
        assert_eq!(ctx.texture_size(texture), None);
        assert_eq!(ctx.upload_count(), 0);
        ctx.upload_texture(texture, &RgbaImage::new(16, 16), Sampling::BACKGROUND)
            .unwrap();
        assert_eq!(ctx.texture_size(texture), Some((16, 16)));
    }
}
