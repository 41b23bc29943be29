//! Builds the single background program and resolves its uniforms.

use tracing::{debug, error};

use crate::backend::{
    BackendError, GraphicsContext, ProgramId, ShaderId, UniformLocation, UniformSlot, UniformValue,
};
use crate::compile::VERTEX_SHADER_GLSL;
use crate::types::StageKind;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: StageKind, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Linked vertex + fragment program. Immutable once built.
#[derive(Debug)]
pub struct RenderProgram {
    id: ProgramId,
}

impl RenderProgram {
    pub fn id(&self) -> ProgramId {
        self.id
    }
}

/// Compiles one stage, surfacing the info log instead of panicking.
pub fn compile<C: GraphicsContext>(
    ctx: &mut C,
    stage: StageKind,
    source: &str,
) -> Result<ShaderId, PipelineError> {
    ctx.create_shader(stage, source).map_err(|log| {
        error!(%stage, "shader error:\n{log}");
        PipelineError::Compile { stage, log }
    })
}

/// Links two compiled stages and makes the result the current program.
///
/// The stage objects are released whether or not linking succeeds.
pub fn link<C: GraphicsContext>(
    ctx: &mut C,
    vertex: ShaderId,
    fragment: ShaderId,
) -> Result<RenderProgram, PipelineError> {
    let linked = ctx.link_program(vertex, fragment);
    ctx.delete_shader(vertex);
    ctx.delete_shader(fragment);
    let id = linked.map_err(|log| {
        error!("program link error:\n{log}");
        PipelineError::Link { log }
    })?;
    ctx.use_program(id);
    Ok(RenderProgram { id })
}

/// Compiles the fixed vertex stage plus a caller supplied fragment stage.
#[derive(Debug, Default)]
pub struct ProgramBuilder;

impl ProgramBuilder {
    pub fn build<C: GraphicsContext>(
        ctx: &mut C,
        fragment_source: &str,
    ) -> Result<RenderProgram, PipelineError> {
        let vertex = compile(ctx, StageKind::Vertex, VERTEX_SHADER_GLSL)?;
        let fragment = match compile(ctx, StageKind::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                ctx.delete_shader(vertex);
                return Err(err);
            }
        };
        let program = link(ctx, vertex, fragment)?;
        debug!(program = program.id.0, "background program linked");
        Ok(program)
    }
}

/// Uniform handles resolved once against the linked program.
#[derive(Debug, Clone, Copy)]
pub struct UniformSet {
    pub resolution: Option<UniformLocation>,
    pub time: Option<UniformLocation>,
    pub mouse: Option<UniformLocation>,
    pub texture: Option<UniformLocation>,
}

impl UniformSet {
    pub fn resolve<C: GraphicsContext>(ctx: &C, program: &RenderProgram) -> Self {
        let lookup = |slot: UniformSlot| {
            let location = ctx.uniform_location(program.id, slot.glsl_name());
            if location.is_none() {
                debug!(uniform = slot.glsl_name(), "uniform not active in fragment shader");
            }
            location
        };
        Self {
            resolution: lookup(UniformSlot::Resolution),
            time: lookup(UniformSlot::Time),
            mouse: lookup(UniformSlot::Mouse),
            texture: lookup(UniformSlot::Channel0),
        }
    }

    pub fn push_resolution<C: GraphicsContext>(&self, ctx: &mut C, width: f32, height: f32) {
        ctx.uniform(
            self.resolution.as_ref(),
            UniformValue::Vec3([width, height, 1.0]),
        );
    }

    pub fn push_time<C: GraphicsContext>(&self, ctx: &mut C, seconds: f32) {
        ctx.uniform(self.time.as_ref(), UniformValue::Float(seconds));
    }

    pub fn push_mouse<C: GraphicsContext>(&self, ctx: &mut C, position: [f32; 2]) {
        ctx.uniform(
            self.mouse.as_ref(),
            UniformValue::Vec4([position[0], position[1], 0.0, 0.0]),
        );
    }

    pub fn push_texture_unit<C: GraphicsContext>(&self, ctx: &mut C, unit: u32) {
        ctx.uniform(self.texture.as_ref(), UniformValue::Int(unit as i32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessContext, RecordedCall};

    const FULL: &str = r#"
        precision mediump float;
        uniform vec3 iResolution;
        uniform float iTime;
        uniform vec4 iMouse;
        uniform sampler2D iChannel0;
        void main() {
            vec2 uv = gl_FragCoord.xy / iResolution.xy;
            gl_FragColor = texture2D(iChannel0, uv) * (0.5 + 0.5 * sin(iTime)) + iMouse / 1000.0;
        }
    "#;

    #[test]
    fn builds_and_activates_program() {
        let mut ctx = HeadlessContext::new();
        let program = ProgramBuilder::build(&mut ctx, FULL).expect("build");
        assert!(ctx
            .calls()
            .contains(&RecordedCall::UseProgram(program.id())));
        assert_eq!(ctx.live_shader_count(), 0);
    }

    #[test]
    fn resolves_all_active_uniforms() {
        let mut ctx = HeadlessContext::new();
        let program = ProgramBuilder::build(&mut ctx, FULL).expect("build");
        let uniforms = UniformSet::resolve(&ctx, &program);
        assert!(uniforms.resolution.is_some());
        assert!(uniforms.time.is_some());
        assert!(uniforms.mouse.is_some());
        assert!(uniforms.texture.is_some());
    }

    #[test]
    fn missing_uniform_resolves_to_none_and_writes_are_ignored() {
        let mut ctx = HeadlessContext::new();
        let source = r#"
            uniform float iTime;
            void main() { gl_FragColor = vec4(fract(iTime)); }
        "#;
        let program = ProgramBuilder::build(&mut ctx, source).expect("build");
        let uniforms = UniformSet::resolve(&ctx, &program);
        assert!(uniforms.mouse.is_none());
        uniforms.push_mouse(&mut ctx, [4.0, 2.0]);
        uniforms.push_time(&mut ctx, 1.5);
        assert_eq!(ctx.uniform_value(UniformSlot::Mouse), None);
        assert_eq!(
            ctx.uniform_value(UniformSlot::Time),
            Some(UniformValue::Float(1.5))
        );
    }

    #[test]
    fn compile_failure_is_reported_not_thrown() {
        let mut ctx = HeadlessContext::new();
        let err = ProgramBuilder::build(&mut ctx, "void main() { gl_FragColor = ; }").unwrap_err();
        match err {
            PipelineError::Compile { stage, log } => {
                assert_eq!(stage, StageKind::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctx.live_shader_count(), 0);
        assert!(!ctx
            .calls()
            .iter()
            .any(|call| matches!(call, RecordedCall::UseProgram(_))));
    }
}
