use tracing::warn;

use crate::backend::{BufferId, BufferUsage, DrawMode, GraphicsContext, VertexLayout};
use crate::compile::POSITION_ATTRIBUTE;
use crate::program::{PipelineError, RenderProgram};

/// Two triangles covering clip space, in triangle-strip order.
pub const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Floats per vertex in [`QUAD_VERTICES`].
pub const QUAD_COMPONENTS: u32 = 2;

/// Vertex buffer uploaded once and drawn every frame.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    buffer: BufferId,
    vertex_count: u32,
    mode: DrawMode,
}

impl Geometry {
    /// Uploads `vertices` and binds them to the program's `position`
    /// attribute as tightly packed pairs.
    pub fn upload<C: GraphicsContext>(
        ctx: &mut C,
        program: &RenderProgram,
        vertices: &[f32],
        usage: BufferUsage,
    ) -> Result<Self, PipelineError> {
        debug_assert_eq!(vertices.len() % QUAD_COMPONENTS as usize, 0);
        let buffer = ctx.create_buffer(vertices, usage)?;
        match ctx.attribute_location(program.id(), POSITION_ATTRIBUTE) {
            Some(location) => {
                ctx.vertex_attrib_pointer(location, buffer, VertexLayout::packed(QUAD_COMPONENTS))
            }
            None => warn!("vertex stage has no active position attribute"),
        }
        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32 / QUAD_COMPONENTS,
            mode: DrawMode::TriangleStrip,
        })
    }

    /// Uploads the full-screen quad.
    pub fn fullscreen_quad<C: GraphicsContext>(
        ctx: &mut C,
        program: &RenderProgram,
    ) -> Result<Self, PipelineError> {
        Self::upload(ctx, program, &QUAD_VERTICES, BufferUsage::Static)
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessContext, RecordedCall};
    use crate::program::ProgramBuilder;

    #[test]
    fn quad_spans_clip_space() {
        let xs: Vec<f32> = QUAD_VERTICES.iter().step_by(2).copied().collect();
        let ys: Vec<f32> = QUAD_VERTICES.iter().skip(1).step_by(2).copied().collect();
        assert_eq!(xs, vec![-1.0, 1.0, -1.0, 1.0]);
        assert_eq!(ys, vec![-1.0, -1.0, 1.0, 1.0]);
    }

    #[test]
    fn uploads_once_with_packed_layout() {
        let mut ctx = HeadlessContext::new();
        let program = ProgramBuilder::build(
            &mut ctx,
            "void main() { gl_FragColor = vec4(1.0); }",
        )
        .expect("build");
        let geometry = Geometry::fullscreen_quad(&mut ctx, &program).expect("upload");
        assert_eq!(geometry.vertex_count(), 4);
        assert_eq!(geometry.mode(), DrawMode::TriangleStrip);

        let uploads: Vec<_> = ctx
            .calls()
            .iter()
            .filter(|call| matches!(call, RecordedCall::CreateBuffer { .. }))
            .collect();
        assert_eq!(
            uploads,
            vec![&RecordedCall::CreateBuffer {
                buffer: geometry.buffer(),
                floats: 8,
                usage: BufferUsage::Static,
            }]
        );
        assert!(ctx.calls().contains(&RecordedCall::VertexAttribPointer {
            location: 0,
            buffer: geometry.buffer(),
            layout: VertexLayout::packed(2),
        }));
    }
}
