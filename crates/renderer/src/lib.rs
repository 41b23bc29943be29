//! Renderer crate for Backdrop, an animated full-window shader background.
//!
//! The pipeline is split into small components that only talk to a
//! [`GraphicsContext`], so the same code drives the real GPU and the
//! headless backend used by `backdrop check` and the tests:
//!
//! ```text
//!   RendererConfig
//!          │
//!          ▼
//!   Renderer::run ──▶ winit event loop ──▶ FrameDriver::tick()
//!                        │  Resized          │ viewport, clear, uniforms,
//!                        │  CursorMoved      │ texture bind, draw, present
//!                        │  ImageReady       ▼
//!                        └──────────────▶ WgpuContext
//! ```
//!
//! Fragment shaders are written WebGL style (`gl_FragColor`, `texture2D`,
//! loose `uniform` declarations) or ShaderToy style (`mainImage`). They are
//! wrapped at runtime into Vulkan GLSL with a uniform block feeding
//! `iResolution`, `iTime`, `iMouse`, and a texture/sampler pair for
//! `iChannel0`.

use std::fs;

use anyhow::{Context, Result};

mod backend;
mod compile;
mod frame;
mod geometry;
mod gpu;
mod headless;
mod image_source;
mod pointer;
mod program;
mod runtime;
mod surface;
mod texture;
mod types;
mod window;

pub use backend::{
    BackendError, BufferId, BufferUsage, DrawMode, FilterMode, GraphicsContext, ProgramId,
    Sampling, ShaderId, TextureId, UniformLocation, UniformSlot, UniformValue, VertexLayout,
    WrapMode,
};
pub use compile::{detect_style, prepare_stage, FragmentStyle, PreparedStage, VERTEX_SHADER_GLSL};
pub use frame::{
    FrameDriver, FrameError, FrameSample, LoopHandle, Pipeline, SceneState, TickOutcome,
    CHANNEL0_UNIT,
};
pub use geometry::{Geometry, QUAD_VERTICES};
pub use gpu::WgpuContext;
pub use headless::{HeadlessContext, RecordedCall};
pub use image_source::ImageHandle;
pub use pointer::PointerTracker;
pub use program::{compile, link, PipelineError, ProgramBuilder, RenderProgram, UniformSet};
pub use runtime::{BoxedTimeSource, SteppedTimeSource, SystemTimeSource, TimeSample, TimeSource};
pub use surface::{HostViewport, SurfaceDimensions, SurfaceManager};
pub use texture::{AttachOutcome, TextureLoader, TextureState};
pub use types::{GpuPowerPreference, RendererConfig, StageKind};

/// Entry point that opens the window and runs the frame loop.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Blocks until the window closes.
    ///
    /// A shader that fails to compile is logged and leaves the window open
    /// without a background; only setup failures (no window, no GPU) are
    /// returned as errors.
    pub fn run(self) -> Result<()> {
        let path = &self.config.shader_source;
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read shader at {}", path.display()))?;
        tracing::info!(
            shader = %path.display(),
            width = self.config.surface_size.0,
            height = self.config.surface_size.1,
            gpu_power = %self.config.gpu_power,
            "starting renderer"
        );
        window::run_window(self.config, source, LoopHandle::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_reports_unreadable_shader_before_opening_a_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = RendererConfig {
            shader_source: dir.path().join("missing.frag"),
            ..RendererConfig::default()
        };
        let error = Renderer::new(config).run().unwrap_err();
        assert!(
            error.to_string().contains("failed to read shader"),
            "{error:#}"
        );
    }
}
