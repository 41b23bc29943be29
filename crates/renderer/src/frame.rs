//! The per-frame driver.
//!
//! [`FrameDriver`] owns everything a frame reads: the built [`Pipeline`] and
//! the mutable [`SceneState`] that event handlers update between ticks. A
//! tick never caches dimensions or pointer samples; it reads them fresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::{BackendError, GraphicsContext};
use crate::geometry::Geometry;
use crate::image_source::ImageHandle;
use crate::pointer::PointerTracker;
use crate::program::{PipelineError, ProgramBuilder, RenderProgram, UniformSet};
use crate::runtime::BoxedTimeSource;
use crate::surface::{HostViewport, SurfaceDimensions, SurfaceManager};
use crate::texture::{AttachOutcome, TextureLoader};

/// Texture unit `iChannel0` samples from.
pub const CHANNEL0_UNIT: u32 = 0;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame loop stopped: {0}")]
    Backend(#[from] BackendError),
}

/// Immutable GPU objects built once before the loop starts.
#[derive(Debug)]
pub struct Pipeline {
    program: RenderProgram,
    uniforms: UniformSet,
    geometry: Geometry,
}

impl Pipeline {
    /// Compiles and links the program, resolves its uniforms, and uploads
    /// the full-screen quad.
    pub fn build<C: GraphicsContext>(
        ctx: &mut C,
        fragment_source: &str,
    ) -> Result<Self, PipelineError> {
        let program = ProgramBuilder::build(ctx, fragment_source)?;
        let uniforms = UniformSet::resolve(ctx, &program);
        let geometry = Geometry::fullscreen_quad(ctx, &program)?;
        Ok(Self {
            program,
            uniforms,
            geometry,
        })
    }

    pub fn program(&self) -> &RenderProgram {
        &self.program
    }

    pub fn uniforms(&self) -> &UniformSet {
        &self.uniforms
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

/// State mutated by host events between ticks.
#[derive(Debug)]
pub struct SceneState {
    pub surface: SurfaceManager,
    pub pointer: PointerTracker,
    pub texture: TextureLoader,
}

impl SceneState {
    pub fn new<C: GraphicsContext>(
        ctx: &mut C,
        host: &impl HostViewport,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            surface: SurfaceManager::new(host),
            pointer: PointerTracker::new(),
            texture: TextureLoader::new(ctx)?,
        })
    }
}

/// Cancellation token for a running frame loop. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct LoopHandle {
    cancelled: Arc<AtomicBool>,
}

impl LoopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the loop before its next tick. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Frame drawn; the caller should schedule the next one.
    Rescheduled,
    /// Frame dropped after a recoverable surface error; schedule the next one.
    Skipped,
    /// The loop was cancelled. Nothing was drawn.
    Stopped,
}

/// Uniform values pushed by the most recent drawn frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub frame_index: u64,
    pub time: f32,
    pub resolution: [f32; 3],
    pub mouse: [f32; 4],
}

#[derive(Debug)]
struct FrameStats {
    last_update: Instant,
    frames_since_update: u32,
    frames_drawn: u64,
    frames_skipped: u64,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frames_since_update: 0,
            frames_drawn: 0,
            frames_skipped: 0,
        }
    }

    fn record(&mut self, time: f32) {
        self.frames_drawn += 1;
        self.frames_since_update += 1;
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_update);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames_since_update as f32 / elapsed.as_secs_f32();
            self.frames_since_update = 0;
            self.last_update = now;
            debug!(
                fps = fps.round(),
                frames = self.frames_drawn,
                skipped = self.frames_skipped,
                time,
                "render stats"
            );
        }
    }
}

pub struct FrameDriver {
    pipeline: Pipeline,
    scene: SceneState,
    time_source: BoxedTimeSource,
    handle: LoopHandle,
    last_time: f32,
    last_sample: Option<FrameSample>,
    stats: FrameStats,
}

impl FrameDriver {
    /// Schedules the loop. The clock starts now, so the first tick reports a
    /// time close to zero.
    pub fn start(pipeline: Pipeline, scene: SceneState, time_source: BoxedTimeSource) -> Self {
        Self::start_with_handle(pipeline, scene, time_source, LoopHandle::new())
    }

    /// Like [`FrameDriver::start`], but observes a handle created up front so
    /// callers can cancel a loop that has not been built yet.
    pub fn start_with_handle(
        pipeline: Pipeline,
        scene: SceneState,
        mut time_source: BoxedTimeSource,
        handle: LoopHandle,
    ) -> Self {
        time_source.reset();
        let dimensions = scene.surface.dimensions();
        info!(
            width = dimensions.width,
            height = dimensions.height,
            "frame loop started"
        );
        Self {
            pipeline,
            scene,
            time_source,
            handle,
            last_time: 0.0,
            last_sample: None,
            stats: FrameStats::new(),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_cancelled()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn last_sample(&self) -> Option<FrameSample> {
        self.last_sample
    }

    pub fn dimensions(&self) -> SurfaceDimensions {
        self.scene.surface.dimensions()
    }

    pub fn resize(&mut self, host: &impl HostViewport) -> SurfaceDimensions {
        self.scene.surface.resize(host)
    }

    /// Records a pointer sample in top-left client coordinates.
    pub fn pointer_moved(&mut self, client_x: f32, client_y: f32) {
        let dimensions = self.scene.surface.dimensions();
        self.scene.pointer.record(client_x, client_y, &dimensions);
    }

    pub fn attach_image<C: GraphicsContext>(
        &mut self,
        ctx: &mut C,
        image: &ImageHandle,
    ) -> Result<AttachOutcome, BackendError> {
        self.scene.texture.attach(ctx, image)
    }

    /// Routes an image completion signal to the texture loader.
    pub fn image_ready<C: GraphicsContext>(
        &mut self,
        ctx: &mut C,
        image: &ImageHandle,
    ) -> Result<bool, BackendError> {
        self.scene.texture.on_image_complete(ctx, image)
    }

    /// Renders one frame.
    pub fn tick<C: GraphicsContext>(&mut self, ctx: &mut C) -> Result<TickOutcome, FrameError> {
        if self.handle.is_cancelled() {
            return Ok(TickOutcome::Stopped);
        }

        let sample = self.time_source.sample();
        let time = sample.seconds.max(self.last_time);
        self.last_time = time;

        let SurfaceDimensions { width, height } = self.scene.surface.dimensions();
        let resolution = [width as f32, height as f32, 1.0];
        let [x, y] = self.scene.pointer.position();
        let uniforms = self.pipeline.uniforms;

        ctx.viewport(width, height);
        ctx.clear();
        uniforms.push_resolution(ctx, resolution[0], resolution[1]);
        uniforms.push_time(ctx, time);
        uniforms.push_mouse(ctx, [x, y]);
        ctx.bind_texture(CHANNEL0_UNIT, self.scene.texture.texture());
        uniforms.push_texture_unit(ctx, CHANNEL0_UNIT);

        let geometry = self.pipeline.geometry;
        let submitted = ctx
            .draw_arrays(geometry.mode(), 0, geometry.vertex_count())
            .and_then(|()| ctx.present());

        match submitted {
            Ok(()) => {
                self.last_sample = Some(FrameSample {
                    frame_index: sample.frame_index,
                    time,
                    resolution,
                    mouse: [x, y, 0.0, 0.0],
                });
                self.stats.record(time);
                Ok(TickOutcome::Rescheduled)
            }
            Err(err) if err.is_recoverable() => {
                self.stats.frames_skipped += 1;
                warn!(error = %err, "frame skipped");
                Ok(TickOutcome::Skipped)
            }
            Err(err) => {
                self.handle.cancel();
                Err(FrameError::Backend(err))
            }
        }
    }
}
