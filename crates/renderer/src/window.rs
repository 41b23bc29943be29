use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::window::{Window, WindowBuilder};

use crate::frame::{FrameDriver, LoopHandle, Pipeline, SceneState, TickOutcome};
use crate::gpu::WgpuContext;
use crate::image_source::ImageHandle;
use crate::runtime::SystemTimeSource;
use crate::surface::HostViewport;
use crate::texture::AttachOutcome;
use crate::types::RendererConfig;

/// Events posted into the loop from other threads.
#[derive(Debug)]
pub(crate) enum BackdropEvent {
    ImageReady(ImageHandle),
}

/// Everything the event loop owns.
///
/// Field order matters: the GPU context holds a surface created from the
/// window's raw handles, so it has to drop before the window does.
struct WindowState {
    gpu: WgpuContext,
    driver: Option<FrameDriver>,
    window: Arc<Window>,
}

impl WindowState {
    fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        fragment_source: &str,
        handle: LoopHandle,
        proxy: EventLoopProxy<BackdropEvent>,
    ) -> Result<Self> {
        let size = HostViewport::inner_size(window.as_ref());
        let mut gpu = WgpuContext::new(window.as_ref(), size, config.gpu_power)?;

        let driver = match Pipeline::build(&mut gpu, fragment_source) {
            Ok(pipeline) => {
                let scene = SceneState::new(&mut gpu, window.as_ref())?;
                Some(FrameDriver::start_with_handle(
                    pipeline,
                    scene,
                    Box::new(SystemTimeSource::new()),
                    handle,
                ))
            }
            Err(err) => {
                error!(
                    shader = %config.shader_source.display(),
                    "background disabled: {err}"
                );
                None
            }
        };

        let mut state = Self {
            gpu,
            driver,
            window,
        };
        if let Some(path) = &config.image {
            state.load_image(path, proxy)?;
        }
        Ok(state)
    }

    fn load_image(
        &mut self,
        path: &std::path::Path,
        proxy: EventLoopProxy<BackdropEvent>,
    ) -> Result<()> {
        let Some(driver) = self.driver.as_mut() else {
            return Ok(());
        };
        let image = ImageHandle::load_file(path, move |loaded| {
            let _ = proxy.send_event(BackdropEvent::ImageReady(loaded));
        })?;
        // The decoder may finish before we attach; the later completion
        // event is then ignored by the loader.
        if driver.attach_image(&mut self.gpu, &image)? == AttachOutcome::Uploaded {
            info!(image = image.label(), "image was ready at attach time");
        }
        Ok(())
    }

    fn request_frame(&self) {
        if let Some(driver) = &self.driver {
            if driver.is_running() && !driver.dimensions().is_empty() {
                self.window.request_redraw();
            }
        }
    }
}

pub(crate) fn run_window(
    config: RendererConfig,
    fragment_source: String,
    handle: LoopHandle,
) -> Result<()> {
    let event_loop = EventLoopBuilder::<BackdropEvent>::with_user_event()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let proxy = event_loop.create_proxy();

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &config, &fragment_source, handle.clone(), proxy)?;
    state.request_frame();

    let run_result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::UserEvent(BackdropEvent::ImageReady(image)) => {
                if let Some(driver) = state.driver.as_mut() {
                    if let Err(err) = driver.image_ready(&mut state.gpu, &image) {
                        warn!(image = image.label(), error = %err, "failed to upload image");
                    }
                }
            }
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        handle.cancel();
                        elwt.exit();
                    }
                    WindowEvent::Resized(_) => {
                        if let Some(driver) = state.driver.as_mut() {
                            driver.resize(state.window.as_ref());
                        }
                        state.request_frame();
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        if let Some(driver) = state.driver.as_mut() {
                            driver.pointer_moved(position.x as f32, position.y as f32);
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let Some(driver) = state.driver.as_mut() else {
                            return;
                        };
                        match driver.tick(&mut state.gpu) {
                            Ok(TickOutcome::Rescheduled | TickOutcome::Skipped) => {
                                state.request_frame();
                            }
                            Ok(TickOutcome::Stopped) => {
                                info!("frame loop cancelled");
                                elwt.exit();
                            }
                            Err(err) => {
                                error!("{err}");
                                elwt.exit();
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                if handle.is_cancelled() {
                    elwt.exit();
                }
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
