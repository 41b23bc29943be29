//! Headless dry run: builds the shader against the recording backend, renders
//! a few frames, and prints what the last frame pushed to the GPU.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use renderer::{
    detect_style, FrameDriver, HeadlessContext, ImageHandle, Pipeline, SceneState,
    SteppedTimeSource, SurfaceDimensions, TextureState, TickOutcome, UniformLocation,
};

use crate::cli::CheckArgs;
use crate::paths::AppPaths;
use crate::run::ResolvedScene;

const IMAGE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn run_check(paths: &AppPaths, args: CheckArgs) -> Result<ExitCode> {
    let scene = paths.load_scene(args.scene.scene.as_deref())?;
    let resolved = ResolvedScene::resolve(&args.scene, scene.as_ref())?;

    let source = fs::read_to_string(&resolved.shader)
        .with_context(|| format!("failed to read shader at {}", resolved.shader.display()))?;

    let mut ctx = HeadlessContext::new();
    let pipeline = Pipeline::build(&mut ctx, &source).with_context(|| {
        format!("shader {} failed to build", resolved.shader.display())
    })?;

    let (width, height) = resolved.size;
    let scene_state = SceneState::new(&mut ctx, &SurfaceDimensions::new(width, height))?;
    let mut driver = FrameDriver::start(
        pipeline,
        scene_state,
        Box::new(SteppedTimeSource::sixty_hz()),
    );

    if let Some(path) = resolved.image.as_deref() {
        load_image(&mut ctx, &mut driver, path)?;
    }
    if let Some((x, y)) = args.pointer {
        driver.pointer_moved(x, y);
    }

    let mut drawn = 0u32;
    for _ in 0..args.frames {
        match driver.tick(&mut ctx)? {
            TickOutcome::Rescheduled => drawn += 1,
            TickOutcome::Skipped => {}
            TickOutcome::Stopped => break,
        }
    }

    print!("{}", report(&resolved, &source, &driver, drawn));
    Ok(ExitCode::SUCCESS)
}

fn load_image(ctx: &mut HeadlessContext, driver: &mut FrameDriver, path: &Path) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let image = ImageHandle::load_file(path, move |loaded| {
        let _ = tx.send(loaded);
    })?;
    driver.attach_image(ctx, &image)?;

    // The sender is dropped without a message when decoding fails.
    match rx.recv_timeout(IMAGE_TIMEOUT) {
        Ok(loaded) => {
            driver.image_ready(ctx, &loaded)?;
        }
        Err(_) if image.is_complete() => {}
        Err(_) => tracing::warn!(path = %path.display(), "rendering without the image"),
    }
    Ok(())
}

fn report(scene: &ResolvedScene, source: &str, driver: &FrameDriver, drawn: u32) -> String {
    let mut out = String::new();
    let style = match detect_style(source) {
        Some(style) => format!("{style:?}"),
        None => "unknown".to_string(),
    };
    let _ = writeln!(out, "shader: {} ({style})", scene.shader.display());
    let _ = writeln!(out, "frames drawn: {drawn}");

    let uniforms = driver.pipeline().uniforms();
    let active = |location: Option<UniformLocation>| {
        if location.is_some() {
            ""
        } else {
            " (inactive)"
        }
    };
    if let Some(sample) = driver.last_sample() {
        let [w, h, d] = sample.resolution;
        let [mx, my, mz, mw] = sample.mouse;
        let _ = writeln!(out, "iResolution = ({w}, {h}, {d}){}", active(uniforms.resolution));
        let _ = writeln!(out, "iTime = {:.4}{}", sample.time, active(uniforms.time));
        let _ = writeln!(out, "iMouse = ({mx}, {my}, {mz}, {mw}){}", active(uniforms.mouse));
    }
    let channel = match driver.scene().texture.state() {
        TextureState::Loaded { width, height } => format!("{width}x{height} image"),
        TextureState::Unloaded => "placeholder".to_string(),
    };
    let _ = writeln!(out, "iChannel0 = {channel}{}", active(uniforms.texture));
    let _ = writeln!(out, "reveal threshold: {}", scene.reveal_threshold);
    out
}
