use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use renderer::{GpuPowerPreference, Renderer, RendererConfig};
use sceneconfig::{GpuPower, SceneConfig};
use tracing_subscriber::EnvFilter;

use crate::check;
use crate::cli::{Cli, Command, RunArgs, SceneArgs};
use crate::paths::AppPaths;
use crate::submit;

pub fn dispatch(cli: Cli) -> Result<ExitCode> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved backdrop paths");

    match cli.command {
        None => run_window(&paths, cli.run),
        Some(Command::Run(args)) => run_window(&paths, args),
        Some(Command::Check(args)) => check::run_check(&paths, args),
        Some(Command::Submit(args)) => submit::run_submit(&paths, args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Scene values after CLI overrides have been applied.
#[derive(Debug, Clone)]
pub struct ResolvedScene {
    pub shader: PathBuf,
    pub image: Option<PathBuf>,
    pub size: (u32, u32),
    pub title: String,
    pub gpu_power: GpuPower,
    pub reveal_threshold: f32,
}

impl ResolvedScene {
    pub fn resolve(args: &SceneArgs, scene: Option<&SceneConfig>) -> Result<Self> {
        let shader = match (&args.shader, scene) {
            (Some(path), _) => path.clone(),
            (None, Some(scene)) => scene.shader.fragment.clone(),
            (None, None) => bail!("no shader given; pass --shader or --scene"),
        };
        let image = args
            .image
            .clone()
            .or_else(|| scene.and_then(|s| s.image_path().map(PathBuf::from)));
        let window = scene.map(|s| s.window.clone()).unwrap_or_default();
        let size = args.size.unwrap_or((window.width, window.height));
        let reveal_threshold = scene
            .map(|s| s.reveal.threshold)
            .unwrap_or(page::DEFAULT_THRESHOLD);

        Ok(Self {
            shader,
            image,
            size,
            title: window.title,
            gpu_power: window.gpu_power,
            reveal_threshold,
        })
    }
}

fn run_window(paths: &AppPaths, args: RunArgs) -> Result<ExitCode> {
    let scene = paths.load_scene(args.scene.scene.as_deref())?;
    let mut resolved = ResolvedScene::resolve(&args.scene, scene.as_ref())?;
    if let Some(title) = args.title {
        resolved.title = title;
    }
    if let Some(power) = args.gpu_power {
        resolved.gpu_power = power;
    }

    let config = RendererConfig {
        surface_size: resolved.size,
        shader_source: resolved.shader,
        image: resolved.image,
        title: resolved.title,
        gpu_power: map_gpu_power(resolved.gpu_power),
    };
    tracing::info!(shader = %config.shader_source.display(), "bootstrapping backdrop");

    Renderer::new(config).run()?;
    Ok(ExitCode::SUCCESS)
}

pub fn map_gpu_power(power: GpuPower) -> GpuPowerPreference {
    match power {
        GpuPower::Low => GpuPowerPreference::Low,
        GpuPower::High => GpuPowerPreference::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SceneConfig {
        SceneConfig::from_toml_str(
            r#"
version = 1
[shader]
fragment = "scene.frag"
[image]
path = "scene.png"
[window]
width = 640
height = 480
gpu_power = "high"
[reveal]
threshold = 0.3
"#,
        )
        .unwrap()
    }

    #[test]
    fn cli_overrides_scene_values() {
        let args = SceneArgs {
            scene: None,
            shader: Some(PathBuf::from("cli.frag")),
            image: None,
            size: Some((100, 50)),
        };
        let resolved = ResolvedScene::resolve(&args, Some(&scene())).unwrap();
        assert_eq!(resolved.shader, PathBuf::from("cli.frag"));
        assert_eq!(resolved.image, Some(PathBuf::from("scene.png")));
        assert_eq!(resolved.size, (100, 50));
        assert_eq!(resolved.gpu_power, GpuPower::High);
        assert_eq!(resolved.reveal_threshold, 0.3);
    }

    #[test]
    fn defaults_apply_without_a_scene() {
        let args = SceneArgs {
            shader: Some(PathBuf::from("bg.frag")),
            ..SceneArgs::default()
        };
        let resolved = ResolvedScene::resolve(&args, None).unwrap();
        assert_eq!(resolved.size, (1280, 720));
        assert_eq!(resolved.title, "Backdrop");
        assert_eq!(resolved.gpu_power, GpuPower::Low);
        assert!(resolved.image.is_none());
    }

    #[test]
    fn shader_is_required() {
        assert!(ResolvedScene::resolve(&SceneArgs::default(), None).is_err());
    }

    #[test]
    fn maps_gpu_power() {
        assert_eq!(map_gpu_power(GpuPower::High), GpuPowerPreference::High);
        assert_eq!(map_gpu_power(GpuPower::Low), GpuPowerPreference::Low);
    }
}
