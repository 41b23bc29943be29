use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sceneconfig::GpuPower;

#[derive(Parser, Debug)]
#[command(
    name = "backdrop",
    author,
    version,
    about = "Animated fragment-shader background",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the background window (the default).
    Run(RunArgs),
    /// Build the shader headlessly, render a few frames, and print the uniforms.
    Check(CheckArgs),
    /// Post a contact form and print the resulting status message.
    Submit(SubmitArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SceneArgs {
    /// Scene description (TOML). Defaults to `scene.toml` in the config directory.
    #[arg(long, value_name = "FILE")]
    pub scene: Option<PathBuf>,

    /// Fragment shader to render; overrides the scene.
    #[arg(long, value_name = "FILE")]
    pub shader: Option<PathBuf>,

    /// Image bound to `iChannel0`; overrides the scene.
    #[arg(long, value_name = "FILE")]
    pub image: Option<PathBuf>,

    /// Surface size (e.g. `1280x720`); overrides the scene.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub scene: SceneArgs,

    /// Adapter power preference: `low` or `high`.
    #[arg(long, value_name = "POWER", value_parser = GpuPower::parse)]
    pub gpu_power: Option<GpuPower>,

    /// Window title; overrides the scene.
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub scene: SceneArgs,

    /// Number of frames to render.
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub frames: u32,

    /// Pointer position in window coordinates (top-left origin), e.g. `40,60`.
    #[arg(long, value_name = "X,Y", value_parser = parse_pointer)]
    pub pointer: Option<(f32, f32)>,
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Scene whose `[contact]` section supplies the defaults.
    #[arg(long, value_name = "FILE")]
    pub scene: Option<PathBuf>,

    /// Endpoint the form is posted to; overrides the scene.
    #[arg(long, value_name = "URL")]
    pub action: Option<String>,

    /// Form field as `name=value`; repeatable.
    #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,

    /// Address shown to the user when submission fails; overrides the scene.
    #[arg(long, value_name = "ADDRESS", env = "BACKDROP_FALLBACK_EMAIL")]
    pub fallback_email: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

pub fn parse_pointer(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{value}'"))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("invalid x in '{value}'"))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("invalid y in '{value}'"))?;
    Ok((x, y))
}

pub fn parse_field(input: &str) -> Result<(String, String), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{input}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("field name must not be empty".to_string());
    }
    Ok((name.to_string(), value.to_string()))
}
