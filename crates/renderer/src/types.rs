use std::path::PathBuf;

/// Which programmable stage a shader object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Power profile requested from the GPU adapter.
///
/// A background animation rarely needs the discrete GPU, so `Low` is the
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

impl std::fmt::Display for GpuPowerPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuPowerPreference::Low => f.write_str("low"),
            GpuPowerPreference::High => f.write_str("high"),
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the scene file and CLI flags: which fragment
/// shader to compile, which image feeds `iChannel0`, and how the window
/// should be created.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Path to the fragment shader rendered as the background.
    pub shader_source: PathBuf,
    /// Optional image bound to `iChannel0` once it finishes loading.
    pub image: Option<PathBuf>,
    /// Window title.
    pub title: String,
    /// Adapter power preference.
    pub gpu_power: GpuPowerPreference,
}

impl Default for RendererConfig {
    /// Provides a 1280x720 window with no shader selected.
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            shader_source: PathBuf::new(),
            image: None,
            title: "Backdrop".to_string(),
            gpu_power: GpuPowerPreference::default(),
        }
    }
}
