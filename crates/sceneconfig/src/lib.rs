use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Largest window edge accepted from a scene file.
pub const MAX_WINDOW_EDGE: u32 = 16_384;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read scene file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scene: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid scene: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuPower {
    #[default]
    Low,
    High,
}

impl GpuPower {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "low-power" | "integrated" => Ok(Self::Low),
            "high" | "high-performance" | "discrete" => Ok(Self::High),
            other => Err(format!("invalid gpu_power '{other}'; expected 'low' or 'high'")),
        }
    }
}

impl<'de> Deserialize<'de> for GpuPower {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        GpuPower::parse(&raw).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneConfig {
    pub version: u32,
    pub shader: ShaderSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSection>,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub reveal: RevealSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShaderSection {
    /// Fragment shader, relative to the scene file.
    pub fragment: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageSection {
    /// Image bound to `iChannel0`, relative to the scene file.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSection {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub gpu_power: GpuPower,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            gpu_power: GpuPower::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RevealSection {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl Default for RevealSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactSection {
    pub action: String,
    pub fallback_email: String,
}

fn default_title() -> String {
    "Backdrop".to_string()
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_threshold() -> f32 {
    0.15
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a scene file, resolving relative asset paths
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&input)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Joins relative shader and image paths onto `base`. Absolute paths are
    /// left alone.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.shader.fragment = resolve(base, &self.shader.fragment);
        if let Some(image) = &mut self.image {
            image.path = resolve(base, &image.path);
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image.as_ref().map(|image| image.path.as_path())
    }

    /// Every problem found in the scene, in a stable order.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.version != 1 {
            issues.push(format!(
                "unsupported scene version {}; expected 1",
                self.version
            ));
        }

        if self.shader.fragment.as_os_str().is_empty() {
            issues.push("shader.fragment must name a file".into());
        }

        if let Some(image) = &self.image {
            if image.path.as_os_str().is_empty() {
                issues.push("image.path must name a file".into());
            }
        }

        let window = &self.window;
        for (name, value) in [("width", window.width), ("height", window.height)] {
            if value == 0 || value > MAX_WINDOW_EDGE {
                issues.push(format!(
                    "window.{name} must be between 1 and {MAX_WINDOW_EDGE}, got {value}"
                ));
            }
        }

        let threshold = self.reveal.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            issues.push(format!(
                "reveal.threshold must be within 0.0..=1.0, got {threshold}"
            ));
        }

        if let Some(contact) = &self.contact {
            let action = contact.action.trim();
            if !(action.starts_with("http://") || action.starts_with("https://")) {
                issues.push(format!(
                    "contact.action '{action}' must be an http(s) URL"
                ));
            }
            if !contact.fallback_email.contains('@') {
                issues.push(format!(
                    "contact.fallback_email '{}' is not an email address",
                    contact.fallback_email
                ));
            }
        }

        issues
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues.join("; ")))
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
