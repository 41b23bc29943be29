use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories_next::ProjectDirs;
use sceneconfig::SceneConfig;

pub const ENV_CONFIG_DIR: &str = "BACKDROP_CONFIG_DIR";
pub const SCENE_FILE: &str = "scene.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Backdrop";
const APPLICATION: &str = "Backdrop";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        if let Some(config_dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn scene_file(&self) -> PathBuf {
        self.config_dir.join(SCENE_FILE)
    }

    /// Loads the explicitly requested scene, or the default one when it
    /// exists. A missing default scene is not an error.
    pub fn load_scene(&self, explicit: Option<&Path>) -> Result<Option<SceneConfig>> {
        if let Some(path) = explicit {
            let scene = SceneConfig::load(path)
                .with_context(|| format!("failed to load scene {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded scene");
            return Ok(Some(scene));
        }

        let default = self.scene_file();
        if !default.is_file() {
            tracing::debug!(path = %default.display(), "no default scene");
            return Ok(None);
        }
        let scene = SceneConfig::load(&default)
            .with_context(|| format!("failed to load scene {}", default.display()))?;
        tracing::debug!(path = %default.display(), "loaded default scene");
        Ok(Some(scene))
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_override_takes_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _config = EnvGuard::set(ENV_CONFIG_DIR, root.path());

        let paths = AppPaths::discover().unwrap();
        assert_eq!(paths.config_dir(), root.path());
        assert_eq!(paths.scene_file(), root.path().join(SCENE_FILE));
    }

    #[test]
    fn missing_default_scene_is_none() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _config = EnvGuard::set(ENV_CONFIG_DIR, root.path());

        let paths = AppPaths::discover().unwrap();
        assert!(paths.load_scene(None).unwrap().is_none());
    }

    #[test]
    fn default_scene_is_loaded_when_present() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _config = EnvGuard::set(ENV_CONFIG_DIR, root.path());
        fs::write(
            root.path().join(SCENE_FILE),
            "version = 1\n[shader]\nfragment = \"bg.frag\"\n",
        )
        .unwrap();

        let paths = AppPaths::discover().unwrap();
        let scene = paths.load_scene(None).unwrap().expect("scene");
        assert_eq!(scene.shader.fragment, root.path().join("bg.frag"));
    }

    #[test]
    fn explicit_missing_scene_is_an_error() {
        let root = TempDir::new().unwrap();
        let paths = AppPaths {
            config_dir: root.path().to_path_buf(),
        };
        assert!(paths
            .load_scene(Some(&root.path().join("nope.toml")))
            .is_err());
    }
}
