//! Image resources feeding `iChannel0`.
//!
//! An [`ImageHandle`] is a shareable slot that becomes complete at most once.
//! Decoding happens off the event-loop thread; the worker only fills the slot
//! and fires a one-shot notification, it never touches pipeline state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread;

use anyhow::{Context, Result};
use image::RgbaImage;

#[derive(Debug)]
struct ImageSlot {
    label: String,
    pixels: OnceLock<RgbaImage>,
}

#[derive(Debug, Clone)]
pub struct ImageHandle {
    slot: Arc<ImageSlot>,
}

impl ImageHandle {
    /// Creates a handle whose pixels arrive later through [`ImageHandle::complete`].
    pub fn pending(label: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(ImageSlot {
                label: label.into(),
                pixels: OnceLock::new(),
            }),
        }
    }

    /// Creates a handle that is already complete.
    pub fn ready(label: impl Into<String>, pixels: RgbaImage) -> Self {
        let handle = Self::pending(label);
        let _ = handle.slot.pixels.set(pixels);
        handle
    }

    /// Starts decoding `path` on a worker thread.
    ///
    /// `on_loaded` runs on the worker once the pixels are in place. It is not
    /// called when the file cannot be read or decoded; the handle then stays
    /// incomplete forever.
    pub fn load_file<F>(path: &Path, on_loaded: F) -> Result<Self>
    where
        F: FnOnce(ImageHandle) + Send + 'static,
    {
        let handle = Self::pending(path.display().to_string());
        let worker = handle.clone();
        let path: PathBuf = path.to_path_buf();
        thread::Builder::new()
            .name("backdrop-image".into())
            .spawn(move || match decode(&path) {
                Ok(pixels) => {
                    tracing::debug!(
                        path = %path.display(),
                        width = pixels.width(),
                        height = pixels.height(),
                        "image decoded"
                    );
                    if worker.complete(pixels) {
                        on_loaded(worker);
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "image failed to load");
                }
            })
            .context("failed to spawn image decoder thread")?;
        Ok(handle)
    }

    pub fn label(&self) -> &str {
        &self.slot.label
    }

    /// Synchronous "already loaded" query.
    pub fn is_complete(&self) -> bool {
        self.slot.pixels.get().is_some()
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.slot.pixels.get()
    }

    /// Fills the slot. Returns `false` if it was already complete.
    pub fn complete(&self, pixels: RgbaImage) -> bool {
        self.slot.pixels.set(pixels).is_ok()
    }
}

fn decode(path: &Path) -> Result<RgbaImage> {
    let image =
        image::open(path).with_context(|| format!("failed to open image at {}", path.display()))?;
    Ok(image.to_rgba8())
}
