//! Binds the background image to `iChannel0` once it has been decoded.

use tracing::{debug, info, warn};

use crate::backend::{BackendError, GraphicsContext, Sampling, TextureId};
use crate::image_source::ImageHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    /// Texture object exists but holds no image data yet.
    Unloaded,
    Loaded { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Uploaded,
    /// The image is still loading; route its completion to
    /// [`TextureLoader::on_image_complete`].
    Deferred,
    /// The context refused the image. The texture stays unloaded for good.
    Rejected,
}

#[derive(Debug)]
pub struct TextureLoader {
    texture: TextureId,
    state: TextureState,
    uploads: u32,
    rejected: bool,
}

impl TextureLoader {
    pub fn new<C: GraphicsContext>(ctx: &mut C) -> Result<Self, BackendError> {
        let texture = ctx.create_texture()?;
        Ok(Self {
            texture,
            state: TextureState::Unloaded,
            uploads: 0,
            rejected: false,
        })
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn state(&self) -> TextureState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, TextureState::Loaded { .. })
    }

    pub fn upload_count(&self) -> u32 {
        self.uploads
    }

    pub fn attach<C: GraphicsContext>(
        &mut self,
        ctx: &mut C,
        image: &ImageHandle,
    ) -> Result<AttachOutcome, BackendError> {
        if self.upload_if_ready(ctx, image)? {
            Ok(AttachOutcome::Uploaded)
        } else if self.rejected {
            Ok(AttachOutcome::Rejected)
        } else {
            debug!(image = image.label(), "image still loading, upload deferred");
            Ok(AttachOutcome::Deferred)
        }
    }

    /// Handles the image's completion signal. Returns `true` if this call
    /// uploaded the pixels.
    pub fn on_image_complete<C: GraphicsContext>(
        &mut self,
        ctx: &mut C,
        image: &ImageHandle,
    ) -> Result<bool, BackendError> {
        if self.is_loaded() || self.rejected {
            debug!(image = image.label(), "texture already settled, ignoring completion");
            return Ok(false);
        }
        self.upload_if_ready(ctx, image)
    }

    fn upload_if_ready<C: GraphicsContext>(
        &mut self,
        ctx: &mut C,
        image: &ImageHandle,
    ) -> Result<bool, BackendError> {
        let Some(pixels) = image.pixels() else {
            return Ok(false);
        };
        match ctx.upload_texture(self.texture, pixels, Sampling::BACKGROUND) {
            Ok(()) => {}
            Err(BackendError::Rejected(reason)) => {
                warn!(image = image.label(), %reason, "background image not uploaded");
                self.rejected = true;
                return Ok(false);
            }
            Err(err) => return Err(err),
        }
        let (width, height) = pixels.dimensions();
        self.state = TextureState::Loaded { width, height };
        self.uploads += 1;
        info!(image = image.label(), width, height, "background texture uploaded");
        Ok(true)
    }
}
