use tracing::debug;

/// Drawable size in physical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceDimensions {
    pub width: u32,
    pub height: u32,
}

impl SurfaceDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Anything that can report the size of the area the background fills.
pub trait HostViewport {
    /// Inner size in physical pixels.
    fn inner_size(&self) -> SurfaceDimensions;
}

impl HostViewport for winit::window::Window {
    fn inner_size(&self) -> SurfaceDimensions {
        let size = winit::window::Window::inner_size(self);
        SurfaceDimensions::new(size.width, size.height)
    }
}

impl HostViewport for SurfaceDimensions {
    fn inner_size(&self) -> SurfaceDimensions {
        *self
    }
}

/// Tracks the surface size. Never touches the GPU; the frame driver applies
/// the current size as the viewport on every tick.
#[derive(Debug, Default)]
pub struct SurfaceManager {
    dimensions: SurfaceDimensions,
}

impl SurfaceManager {
    pub fn new(host: &impl HostViewport) -> Self {
        let mut manager = Self::default();
        manager.resize(host);
        manager
    }

    pub fn resize(&mut self, host: &impl HostViewport) -> SurfaceDimensions {
        let dimensions = host.inner_size();
        if dimensions != self.dimensions {
            debug!(
                width = dimensions.width,
                height = dimensions.height,
                "surface resized"
            );
        }
        self.dimensions = dimensions;
        dimensions
    }

    pub fn dimensions(&self) -> SurfaceDimensions {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_host_size() {
        let mut manager = SurfaceManager::new(&SurfaceDimensions::new(800, 600));
        assert_eq!(manager.dimensions(), SurfaceDimensions::new(800, 600));
        manager.resize(&SurfaceDimensions::new(1920, 1080));
        assert_eq!(manager.dimensions(), SurfaceDimensions::new(1920, 1080));
    }

    #[test]
    fn zero_area_is_empty() {
        assert!(SurfaceDimensions::new(0, 10).is_empty());
        assert!(!SurfaceDimensions::new(1, 1).is_empty());
    }
}
