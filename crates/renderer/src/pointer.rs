use crate::surface::SurfaceDimensions;

/// Latest pointer position in surface space with a bottom-left origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerTracker {
    position: [f32; 2],
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a pointer sample given in top-left client coordinates.
    pub fn record(&mut self, client_x: f32, client_y: f32, surface: &SurfaceDimensions) {
        self.position = [client_x, surface.height as f32 - client_y];
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_origin() {
        assert_eq!(PointerTracker::new().position(), [0.0, 0.0]);
    }

    #[test]
    fn flips_vertical_axis() {
        let mut pointer = PointerTracker::new();
        let surface = SurfaceDimensions::new(800, 600);
        pointer.record(100.0, 50.0, &surface);
        assert_eq!(pointer.position(), [100.0, 550.0]);
        pointer.record(10.0, 600.0, &surface);
        assert_eq!(pointer.position(), [10.0, 0.0]);
    }
}
