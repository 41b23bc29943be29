use bytemuck::{Pod, Zeroable};

use crate::backend::{UniformSlot, UniformValue};

/// CPU mirror of the `BackdropParams` block declared by the fragment header.
///
/// std140: `vec3` takes 12 bytes and the following `float` packs into its
/// tail, so the block is exactly two 16-byte rows.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct BackdropUniforms {
    pub i_resolution: [f32; 3],
    pub i_time: f32,
    pub i_mouse: [f32; 4],
}

impl BackdropUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            i_resolution: [width as f32, height as f32, 1.0],
            i_time: 0.0,
            i_mouse: [0.0; 4],
        }
    }

    /// Stores a value written through the uniform API. Returns `false` when
    /// the value does not belong in the block (sampler units, or a type that
    /// does not match the slot).
    pub fn apply(&mut self, slot: UniformSlot, value: UniformValue) -> bool {
        match (slot, value) {
            (UniformSlot::Resolution, UniformValue::Vec3(resolution)) => {
                self.i_resolution = resolution;
                true
            }
            (UniformSlot::Time, UniformValue::Float(seconds)) => {
                self.i_time = seconds;
                true
            }
            (UniformSlot::Mouse, UniformValue::Vec4(mouse)) => {
                self.i_mouse = mouse;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_matches_std140_layout() {
        assert_eq!(std::mem::size_of::<BackdropUniforms>(), 32);
        let uniforms = BackdropUniforms {
            i_resolution: [1.0, 2.0, 3.0],
            i_time: 4.0,
            i_mouse: [5.0, 6.0, 7.0, 8.0],
        };
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&uniforms));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn apply_ignores_mismatched_values() {
        let mut uniforms = BackdropUniforms::new(640, 480);
        assert!(uniforms.apply(UniformSlot::Time, UniformValue::Float(2.5)));
        assert!(!uniforms.apply(UniformSlot::Time, UniformValue::Int(3)));
        assert!(!uniforms.apply(UniformSlot::Channel0, UniformValue::Int(0)));
        assert_eq!(uniforms.i_time, 2.5);
        assert_eq!(uniforms.i_resolution, [640.0, 480.0, 1.0]);
    }
}
