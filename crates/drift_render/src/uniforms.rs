//! Per-object uniform block shared with `shaders/plane.wgsl`

use drift_core::math::{Mat4, Vec3};

/// GPU addressing granularity for uniform slots inside a ring buffer.
pub const UNIFORM_ALIGNMENT: usize = 256;

pub const UNIFORMS_SIZE: usize = std::mem::size_of::<Uniforms>();

/// Stride between consecutive slots of a ring.
pub const ALIGNED_UNIFORMS_SIZE: usize =
    (UNIFORMS_SIZE + UNIFORM_ALIGNMENT - 1) & !(UNIFORM_ALIGNMENT - 1);

/// Layout matches the WGSL struct: two column-major matrices then a vec3
/// padded out to 16 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub projection: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    _pad: f32,
}

impl Uniforms {
    pub fn new(projection: Mat4, model_view: Mat4, light_position: Vec3) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            model_view: model_view.to_cols_array_2d(),
            light_position: light_position.to_array(),
            _pad: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_stride_is_aligned() {
        assert_eq!(UNIFORMS_SIZE, 144);
        assert_eq!(ALIGNED_UNIFORMS_SIZE, 256);
        assert_eq!(ALIGNED_UNIFORMS_SIZE % UNIFORM_ALIGNMENT, 0);
    }

    #[test]
    fn matrices_are_stored_column_major() {
        let model_view = drift_core::math::translation(1.0, 2.0, 3.0);
        let u = Uniforms::new(Mat4::IDENTITY, model_view, Vec3::X);
        assert_eq!(u.model_view[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(u.projection[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(u.light_position, [1.0, 0.0, 0.0]);

        let bytes = bytemuck::bytes_of(&u);
        assert_eq!(bytes.len(), UNIFORMS_SIZE);
    }
}
