//! Matrix math utilities
//!
//! Column-major 4x4 builders on top of glam plus a seeded RNG. Composition
//! follows the usual convention: applying `a` then `b` to a point is
//! `b * a * p`, so a model-view matrix is `view * model`.

pub use glam::{Mat4, Vec2, Vec3, Vec4};

use thiserror::Error;

/// Lengths below this are treated as zero when normalizing basis vectors.
const BASIS_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MathError {
    #[error("rotation axis has zero length")]
    ZeroAxis,

    #[error("invalid projection (fovy {fovy}, aspect {aspect}, near {near}, far {far})")]
    InvalidProjection {
        fovy: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },

    #[error("degenerate view basis (eye {eye:?}, target {target:?}, up {up:?})")]
    DegenerateBasis { eye: Vec3, target: Vec3, up: Vec3 },
}

pub fn radians_from_degrees(degrees: f32) -> f32 {
    (degrees / 180.0) * std::f32::consts::PI
}

/// Identity with the translation column set.
pub fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(1.0, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 1.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(x, y, z, 1.0),
    )
}

/// Axis-angle rotation. The axis does not need to be normalized.
pub fn rotation(radians: f32, axis: Vec3) -> Result<Mat4, MathError> {
    let len = axis.length();
    if !(len > BASIS_EPSILON) {
        return Err(MathError::ZeroAxis);
    }
    let Vec3 { x, y, z } = axis / len;
    let (st, ct) = radians.sin_cos();
    let ci = 1.0 - ct;

    Ok(Mat4::from_cols(
        Vec4::new(ct + x * x * ci, y * x * ci + z * st, z * x * ci - y * st, 0.0),
        Vec4::new(x * y * ci - z * st, ct + y * y * ci, z * y * ci + x * st, 0.0),
        Vec4::new(x * z * ci + y * st, y * z * ci - x * st, ct + z * z * ci, 0.0),
        Vec4::new(0.0, 0.0, 0.0, 1.0),
    ))
}

/// Right-handed perspective projection mapping view-space depth to `[0, 1]`.
///
/// Requires `far > near > 0`, a positive finite aspect ratio and a field of
/// view strictly between 0 and pi.
pub fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Result<Mat4, MathError> {
    let valid = fovy > 0.0
        && fovy < std::f32::consts::PI
        && aspect.is_finite()
        && aspect > 0.0
        && near > 0.0
        && far.is_finite()
        && far > near;
    if !valid {
        return Err(MathError::InvalidProjection {
            fovy,
            aspect,
            near,
            far,
        });
    }

    let ys = 1.0 / (fovy * 0.5).tan();
    let xs = ys / aspect;
    let zs = far / (near - far);

    Ok(Mat4::from_cols(
        Vec4::new(xs, 0.0, 0.0, 0.0),
        Vec4::new(0.0, ys, 0.0, 0.0),
        Vec4::new(0.0, 0.0, zs, -1.0),
        Vec4::new(0.0, 0.0, zs * near, 0.0),
    ))
}

/// Right-handed view matrix looking from `eye` towards `target`.
///
/// Fails instead of dividing by zero when `eye == target` or `up` is
/// parallel to the viewing direction.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Result<Mat4, MathError> {
    let degenerate = MathError::DegenerateBasis { eye, target, up };

    let back = eye - target;
    let back_len = back.length();
    if !(back_len > BASIS_EPSILON) {
        return Err(degenerate);
    }
    let forward = back / back_len;

    let side = up.cross(forward);
    let side_len = side.length();
    if !(side_len > BASIS_EPSILON) {
        return Err(degenerate);
    }
    let side = side / side_len;
    let true_up = forward.cross(side);

    Ok(Mat4::from_cols(
        Vec4::new(side.x, true_up.x, forward.x, 0.0),
        Vec4::new(side.y, true_up.y, forward.y, 0.0),
        Vec4::new(side.z, true_up.z, forward.z, 0.0),
        Vec4::new(-eye.dot(side), -eye.dot(true_up), -eye.dot(forward), 1.0),
    ))
}

/// Deterministic random number generator
///
/// All randomness in the simulation flows through one of these so a seed
/// reproduces a run exactly.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    state: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self { seed, state: seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_u32(&mut self) -> u32 {
        // 64-bit LCG (MMIX constants), high half as output
        const A: u64 = 6_364_136_223_846_793_005;
        const C: u64 = 1_442_695_040_888_963_407;

        self.state = self.state.wrapping_mul(A).wrapping_add(C);
        (self.state >> 32) as u32
    }

    /// Uniform in `[0, 1]`.
    pub fn next_f32(&mut self) -> f32 {
        const MAX_24: f32 = ((1u32 << 24) - 1) as f32;
        (self.next_u32() >> 8) as f32 / MAX_24
    }

    /// Uniform in the closed range between `lo` and `hi`, in either order.
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        (lo + (hi - lo) * self.next_f32()).clamp(lo, hi)
    }
}
