//! Simulated planes
//!
//! Each plane is a single textured quad drifting across a bounded square
//! region. Motion is a plain per-step velocity integration with a reflective
//! boundary: leaving `[-bound, bound]` on an axis flips that axis's velocity.

use crate::math::{DeterministicRng, Vec2, Vec3};

/// Number of vertices in a plane's triangle strip.
pub const QUAD_VERTEX_COUNT: usize = 4;

/// Unit quad in strip order: bottom-left, bottom-right, top-left, top-right.
const UNIT_QUAD: [[f32; 4]; QUAD_VERTEX_COUNT] = [
    [-1.0, -1.0, 1.0, 1.0],
    [1.0, -1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0],
];

const QUAD_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

const QUAD_TEX_COORDS: [f32; QUAD_VERTEX_COUNT * 2] = [
    0.0, 1.0, //
    1.0, 1.0, //
    0.0, 0.0, //
    1.0, 0.0,
];

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub normal: [f32; 3],
}

/// Motion limits shared by every plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    /// Half extent of the square region, on both axes.
    pub bound: f32,
    /// Largest initial speed per axis.
    pub max_speed: f32,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            bound: 3.0,
            max_speed: 0.01,
        }
    }
}

/// Axes whose velocity flipped during a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounce {
    pub x: bool,
    pub y: bool,
}

impl Bounce {
    pub fn any(self) -> bool {
        self.x || self.y
    }
}

#[derive(Debug, Clone)]
pub struct Plane {
    position: Vec2,
    velocity: Vec2,
    bound: f32,
    vertices: [Vertex; QUAD_VERTEX_COUNT],
    tex_coords: [f32; QUAD_VERTEX_COUNT * 2],
    geometry_dirty: bool,
}

impl Plane {
    /// Builds a quad scaled per axis with random per-vertex colors and a
    /// random start position and velocity.
    pub fn new(motion: &MotionParams, scale: Vec3, alpha: f32, rng: &mut DeterministicRng) -> Self {
        let velocity = Vec2::new(
            rng.range(-motion.max_speed, motion.max_speed),
            rng.range(-motion.max_speed, motion.max_speed),
        );
        let position = Vec2::new(
            rng.range(-motion.bound, motion.bound),
            rng.range(-motion.bound, motion.bound),
        );

        let vertices = UNIT_QUAD.map(|[x, y, z, w]| Vertex {
            position: [x * scale.x, y * scale.y, z * scale.z, w],
            color: [rng.next_f32(), rng.next_f32(), rng.next_f32(), alpha],
            normal: QUAD_NORMAL,
        });

        Self {
            position,
            velocity,
            bound: motion.bound.abs(),
            vertices,
            tex_coords: QUAD_TEX_COORDS,
            geometry_dirty: false,
        }
    }

    /// Advances one simulation step.
    ///
    /// The position is not clamped, so a plane can overshoot the boundary by
    /// at most one step before heading back.
    pub fn step(&mut self) -> Bounce {
        self.position += self.velocity;

        let bounce = Bounce {
            x: self.position.x.abs() > self.bound,
            y: self.position.y.abs() > self.bound,
        };
        if bounce.x {
            self.velocity.x = -self.velocity.x;
        }
        if bounce.y {
            self.velocity.y = -self.velocity.y;
        }
        bounce
    }

    pub fn set_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        for vertex in &mut self.vertices {
            vertex.color = [r, g, b, a];
        }
        self.geometry_dirty = true;
    }

    /// Scales every vertex position uniformly. Repeated calls compound.
    pub fn set_size(&mut self, factor: f32) {
        for vertex in &mut self.vertices {
            for c in &mut vertex.position[..3] {
                *c *= factor;
            }
        }
        self.geometry_dirty = true;
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn bound(&self) -> f32 {
        self.bound
    }

    pub fn vertices(&self) -> &[Vertex; QUAD_VERTEX_COUNT] {
        &self.vertices
    }

    pub fn tex_coords(&self) -> &[f32; QUAD_VERTEX_COUNT * 2] {
        &self.tex_coords
    }

    /// Returns whether vertex data changed since the last call, clearing the flag.
    pub fn take_geometry_dirty(&mut self) -> bool {
        std::mem::take(&mut self.geometry_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(seed: u64) -> Plane {
        let mut rng = DeterministicRng::new(seed);
        Plane::new(&MotionParams::default(), Vec3::splat(2.0), 0.75, &mut rng)
    }

    #[test]
    fn new_plane_colors_and_alpha() {
        for seed in 0..32 {
            let plane = spawn(seed);
            for v in plane.vertices() {
                assert_eq!(v.color[3], 0.75);
                assert!(v.color[..3].iter().all(|c| (0.0..=1.0).contains(c)));
            }
        }
    }

    #[test]
    fn new_plane_scales_unit_quad() {
        let mut rng = DeterministicRng::new(3);
        let plane = Plane::new(
            &MotionParams::default(),
            Vec3::new(2.0, 3.0, 4.0),
            1.0,
            &mut rng,
        );
        let v = plane.vertices();
        assert_eq!(v[0].position, [-2.0, -3.0, 4.0, 1.0]);
        assert_eq!(v[1].position, [2.0, -3.0, 4.0, 1.0]);
        assert_eq!(v[2].position, [-2.0, 3.0, 4.0, 1.0]);
        assert_eq!(v[3].position, [2.0, 3.0, 4.0, 1.0]);
        assert!(v.iter().all(|v| v.normal == QUAD_NORMAL));
        assert_eq!(plane.tex_coords(), &QUAD_TEX_COORDS);
    }

    #[test]
    fn new_plane_start_state_within_limits() {
        let motion = MotionParams::default();
        for seed in 0..64 {
            let plane = spawn(seed);
            assert!(plane.position().x.abs() <= motion.bound);
            assert!(plane.position().y.abs() <= motion.bound);
            assert!(plane.velocity().x.abs() <= motion.max_speed);
            assert!(plane.velocity().y.abs() <= motion.max_speed);
        }
    }

    #[test]
    fn negative_motion_limits_use_their_magnitude() {
        let motion = MotionParams {
            bound: -3.0,
            max_speed: -0.01,
        };
        let mut rng = DeterministicRng::new(1);
        let plane = Plane::new(&motion, Vec3::ONE, 1.0, &mut rng);

        assert!(plane.position().x.abs() <= 3.0);
        assert!(plane.position().y.abs() <= 3.0);
        assert!(plane.velocity().x.abs() <= 0.01);
        assert!(plane.velocity().y.abs() <= 0.01);
        assert_eq!(plane.bound(), 3.0);
    }

    #[test]
    fn step_bounces_exactly_when_leaving_bounds() {
        for seed in 0..16 {
            let mut plane = spawn(seed);
            for _ in 0..2_000 {
                let before = plane.velocity();
                let bounce = plane.step();
                let p = plane.position();
                let v = plane.velocity();

                let left_x = p.x < -3.0 || p.x > 3.0;
                let left_y = p.y < -3.0 || p.y > 3.0;
                assert_eq!(bounce.x, left_x);
                assert_eq!(bounce.y, left_y);
                assert_eq!(v.x, if left_x { -before.x } else { before.x });
                assert_eq!(v.y, if left_y { -before.y } else { before.y });

                assert!(p.x.abs() <= 3.0 + v.x.abs());
                assert!(p.y.abs() <= 3.0 + v.y.abs());
            }
        }
    }

    #[test]
    fn step_overshoots_then_returns() {
        let mut rng = DeterministicRng::new(1);
        let mut plane = Plane::new(&MotionParams::default(), Vec3::ONE, 1.0, &mut rng);
        plane.position = Vec2::new(2.995, 0.0);
        plane.velocity = Vec2::new(0.01, 0.0);

        let bounce = plane.step();
        assert!(bounce.x && !bounce.y);
        assert!(plane.position().x > 3.0);
        assert_eq!(plane.velocity().x, -0.01);

        let bounce = plane.step();
        assert!(!bounce.any());
        assert!(plane.position().x <= 3.0);
    }

    #[test]
    fn set_color_overwrites_every_vertex() {
        let mut plane = spawn(9);
        assert!(!plane.take_geometry_dirty());
        plane.set_color(0.1, 0.2, 0.3, 0.4);
        assert!(plane.vertices().iter().all(|v| v.color == [0.1, 0.2, 0.3, 0.4]));
        assert!(plane.take_geometry_dirty());
        assert!(!plane.take_geometry_dirty());
    }

    #[test]
    fn set_size_compounds() {
        let mut plane = spawn(11);
        plane.set_size(0.5);
        plane.set_size(0.5);
        let v = plane.vertices();
        assert_eq!(v[3].position, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(v[0].position, [-0.5, -0.5, 0.5, 1.0]);
    }

    #[test]
    fn fixed_seed_population_stays_bounded() {
        let motion = MotionParams::default();
        let mut rng = DeterministicRng::new(0xD21F7);
        let mut planes: Vec<Plane> = (0..33)
            .map(|_| Plane::new(&motion, Vec3::splat(2.0), 1.0, &mut rng))
            .collect();

        for _ in 0..100 {
            for plane in &mut planes {
                plane.step();
                let p = plane.position();
                assert!(p.x.abs() <= motion.bound + motion.max_speed);
                assert!(p.y.abs() <= motion.bound + motion.max_speed);
            }
        }
    }
}
