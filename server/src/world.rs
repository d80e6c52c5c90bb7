//! World geometry for the toroidal arena.
//!
//! Positions live in `[0, width) x [0, height)`. Anything that leaves one edge
//! re-enters on the opposite edge. Distances are plain Euclidean distances and
//! do not take the shorter path across an edge.

use crate::error::GameError;
use rand::Rng;
use shared::{WORLD_HEIGHT, WORLD_WIDTH};

/// A vector in 2D world space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    /// Positive direction is to the right.
    pub x: f32,
    /// Positive direction is down, matching screen coordinates on the client.
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the unit vector, or zero for a zero-length vector.
    pub fn normalize(&self) -> Vec2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec2::ZERO
        } else {
            self.scale(1.0 / mag)
        }
    }

    /// Shortens the vector to `max` if it is longer, keeping its direction.
    pub fn clamp_length(&self, max: f32) -> Vec2 {
        if self.magnitude() > max {
            self.normalize().scale(max)
        } else {
            *self
        }
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    b.sub(&a).magnitude()
}

/// Fixed rectangular extent of the arena. Immutable once a room is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct World {
    pub width: f32,
    pub height: f32,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WORLD_WIDTH, WORLD_HEIGHT)
    }
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Like [`World::new`], but rejects empty, negative or non-finite extents.
    pub fn checked(width: f32, height: f32) -> Result<Self, GameError> {
        if valid_extent(width) && valid_extent(height) {
            Ok(Self::new(width, height))
        } else {
            Err(GameError::InvalidWorld(width, height))
        }
    }

    pub fn is_valid(&self) -> bool {
        valid_extent(self.width) && valid_extent(self.height)
    }

    /// Brings a position back inside the world, handling negative coordinates.
    pub fn wrap(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            wrap_axis(position.x, self.width),
            wrap_axis(position.y, self.height),
        )
    }

    pub fn contains(&self, position: Vec2) -> bool {
        (0.0..self.width).contains(&position.x) && (0.0..self.height).contains(&position.y)
    }

    /// Uniformly random point inside the world. A degenerate axis yields 0.
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(sample_axis(rng, self.width), sample_axis(rng, self.height))
    }
}

fn valid_extent(extent: f32) -> bool {
    extent.is_finite() && extent > 0.0
}

fn sample_axis<R: Rng + ?Sized>(rng: &mut R, extent: f32) -> f32 {
    if valid_extent(extent) {
        rng.gen_range(0.0..extent)
    } else {
        0.0
    }
}

fn wrap_axis(value: f32, extent: f32) -> f32 {
    if !value.is_finite() || !valid_extent(extent) {
        return 0.0;
    }
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to the extent itself for tiny negative inputs
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_wrap_past_right_edge() {
        let world = World::new(4000.0, 4000.0);
        let wrapped = world.wrap(Vec2::new(3995.0 + 10.0, 100.0));
        assert_approx_eq!(wrapped.x, 5.0, 0.001);
        assert_approx_eq!(wrapped.y, 100.0, 0.001);
    }

    #[test]
    fn test_wrap_negative_coordinates() {
        let world = World::new(4000.0, 3000.0);
        let wrapped = world.wrap(Vec2::new(-10.0, -3001.0));
        assert_approx_eq!(wrapped.x, 3990.0, 0.001);
        assert_approx_eq!(wrapped.y, 2999.0, 0.001);
    }

    #[test]
    fn test_wrap_exact_extent_maps_to_zero() {
        let world = World::new(4000.0, 4000.0);
        let wrapped = world.wrap(Vec2::new(4000.0, 8000.0));
        assert_eq!(wrapped, Vec2::ZERO);
    }

    #[test]
    fn test_wrap_tiny_negative_stays_in_bounds() {
        let world = World::new(4000.0, 4000.0);
        let wrapped = world.wrap(Vec2::new(-1e-9, -1e-7));
        assert!(world.contains(wrapped), "{:?} escaped the world", wrapped);
    }

    #[test]
    fn test_wrap_non_finite_resets_axis() {
        let world = World::default();
        let wrapped = world.wrap(Vec2::new(f32::NAN, f32::INFINITY));
        assert_eq!(wrapped, Vec2::ZERO);
    }

    #[test]
    fn test_wrap_always_in_bounds() {
        let world = World::new(800.0, 600.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let p = world.sample_point(&mut rng);
            let d = Vec2::new(rng.gen_range(-5000.0..5000.0), rng.gen_range(-5000.0..5000.0));
            let wrapped = world.wrap(p.add(&d));
            assert!(world.contains(wrapped), "{:?} escaped the world", wrapped);
        }
    }

    #[test]
    fn test_distance() {
        assert_approx_eq!(distance(Vec2::new(0.0, 0.0), Vec2::new(3.0, 4.0)), 5.0);
        assert_approx_eq!(distance(Vec2::new(100.0, 100.0), Vec2::new(105.0, 100.0)), 5.0);
    }

    #[test]
    fn test_distance_does_not_wrap() {
        // Points hugging opposite edges are far apart, not 2 units apart.
        let d = distance(Vec2::new(1.0, 0.0), Vec2::new(3999.0, 0.0));
        assert_approx_eq!(d, 3998.0);
    }

    #[test]
    fn test_sample_point_inside_world() {
        let world = World::new(100.0, 50.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(world.contains(world.sample_point(&mut rng)));
        }
    }

    #[test]
    fn test_checked_rejects_degenerate_extents() {
        assert_eq!(World::checked(0.0, 100.0), Err(GameError::InvalidWorld(0.0, 100.0)));
        assert_eq!(World::checked(100.0, -5.0), Err(GameError::InvalidWorld(100.0, -5.0)));
        assert!(World::checked(f32::NAN, 100.0).is_err());
        assert!(World::checked(100.0, f32::INFINITY).is_err());
        assert_eq!(World::checked(800.0, 600.0), Ok(World::new(800.0, 600.0)));
    }

    #[test]
    fn test_degenerate_world_does_not_panic() {
        let mut rng = StdRng::seed_from_u64(3);
        for world in [World::new(0.0, 0.0), World::new(-10.0, f32::NAN)] {
            assert!(!world.is_valid());
            assert_eq!(world.sample_point(&mut rng), Vec2::ZERO);
            assert_eq!(world.wrap(Vec2::new(12.0, -3.0)), Vec2::ZERO);
        }

        let half = World::new(100.0, 0.0);
        let p = half.sample_point(&mut rng);
        assert!((0.0..100.0).contains(&p.x));
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_vector_helpers() {
        let v = Vec2::new(3.0, 4.0);
        assert_approx_eq!(v.magnitude(), 5.0);
        assert_approx_eq!(v.normalize().x, 0.6);
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
        assert_approx_eq!(v.clamp_length(1.0).magnitude(), 1.0);
        assert_eq!(Vec2::new(0.3, 0.4).clamp_length(1.0), Vec2::new(0.3, 0.4));
    }
}
