//! Ground-plane math helpers
//!
//! All combat math happens on the XZ plane; Y is height and stays untouched.

use bevy::prelude::*;

/// Drop the vertical component of a vector.
pub fn flat(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Ground-plane distance between two points.
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    flat(a).distance(flat(b))
}

/// Angle between two ground-plane vectors, in degrees.
/// Degenerate (zero) inputs count as fully misaligned.
pub fn angle_between_degrees(a: Vec3, b: Vec3) -> f32 {
    let a = flat(a);
    let b = flat(b);
    if a == Vec3::ZERO || b == Vec3::ZERO {
        return 180.0;
    }
    a.angle_between(b).to_degrees()
}

/// Rotate a local-space offset (sideways, forward) into world space by the
/// given facing direction.
pub fn rotate_by_facing(local: Vec2, facing: Vec3) -> Vec3 {
    let forward = flat(facing).normalize_or_zero();
    if forward == Vec3::ZERO {
        return Vec3::new(local.x, 0.0, local.y);
    }
    let right = Vec3::new(forward.z, 0.0, -forward.x);
    right * local.x + forward * local.y
}

/// Flip a direction 180 degrees on the ground plane.
pub fn invert_direction(dir: Vec3) -> Vec3 {
    Vec3::new(-dir.x, 0.0, -dir.z)
}

/// Whether the segment a-b crosses a circle on the ground plane.
/// Used for line-of-sight checks against vision blockers.
pub fn segment_hits_circle(a: Vec3, b: Vec3, center: Vec3, radius: f32) -> bool {
    let a2 = Vec2::new(a.x, a.z);
    let b2 = Vec2::new(b.x, b.z);
    let c2 = Vec2::new(center.x, center.z);

    let ab = b2 - a2;
    let len_sq = ab.length_squared();
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        ((c2 - a2).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    let closest = a2 + ab * t;
    closest.distance_squared(c2) <= radius * radius
}
