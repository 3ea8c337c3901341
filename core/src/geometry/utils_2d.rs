//! 2D vector utilities shared by the primitives and the constraint residuals.
//!
//! The sketch works in screen coordinates: the y axis points down, so a
//! positive `cross(a, b)` means `b` lies clockwise from `a` as drawn.

use super::{Point2, Vector2, EPSILON};
use nalgebra as na;
use std::f64::consts::TAU;

/// 2D dot product.
#[inline]
pub fn dot(a: &Vector2, b: &Vector2) -> f64 {
    a.dot(b)
}

/// 2D cross product (z-component of the 3D cross product).
#[inline]
pub fn cross(a: &Vector2, b: &Vector2) -> f64 {
    a.perp(b)
}

/// Rotate a vector by `angle` radians.
#[inline]
pub fn rotated(v: &Vector2, angle: f64) -> Vector2 {
    na::Rotation2::new(angle) * v
}

/// Quarter turn counter-clockwise as drawn on screen.
#[inline]
pub fn rotated_90_ccw(v: &Vector2) -> Vector2 {
    Vector2::new(v.y, -v.x)
}

/// Quarter turn clockwise as drawn on screen.
#[inline]
pub fn rotated_90_cw(v: &Vector2) -> Vector2 {
    Vector2::new(-v.y, v.x)
}

/// Midpoint between two points.
#[inline]
pub fn midpoint(p1: &Point2, p2: &Point2) -> Point2 {
    na::center(p1, p2)
}

/// Fold an angle coming out of `atan2` into `[0, 2π)`.
pub fn angle_to_0_2pi(angle: f64) -> f64 {
    if angle < 0.0 {
        angle + TAU
    } else if angle >= TAU {
        angle - TAU
    } else {
        angle
    }
}

/// Clockwise angle swept when turning from `a` to `b`, in `[0, 2π)`.
pub fn clockwise_angle(a: &Vector2, b: &Vector2) -> f64 {
    angle_to_0_2pi(cross(a, b).atan2(dot(a, b)))
}

#[inline]
pub fn equal_eps(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}
