use super::{
    clockwise_angle, cross, distance, dot, equal_eps, midpoint, rotated, rotated_90_ccw, Line,
    Point2, Vector2,
};
use crate::error::{SketchError, SketchResult};
use serde::{Deserialize, Serialize};

/// Circular arc running clockwise (as drawn) from `p1` to `p2`.
///
/// The center is not stored. It sits on the chord's perpendicular bisector at
/// signed offset `d` along [`Arc::normal`], so the arc has five scalar degrees
/// of freedom and the solver only ever optimizes `d` on top of the endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub p1: Point2,
    pub p2: Point2,
    pub d: f64,
}

impl Arc {
    pub fn new(p1: Point2, p2: Point2, d: f64) -> Self {
        Self { p1, p2, d }
    }

    /// Arc from its endpoints and any third point `p` lying on it.
    ///
    /// The endpoints are swapped when needed so the result still sweeps
    /// clockwise from `p1` to `p2` and passes through `p`.
    pub fn through(p1: Point2, p2: Point2, p: Point2) -> SketchResult<Self> {
        let p1_p = p - p1;
        let p_p2 = p2 - p;

        let mid_first = p1 + p1_p / 2.0;
        let mid_second = p + p_p2 / 2.0;

        let bisector_first = Line::through(&mid_first, &(mid_first + rotated_90_ccw(&p1_p)));
        let bisector_second = Line::through(&mid_second, &(mid_second + rotated_90_ccw(&p_p2)));

        let center = bisector_first
            .intersect(&bisector_second)
            .ok_or(SketchError::CollinearArc)?;

        let clockwise = cross(&(p1 - center), &(p - center)) > 0.0;
        let (p1, p2) = if clockwise { (p1, p2) } else { (p2, p1) };

        let mut arc = Self { p1, p2, d: 0.0 };
        arc.d = dot(&(center - arc.chord_midpoint()), &arc.normal());
        Ok(arc)
    }

    /// Unit normal of the chord, the direction `d` is measured along.
    pub fn normal(&self) -> Vector2 {
        rotated_90_ccw(&(self.p2 - self.p1))
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector2::zeros)
    }

    pub fn chord_midpoint(&self) -> Point2 {
        midpoint(&self.p1, &self.p2)
    }

    pub fn center(&self) -> Point2 {
        self.chord_midpoint() + self.normal() * self.d
    }

    pub fn radius(&self) -> f64 {
        distance(&self.p1, &self.center())
    }

    pub fn points(&self) -> [Point2; 2] {
        [self.p1, self.p2]
    }

    /// Clockwise angle covered from `p1` to `p2`, in `[0, 2π)`.
    pub fn sweep_angle(&self) -> f64 {
        let center = self.center();
        clockwise_angle(&(self.p1 - center), &(self.p2 - center))
    }

    /// Point halfway along the sweep.
    pub fn middle_point(&self) -> Point2 {
        let center = self.center();
        let c_p1 = self.p1 - center;
        center + rotated(&c_p1, self.sweep_angle() / 2.0)
    }

    /// Bounding box of the full circle as `(min, max)` corners.
    pub fn bounding_box(&self) -> (Point2, Point2) {
        let center = self.center();
        let r = self.radius();
        (
            Point2::new(center.x - r, center.y - r),
            Point2::new(center.x + r, center.y + r),
        )
    }

    /// Swap the endpoints while keeping the circle, so the arc now covers
    /// the complementary part of it.
    pub fn invert_direction(&mut self) {
        std::mem::swap(&mut self.p1, &mut self.p2);
        self.d = -self.d;
    }

    pub fn distance_to_point(&self, p: &Point2) -> f64 {
        let center = self.center();
        let c_p1 = self.p1 - center;
        let c_p2 = self.p2 - center;
        let c_p = p - center;

        let inside_sector = equal_eps(
            clockwise_angle(&c_p1, &c_p) + clockwise_angle(&c_p, &c_p2),
            clockwise_angle(&c_p1, &c_p2),
        );

        if inside_sector {
            (self.radius() - c_p.norm()).abs()
        } else {
            distance(p, &self.p1).min(distance(p, &self.p2))
        }
    }
}
