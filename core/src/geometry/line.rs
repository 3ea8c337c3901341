use super::{Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};

/// Infinite line in implicit form `a·x + b·y = c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Line {
    pub fn through(p1: &Point2, p2: &Point2) -> Self {
        Self {
            a: p1.y - p2.y,
            b: p2.x - p1.x,
            c: p1.y * p2.x - p1.x * p2.y,
        }
    }

    pub fn normal(&self) -> Vector2 {
        Vector2::new(self.a, self.b)
    }

    /// Intersection with another line, `None` when the two are (nearly) parallel.
    pub fn intersect(&self, other: &Line) -> Option<Point2> {
        let d = self.a * other.b - self.b * other.a;
        if d.abs() < EPSILON {
            return None;
        }

        let dx = self.c * other.b - self.b * other.c;
        let dy = self.a * other.c - self.c * other.a;
        Some(Point2::new(dx / d, dy / d))
    }

    /// Foot of the perpendicular dropped from `p`.
    pub fn project_point(&self, p: &Point2) -> Option<Point2> {
        let perpendicular = Line::through(p, &(p + self.normal()));
        self.intersect(&perpendicular)
    }

    /// Perpendicular distance from `p`, `None` for a line built from two equal points.
    pub fn distance_to_point(&self, p: &Point2) -> Option<f64> {
        let norm = self.normal().norm();
        if norm < f64::EPSILON {
            return None;
        }
        Some((self.a * p.x + self.b * p.y - self.c).abs() / norm)
    }
}
