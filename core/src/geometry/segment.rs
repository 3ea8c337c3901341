use super::{cross, distance, dot, midpoint, Line, Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub p1: Point2,
    pub p2: Point2,
}

impl Segment {
    pub fn new(p1: Point2, p2: Point2) -> Self {
        Self { p1, p2 }
    }

    pub fn vector(&self) -> Vector2 {
        self.p2 - self.p1
    }

    pub fn length(&self) -> f64 {
        self.vector().norm()
    }

    pub fn midpoint(&self) -> Point2 {
        midpoint(&self.p1, &self.p2)
    }

    pub fn line(&self) -> Line {
        Line::through(&self.p1, &self.p2)
    }

    pub fn points(&self) -> [Point2; 2] {
        [self.p1, self.p2]
    }

    /// True when `p` lies on the segment: close to the carrier line and inside
    /// the bounding box of the two endpoints.
    pub fn contains(&self, p: &Point2) -> bool {
        let length = self.length();
        if length < EPSILON {
            return distance(&self.p1, p) < EPSILON;
        }

        let off_line = cross(&(p - self.p1), &self.vector()) / length;
        let between = |a: f64, b: f64, x: f64| (a <= x && x <= b) || (b <= x && x <= a);

        off_line.abs() < EPSILON
            && between(self.p1.x, self.p2.x, p.x)
            && between(self.p1.y, self.p2.y, p.y)
    }

    pub fn distance_to_point(&self, p: &Point2) -> f64 {
        let length = self.length();
        if length < EPSILON {
            return distance(&self.p1, p);
        }

        let direction = self.vector() / length;
        let p1_p = p - self.p1;
        let to_line = cross(&p1_p, &direction).abs();
        let projection = self.p1 + direction * dot(&p1_p, &direction);

        if self.contains(&projection) {
            to_line
        } else {
            distance(p, &self.p1).min(distance(p, &self.p2))
        }
    }
}
