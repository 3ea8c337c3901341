//! Constraint kinds, the operand patterns each kind accepts, and the residual
//! equations the numeric solver drives to zero.

use super::types::{EntityRef, EntityType, Geometry};
use crate::error::{SketchError, SketchResult};
use crate::geometry::{cross, distance, dot};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::EntityType::{Arc as A, Point as P, Segment as S, Value as V};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstraintKind {
    Coincidence,
    Parallelism,
    Perpendicularity,
    EqualLengthOrRadius,
    Fixed,
    Horizontality,
    Verticality,
    Tangency,
    Concentricity,
    Length,
}

/// Operand pattern a constraint kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Exactly these operand types, in any order.
    Exactly(&'static [EntityType]),
    /// Two or more operands, all of this type.
    MoreThanOne(EntityType),
}

impl Requirement {
    pub fn arity(&self) -> usize {
        match self {
            Requirement::Exactly(types) => types.len(),
            Requirement::MoreThanOne(_) => 2,
        }
    }

    pub fn is_satisfied_by(&self, kind: ConstraintKind, types: &[EntityType]) -> bool {
        match self {
            Requirement::MoreThanOne(required) => {
                types.len() > 1 && types.iter().all(|t| t == required)
            }
            Requirement::Exactly(pattern) => {
                if same_multiset(pattern, types) {
                    return true;
                }
                // Splittable kinds also take a longer homogeneous run of the
                // pattern's single type.
                kind.is_splittable()
                    && !types.is_empty()
                    && types.len() >= pattern.len()
                    && types.iter().all(|t| *t == types[0])
                    && pattern.iter().all(|t| *t == types[0])
            }
        }
    }
}

fn same_multiset(a: &[EntityType], b: &[EntityType]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 10] = [
        ConstraintKind::Coincidence,
        ConstraintKind::Parallelism,
        ConstraintKind::Perpendicularity,
        ConstraintKind::EqualLengthOrRadius,
        ConstraintKind::Fixed,
        ConstraintKind::Horizontality,
        ConstraintKind::Verticality,
        ConstraintKind::Tangency,
        ConstraintKind::Concentricity,
        ConstraintKind::Length,
    ];

    pub fn requirements(&self) -> &'static [Requirement] {
        use Requirement::*;
        match self {
            ConstraintKind::Coincidence => &[MoreThanOne(P)],
            ConstraintKind::Parallelism => &[Exactly(&[S, S])],
            ConstraintKind::Perpendicularity => &[Exactly(&[S, S])],
            ConstraintKind::EqualLengthOrRadius => &[Exactly(&[S, S]), Exactly(&[A, A])],
            ConstraintKind::Fixed => &[Exactly(&[P])],
            ConstraintKind::Horizontality => &[Exactly(&[S]), Exactly(&[P, P])],
            ConstraintKind::Verticality => &[Exactly(&[S]), Exactly(&[P, P])],
            ConstraintKind::Tangency => &[Exactly(&[A, S]), Exactly(&[A, A])],
            ConstraintKind::Concentricity => &[Exactly(&[A, A])],
            ConstraintKind::Length => &[Exactly(&[S, V]), Exactly(&[A, V])],
        }
    }

    /// Kinds that turn a longer homogeneous selection into several atomic constraints.
    pub fn is_splittable(&self) -> bool {
        matches!(
            self,
            ConstraintKind::Parallelism
                | ConstraintKind::EqualLengthOrRadius
                | ConstraintKind::Fixed
                | ConstraintKind::Horizontality
                | ConstraintKind::Verticality
                | ConstraintKind::Tangency
                | ConstraintKind::Concentricity
        )
    }

    pub fn has_residual(&self) -> bool {
        !matches!(
            self,
            ConstraintKind::Coincidence
                | ConstraintKind::Fixed
                | ConstraintKind::Horizontality
                | ConstraintKind::Verticality
        )
    }

    /// Kinds eliminated by slot linkage rather than by a residual.
    pub fn is_solved_by_substitution(&self) -> bool {
        matches!(
            self,
            ConstraintKind::Coincidence | ConstraintKind::Horizontality | ConstraintKind::Verticality
        )
    }

    /// First requirement the operand types satisfy.
    pub fn matching_requirement(&self, types: &[EntityType]) -> Option<Requirement> {
        self.requirements()
            .iter()
            .copied()
            .find(|r| r.is_satisfied_by(*self, types))
    }

    pub fn accepts(&self, types: &[EntityType]) -> bool {
        self.matching_requirement(types).is_some()
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::Coincidence => "Coincidence",
            ConstraintKind::Parallelism => "Parallelism",
            ConstraintKind::Perpendicularity => "Perpendicularity",
            ConstraintKind::EqualLengthOrRadius => "Equal length or radius",
            ConstraintKind::Fixed => "Fixed",
            ConstraintKind::Horizontality => "Horizontality",
            ConstraintKind::Verticality => "Verticality",
            ConstraintKind::Tangency => "Tangency",
            ConstraintKind::Concentricity => "Concentricity",
            ConstraintKind::Length => "Length",
        };
        f.write_str(name)
    }
}

/// A residual-bearing constraint bound to geometry indices for one solve.
///
/// Segment operands index `Geometry::segments`, arc operands `Geometry::arcs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Residual {
    Parallel(usize, usize),
    Perpendicular(usize, usize),
    EqualLength(usize, usize),
    EqualRadius(usize, usize),
    SegmentLength(usize, f64),
    ArcRadius(usize, f64),
    ArcSegmentTangent { arc: usize, segment: usize },
    ArcArcTangent(usize, usize),
    Concentric(usize, usize),
}

enum Bound {
    Segment(usize),
    Arc(usize),
    Value(f64),
}

fn bind_operand(entity: &EntityRef, geometry: &Geometry) -> SketchResult<Option<Bound>> {
    Ok(match entity {
        EntityRef::Segment(id) => Some(Bound::Segment(
            geometry.segment_index(*id).ok_or(SketchError::UnknownEntity(*id))?,
        )),
        EntityRef::Arc(id) => Some(Bound::Arc(
            geometry.arc_index(*id).ok_or(SketchError::UnknownEntity(*id))?,
        )),
        EntityRef::Value(v) => Some(Bound::Value(*v)),
        EntityRef::Point(_) => None,
    })
}

impl Residual {
    /// Resolve a constraint's operands against the current geometry.
    ///
    /// Returns `Ok(None)` for kinds without a residual.
    pub fn bind(
        kind: ConstraintKind,
        entities: &[EntityRef],
        geometry: &Geometry,
    ) -> SketchResult<Option<Residual>> {
        if !kind.has_residual() {
            return Ok(None);
        }

        let mismatch = || SketchError::RequirementMismatch {
            kind,
            entities: entities.iter().map(EntityRef::entity_type).collect(),
        };

        let [first, second] = entities else {
            return Err(mismatch());
        };
        let pair = (
            bind_operand(first, geometry)?.ok_or_else(mismatch)?,
            bind_operand(second, geometry)?.ok_or_else(mismatch)?,
        );

        use Bound::{Arc, Segment, Value};
        let residual = match (kind, pair) {
            (ConstraintKind::Parallelism, (Segment(a), Segment(b))) => Residual::Parallel(a, b),
            (ConstraintKind::Perpendicularity, (Segment(a), Segment(b))) => {
                Residual::Perpendicular(a, b)
            }
            (ConstraintKind::EqualLengthOrRadius, (Segment(a), Segment(b))) => {
                Residual::EqualLength(a, b)
            }
            (ConstraintKind::EqualLengthOrRadius, (Arc(a), Arc(b))) => Residual::EqualRadius(a, b),
            (ConstraintKind::Length, (Segment(s), Value(v)) | (Value(v), Segment(s))) => {
                Residual::SegmentLength(s, v)
            }
            (ConstraintKind::Length, (Arc(a), Value(v)) | (Value(v), Arc(a))) => {
                Residual::ArcRadius(a, v)
            }
            (ConstraintKind::Tangency, (Arc(arc), Segment(segment)) | (Segment(segment), Arc(arc))) => {
                Residual::ArcSegmentTangent { arc, segment }
            }
            (ConstraintKind::Tangency, (Arc(a), Arc(b))) => Residual::ArcArcTangent(a, b),
            (ConstraintKind::Concentricity, (Arc(a), Arc(b))) => Residual::Concentric(a, b),
            _ => return Err(mismatch()),
        };
        Ok(Some(residual))
    }

    /// Append this constraint's residual entries to `out`.
    pub fn evaluate(&self, geometry: &Geometry, out: &mut Vec<f64>) {
        let segment = |i: usize| &geometry.segments[i].segment;
        let arc = |i: usize| &geometry.arcs[i].arc;

        let value = match *self {
            Residual::Parallel(a, b) => cross(&segment(a).vector(), &segment(b).vector()),
            Residual::Perpendicular(a, b) => dot(&segment(a).vector(), &segment(b).vector()),
            Residual::EqualLength(a, b) => segment(a).length() - segment(b).length(),
            Residual::EqualRadius(a, b) => arc(a).radius() - arc(b).radius(),
            Residual::SegmentLength(s, length) => segment(s).length() - length,
            Residual::ArcRadius(a, radius) => arc(a).radius() - radius,
            Residual::ArcSegmentTangent { arc: a, segment: s } => {
                let arc = arc(a);
                let segment = segment(s);
                let center = arc.center();
                // A collapsed segment has no carrier line; use its single point.
                let to_line = segment
                    .line()
                    .distance_to_point(&center)
                    .unwrap_or_else(|| distance(&center, &segment.p1));
                to_line - arc.radius()
            }
            Residual::ArcArcTangent(a, b) => {
                let (a, b) = (arc(a), arc(b));
                distance(&a.center(), &b.center()) - (a.radius() + b.radius())
            }
            Residual::Concentric(a, b) => distance(&arc(a).center(), &arc(b).center()),
        };
        out.push(value);
    }
}
