use crate::geometry::{Arc, Point2, Segment};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a segment or arc in a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a stored constraint. Never reused once the constraint is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(pub Uuid);

impl ConstraintId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ConstraintId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    Start,
    End,
}

/// One endpoint of a segment or arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointRef {
    pub entity: EntityId,
    pub end: Endpoint,
}

impl PointRef {
    pub fn start(entity: EntityId) -> Self {
        Self { entity, end: Endpoint::Start }
    }

    pub fn end(entity: EntityId) -> Self {
        Self { entity, end: Endpoint::End }
    }
}

impl fmt::Display for PointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = match self.end {
            Endpoint::Start => "start",
            Endpoint::End => "end",
        };
        write!(f, "{}:{}", self.entity, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Point,
    Segment,
    Arc,
    Value,
}

/// Operand of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntityRef {
    Point(PointRef),
    Segment(EntityId),
    Arc(EntityId),
    /// Numeric literal, used by `Length`.
    Value(f64),
}

impl EntityRef {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityRef::Point(_) => EntityType::Point,
            EntityRef::Segment(_) => EntityType::Segment,
            EntityRef::Arc(_) => EntityType::Arc,
            EntityRef::Value(_) => EntityType::Value,
        }
    }

    /// Segment or arc this operand lives on. `None` for literals.
    pub fn owner(&self) -> Option<EntityId> {
        match self {
            EntityRef::Point(point) => Some(point.entity),
            EntityRef::Segment(id) | EntityRef::Arc(id) => Some(*id),
            EntityRef::Value(_) => None,
        }
    }
}

impl From<PointRef> for EntityRef {
    fn from(point: PointRef) -> Self {
        EntityRef::Point(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SketchSegment {
    pub id: EntityId,
    pub segment: Segment,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SketchArc {
    pub id: EntityId,
    pub arc: Arc,
}

/// Ordered segments and arcs of a sketch.
///
/// Points have no identity of their own: each endpoint belongs to exactly one
/// entity. The canonical point order used by the solver is every segment's
/// `(p1, p2)` followed by every arc's `(p1, p2)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub segments: Vec<SketchSegment>,
    pub arcs: Vec<SketchArc>,
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, segment: Segment) -> EntityId {
        let id = EntityId::new();
        self.segments.push(SketchSegment { id, segment });
        id
    }

    pub fn add_arc(&mut self, arc: Arc) -> EntityId {
        let id = EntityId::new();
        self.arcs.push(SketchArc { id, arc });
        id
    }

    /// Drop a segment or arc together with its two endpoints.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let before = self.segments.len() + self.arcs.len();
        self.segments.retain(|s| s.id != id);
        self.arcs.retain(|a| a.id != id);
        before != self.segments.len() + self.arcs.len()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.arcs.clear();
    }

    pub fn segment_index(&self, id: EntityId) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }

    pub fn arc_index(&self, id: EntityId) -> Option<usize> {
        self.arcs.iter().position(|a| a.id == id)
    }

    pub fn segment(&self, id: EntityId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id).map(|s| &s.segment)
    }

    pub fn arc(&self, id: EntityId) -> Option<&Arc> {
        self.arcs.iter().find(|a| a.id == id).map(|a| &a.arc)
    }

    pub fn entity_type(&self, id: EntityId) -> Option<EntityType> {
        if self.segment_index(id).is_some() {
            Some(EntityType::Segment)
        } else if self.arc_index(id).is_some() {
            Some(EntityType::Arc)
        } else {
            None
        }
    }

    /// True when the operand names something that exists with the right type.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Point(point) => self.entity_type(point.entity).is_some(),
            EntityRef::Segment(id) => self.segment_index(*id).is_some(),
            EntityRef::Arc(id) => self.arc_index(*id).is_some(),
            EntityRef::Value(_) => true,
        }
    }

    pub fn point_count(&self) -> usize {
        2 * (self.segments.len() + self.arcs.len())
    }

    /// Position of `point` in the canonical point order.
    pub fn point_index(&self, point: &PointRef) -> Option<usize> {
        let offset = match point.end {
            Endpoint::Start => 0,
            Endpoint::End => 1,
        };
        if let Some(i) = self.segment_index(point.entity) {
            return Some(2 * i + offset);
        }
        self.arc_index(point.entity)
            .map(|i| 2 * (self.segments.len() + i) + offset)
    }

    pub fn point(&self, point: &PointRef) -> Option<Point2> {
        self.point_index(point).and_then(|i| self.point_at(i))
    }

    /// Point by canonical index.
    pub fn point_at(&self, index: usize) -> Option<Point2> {
        let entity = index / 2;
        let pick = |p1: Point2, p2: Point2| if index % 2 == 0 { p1 } else { p2 };
        if let Some(s) = self.segments.get(entity) {
            return Some(pick(s.segment.p1, s.segment.p2));
        }
        self.arcs
            .get(entity - self.segments.len())
            .map(|a| pick(a.arc.p1, a.arc.p2))
    }

    pub fn point_at_mut(&mut self, index: usize) -> Option<&mut Point2> {
        let entity = index / 2;
        let first = index % 2 == 0;
        let segment_count = self.segments.len();
        if let Some(s) = self.segments.get_mut(entity) {
            return Some(if first { &mut s.segment.p1 } else { &mut s.segment.p2 });
        }
        self.arcs
            .get_mut(entity - segment_count)
            .map(|a| if first { &mut a.arc.p1 } else { &mut a.arc.p2 })
    }

    pub fn set_point(&mut self, point: &PointRef, value: Point2) -> bool {
        match self.point_index(point).and_then(|i| self.point_at_mut(i)) {
            Some(p) => {
                *p = value;
                true
            }
            None => false,
        }
    }

    /// All endpoints in canonical order.
    pub fn points(&self) -> Vec<(PointRef, Point2)> {
        let segments = self.segments.iter().flat_map(|s| {
            [
                (PointRef::start(s.id), s.segment.p1),
                (PointRef::end(s.id), s.segment.p2),
            ]
        });
        let arcs = self.arcs.iter().flat_map(|a| {
            [
                (PointRef::start(a.id), a.arc.p1),
                (PointRef::end(a.id), a.arc.p2),
            ]
        });
        segments.chain(arcs).collect()
    }
}
