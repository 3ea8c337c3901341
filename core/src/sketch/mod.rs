pub mod catalog;
pub mod collection;
pub mod types;

pub use catalog::{ConstraintKind, Requirement, Residual};
pub use collection::{Constraint, ConstraintCounters, Constraints};
pub use types::{
    ConstraintId, Endpoint, EntityId, EntityRef, EntityType, Geometry, PointRef, SketchArc,
    SketchSegment,
};

#[cfg(test)]
mod tests_collection;

use crate::error::{SketchError, SketchResult};
use crate::geometry::{Arc, Segment};
use serde::{Deserialize, Serialize};

/// Constraints dropped or rebuilt by [`Sketch::remove_entities`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Constraints deleted because they no longer apply.
    pub removed: Vec<ConstraintId>,
    /// `(old, new)` ids of constraints recreated over their surviving operands.
    pub replaced: Vec<(ConstraintId, ConstraintId)>,
}

/// Geometry plus the constraints declared over it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sketch {
    pub geometry: Geometry,
    pub constraints: Constraints,
}

impl Sketch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, segment: Segment) -> EntityId {
        self.geometry.add_segment(segment)
    }

    pub fn add_arc(&mut self, arc: Arc) -> EntityId {
        self.geometry.add_arc(arc)
    }

    /// Add a constraint over existing entities. See [`Constraints::add_constraint`]
    /// for splitting.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        entities: Vec<EntityRef>,
    ) -> SketchResult<Vec<ConstraintId>> {
        let missing = entities.iter().find_map(|e| match e {
            _ if self.geometry.contains(e) => None,
            EntityRef::Point(point) => Some(SketchError::UnknownPoint(*point)),
            EntityRef::Segment(id) | EntityRef::Arc(id) => Some(SketchError::UnknownEntity(*id)),
            EntityRef::Value(_) => None,
        });
        if let Some(err) = missing {
            return Err(err);
        }
        self.constraints.add_constraint(kind, entities)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> SketchResult<Constraint> {
        self.constraints.remove_constraint(id)
    }

    /// Delete segments or arcs along with their endpoints.
    ///
    /// Constraints that stop being applicable are removed. Those that still
    /// apply but mention a removed entity are recreated over what is left.
    pub fn remove_entities(&mut self, ids: &[EntityId]) -> SketchResult<RemovalReport> {
        if let Some(missing) = ids.iter().find(|id| self.geometry.entity_type(**id).is_none()) {
            return Err(SketchError::UnknownEntity(*missing));
        }

        let mut report = RemovalReport::default();
        for id in self.constraints.get_useless_constraints(ids) {
            self.constraints.remove_constraint(id)?;
            report.removed.push(id);
        }

        let touched: Vec<(ConstraintId, Vec<EntityRef>)> = self
            .constraints
            .iter()
            .filter(|c| ids.iter().any(|id| c.references(*id)))
            .map(|c| {
                let surviving = c
                    .entities
                    .iter()
                    .filter(|e| e.owner().map_or(true, |owner| !ids.contains(&owner)))
                    .copied()
                    .collect();
                (c.id, surviving)
            })
            .collect();

        for (old, surviving) in touched {
            let new = self.constraints.recreate(old, surviving)?;
            report.replaced.push((old, new));
        }

        for id in ids {
            self.geometry.remove_entity(*id);
        }

        tracing::debug!(
            entities = ids.len(),
            removed = report.removed.len(),
            replaced = report.replaced.len(),
            "removed sketch entities"
        );
        Ok(report)
    }

    pub fn clear(&mut self) {
        self.geometry.clear();
        self.constraints.clear();
    }
}
