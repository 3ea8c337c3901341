use super::catalog::ConstraintKind;
use super::types::{ConstraintId, EntityId, EntityRef, EntityType, PointRef};
use crate::error::{SketchError, SketchResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A geometric relation over an ordered list of operands.
///
/// Immutable once stored: edits go through delete-and-recreate so the id
/// always names the same relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub entities: Vec<EntityRef>,
}

impl Constraint {
    fn new(kind: ConstraintKind, entities: Vec<EntityRef>) -> Self {
        Self {
            id: ConstraintId::new(),
            kind,
            entities,
        }
    }

    pub fn entity_types(&self) -> Vec<EntityType> {
        self.entities.iter().map(EntityRef::entity_type).collect()
    }

    /// Points this constraint touches. Segment and arc operands contribute
    /// both of their endpoints; literals contribute nothing.
    pub fn point_operands(&self) -> Vec<PointRef> {
        self.entities
            .iter()
            .flat_map(|entity| match entity {
                EntityRef::Point(point) => vec![*point],
                EntityRef::Segment(id) | EntityRef::Arc(id) => {
                    vec![PointRef::start(*id), PointRef::end(*id)]
                }
                EntityRef::Value(_) => Vec::new(),
            })
            .collect()
    }

    pub fn references(&self, id: EntityId) -> bool {
        self.entities.iter().any(|e| e.owner() == Some(id))
    }
}

/// Diagnostic counts refreshed by every solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintCounters {
    pub inactive: usize,
    pub solved_by_substitution: usize,
    pub fixed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    items: Vec<Constraint>,
    counters: ConstraintCounters,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a constraint request.
    ///
    /// Splittable kinds given a longer homogeneous list are stored as atomic
    /// constraints: consecutive pairs for two-operand patterns, one per operand
    /// for single-operand ones. Returns the ids in insertion order.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        entities: Vec<EntityRef>,
    ) -> SketchResult<Vec<ConstraintId>> {
        let types: Vec<EntityType> = entities.iter().map(EntityRef::entity_type).collect();
        let requirement = kind
            .matching_requirement(&types)
            .ok_or(SketchError::RequirementMismatch {
                kind,
                entities: types,
            })?;

        let new_constraints: Vec<Constraint> = if kind.is_splittable() {
            match requirement.arity() {
                1 => entities
                    .iter()
                    .map(|e| Constraint::new(kind, vec![*e]))
                    .collect(),
                _ => entities
                    .windows(2)
                    .map(|pair| Constraint::new(kind, pair.to_vec()))
                    .collect(),
            }
        } else {
            vec![Constraint::new(kind, entities)]
        };

        let ids = new_constraints.iter().map(|c| c.id).collect();
        self.items.extend(new_constraints);
        Ok(ids)
    }

    /// Every kind the selection could be turned into.
    pub fn get_available_constraints(entities: &[EntityRef]) -> BTreeSet<ConstraintKind> {
        let types: Vec<EntityType> = entities.iter().map(EntityRef::entity_type).collect();
        ConstraintKind::ALL
            .into_iter()
            .filter(|kind| kind.accepts(&types))
            .collect()
    }

    /// Constraints that would no longer be applicable once `removed` are gone.
    pub fn get_useless_constraints(&self, removed: &[EntityId]) -> Vec<ConstraintId> {
        let removed: HashSet<EntityId> = removed.iter().copied().collect();
        self.items
            .iter()
            .filter(|constraint| {
                let remaining: Vec<EntityType> = constraint
                    .entities
                    .iter()
                    .filter(|e| e.owner().map_or(true, |owner| !removed.contains(&owner)))
                    .map(EntityRef::entity_type)
                    .collect();
                !constraint.kind.accepts(&remaining)
            })
            .map(|constraint| constraint.id)
            .collect()
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> SketchResult<Constraint> {
        let index = self.position(id)?;
        Ok(self.items.remove(index))
    }

    /// Replace a constraint by a freshly created one over `entities`, at the
    /// same position. The replacement gets a new id.
    pub fn recreate(
        &mut self,
        id: ConstraintId,
        entities: Vec<EntityRef>,
    ) -> SketchResult<ConstraintId> {
        let index = self.position(id)?;
        let kind = self.items[index].kind;
        let types: Vec<EntityType> = entities.iter().map(EntityRef::entity_type).collect();
        if !kind.accepts(&types) {
            return Err(SketchError::RequirementMismatch {
                kind,
                entities: types,
            });
        }

        let replacement = Constraint::new(kind, entities);
        let new_id = replacement.id;
        self.items[index] = replacement;
        Ok(new_id)
    }

    fn position(&self, id: ConstraintId) -> SketchResult<usize> {
        self.items
            .iter()
            .position(|c| c.id == id)
            .ok_or(SketchError::UnknownConstraint(id))
    }

    pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
        self.items.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.counters = ConstraintCounters::default();
    }

    /// True when some Fixed constraint names `point`.
    pub fn is_point_fixed(&self, point: &PointRef) -> bool {
        self.items.iter().any(|c| {
            c.kind == ConstraintKind::Fixed && c.entities.contains(&EntityRef::Point(*point))
        })
    }

    pub fn counters(&self) -> ConstraintCounters {
        self.counters
    }

    pub fn refresh_counters(&mut self, inactive: usize) {
        self.counters = ConstraintCounters {
            inactive,
            solved_by_substitution: self
                .items
                .iter()
                .filter(|c| c.kind.is_solved_by_substitution())
                .count(),
            fixed: self
                .items
                .iter()
                .filter(|c| c.kind == ConstraintKind::Fixed)
                .count(),
        };
    }
}

impl<'a> IntoIterator for &'a Constraints {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
