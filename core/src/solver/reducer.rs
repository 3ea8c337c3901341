//! Slot linkage: eliminates coincidence, horizontality, verticality and fixed
//! constraints by substitution before anything reaches the numeric solver.
//!
//! Every point contributes two slots, `2·i` for x and `2·i + 1` for y, where
//! `i` is the point's canonical index. Slots linked together share one
//! representative, which is either a free variable or a fixed value.

use crate::error::{SketchError, SketchResult};
use crate::sketch::{Constraint, ConstraintKind, EntityRef, Geometry, PointRef};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Link {
    /// Holds its own free value.
    Base,
    /// Holds its own value, excluded from optimization.
    Fixed,
    /// Auxiliary slot no point links to anymore.
    Orphan,
    /// Takes its value from the given representative slot.
    To(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotValue {
    /// Index into the optimization vector.
    Free(usize),
    Fixed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X = 0,
    Y = 1,
}

#[derive(Debug, Clone)]
pub struct SlotLinkage {
    values: Vec<f64>,
    links: Vec<Link>,
    primary_slots: usize,
    var_index: Vec<Option<usize>>,
    free_slots: usize,
    arc_count: usize,
}

impl SlotLinkage {
    /// Build the linkage from scratch for the current geometry.
    ///
    /// `active` is the point being dragged, if any. It never seeds a newly
    /// created group, and its live coordinate wins over the group's value when
    /// the group is still free.
    pub fn build<'a>(
        geometry: &Geometry,
        constraints: impl IntoIterator<Item = &'a Constraint>,
        active: Option<PointRef>,
    ) -> SketchResult<Self> {
        let values: Vec<f64> = geometry
            .points()
            .iter()
            .flat_map(|(_, p)| [p.x, p.y])
            .collect();
        let primary_slots = values.len();

        let mut linkage = Self {
            links: vec![Link::Base; primary_slots],
            values,
            primary_slots,
            var_index: Vec::new(),
            free_slots: 0,
            arc_count: geometry.arcs.len(),
        };

        let active = match active {
            Some(point) => Some(
                geometry
                    .point_index(&point)
                    .ok_or(SketchError::UnknownPoint(point))?,
            ),
            None => None,
        };

        let constraints: Vec<&Constraint> = constraints.into_iter().collect();

        for constraint in &constraints {
            let axes: &[Axis] = match constraint.kind {
                ConstraintKind::Coincidence => &[Axis::X, Axis::Y],
                ConstraintKind::Horizontality => &[Axis::Y],
                ConstraintKind::Verticality => &[Axis::X],
                _ => continue,
            };
            let points = point_indices(geometry, constraint)?;
            for axis in axes {
                linkage.unify(&points, *axis, active);
            }
        }

        for constraint in &constraints {
            if constraint.kind != ConstraintKind::Fixed {
                continue;
            }
            for point in point_indices(geometry, constraint)? {
                for axis in [Axis::X, Axis::Y] {
                    let slot = slot(point, axis);
                    let representative = linkage.representative(slot);
                    linkage.values[representative] = linkage.values[slot];
                    linkage.links[representative] = Link::Fixed;
                }
            }
        }

        if let Some(point) = active {
            for axis in [Axis::X, Axis::Y] {
                let slot = slot(point, axis);
                let representative = linkage.representative(slot);
                if linkage.links[representative] == Link::Base {
                    linkage.values[representative] = linkage.values[slot];
                }
            }
        }

        let mut referenced = vec![false; linkage.links.len()];
        for link in &linkage.links[..primary_slots] {
            if let Link::To(target) = link {
                referenced[*target] = true;
            }
        }
        for aux in primary_slots..linkage.links.len() {
            if !referenced[aux] {
                linkage.links[aux] = Link::Orphan;
            }
        }

        let mut next = 0;
        linkage.var_index = linkage
            .links
            .iter()
            .map(|link| {
                (*link == Link::Base).then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        linkage.free_slots = next;

        Ok(linkage)
    }

    /// Link the `axis` slots of `points` into one group.
    fn unify(&mut self, points: &[usize], axis: Axis, active: Option<usize>) {
        let slots: Vec<usize> = points.iter().map(|p| slot(*p, axis)).collect();

        let existing = slots.iter().find_map(|s| match self.links[*s] {
            Link::To(target) => Some(target),
            _ => None,
        });

        let target = match existing {
            Some(target) => target,
            None => {
                let seed = points
                    .iter()
                    .zip(&slots)
                    .find(|(p, _)| Some(**p) != active)
                    .or_else(|| points.iter().zip(&slots).next())
                    .map(|(_, s)| self.values[*s])
                    .unwrap_or_default();
                self.links.push(Link::Base);
                self.values.push(seed);
                self.links.len() - 1
            }
        };

        for s in slots {
            match self.links[s] {
                Link::To(old) if old != target => {
                    for link in self.links.iter_mut() {
                        if *link == Link::To(old) {
                            *link = Link::To(target);
                        }
                    }
                }
                Link::To(_) => {}
                _ => self.links[s] = Link::To(target),
            }
        }
    }

    pub fn representative(&self, slot: usize) -> usize {
        match self.links[slot] {
            Link::To(target) => target,
            _ => slot,
        }
    }

    pub fn link(&self, slot: usize) -> Link {
        self.links[slot]
    }

    pub fn resolve(&self, slot: usize) -> SlotValue {
        let representative = self.representative(slot);
        match self.var_index[representative] {
            Some(index) => SlotValue::Free(index),
            None => SlotValue::Fixed(self.values[representative]),
        }
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.free_slots + self.arc_count
    }

    /// Number of slots, point slots first and auxiliary slots after.
    pub fn slot_count(&self) -> usize {
        self.links.len()
    }

    /// Free slot values in slot order, then every arc's `d`.
    pub fn geometry_to_vars(&self, geometry: &Geometry) -> Vec<f64> {
        self.links
            .iter()
            .zip(&self.values)
            .filter(|(link, _)| **link == Link::Base)
            .map(|(_, value)| *value)
            .chain(geometry.arcs.iter().map(|a| a.arc.d))
            .collect()
    }

    /// Write `vars` back into the geometry. This is the only place solving
    /// mutates points and arc offsets.
    pub fn geometry_from_vars(&self, geometry: &mut Geometry, vars: &[f64]) {
        debug_assert_eq!(vars.len(), self.degrees_of_freedom());

        let value = |slot: usize| match self.resolve(slot) {
            SlotValue::Free(index) => vars[index],
            SlotValue::Fixed(value) => value,
        };

        for point in 0..self.primary_slots / 2 {
            let x = value(slot(point, Axis::X));
            let y = value(slot(point, Axis::Y));
            if let Some(p) = geometry.point_at_mut(point) {
                p.x = x;
                p.y = y;
            }
        }

        for (arc, d) in geometry.arcs.iter_mut().zip(&vars[self.free_slots..]) {
            arc.arc.d = *d;
        }
    }

    /// Both coordinates of the point at canonical index `point` are fixed.
    pub fn is_point_fixed(&self, point: usize) -> bool {
        [Axis::X, Axis::Y]
            .into_iter()
            .all(|axis| self.links[self.representative(slot(point, axis))] == Link::Fixed)
    }

    /// A residual-bearing constraint whose operands are all fully fixed has
    /// nothing left to adjust. Arcs are never fixed since `d` stays free;
    /// literals are ignored.
    pub fn is_inactive(&self, geometry: &Geometry, constraint: &Constraint) -> bool {
        if !constraint.kind.has_residual() {
            return false;
        }
        let fixed = |point: PointRef| {
            geometry
                .point_index(&point)
                .is_some_and(|index| self.is_point_fixed(index))
        };
        constraint.entities.iter().all(|entity| match entity {
            EntityRef::Point(point) => fixed(*point),
            EntityRef::Segment(id) => fixed(PointRef::start(*id)) && fixed(PointRef::end(*id)),
            EntityRef::Arc(_) => false,
            EntityRef::Value(_) => true,
        })
    }
}

fn slot(point: usize, axis: Axis) -> usize {
    2 * point + axis as usize
}

fn point_indices(geometry: &Geometry, constraint: &Constraint) -> SketchResult<Vec<usize>> {
    constraint
        .point_operands()
        .into_iter()
        .map(|point| {
            geometry
                .point_index(&point)
                .ok_or(SketchError::UnknownPoint(point))
        })
        .collect()
}
