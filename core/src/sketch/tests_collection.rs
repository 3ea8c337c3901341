use crate::error::SketchError;
use crate::geometry::{Arc, Point2, Segment};
use crate::sketch::{ConstraintKind, Constraints, EntityId, EntityRef, PointRef, Sketch};
use std::collections::BTreeSet;

fn segment(sketch: &mut Sketch, x1: f64, y1: f64, x2: f64, y2: f64) -> EntityId {
    sketch.add_segment(Segment::new(Point2::new(x1, y1), Point2::new(x2, y2)))
}

fn three_segments() -> (Sketch, EntityId, EntityId, EntityId) {
    let mut sketch = Sketch::new();
    let s1 = segment(&mut sketch, 0.0, 0.0, 10.0, 0.0);
    let s2 = segment(&mut sketch, 10.0, 0.0, 10.0, 10.0);
    let s3 = segment(&mut sketch, 10.0, 10.0, 0.0, 0.0);
    (sketch, s1, s2, s3)
}

// ============================================================================
// Splitting
// ============================================================================

#[test]
fn test_equal_length_splits_into_consecutive_pairs() {
    let (mut sketch, s1, s2, s3) = three_segments();
    let ids = sketch
        .add_constraint(
            ConstraintKind::EqualLengthOrRadius,
            vec![EntityRef::Segment(s1), EntityRef::Segment(s2), EntityRef::Segment(s3)],
        )
        .unwrap();

    assert_eq!(ids.len(), 2);
    let first = sketch.constraints.get(ids[0]).unwrap();
    let second = sketch.constraints.get(ids[1]).unwrap();
    assert_eq!(first.entities, vec![EntityRef::Segment(s1), EntityRef::Segment(s2)]);
    assert_eq!(second.entities, vec![EntityRef::Segment(s2), EntityRef::Segment(s3)]);
}

#[test]
fn test_fixed_splits_one_per_point() {
    let (mut sketch, s1, s2, _) = three_segments();
    let points = vec![
        PointRef::start(s1).into(),
        PointRef::end(s1).into(),
        PointRef::start(s2).into(),
    ];
    let ids = sketch.add_constraint(ConstraintKind::Fixed, points).unwrap();

    assert_eq!(ids.len(), 3);
    assert!(sketch.constraints.iter().all(|c| c.entities.len() == 1));
    assert!(sketch.constraints.is_point_fixed(&PointRef::end(s1)));
    assert!(!sketch.constraints.is_point_fixed(&PointRef::end(s2)));
}

#[test]
fn test_horizontality_over_segments_splits_per_segment() {
    let (mut sketch, s1, s2, _) = three_segments();
    let ids = sketch
        .add_constraint(
            ConstraintKind::Horizontality,
            vec![EntityRef::Segment(s1), EntityRef::Segment(s2)],
        )
        .unwrap();
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_coincidence_is_stored_whole() {
    let (mut sketch, s1, s2, s3) = three_segments();
    let ids = sketch
        .add_constraint(
            ConstraintKind::Coincidence,
            vec![
                PointRef::end(s1).into(),
                PointRef::start(s2).into(),
                PointRef::end(s3).into(),
            ],
        )
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(sketch.constraints.get(ids[0]).unwrap().entities.len(), 3);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_requirement_mismatch_creates_nothing() {
    let (mut sketch, s1, _, _) = three_segments();
    let result = sketch.add_constraint(
        ConstraintKind::Perpendicularity,
        vec![EntityRef::Segment(s1), PointRef::start(s1).into()],
    );
    assert!(matches!(
        result,
        Err(SketchError::RequirementMismatch { kind: ConstraintKind::Perpendicularity, .. })
    ));
    assert!(sketch.constraints.is_empty());
}

#[test]
fn test_unknown_entity_is_rejected() {
    let (mut sketch, s1, _, _) = three_segments();
    let ghost = EntityId::new();
    let result = sketch.add_constraint(
        ConstraintKind::Parallelism,
        vec![EntityRef::Segment(s1), EntityRef::Segment(ghost)],
    );
    assert!(matches!(result, Err(SketchError::UnknownEntity(id)) if id == ghost));

    let result = sketch.add_constraint(ConstraintKind::Fixed, vec![PointRef::start(ghost).into()]);
    assert!(matches!(result, Err(SketchError::UnknownPoint(_))));
}

#[test]
fn test_segment_operand_must_really_be_a_segment() {
    let mut sketch = Sketch::new();
    let arc = sketch.add_arc(Arc::new(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), 0.0));
    let s = segment(&mut sketch, 0.0, 5.0, 2.0, 5.0);
    let result = sketch.add_constraint(
        ConstraintKind::Parallelism,
        vec![EntityRef::Segment(s), EntityRef::Segment(arc)],
    );
    assert!(matches!(result, Err(SketchError::UnknownEntity(_))));
}

// ============================================================================
// Applicability queries
// ============================================================================

#[test]
fn test_available_constraints_for_two_segments() {
    let (_, s1, s2, _) = three_segments();
    let available =
        Constraints::get_available_constraints(&[EntityRef::Segment(s1), EntityRef::Segment(s2)]);
    let expected: BTreeSet<_> = [
        ConstraintKind::Parallelism,
        ConstraintKind::Perpendicularity,
        ConstraintKind::EqualLengthOrRadius,
        ConstraintKind::Horizontality,
        ConstraintKind::Verticality,
    ]
    .into_iter()
    .collect();
    assert_eq!(available, expected);
}

#[test]
fn test_available_constraints_for_points_and_mixed() {
    let (_, s1, s2, _) = three_segments();
    let available = Constraints::get_available_constraints(&[
        PointRef::end(s1).into(),
        PointRef::start(s2).into(),
    ]);
    let expected: BTreeSet<_> = [
        ConstraintKind::Coincidence,
        ConstraintKind::Fixed,
        ConstraintKind::Horizontality,
        ConstraintKind::Verticality,
    ]
    .into_iter()
    .collect();
    assert_eq!(available, expected);

    let arc = EntityId::new();
    let available =
        Constraints::get_available_constraints(&[EntityRef::Arc(arc), EntityRef::Segment(s1)]);
    assert_eq!(available.into_iter().collect::<Vec<_>>(), vec![ConstraintKind::Tangency]);

    assert!(Constraints::get_available_constraints(&[]).is_empty());
}

#[test]
fn test_useless_constraints() {
    let (mut sketch, s1, s2, s3) = three_segments();
    let parallel = sketch
        .add_constraint(
            ConstraintKind::Parallelism,
            vec![EntityRef::Segment(s1), EntityRef::Segment(s3)],
        )
        .unwrap()[0];
    let coincidence = sketch
        .add_constraint(
            ConstraintKind::Coincidence,
            vec![
                PointRef::end(s1).into(),
                PointRef::start(s2).into(),
                PointRef::end(s3).into(),
            ],
        )
        .unwrap()[0];

    assert_eq!(sketch.constraints.get_useless_constraints(&[s1]), vec![parallel]);
    assert_eq!(
        sketch.constraints.get_useless_constraints(&[s1, s2]),
        vec![parallel, coincidence]
    );
    assert!(sketch.constraints.get_useless_constraints(&[s2]).is_empty());
}

// ============================================================================
// Cascading removal
// ============================================================================

#[test]
fn test_remove_entities_prunes_and_recreates() {
    let (mut sketch, s1, s2, s3) = three_segments();
    let parallel = sketch
        .add_constraint(
            ConstraintKind::Parallelism,
            vec![EntityRef::Segment(s1), EntityRef::Segment(s3)],
        )
        .unwrap()[0];
    let coincidence = sketch
        .add_constraint(
            ConstraintKind::Coincidence,
            vec![
                PointRef::end(s1).into(),
                PointRef::start(s2).into(),
                PointRef::end(s3).into(),
            ],
        )
        .unwrap()[0];
    let untouched = sketch
        .add_constraint(ConstraintKind::Fixed, vec![PointRef::start(s2).into()])
        .unwrap()[0];

    let report = sketch.remove_entities(&[s1]).unwrap();

    assert_eq!(report.removed, vec![parallel]);
    assert_eq!(report.replaced.len(), 1);
    let (old, new) = report.replaced[0];
    assert_eq!(old, coincidence);
    assert_ne!(new, coincidence);

    assert!(sketch.constraints.get(coincidence).is_none());
    let recreated = sketch.constraints.get(new).unwrap();
    assert_eq!(recreated.kind, ConstraintKind::Coincidence);
    assert_eq!(
        recreated.entities,
        vec![
            EntityRef::Point(PointRef::start(s2)),
            EntityRef::Point(PointRef::end(s3)),
        ]
    );
    assert!(sketch.constraints.get(untouched).is_some());
    assert_eq!(sketch.constraints.len(), 2);
    assert_eq!(sketch.geometry.segments.len(), 2);
}

#[test]
fn test_remove_unknown_entity_changes_nothing() {
    let (mut sketch, s1, s2, _) = three_segments();
    sketch
        .add_constraint(
            ConstraintKind::Parallelism,
            vec![EntityRef::Segment(s1), EntityRef::Segment(s2)],
        )
        .unwrap();

    let result = sketch.remove_entities(&[s1, EntityId::new()]);
    assert!(matches!(result, Err(SketchError::UnknownEntity(_))));
    assert_eq!(sketch.constraints.len(), 1);
    assert_eq!(sketch.geometry.segments.len(), 3);
}
