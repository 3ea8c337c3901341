use crate::sketch::{ConstraintId, ConstraintKind, EntityId, EntityType, PointRef};
use thiserror::Error;

/// Errors raised while editing a sketch or loading solver settings.
#[derive(Debug, Error)]
pub enum SketchError {
    #[error("Arc defining points are collinear")]
    CollinearArc,

    #[error("{kind} cannot be applied to {entities:?}")]
    RequirementMismatch {
        kind: ConstraintKind,
        entities: Vec<EntityType>,
    },

    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    #[error("Unknown point: {0}")]
    UnknownPoint(PointRef),

    #[error("Unknown constraint: {0}")]
    UnknownConstraint(ConstraintId),

    #[error("Invalid solver configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

pub type SketchResult<T> = Result<T, SketchError>;
