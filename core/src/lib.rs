pub mod config;
pub mod error;
pub mod geometry;
pub mod sketch;
pub mod solver;

pub use config::{SolverBackend, SolverConfig};
pub use error::{SketchError, SketchResult};
pub use sketch::{
    Constraint, ConstraintId, ConstraintKind, EntityId, EntityRef, EntityType, PointRef, Sketch,
};
pub use solver::{SolveReport, Solver};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
