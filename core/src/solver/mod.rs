//! Solver orchestration: substitution, residual binding, the numeric backend
//! and write-back, run as one reentry-guarded `solve`.

pub mod interior_point;
pub mod numeric;
pub mod reducer;
pub mod sqp;

#[cfg(test)]
mod tests_backends;

pub use numeric::{backend_for, Minimization, NonlinearSolver, Problem};
pub use reducer::{Link, SlotLinkage, SlotValue};

use crate::config::{SolverBackend, SolverConfig};
use crate::error::SketchResult;
use crate::geometry::Point2;
use crate::sketch::{Geometry, PointRef, Residual, Sketch};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Statistics of the most recent solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub backend: SolverBackend,
    pub degrees_of_freedom: usize,
    pub residuals: usize,
    pub iterations: usize,
    pub converged: bool,
    pub max_residual: f64,
}

/// Objective and residuals of one solve, evaluated on the live geometry.
struct SketchProblem<'a> {
    geometry: &'a mut Geometry,
    linkage: &'a SlotLinkage,
    residuals: &'a [Residual],
    /// Canonical index of the dragged point and where it was dropped.
    active: Option<(usize, Point2)>,
}

impl SketchProblem<'_> {
    fn residual_values(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.residuals.len());
        for residual in self.residuals {
            residual.evaluate(self.geometry, &mut out);
        }
        out
    }
}

impl Problem for SketchProblem<'_> {
    fn objective(&mut self, x: &[f64]) -> f64 {
        self.linkage.geometry_from_vars(self.geometry, x);
        match self.active {
            Some((index, target)) => self
                .geometry
                .point_at(index)
                .map_or(0.0, |p| (p - target).norm_squared()),
            None => 0.0,
        }
    }

    fn constraints(&mut self, x: &[f64]) -> Vec<f64> {
        self.linkage.geometry_from_vars(self.geometry, x);
        self.residual_values()
    }
}

struct SolvingGuard<'a>(&'a Cell<bool>);

impl Drop for SolvingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Re-solves a shared sketch whenever asked to, typically after every edit
/// and on every drag step.
///
/// The sketch is only borrowed while solving; the geometry-changed callback
/// runs after the borrow is released, so it may read the sketch. A `solve`
/// requested from inside the callback is ignored.
pub struct Solver {
    sketch: Rc<RefCell<Sketch>>,
    config: RefCell<SolverConfig>,
    degrees_of_freedom: Cell<usize>,
    solving: Cell<bool>,
    geometry_changed: RefCell<Option<Box<dyn FnMut()>>>,
    last_report: RefCell<Option<SolveReport>>,
}

impl Solver {
    pub fn new(sketch: Rc<RefCell<Sketch>>) -> Self {
        Self::with_config(sketch, SolverConfig::default())
    }

    pub fn with_config(sketch: Rc<RefCell<Sketch>>, config: SolverConfig) -> Self {
        Self {
            sketch,
            config: RefCell::new(config),
            degrees_of_freedom: Cell::new(0),
            solving: Cell::new(false),
            geometry_changed: RefCell::new(None),
            last_report: RefCell::new(None),
        }
    }

    pub fn sketch(&self) -> Rc<RefCell<Sketch>> {
        Rc::clone(&self.sketch)
    }

    pub fn set_geometry_changed(&self, callback: impl FnMut() + 'static) {
        *self.geometry_changed.borrow_mut() = Some(Box::new(callback));
    }

    pub fn set_backend(&self, backend: SolverBackend) {
        self.config.borrow_mut().backend = backend;
    }

    pub fn backend(&self) -> SolverBackend {
        self.config.borrow().backend
    }

    pub fn config(&self) -> SolverConfig {
        self.config.borrow().clone()
    }

    pub fn set_config(&self, config: SolverConfig) {
        *self.config.borrow_mut() = config;
    }

    /// Free variables left after substitution, as of the last solve.
    pub fn degrees_of_freedom(&self) -> usize {
        self.degrees_of_freedom.get()
    }

    pub fn is_solving(&self) -> bool {
        self.solving.get()
    }

    pub fn last_report(&self) -> Option<SolveReport> {
        self.last_report.borrow().clone()
    }

    /// Recompute the geometry so every active constraint holds.
    ///
    /// With `active` set, the named point is kept as close as possible to its
    /// current position. Failures are logged, never returned: the best
    /// iterate found is applied and the sketch stays usable.
    pub fn solve(&self, active: Option<PointRef>) {
        self.solve_guarded(active);
    }

    /// Move `point` to `target` and re-solve around it.
    ///
    /// Returns `true` once the sketch has been re-solved around the new
    /// position. Returns `false` without a solve when the point is held by a
    /// Fixed constraint, does not exist, or a solve is already running. When
    /// the solve itself is skipped (a constraint names a removed entity) the
    /// point is put back and `false` is returned.
    pub fn drag_point(&self, point: PointRef, target: Point2) -> bool {
        if self.solving.get() {
            return false;
        }
        let previous = {
            let Ok(mut sketch) = self.sketch.try_borrow_mut() else {
                return false;
            };
            if sketch.constraints.is_point_fixed(&point) {
                tracing::debug!(%point, "drag refused, point is fixed");
                return false;
            }
            let Some(previous) = sketch.geometry.point(&point) else {
                tracing::warn!(%point, "drag refused, unknown point");
                return false;
            };
            sketch.geometry.set_point(&point, target);
            previous
        };

        if self.solve_guarded(Some(point)) {
            return true;
        }
        if let Ok(mut sketch) = self.sketch.try_borrow_mut() {
            sketch.geometry.set_point(&point, previous);
        }
        false
    }

    /// Runs one solve unless one is already in progress. Returns whether the
    /// solve ran to completion.
    fn solve_guarded(&self, active: Option<PointRef>) -> bool {
        if self.solving.get() {
            tracing::trace!("solve requested while solving, ignored");
            return false;
        }
        self.solving.set(true);
        let _guard = SolvingGuard(&self.solving);

        let config = self.config();
        let notify = {
            let Ok(mut sketch) = self.sketch.try_borrow_mut() else {
                tracing::warn!("sketch is borrowed elsewhere, solve skipped");
                return false;
            };
            match self.run(&mut sketch, active, &config) {
                Ok(notify) => notify,
                Err(err) => {
                    tracing::warn!(%err, "solve skipped");
                    return false;
                }
            }
        };

        if notify {
            self.notify_geometry_changed();
        }
        true
    }

    fn run(
        &self,
        sketch: &mut Sketch,
        active: Option<PointRef>,
        config: &SolverConfig,
    ) -> SketchResult<bool> {
        let Sketch {
            geometry,
            constraints,
        } = sketch;

        let snapshot = active.and_then(|point| {
            let index = geometry.point_index(&point)?;
            Some((index, geometry.point_at(index)?))
        });

        let linkage = SlotLinkage::build(geometry, constraints.iter(), active)?;

        let mut residuals = Vec::new();
        let mut inactive = 0;
        for constraint in constraints.iter() {
            if linkage.is_inactive(geometry, constraint) {
                inactive += 1;
                continue;
            }
            if let Some(residual) = Residual::bind(constraint.kind, &constraint.entities, geometry)? {
                residuals.push(residual);
            }
        }
        constraints.refresh_counters(inactive);

        let initial_guess = linkage.geometry_to_vars(geometry);
        let dof = initial_guess.len();
        self.degrees_of_freedom.set(dof);

        let mut problem = SketchProblem {
            geometry,
            linkage: &linkage,
            residuals: &residuals,
            active: snapshot,
        };

        if dof == 0 {
            linkage.geometry_from_vars(problem.geometry, &initial_guess);
            let max_residual = problem
                .residual_values()
                .iter()
                .fold(0.0_f64, |acc, r| acc.max(r.abs()));
            tracing::debug!(
                residuals = residuals.len(),
                inactive,
                "geometry fully determined by substitution"
            );
            self.store_report(SolveReport {
                backend: config.backend,
                degrees_of_freedom: 0,
                residuals: residuals.len(),
                iterations: 0,
                converged: max_residual <= config.constraint_tolerance,
                max_residual,
            });
            return Ok(config.notify_when_determined);
        }

        let backend = backend_for(config);
        let result = backend.minimize(&mut problem, &initial_guess);
        linkage.geometry_from_vars(problem.geometry, &result.x);

        if result.converged {
            tracing::debug!(
                backend = backend.name(),
                dof,
                residuals = residuals.len(),
                inactive,
                iterations = result.iterations,
                "sketch solved"
            );
        } else {
            tracing::warn!(
                backend = backend.name(),
                dof,
                residuals = residuals.len(),
                iterations = result.iterations,
                max_residual = result.max_residual,
                "solver did not converge, applying best iterate"
            );
        }

        self.store_report(SolveReport {
            backend: config.backend,
            degrees_of_freedom: dof,
            residuals: residuals.len(),
            iterations: result.iterations,
            converged: result.converged,
            max_residual: result.max_residual,
        });
        Ok(true)
    }

    fn store_report(&self, report: SolveReport) {
        *self.last_report.borrow_mut() = Some(report);
    }

    fn notify_geometry_changed(&self) {
        // Taken out for the call so the callback may install a new one.
        let callback = self.geometry_changed.borrow_mut().take();
        if let Some(mut callback) = callback {
            callback();
            let mut slot = self.geometry_changed.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }
}
