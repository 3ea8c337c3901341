//! Problem interface shared by the nonlinear backends, plus the finite
//! difference and KKT linear algebra they both rely on.

use crate::config::{SolverBackend, SolverConfig};
use nalgebra::{DMatrix, DVector};

use super::interior_point::InteriorPoint;
use super::sqp::Sqp;

/// Equality-constrained minimization problem: minimize `objective(x)`
/// subject to `constraints(x) = 0`.
///
/// Both callbacks take `&mut self` because evaluating them writes the
/// candidate vector into the sketch first.
pub trait Problem {
    fn objective(&mut self, x: &[f64]) -> f64;
    fn constraints(&mut self, x: &[f64]) -> Vec<f64>;
}

/// Outcome of a backend run. `x` is the best iterate seen, converged or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimization {
    pub x: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
    pub objective: f64,
    pub max_residual: f64,
}

pub trait NonlinearSolver {
    fn name(&self) -> &'static str;
    fn minimize(&self, problem: &mut dyn Problem, initial_guess: &[f64]) -> Minimization;
}

pub fn backend_for(config: &SolverConfig) -> Box<dyn NonlinearSolver> {
    match config.backend {
        SolverBackend::Sqp => Box::new(Sqp::new(config)),
        SolverBackend::InteriorPoint => Box::new(InteriorPoint::new(config)),
    }
}

/// Objective and residuals at `x`.
pub(crate) fn evaluate(problem: &mut dyn Problem, x: &DVector<f64>) -> (f64, DVector<f64>) {
    let f = problem.objective(x.as_slice());
    let c = DVector::from_vec(problem.constraints(x.as_slice()));
    (f, c)
}

fn relative_step(step: f64, xi: f64) -> f64 {
    step * (1.0 + xi.abs())
}

/// Central-difference gradient of the objective.
pub(crate) fn gradient(problem: &mut dyn Problem, x: &DVector<f64>, step: f64) -> DVector<f64> {
    let mut probe = x.clone();
    DVector::from_fn(x.len(), |j, _| {
        let h = relative_step(step, x[j]);
        probe[j] = x[j] + h;
        let forward = problem.objective(probe.as_slice());
        probe[j] = x[j] - h;
        let backward = problem.objective(probe.as_slice());
        probe[j] = x[j];
        (forward - backward) / (2.0 * h)
    })
}

/// Central-difference Jacobian of the residuals, `m × n`.
pub(crate) fn jacobian(
    problem: &mut dyn Problem,
    x: &DVector<f64>,
    m: usize,
    step: f64,
) -> DMatrix<f64> {
    let n = x.len();
    let mut jac = DMatrix::zeros(m, n);
    let mut probe = x.clone();
    for j in 0..n {
        let h = relative_step(step, x[j]);
        probe[j] = x[j] + h;
        let forward = problem.constraints(probe.as_slice());
        probe[j] = x[j] - h;
        let backward = problem.constraints(probe.as_slice());
        probe[j] = x[j];
        for i in 0..m.min(forward.len()).min(backward.len()) {
            jac[(i, j)] = (forward[i] - backward[i]) / (2.0 * h);
        }
    }
    jac
}

fn lagrangian(problem: &mut dyn Problem, x: &DVector<f64>, lambda: &DVector<f64>) -> f64 {
    let f = problem.objective(x.as_slice());
    let c = problem.constraints(x.as_slice());
    f + c.iter().zip(lambda.iter()).map(|(ci, li)| ci * li).sum::<f64>()
}

/// Second-difference Hessian of `f + λᵀc`.
///
/// Uses a coarser step than the first derivatives so that rounding in the
/// four-point stencil stays small.
pub(crate) fn lagrangian_hessian(
    problem: &mut dyn Problem,
    x: &DVector<f64>,
    lambda: &DVector<f64>,
    step: f64,
) -> DMatrix<f64> {
    let n = x.len();
    let step = step * 100.0;
    let mut hessian = DMatrix::zeros(n, n);
    let mut probe = x.clone();

    for i in 0..n {
        let hi = relative_step(step, x[i]);
        for j in i..n {
            let hj = relative_step(step, x[j]);
            let mut corner = |si: f64, sj: f64| {
                probe[i] += si * hi;
                probe[j] += sj * hj;
                let value = lagrangian(problem, &probe, lambda);
                probe[i] = x[i];
                probe[j] = x[j];
                value
            };
            let value = (corner(1.0, 1.0) - corner(1.0, -1.0) - corner(-1.0, 1.0)
                + corner(-1.0, -1.0))
                / (4.0 * hi * hj);
            hessian[(i, j)] = value;
            hessian[(j, i)] = value;
        }
    }
    hessian
}

/// Sufficient-decrease constant shared by the line searches.
pub(crate) const ARMIJO: f64 = 1e-4;
/// Smallest step fraction a backtracking search tries.
pub(crate) const MIN_STEP: f64 = 1e-10;

/// Absolute tolerance scaled to the magnitude of `x`, matching the relative
/// finite-difference steps.
pub(crate) fn scaled_tolerance(tolerance: f64, x: &DVector<f64>) -> f64 {
    tolerance * (1.0 + max_abs(x))
}

/// A point with its objective and residuals.
pub(crate) struct Iterate {
    pub x: DVector<f64>,
    pub f: f64,
    pub c: DVector<f64>,
}

/// Gauss–Newton step on `½‖c‖²`, backtracking until `‖c‖₁` decreases.
pub(crate) fn restore_feasibility(
    problem: &mut dyn Problem,
    x: &DVector<f64>,
    c: &DVector<f64>,
    a: &DMatrix<f64>,
) -> Option<Iterate> {
    let p = least_squares(a.clone(), &(-c))?;
    let theta = l1(c);
    let mut alpha = 1.0;
    while alpha >= MIN_STEP {
        let trial = x + &p * alpha;
        let (f, trial_c) = evaluate(problem, &trial);
        if f.is_finite() && l1(&trial_c) < (1.0 - ARMIJO * alpha) * theta {
            return Some(Iterate { x: trial, f, c: trial_c });
        }
        alpha *= 0.5;
    }
    None
}

/// Replace the range-space part of `p` with the minimum-norm Newton step
/// `A⁺(−c)`, keeping its null-space part.
///
/// The feasibility correction then depends on `A` alone, not on how well the
/// Hessian block of the KKT system is scaled.
pub(crate) fn with_range_step(
    a: &DMatrix<f64>,
    c: &DVector<f64>,
    p: DVector<f64>,
) -> Option<DVector<f64>> {
    if a.nrows() == 0 {
        return Some(p);
    }
    let newton = least_squares(a.clone(), &(-c))?;
    let range = least_squares(a.clone(), &(a * &p))?;
    let step = newton + p - range;
    step.iter().all(|v| v.is_finite()).then_some(step)
}

/// Minimum-norm least-squares solution of `a · x = b` by SVD.
pub(crate) fn least_squares(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if a.nrows() == 0 || a.ncols() == 0 {
        return Some(DVector::zeros(a.ncols()));
    }
    let svd = a.svd(true, true);
    let eps = 1e-12 * svd.singular_values.max().max(f64::MIN_POSITIVE);
    svd.solve(b, eps).ok()
}

/// Solve the equality KKT system
///
/// ```text
/// [ H  Aᵀ ] [ p ]   [ -g ]
/// [ A  0  ] [ λ ] = [ -c ]
/// ```
///
/// in the least-squares sense, so redundant rows of `A` are tolerated.
/// Returns the step `p` and the new multipliers `λ`.
pub(crate) fn solve_kkt(
    h: &DMatrix<f64>,
    a: &DMatrix<f64>,
    g: &DVector<f64>,
    c: &DVector<f64>,
) -> Option<(DVector<f64>, DVector<f64>)> {
    let n = h.nrows();
    let m = a.nrows();

    let mut kkt = DMatrix::zeros(n + m, n + m);
    kkt.view_mut((0, 0), (n, n)).copy_from(h);
    if m > 0 {
        kkt.view_mut((0, n), (n, m)).copy_from(&a.transpose());
        kkt.view_mut((n, 0), (m, n)).copy_from(a);
    }

    let mut rhs = DVector::zeros(n + m);
    rhs.rows_mut(0, n).copy_from(&(-g));
    if m > 0 {
        rhs.rows_mut(n, m).copy_from(&(-c));
    }

    let solution = least_squares(kkt, &rhs)?;
    if solution.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some((
        solution.rows(0, n).into_owned(),
        solution.rows(n, m).into_owned(),
    ))
}

pub(crate) fn max_abs(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

pub(crate) fn l1(v: &DVector<f64>) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

/// Keeps the best point seen during a run: feasible beats infeasible, then
/// lower objective, then lower violation.
#[derive(Debug, Clone)]
pub(crate) struct BestIterate {
    pub x: DVector<f64>,
    pub objective: f64,
    pub violation: f64,
    tolerance: f64,
}

impl BestIterate {
    pub fn new(x: DVector<f64>, objective: f64, violation: f64, tolerance: f64) -> Self {
        Self {
            x,
            objective,
            violation,
            tolerance,
        }
    }

    pub fn offer(&mut self, x: &DVector<f64>, objective: f64, violation: f64) {
        let feasible = violation <= self.tolerance;
        let best_feasible = self.violation <= self.tolerance;
        let better = match (feasible, best_feasible) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => {
                objective < self.objective
                    || (objective == self.objective && violation < self.violation)
            }
            (false, false) => violation < self.violation,
        };
        if better {
            self.x.copy_from(x);
            self.objective = objective;
            self.violation = violation;
        }
    }

    pub fn into_minimization(self, converged: bool, iterations: usize) -> Minimization {
        Minimization {
            x: self.x.as_slice().to_vec(),
            converged,
            iterations,
            objective: self.objective,
            max_residual: self.violation,
        }
    }
}
