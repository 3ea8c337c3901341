//! Primal-dual Newton method for equality-constrained problems.
//!
//! This is the equality-only specialization of a filter interior-point NLP
//! method: with no inequalities there is no barrier term, so each iteration is
//! a Newton step on the KKT conditions with
//!
//! * a finite-difference Hessian of the Lagrangian,
//! * inertia correction (diagonal shift until Cholesky succeeds),
//! * a filter line search over `(‖c‖₁, f)`,
//! * a Gauss–Newton feasibility restoration when the filter blocks every step.

use super::numeric::{
    evaluate, gradient, jacobian, l1, lagrangian_hessian, least_squares, max_abs,
    restore_feasibility, scaled_tolerance, solve_kkt, with_range_step, BestIterate, Iterate,
    Minimization, NonlinearSolver, Problem, ARMIJO, MIN_STEP,
};
use crate::config::SolverConfig;
use nalgebra::{Cholesky, DMatrix, DVector};

const GAMMA_THETA: f64 = 1e-5;
const GAMMA_PHI: f64 = 1e-5;

const FIRST_SHIFT: f64 = 1e-4;
const MIN_SHIFT: f64 = 1e-20;
const MAX_SHIFT: f64 = 1e20;
const SHIFT_GROWTH: f64 = 8.0;

#[derive(Debug, Clone)]
pub struct InteriorPoint {
    max_iterations: usize,
    constraint_tolerance: f64,
    optimality_tolerance: f64,
    step: f64,
}

impl InteriorPoint {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            constraint_tolerance: config.constraint_tolerance,
            optimality_tolerance: config.optimality_tolerance,
            step: config.finite_difference_step,
        }
    }
}

/// Pairs `(θ, φ)` that later iterates must improve upon.
#[derive(Debug, Default)]
struct Filter {
    entries: Vec<(f64, f64)>,
}

impl Filter {
    fn acceptable(&self, theta: f64, phi: f64) -> bool {
        self.entries
            .iter()
            .all(|&(t, p)| theta <= (1.0 - GAMMA_THETA) * t || phi <= p - GAMMA_PHI * t)
    }

    fn add(&mut self, theta: f64, phi: f64) {
        let theta = (1.0 - GAMMA_THETA) * theta;
        let phi = phi - GAMMA_PHI * theta;
        // Drop entries the new one dominates.
        self.entries.retain(|&(t, p)| t < theta || p < phi);
        self.entries.push((theta, phi));
    }
}

/// Shift `h` by `δ·I` until it is positive definite. `last` is the shift
/// that worked on the previous iteration.
fn inertia_correction(h: &DMatrix<f64>, last: f64) -> Option<(DMatrix<f64>, f64)> {
    if Cholesky::new(h.clone()).is_some() {
        return Some((h.clone(), 0.0));
    }

    let n = h.nrows();
    let mut delta = if last == 0.0 {
        FIRST_SHIFT
    } else {
        (last / 3.0).max(MIN_SHIFT)
    };
    while delta <= MAX_SHIFT {
        let shifted = h + DMatrix::<f64>::identity(n, n) * delta;
        if Cholesky::new(shifted.clone()).is_some() {
            return Some((shifted, delta));
        }
        delta *= SHIFT_GROWTH;
    }
    None
}

/// Multipliers minimizing `‖g + Aᵀλ‖`.
fn least_squares_multipliers(a: &DMatrix<f64>, g: &DVector<f64>) -> DVector<f64> {
    least_squares(a.transpose(), &(-g)).unwrap_or_else(|| DVector::zeros(a.nrows()))
}

impl NonlinearSolver for InteriorPoint {
    fn name(&self) -> &'static str {
        "interior_point"
    }

    fn minimize(&self, problem: &mut dyn Problem, initial_guess: &[f64]) -> Minimization {
        let n = initial_guess.len();
        let mut x = DVector::from_column_slice(initial_guess);
        let (mut f, mut c) = evaluate(problem, &x);
        let m = c.len();

        let feasibility = scaled_tolerance(self.constraint_tolerance, &x);
        let mut best = BestIterate::new(x.clone(), f, max_abs(&c), feasibility);
        if n == 0 {
            let converged = best.violation <= feasibility;
            return best.into_minimization(converged, 0);
        }

        let mut g = gradient(problem, &x, self.step);
        let mut a = jacobian(problem, &x, m, self.step);
        let mut lambda = least_squares_multipliers(&a, &g);

        let theta_start = l1(&c).max(1.0);
        let theta_min = 1e-4 * theta_start;
        let mut filter = Filter::default();
        filter.add(1e4 * theta_start, f64::NEG_INFINITY);
        let mut last_shift = 0.0;

        for iteration in 0..self.max_iterations {
            let violation = max_abs(&c);
            let stationarity = max_abs(&(&g + a.transpose() * &lambda));
            tracing::trace!(iteration, violation, stationarity, f, "interior point iterate");

            let feasible = violation <= scaled_tolerance(self.constraint_tolerance, &x);
            if feasible && stationarity <= scaled_tolerance(self.optimality_tolerance, &x) {
                best.offer(&x, f, violation);
                return best.into_minimization(true, iteration);
            }

            let hessian = lagrangian_hessian(problem, &x, &lambda, self.step);
            let Some((hessian, shift)) = inertia_correction(&hessian, last_shift) else {
                tracing::trace!(iteration, "interior point: inertia correction failed");
                return best.into_minimization(false, iteration);
            };
            last_shift = shift;

            let Some((p, lambda_plus)) = solve_kkt(&hessian, &a, &g, &c) else {
                tracing::trace!(iteration, "interior point: singular KKT system");
                return best.into_minimization(false, iteration);
            };
            let Some(p) = with_range_step(&a, &c, p) else {
                tracing::trace!(iteration, "interior point: singular constraint Jacobian");
                return best.into_minimization(false, iteration);
            };

            if feasible && max_abs(&p) <= 1e-12 * (1.0 + max_abs(&x)) {
                best.offer(&x, f, violation);
                return best.into_minimization(true, iteration);
            }

            let theta = l1(&c);
            let slope = g.dot(&p);
            let f_type = slope < 0.0 && theta <= theta_min;

            let mut alpha = 1.0;
            let accepted = loop {
                let trial = &x + &p * alpha;
                let (trial_f, trial_c) = evaluate(problem, &trial);
                let trial_theta = l1(&trial_c);

                if trial_f.is_finite() && filter.acceptable(trial_theta, trial_f) {
                    let sufficient = if f_type {
                        trial_f <= f + ARMIJO * alpha * slope
                    } else {
                        trial_theta <= (1.0 - GAMMA_THETA) * theta
                            || trial_f <= f - GAMMA_PHI * theta
                    };
                    if sufficient {
                        break Some(Iterate { x: trial, f: trial_f, c: trial_c });
                    }
                }

                alpha *= 0.5;
                if alpha < MIN_STEP {
                    break None;
                }
            };

            let restored = accepted.is_none();
            let next = match accepted {
                Some(next) => {
                    if !f_type {
                        filter.add(theta, f);
                    }
                    let update = (lambda_plus - &lambda) * alpha;
                    lambda += update;
                    next
                }
                None => {
                    tracing::trace!(iteration, "interior point: feasibility restoration");
                    filter.add(theta, f);
                    let Some(next) = restore_feasibility(problem, &x, &c, &a) else {
                        return best.into_minimization(false, iteration + 1);
                    };
                    next
                }
            };

            x = next.x;
            f = next.f;
            c = next.c;
            g = gradient(problem, &x, self.step);
            a = jacobian(problem, &x, m, self.step);
            if restored {
                lambda = least_squares_multipliers(&a, &g);
            }
            best.offer(&x, f, max_abs(&c));
        }

        best.into_minimization(false, self.max_iterations)
    }
}
