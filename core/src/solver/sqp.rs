//! Equality-constrained SQP with a damped BFGS Hessian and an ℓ1 merit line search.

use super::numeric::{
    evaluate, gradient, jacobian, l1, max_abs, restore_feasibility, scaled_tolerance, solve_kkt,
    with_range_step, BestIterate, Iterate, Minimization, NonlinearSolver, Problem, ARMIJO,
    MIN_STEP,
};
use crate::config::SolverConfig;
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct Sqp {
    max_iterations: usize,
    constraint_tolerance: f64,
    optimality_tolerance: f64,
    step: f64,
}

impl Sqp {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            constraint_tolerance: config.constraint_tolerance,
            optimality_tolerance: config.optimality_tolerance,
            step: config.finite_difference_step,
        }
    }
}

/// Powell-damped BFGS update keeping `b` positive definite.
fn damped_bfgs(b: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) {
    let bs = &*b * s;
    let sbs = s.dot(&bs);
    if sbs <= f64::EPSILON {
        return;
    }
    let sy = s.dot(y);
    let theta = if sy >= 0.2 * sbs {
        1.0
    } else {
        0.8 * sbs / (sbs - sy)
    };
    let r = y * theta + &bs * (1.0 - theta);
    let sr = s.dot(&r);
    if sr <= f64::EPSILON {
        return;
    }
    *b += &r * r.transpose() / sr - &bs * bs.transpose() / sbs;
}

impl NonlinearSolver for Sqp {
    fn name(&self) -> &'static str {
        "sqp"
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
        let mut hessian = DMatrix::<f64>::identity(n, n);
        let mut penalty: f64 = 1.0;

        for iteration in 0..self.max_iterations {
            let Some((p, lambda)) = solve_kkt(&hessian, &a, &g, &c) else {
                tracing::trace!(iteration, "sqp: singular KKT system");
                return best.into_minimization(false, iteration);
            };
            let Some(p) = with_range_step(&a, &c, p) else {
                tracing::trace!(iteration, "sqp: singular constraint Jacobian");
                return best.into_minimization(false, iteration);
            };

            let stationarity = max_abs(&(&g + a.transpose() * &lambda));
            let violation = max_abs(&c);
            tracing::trace!(iteration, violation, stationarity, f, "sqp iterate");

            if violation <= scaled_tolerance(self.constraint_tolerance, &x)
                && (stationarity <= scaled_tolerance(self.optimality_tolerance, &x)
                    || max_abs(&p) <= 1e-12 * (1.0 + max_abs(&x)))
            {
                best.offer(&x, f, violation);
                return best.into_minimization(true, iteration);
            }

            penalty = penalty.max(max_abs(&lambda) * 1.1 + 1e-3);
            let merit = f + penalty * l1(&c);
            let slope = g.dot(&p) - penalty * l1(&c);

            let mut alpha = 1.0;
            let accepted = loop {
                let trial = &x + &p * alpha;
                let (trial_f, trial_c) = evaluate(problem, &trial);
                let trial_merit = trial_f + penalty * l1(&trial_c);
                if trial_merit.is_finite() && trial_merit <= merit + ARMIJO * alpha * slope.min(0.0)
                {
                    break Some(Iterate { x: trial, f: trial_f, c: trial_c });
                }
                alpha *= 0.5;
                if alpha < MIN_STEP {
                    break None;
                }
            };

            let next = match accepted {
                Some(next) => {
                    let g_new = gradient(problem, &next.x, self.step);
                    let a_new = jacobian(problem, &next.x, m, self.step);
                    let s = &next.x - &x;
                    let y = (&g_new + a_new.transpose() * &lambda) - (&g + a.transpose() * &lambda);
                    damped_bfgs(&mut hessian, &s, &y);
                    g = g_new;
                    a = a_new;
                    next
                }
                None => {
                    tracing::trace!(iteration, "sqp: line search failed, restoring feasibility");
                    let Some(next) = restore_feasibility(problem, &x, &c, &a) else {
                        return best.into_minimization(false, iteration + 1);
                    };
                    // The curvature pairs no longer describe the path taken.
                    hessian = DMatrix::identity(n, n);
                    g = gradient(problem, &next.x, self.step);
                    a = jacobian(problem, &next.x, m, self.step);
                    next
                }
            };

            x = next.x;
            f = next.f;
            c = next.c;
            best.offer(&x, f, max_abs(&c));
        }

        best.into_minimization(false, self.max_iterations)
    }
}
