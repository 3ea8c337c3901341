use crate::config::{SolverBackend, SolverConfig};
use crate::solver::numeric::{backend_for, NonlinearSolver, Problem};

/// Small analytic problem: `objective` and `constraints` are plain functions.
struct Analytic {
    objective: fn(&[f64]) -> f64,
    constraints: fn(&[f64]) -> Vec<f64>,
}

impl Problem for Analytic {
    fn objective(&mut self, x: &[f64]) -> f64 {
        (self.objective)(x)
    }

    fn constraints(&mut self, x: &[f64]) -> Vec<f64> {
        (self.constraints)(x)
    }
}

fn backends() -> Vec<Box<dyn NonlinearSolver>> {
    [SolverBackend::Sqp, SolverBackend::InteriorPoint]
        .into_iter()
        .map(|backend| backend_for(&SolverConfig::default().with_backend(backend)))
        .collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn test_unconstrained_quadratic() {
    for backend in backends() {
        let mut problem = Analytic {
            objective: |x| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2),
            constraints: |_| Vec::new(),
        };
        let result = backend.minimize(&mut problem, &[0.0, 0.0]);
        assert!(result.converged, "{} should converge", backend.name());
        assert!(close(result.x[0], 3.0) && close(result.x[1], -1.0), "{}: {:?}", backend.name(), result.x);
    }
}

#[test]
fn test_linear_equality() {
    for backend in backends() {
        let mut problem = Analytic {
            objective: |x| x[0] * x[0] + x[1] * x[1],
            constraints: |x| vec![x[0] + x[1] - 2.0],
        };
        let result = backend.minimize(&mut problem, &[0.0, 0.0]);
        assert!(result.converged, "{} should converge", backend.name());
        assert!(close(result.x[0], 1.0) && close(result.x[1], 1.0), "{}: {:?}", backend.name(), result.x);
        assert!(result.max_residual < 1e-8);
    }
}

#[test]
fn test_redundant_constraints_are_tolerated() {
    for backend in backends() {
        // The second row is a multiple of the first.
        let mut problem = Analytic {
            objective: |x| (x[0] - 3.0).powi(2) + x[1] * x[1],
            constraints: |x| vec![x[0] + x[1] - 2.0, 2.0 * x[0] + 2.0 * x[1] - 4.0],
        };
        let result = backend.minimize(&mut problem, &[0.0, 0.0]);
        assert!(result.converged, "{} should converge", backend.name());
        assert!(close(result.x[0], 2.5) && close(result.x[1], -0.5), "{}: {:?}", backend.name(), result.x);
    }
}

#[test]
fn test_feasibility_only_takes_small_correction() {
    for backend in backends() {
        // Point on the circle of radius 5 closest to the start.
        let mut problem = Analytic {
            objective: |_| 0.0,
            constraints: |x| vec![x[0] * x[0] + x[1] * x[1] - 25.0],
        };
        let result = backend.minimize(&mut problem, &[3.0, 4.1]);
        assert!(result.converged, "{} should converge", backend.name());
        let radius = (result.x[0].powi(2) + result.x[1].powi(2)).sqrt();
        assert!(close(radius, 5.0));
        assert!((result.x[0] - 3.0).abs() < 0.1 && (result.x[1] - 4.1).abs() < 0.2);
    }
}

#[test]
fn test_already_solved_start_is_kept() {
    for backend in backends() {
        let mut problem = Analytic {
            objective: |_| 0.0,
            constraints: |x| vec![x[0] - x[1]],
        };
        let result = backend.minimize(&mut problem, &[7.0, 7.0]);
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.x, vec![7.0, 7.0]);
    }
}

#[test]
fn test_inconsistent_constraints_return_best_iterate() {
    for backend in backends() {
        let mut problem = Analytic {
            objective: |_| 0.0,
            constraints: |x| vec![x[0] - 1.0, x[0] - 2.0],
        };
        let result = backend.minimize(&mut problem, &[0.0]);
        assert!(!result.converged, "{} cannot satisfy x = 1 and x = 2", backend.name());
        assert!(result.x[0].is_finite());
        assert!(result.max_residual < 2.0);
    }
}
