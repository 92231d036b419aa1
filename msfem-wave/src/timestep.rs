//! Explicit three-level leapfrog integration of the coarse system.
//!
//! Per step, with `y = 2 u1 - u2`:
//!
//! ```text
//! M u0 = M y - dt^2 (S u1 - s(t) b)
//! ```
//!
//! solved by diagonally preconditioned CG, warm-started from the previous
//! solution. A solve that hits the iteration cap is accepted and counted,
//! not escalated: the mass solve is SPD and the best iterate is still a
//! usable state for an explicit scheme.

use ndarray::Array1;
use solvers::{cg_preconditioned_with_guess, CgConfig, DiagonalPreconditioner};

use crate::msoperator::CoarseOperators;

pub const SOLVER_MAX_ITERATIONS: usize = 200;
pub const SOLVER_TOLERANCE: f64 = 1e-12;

/// Number of leapfrog steps covering `[0, t_end]`, rounded to nearest.
pub fn num_time_steps(t_end: f64, dt: f64) -> usize {
    (t_end / dt + 0.5) as usize
}

/// Three rotating time levels of the coarse pressure field.
#[derive(Debug, Clone)]
pub struct PressureState {
    /// Level being solved this step.
    pub u0: Array1<f64>,
    /// Previous step.
    pub u1: Array1<f64>,
    /// Two steps back.
    pub u2: Array1<f64>,
}

impl PressureState {
    pub fn zero(n: usize) -> Self {
        PressureState {
            u0: Array1::zeros(n),
            u1: Array1::zeros(n),
            u2: Array1::zeros(n),
        }
    }

    /// Shift the levels after a step. `u0` keeps the freshly solved value,
    /// which the next solve uses as its initial guess.
    pub fn rotate(&mut self) {
        self.u2.assign(&self.u1);
        self.u1.assign(&self.u0);
    }
}

/// Leapfrog stepper over a fixed set of coarse operators.
pub struct TimeStepper<'a> {
    coarse: &'a CoarseOperators,
    precond: DiagonalPreconditioner<f64>,
    dt2: f64,
    solver: CgConfig<f64>,
    /// Solves that hit the iteration cap so far.
    pub non_converged: usize,
}

impl<'a> TimeStepper<'a> {
    pub fn new(coarse: &'a CoarseOperators, dt: f64) -> Self {
        TimeStepper {
            precond: DiagonalPreconditioner::from_csr(&coarse.mass),
            dt2: dt * dt,
            solver: CgConfig {
                max_iterations: SOLVER_MAX_ITERATIONS,
                tolerance: SOLVER_TOLERANCE,
                print_interval: 0,
            },
            non_converged: 0,
            coarse,
        }
    }

    /// Advance one step: solve for `u0` from `u1`, `u2` and the wavelet
    /// value of this step. Returns the CG iteration count.
    pub fn advance(&mut self, state: &mut PressureState, source_value: f64) -> usize {
        let y = &state.u1 * 2.0 - &state.u2;
        let mass_y = self.coarse.mass.matvec(&y);
        let stiff_u1 = self.coarse.stiffness.matvec(&state.u1);
        let forcing = &self.coarse.rhs * source_value;
        let rhs = mass_y - (stiff_u1 - forcing) * self.dt2;

        let solution = cg_preconditioned_with_guess(
            &self.coarse.mass,
            &self.precond,
            &rhs,
            Some(&state.u0),
            &self.solver,
        );
        if !solution.converged {
            self.non_converged += 1;
            log::warn!(
                "mass solve stopped at relative residual {:.3e} after {} iterations",
                solution.residual,
                solution.iterations
            );
        }
        state.u0 = solution.x;
        solution.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use solvers::CsrMatrix;

    fn identity_system(n: usize) -> CoarseOperators {
        CoarseOperators {
            mass: CsrMatrix::identity(n),
            stiffness: CsrMatrix::identity(n),
            rhs: Array1::ones(n),
        }
    }

    #[test]
    fn test_num_time_steps_rounds_to_nearest() {
        assert_eq!(num_time_steps(1.0, 1e-3), 1000);
        assert_eq!(num_time_steps(0.01, 1e-4), 100);
        assert_eq!(num_time_steps(1.04e-2, 1e-3), 10);
        assert_eq!(num_time_steps(1.05e-2, 1e-3), 11);
    }

    #[test]
    fn test_zero_source_keeps_state_zero() {
        let coarse = identity_system(4);
        let mut stepper = TimeStepper::new(&coarse, 1e-3);
        let mut state = PressureState::zero(4);

        for _ in 0..10 {
            stepper.advance(&mut state, 0.0);
            assert!(state.u0.iter().all(|&v| v == 0.0));
            state.rotate();
        }
        assert_eq!(stepper.non_converged, 0);
    }

    #[test]
    fn test_single_kick_matches_closed_form() {
        let dt = 1e-2;
        let coarse = identity_system(3);
        let mut stepper = TimeStepper::new(&coarse, dt);
        let mut state = PressureState::zero(3);

        // With M = S = I and b = 1: u0 = dt^2 * s.
        stepper.advance(&mut state, 1.0);
        for &v in state.u0.iter() {
            assert_relative_eq!(v, dt * dt, epsilon = 1e-14);
        }
        state.rotate();

        // Next step, source off: u0 = 2 u1 - u2 - dt^2 u1.
        stepper.advance(&mut state, 0.0);
        let expected = 2.0 * dt * dt - dt.powi(4);
        for &v in state.u0.iter() {
            assert_relative_eq!(v, expected, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_rotate_shifts_levels() {
        let mut state = PressureState::zero(2);
        state.u0 = Array1::from_vec(vec![3.0, 4.0]);
        state.u1 = Array1::from_vec(vec![1.0, 2.0]);

        state.rotate();
        assert_eq!(state.u2.to_vec(), vec![1.0, 2.0]);
        assert_eq!(state.u1.to_vec(), vec![3.0, 4.0]);
        // u0 keeps its value as the next warm start.
        assert_eq!(state.u0.to_vec(), vec![3.0, 4.0]);
    }
}
