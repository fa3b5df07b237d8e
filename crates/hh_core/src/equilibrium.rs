use crate::model::{HodgkinHuxley, MembraneState, SimulationConstants};
use crate::rates::Gate;
use crate::traits::DynamicalSystem;
use anyhow::{anyhow, bail, Context, Result};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DIM: usize = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestingState {
    pub state: MembraneState,
    pub residual_norm: f64,
    pub iterations: usize,
    /// Row-major Jacobian of the flow over `[v, m, n, h]`.
    pub jacobian: Vec<f64>,
    pub eigenvalues: Vec<Complex<f64>>,
}

impl RestingState {
    /// True when every eigenvalue has a negative real part.
    pub fn is_stable(&self) -> bool {
        self.eigenvalues.iter().all(|lambda| lambda.re < 0.0)
    }
}

/// Gates at their steady-state values for a membrane held at `v`.
pub fn steady_state_at(v: f64) -> MembraneState {
    MembraneState {
        v,
        m: Gate::M.steady_state(v),
        n: Gate::N.steady_state(v),
        h: Gate::H.steady_state(v),
    }
}

/// Finds the equilibrium of the membrane for the given constants by Newton
/// iteration, starting from `initial_voltage` with gates at steady state.
pub fn resting_state(
    constants: &SimulationConstants,
    initial_voltage: f64,
    settings: NewtonSettings,
) -> Result<RestingState> {
    if !initial_voltage.is_finite() {
        bail!("Initial voltage must be finite.");
    }
    if !constants.is_finite() {
        bail!("Membrane constants must be finite.");
    }
    if settings.max_steps == 0 {
        bail!("max_steps must be greater than zero.");
    }
    if settings.damping <= 0.0 {
        bail!("damping must be positive.");
    }
    if settings.tolerance <= 0.0 {
        bail!("tolerance must be positive.");
    }

    let system = HodgkinHuxley::new(*constants);
    let mut state = steady_state_at(initial_voltage).to_array();
    let mut residual = [0.0; DIM];
    system.apply(0.0, &state, &mut residual);
    let mut residual_norm = l2_norm(&residual);
    let mut iterations = 0usize;

    loop {
        if residual_norm <= settings.tolerance {
            break;
        }

        if iterations >= settings.max_steps {
            bail!(
                "Newton solver failed to converge in {} steps (‖f(x)‖ = {}).",
                settings.max_steps,
                residual_norm
            );
        }

        let jacobian = compute_jacobian(&system, &state);
        let delta = solve_linear_system(&jacobian, &residual)
            .context("Failed to solve linear system during Newton iteration.")?;

        for i in 0..DIM {
            state[i] -= settings.damping * delta[i];
        }
        if state.iter().any(|x| !x.is_finite()) {
            bail!("Newton iteration diverged to a non-finite state.");
        }

        iterations += 1;
        system.apply(0.0, &state, &mut residual);
        residual_norm = l2_norm(&residual);
    }

    debug!(
        iterations,
        residual_norm,
        v = state[0],
        "resting state converged"
    );

    let jacobian = compute_jacobian(&system, &state);
    let eigenvalues = DMatrix::from_row_slice(DIM, DIM, &jacobian)
        .complex_eigenvalues()
        .iter()
        .copied()
        .collect();

    Ok(RestingState {
        state: MembraneState::from_slice(&state),
        residual_norm,
        iterations,
        jacobian,
        eigenvalues,
    })
}

/// Central-difference Jacobian, row-major.
fn compute_jacobian(system: &HodgkinHuxley, state: &[f64; DIM]) -> Vec<f64> {
    let mut jacobian = vec![0.0; DIM * DIM];
    let mut forward = [0.0; DIM];
    let mut backward = [0.0; DIM];

    for j in 0..DIM {
        let step = 1e-6 * state[j].abs().max(1.0);
        let mut shifted = *state;
        shifted[j] = state[j] + step;
        system.apply(0.0, &shifted, &mut forward);
        shifted[j] = state[j] - step;
        system.apply(0.0, &shifted, &mut backward);
        for i in 0..DIM {
            jacobian[i * DIM + j] = (forward[i] - backward[i]) / (2.0 * step);
        }
    }

    jacobian
}

fn solve_linear_system(jacobian: &[f64], residual: &[f64]) -> Result<Vec<f64>> {
    let j_matrix = DMatrix::from_row_slice(DIM, DIM, jacobian);
    let rhs = DVector::from_column_slice(residual);
    j_matrix
        .lu()
        .solve(&rhs)
        .map(|v| v.iter().cloned().collect())
        .ok_or_else(|| anyhow!("Jacobian is singular."))
}

fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn constants_with_current(current: f64) -> SimulationConstants {
        SimulationConstants {
            injected_current: current,
            ..SimulationConstants::default()
        }
    }

    #[test]
    fn unstimulated_membrane_rests_near_zero_and_is_stable() {
        let result = resting_state(&constants_with_current(0.0), 0.0, NewtonSettings::default())
            .expect("resting state should converge");

        assert!(result.state.v.abs() < 0.05, "v = {}", result.state.v);
        assert!(result.residual_norm <= 1e-9);
        assert_eq!(result.eigenvalues.len(), 4);
        assert!(result.is_stable());
        for gate in Gate::ALL {
            let expected = gate.steady_state(result.state.v);
            let actual = match gate {
                Gate::M => result.state.m,
                Gate::N => result.state.n,
                Gate::H => result.state.h,
            };
            assert!((actual - expected).abs() < 1e-8);
        }
    }

    #[test]
    fn strong_current_destabilizes_the_equilibrium() {
        let result = resting_state(&constants_with_current(20.0), 0.0, NewtonSettings::default())
            .expect("equilibrium should converge");

        assert!(result.state.v > 5.0 && result.state.v < 12.0);
        assert!(!result.is_stable());
        assert!(result
            .eigenvalues
            .iter()
            .any(|lambda| lambda.re > 0.0 && lambda.im.abs() > 0.1));
    }

    #[test]
    fn jacobian_matches_analytic_gate_entry() {
        let result = resting_state(&constants_with_current(0.0), 0.0, NewtonSettings::default())
            .expect("resting state should converge");
        // d(dm/dt)/dm = -(alpha_m + beta_m) at the resting voltage.
        let v = result.state.v;
        let expected = -(Gate::M.alpha(v) + Gate::M.beta(v));
        assert!((result.jacobian[DIM + 1] - expected).abs() < 1e-6);
    }

    #[test]
    fn resting_state_rejects_invalid_settings() {
        let constants = SimulationConstants::default();
        assert_err_contains(
            resting_state(
                &constants,
                0.0,
                NewtonSettings {
                    max_steps: 0,
                    ..NewtonSettings::default()
                },
            ),
            "max_steps",
        );
        assert_err_contains(
            resting_state(
                &constants,
                0.0,
                NewtonSettings {
                    damping: 0.0,
                    ..NewtonSettings::default()
                },
            ),
            "damping must be positive",
        );
        assert_err_contains(
            resting_state(&constants, f64::NAN, NewtonSettings::default()),
            "Initial voltage",
        );
    }

    #[test]
    fn resting_state_reports_non_convergence() {
        let settings = NewtonSettings {
            max_steps: 1,
            tolerance: 1e-300,
            ..NewtonSettings::default()
        };
        assert_err_contains(
            resting_state(&constants_with_current(20.0), 0.0, settings),
            "failed to converge",
        );
    }

    #[test]
    fn steady_state_at_sets_gates_for_voltage() {
        let state = steady_state_at(10.0);
        assert_eq!(state.v, 10.0);
        assert!((state.n - Gate::N.steady_state(10.0_f64)).abs() < 1e-15);
    }
}
