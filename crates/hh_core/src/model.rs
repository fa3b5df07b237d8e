//! Membrane parameters, state, and the right-hand sides of the
//! Hodgkin–Huxley equations.

use crate::rates::{alpha_h, alpha_m, alpha_n, beta_h, beta_m, beta_n};
use crate::traits::{DynamicalSystem, Scalar};
use serde::{Deserialize, Serialize};

/// Conductances (mS/cm²), reversal potentials (mV) and injected current
/// (µA/cm²). Fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Scalar + Deserialize<'de>"))]
pub struct SimulationConstants<T = f64> {
    pub g_na: T,
    pub g_k: T,
    pub g_l: T,
    pub e_na: T,
    pub e_k: T,
    pub e_l: T,
    pub injected_current: T,
}

impl<T: Scalar> Default for SimulationConstants<T> {
    fn default() -> Self {
        Self {
            g_na: T::constant(120.0),
            g_k: T::constant(36.0),
            g_l: T::constant(0.3),
            e_na: T::constant(115.0),
            e_k: T::constant(-12.0),
            e_l: T::constant(10.613),
            injected_current: T::constant(10.0),
        }
    }
}

impl<T: Scalar> SimulationConstants<T> {
    pub fn is_finite(&self) -> bool {
        [
            self.g_na,
            self.g_k,
            self.g_l,
            self.e_na,
            self.e_k,
            self.e_l,
            self.injected_current,
        ]
        .iter()
        .all(|value| value.is_finite())
    }
}

/// Membrane potential (mV) and the three gating variables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Scalar + Deserialize<'de>"))]
pub struct MembraneState<T = f64> {
    pub v: T,
    pub m: T,
    pub n: T,
    pub h: T,
}

impl<T: Scalar> Default for MembraneState<T> {
    fn default() -> Self {
        Self {
            v: T::zero(),
            m: T::constant(0.05),
            n: T::constant(0.32),
            h: T::constant(0.59),
        }
    }
}

impl<T: Scalar> MembraneState<T> {
    pub fn is_finite(&self) -> bool {
        self.v.is_finite() && self.m.is_finite() && self.n.is_finite() && self.h.is_finite()
    }

    /// Whether every gating variable lies in [0, 1].
    pub fn gates_in_unit_interval(&self) -> bool {
        let unit = |x: T| x >= T::zero() && x <= T::one();
        unit(self.m) && unit(self.n) && unit(self.h)
    }

    /// Copy of the state with each gating variable clamped to [0, 1].
    pub fn with_clamped_gates(&self) -> Self {
        let unit = |x: T| x.max(T::zero()).min(T::one());
        Self {
            v: self.v,
            m: unit(self.m),
            n: unit(self.n),
            h: unit(self.h),
        }
    }

    pub fn to_array(&self) -> [T; 4] {
        [self.v, self.m, self.n, self.h]
    }

    pub fn from_slice(x: &[T]) -> Self {
        Self {
            v: x[0],
            m: x[1],
            n: x[2],
            h: x[3],
        }
    }
}

/// Ionic current components (µA/cm²), positive outward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IonicCurrents<T = f64> {
    pub sodium: T,
    pub potassium: T,
    pub leak: T,
}

impl<T: Scalar> IonicCurrents<T> {
    pub fn total(&self) -> T {
        self.sodium + self.potassium + self.leak
    }
}

pub fn ionic_currents<T: Scalar>(
    state: &MembraneState<T>,
    constants: &SimulationConstants<T>,
) -> IonicCurrents<T> {
    let MembraneState { v, m, n, h } = *state;
    IonicCurrents {
        sodium: constants.g_na * m * m * m * h * (v - constants.e_na),
        potassium: constants.g_k * n * n * n * n * (v - constants.e_k),
        leak: constants.g_l * (v - constants.e_l),
    }
}

/// dV/dt: injected current minus the total ionic current.
pub fn membrane_rate<T: Scalar>(
    state: &MembraneState<T>,
    constants: &SimulationConstants<T>,
) -> T {
    constants.injected_current - ionic_currents(state, constants).total()
}

/// dx/dt for any gating variable, given its rates at the current voltage.
pub fn gating_rate<T: Scalar>(alpha: T, beta: T, x: T) -> T {
    alpha * (T::one() - x) - beta * x
}

/// The full four-dimensional Hodgkin–Huxley flow over `[v, m, n, h]`.
/// Gating rates are evaluated at the state's own voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HodgkinHuxley<T = f64> {
    pub constants: SimulationConstants<T>,
}

impl<T: Scalar> HodgkinHuxley<T> {
    pub fn new(constants: SimulationConstants<T>) -> Self {
        Self { constants }
    }
}

impl<T: Scalar> DynamicalSystem<T> for HodgkinHuxley<T> {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let state = MembraneState::from_slice(x);
        let v = state.v;
        out[0] = membrane_rate(&state, &self.constants);
        out[1] = gating_rate(alpha_m(v), beta_m(v), state.m);
        out[2] = gating_rate(alpha_n(v), beta_n(v), state.n);
        out[3] = gating_rate(alpha_h(v), beta_h(v), state.h);
    }
}
