//! Voltage-dependent opening (alpha) and closing (beta) rates of the
//! Hodgkin–Huxley gates, in 1/ms, with voltages in mV relative to rest.

use crate::traits::Scalar;
use serde::{Deserialize, Serialize};

/// Denominators smaller than this are treated as the removable singularity.
const SINGULARITY_TOLERANCE: f64 = 1e-7;

/// Evaluates `scale * x / (exp(x / 10) - 1)`, whose limit at `x = 0` is
/// `10 * scale`.
fn exp_ratio<T: Scalar>(scale: f64, x: T) -> T {
    let denominator = (x / T::constant(10.0)).exp() - T::one();
    if denominator.abs() < T::constant(SINGULARITY_TOLERANCE) {
        return T::constant(10.0 * scale);
    }
    T::constant(scale) * x / denominator
}

/// Sodium activation opening rate. Equals 1.0 at v = 25.
pub fn alpha_m<T: Scalar>(v: T) -> T {
    exp_ratio(0.1, T::constant(25.0) - v)
}

pub fn beta_m<T: Scalar>(v: T) -> T {
    T::constant(4.0) * (-v / T::constant(18.0)).exp()
}

/// Potassium activation opening rate. Equals 0.1 at v = 10.
pub fn alpha_n<T: Scalar>(v: T) -> T {
    exp_ratio(0.01, T::constant(10.0) - v)
}

pub fn beta_n<T: Scalar>(v: T) -> T {
    T::constant(0.125) * (-v / T::constant(80.0)).exp()
}

pub fn alpha_h<T: Scalar>(v: T) -> T {
    T::constant(0.07) * (-v / T::constant(20.0)).exp()
}

pub fn beta_h<T: Scalar>(v: T) -> T {
    T::one() / (((T::constant(30.0) - v) / T::constant(10.0)).exp() + T::one())
}

/// One of the three gating variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gate {
    /// Sodium activation.
    M,
    /// Potassium activation.
    N,
    /// Sodium inactivation.
    H,
}

impl Gate {
    pub const ALL: [Gate; 3] = [Gate::M, Gate::N, Gate::H];

    pub fn name(self) -> &'static str {
        match self {
            Gate::M => "m",
            Gate::N => "n",
            Gate::H => "h",
        }
    }

    pub fn alpha<T: Scalar>(self, v: T) -> T {
        match self {
            Gate::M => alpha_m(v),
            Gate::N => alpha_n(v),
            Gate::H => alpha_h(v),
        }
    }

    pub fn beta<T: Scalar>(self, v: T) -> T {
        match self {
            Gate::M => beta_m(v),
            Gate::N => beta_n(v),
            Gate::H => beta_h(v),
        }
    }

    /// Value the gate relaxes to when the voltage is held at `v`.
    pub fn steady_state<T: Scalar>(self, v: T) -> T {
        let a = self.alpha(v);
        a / (a + self.beta(v))
    }

    /// Relaxation time constant (ms) at a held voltage `v`.
    pub fn time_constant<T: Scalar>(self, v: T) -> T {
        T::one() / (self.alpha(v) + self.beta(v))
    }
}
