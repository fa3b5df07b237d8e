use crate::model::gating_rate;
use crate::traits::Scalar;

/// Classic Runge-Kutta 4th order step for a single gating variable.
///
/// The rates are evaluated once at the held voltage `v`; only `x` varies
/// across the four stages. Works for any gate given its `(alpha, beta)` pair.
pub fn rk4_gating_step<T, A, B>(h: T, v: T, x: T, alpha: A, beta: B) -> T
where
    T: Scalar,
    A: Fn(T) -> T,
    B: Fn(T) -> T,
{
    let half = T::constant(0.5);
    let two = T::constant(2.0);
    let sixth = T::constant(1.0 / 6.0);

    let a = alpha(v);
    let b = beta(v);

    // k1 = h*f(x)
    let k1 = h * gating_rate(a, b, x);
    // k2 = h*f(x + k1/2)
    let k2 = h * gating_rate(a, b, x + half * k1);
    // k3 = h*f(x + k2/2)
    let k3 = h * gating_rate(a, b, x + half * k2);
    // k4 = h*f(x + k3)
    let k4 = h * gating_rate(a, b, x + k3);

    x + sixth * (k1 + two * k2 + two * k3 + k4)
}

/// Forward Euler step: x + rate*h.
pub fn forward_euler_step<T: Scalar>(x: T, rate: T, h: T) -> T {
    x + rate * h
}

#[cfg(test)]
mod tests {
    use super::{forward_euler_step, rk4_gating_step};
    use crate::rates::{alpha_n, beta_n, Gate};

    #[test]
    fn rk4_matches_closed_form_for_constant_rates() {
        let h = 0.01_f64;
        let next = rk4_gating_step(h, 0.0, 0.0, |_| 0.5, |_| 0.5);
        let exact = 0.5 * (1.0 - (-h).exp());
        assert!((next - exact).abs() < 1e-8);
    }

    #[test]
    fn rk4_error_shrinks_at_fourth_order_over_a_fixed_window() {
        let (alpha, beta) = (2.0_f64, 3.0);
        let x_inf = alpha / (alpha + beta);
        let exact = x_inf * (1.0 - (-(alpha + beta) * 1.0_f64).exp());

        let integrate = |steps: usize| {
            let h = 1.0 / steps as f64;
            let mut x = 0.0;
            for _ in 0..steps {
                x = rk4_gating_step(h, 0.0, x, |_| alpha, |_| beta);
            }
            (x - exact).abs()
        };

        let coarse = integrate(10);
        let fine = integrate(20);
        // Halving h should cut the global error by about 2^4.
        assert!(coarse / fine > 12.0, "ratio {}", coarse / fine);
    }

    #[test]
    fn rk4_converges_to_steady_state_under_held_voltage() {
        for v in [-20.0_f64, 0.0, 10.0, 25.0, 60.0] {
            for gate in Gate::ALL {
                let mut x = 0.5;
                for _ in 0..200_000 {
                    x = rk4_gating_step(0.01, v, x, |u| gate.alpha(u), |u| gate.beta(u));
                }
                let x_inf = gate.steady_state(v);
                assert!(
                    (x - x_inf).abs() < 1e-4,
                    "{} at {v}: {x} vs {x_inf}",
                    gate.name()
                );
            }
        }
    }

    #[test]
    fn rk4_accepts_plain_rate_functions() {
        let from_fns = rk4_gating_step(0.01_f64, 10.0, 0.32, alpha_n, beta_n);
        let from_gate = rk4_gating_step(
            0.01_f64,
            10.0,
            0.32,
            |u| Gate::N.alpha(u),
            |u| Gate::N.beta(u),
        );
        assert_eq!(from_fns, from_gate);
    }

    #[test]
    fn rk4_is_fixed_point_at_steady_state() {
        let (alpha, beta) = (0.4_f64, 0.1);
        let x_inf = alpha / (alpha + beta);
        let next = rk4_gating_step(0.05, 0.0, x_inf, |_| alpha, |_| beta);
        assert!((next - x_inf).abs() < 1e-15);
    }

    #[test]
    fn forward_euler_advances_linearly() {
        assert!((forward_euler_step(1.0_f64, -2.0, 0.25) - 0.5).abs() < 1e-15);
    }
}
