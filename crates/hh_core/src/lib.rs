//! The `hh_core` crate simulates a single-compartment Hodgkin–Huxley membrane.
//! Rates, right-hand sides and the RK4 gate stepper are generic over the
//! `Scalar` numeric abstraction; the simulator itself runs in `f64`.
//!
//! Key components:
//! - **Rates**: the six voltage-dependent gate rates, singularity-safe, and the `Gate` selector.
//! - **Model**: membrane constants and state, dV/dt and dx/dt, and the full flow as a `DynamicalSystem`.
//! - **Solvers**: RK4 step for one gating variable under held voltage, forward Euler for the voltage.
//! - **Simulation**: `SimulationConfig`, the step loop (`Simulator`) and the resulting `TimeSeries`.
//! - **Analysis / Equilibrium**: spike detection and the Newton resting-state solve.

pub mod analysis;
pub mod equilibrium;
pub mod model;
pub mod rates;
pub mod simulation;
pub mod solvers;
pub mod traits;

pub use model::{MembraneState, SimulationConstants};
pub use simulation::{
    simulate, ConfigError, SimulationConfig, Simulator, TimeSeries, TimeSeriesSample,
};
