//! Fixed-step time evolution of the membrane.
//!
//! Each step advances the three gates by RK4 with the voltage held at its
//! previous value, then advances the voltage by one forward-Euler step using
//! the previous voltage and the freshly updated gates.

use crate::model::{membrane_rate, MembraneState, SimulationConstants};
use crate::rates::{alpha_h, alpha_m, alpha_n, beta_h, beta_m, beta_n, Gate};
use crate::solvers::{forward_euler_step, rk4_gating_step};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Which time a post-step sample is labelled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeLabel {
    /// The time the step ends at, so consecutive samples are `dt` apart.
    #[default]
    StepEnd,
    /// The time the step started at. The first step then repeats the
    /// initial sample's time.
    StepStart,
}

/// Longest run a configuration may request. `run` buffers every sample, so
/// larger windows would exhaust memory before they finish.
pub const MAX_STEPS: usize = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub constants: SimulationConstants,
    pub initial: MembraneState,
    pub t_start: f64,
    pub t_end: f64,
    pub dt: f64,
    pub clamp_gates: bool,
    pub time_label: TimeLabel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            constants: SimulationConstants::default(),
            initial: MembraneState::default(),
            t_start: 0.0,
            t_end: 50.0,
            dt: 0.01,
            clamp_gates: false,
            time_label: TimeLabel::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("dt must be positive and finite (got {0})")]
    InvalidStep(f64),
    #[error("t_end ({t_end}) must not precede t_start ({t_start})")]
    ReversedWindow { t_start: f64, t_end: f64 },
    #[error("{0} must be finite")]
    NonFinite(&'static str),
    #[error("window of {span} ms at dt = {dt} needs more than {} steps", MAX_STEPS)]
    TooManySteps { span: f64, dt: f64 },
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.constants.is_finite() {
            return Err(ConfigError::NonFinite("constants"));
        }
        if !self.initial.is_finite() {
            return Err(ConfigError::NonFinite("initial state"));
        }
        if !self.t_start.is_finite() {
            return Err(ConfigError::NonFinite("t_start"));
        }
        if !self.t_end.is_finite() {
            return Err(ConfigError::NonFinite("t_end"));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::InvalidStep(self.dt));
        }
        if self.t_end < self.t_start {
            return Err(ConfigError::ReversedWindow {
                t_start: self.t_start,
                t_end: self.t_end,
            });
        }
        let quotient = (self.t_end - self.t_start) / self.dt;
        if !quotient.is_finite() || self.step_count() > MAX_STEPS {
            return Err(ConfigError::TooManySteps {
                span: self.t_end - self.t_start,
                dt: self.dt,
            });
        }
        Ok(())
    }

    /// Number of integration steps, `floor((t_end - t_start) / dt)`.
    /// Quotients within rounding distance of an integer count as that integer.
    pub fn step_count(&self) -> usize {
        let quotient = (self.t_end - self.t_start) / self.dt;
        if !(quotient.is_finite() && quotient > 0.0) {
            return 0;
        }
        let nearest = quotient.round();
        let steps = if (quotient - nearest).abs() <= 1e-9 * nearest.max(1.0) {
            nearest
        } else {
            quotient.floor()
        };
        steps as usize
    }
}

/// Snapshot of the membrane at time `t` (ms).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSample {
    pub t: f64,
    pub v: f64,
    pub m: f64,
    pub n: f64,
    pub h: f64,
}

impl TimeSeriesSample {
    pub fn new(t: f64, state: MembraneState) -> Self {
        Self {
            t,
            v: state.v,
            m: state.m,
            n: state.n,
            h: state.h,
        }
    }

    pub fn state(&self) -> MembraneState {
        MembraneState {
            v: self.v,
            m: self.m,
            n: self.n,
            h: self.h,
        }
    }

    pub fn gate(&self, gate: Gate) -> f64 {
        match gate {
            Gate::M => self.m,
            Gate::N => self.n,
            Gate::H => self.h,
        }
    }
}

/// Samples in time order, one per step plus the initial state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries {
    samples: Vec<TimeSeriesSample>,
}

impl TimeSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, sample: TimeSeriesSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TimeSeriesSample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeSeriesSample> {
        self.samples.iter()
    }

    pub fn first(&self) -> Option<&TimeSeriesSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&TimeSeriesSample> {
        self.samples.last()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.t).collect()
    }

    pub fn voltages(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.v).collect()
    }

    pub fn gate_values(&self, gate: Gate) -> Vec<f64> {
        self.samples.iter().map(|s| s.gate(gate)).collect()
    }

    pub fn into_samples(self) -> Vec<TimeSeriesSample> {
        self.samples
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a TimeSeriesSample;
    type IntoIter = std::slice::Iter<'a, TimeSeriesSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

impl IntoIterator for TimeSeries {
    type Item = TimeSeriesSample;
    type IntoIter = std::vec::IntoIter<TimeSeriesSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

/// Drives one run of the membrane model over a fixed window.
#[derive(Debug, Clone)]
pub struct Simulator {
    constants: SimulationConstants,
    state: MembraneState,
    t_start: f64,
    dt: f64,
    total_steps: usize,
    completed_steps: usize,
    clamp_gates: bool,
    time_label: TimeLabel,
    reported_gate_escape: bool,
}

impl Simulator {
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            constants: config.constants,
            state: config.initial,
            t_start: config.t_start,
            dt: config.dt,
            total_steps: config.step_count(),
            completed_steps: 0,
            clamp_gates: config.clamp_gates,
            time_label: config.time_label,
            reported_gate_escape: false,
        })
    }

    pub fn constants(&self) -> &SimulationConstants {
        &self.constants
    }

    pub fn state(&self) -> MembraneState {
        self.state
    }

    /// Simulation time reached so far (ms).
    pub fn time(&self) -> f64 {
        self.t_start + self.completed_steps as f64 * self.dt
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn remaining_steps(&self) -> usize {
        self.total_steps - self.completed_steps
    }

    pub fn is_finished(&self) -> bool {
        self.completed_steps >= self.total_steps
    }

    /// The current state, labelled the way the series labels it.
    pub fn current_sample(&self) -> TimeSeriesSample {
        let label_steps = match self.time_label {
            TimeLabel::StepEnd => self.completed_steps,
            TimeLabel::StepStart => self.completed_steps.saturating_sub(1),
        };
        TimeSeriesSample::new(self.t_start + label_steps as f64 * self.dt, self.state)
    }

    /// Advances one step. Returns `None` once the window is exhausted.
    pub fn step(&mut self) -> Option<TimeSeriesSample> {
        if self.is_finished() {
            return None;
        }
        self.advance();
        Some(self.current_sample())
    }

    fn advance(&mut self) {
        let MembraneState { v, m, n, h } = self.state;
        let dt = self.dt;

        let mut gated = MembraneState {
            v,
            m: rk4_gating_step(dt, v, m, alpha_m, beta_m),
            n: rk4_gating_step(dt, v, n, alpha_n, beta_n),
            h: rk4_gating_step(dt, v, h, alpha_h, beta_h),
        };
        if self.clamp_gates {
            gated = gated.with_clamped_gates();
        } else if !self.reported_gate_escape && !gated.gates_in_unit_interval() {
            warn!(
                t = self.time(),
                m = gated.m,
                n = gated.n,
                h = gated.h,
                "gating variable left [0, 1]"
            );
            self.reported_gate_escape = true;
        }

        let dv = membrane_rate(&gated, &self.constants);
        self.state = MembraneState {
            v: forward_euler_step(v, dv, dt),
            ..gated
        };
        self.completed_steps += 1;
    }

    /// Streams the current sample followed by one sample per remaining step,
    /// leaving the simulator finished. Returns the final state.
    pub fn run_with<F>(&mut self, mut sink: F) -> MembraneState
    where
        F: FnMut(TimeSeriesSample),
    {
        debug!(
            steps = self.remaining_steps(),
            dt = self.dt,
            t_start = self.time(),
            "starting membrane simulation"
        );
        sink(self.current_sample());
        while let Some(sample) = self.step() {
            sink(sample);
        }
        debug!(
            t = self.time(),
            v = self.state.v,
            "membrane simulation finished"
        );
        self.state
    }

    /// Runs the remaining window and buffers every sample.
    pub fn run(mut self) -> TimeSeries {
        let mut series = TimeSeries::with_capacity(self.remaining_steps() + 1);
        self.run_with(|sample| series.push(sample));
        series
    }
}

/// Validates `config` and runs it to completion.
pub fn simulate(config: &SimulationConfig) -> Result<TimeSeries, ConfigError> {
    Ok(Simulator::new(config)?.run())
}
