//! Stateful simulator handle exposed to JavaScript.

use hh_core::simulation::{ConfigError, SimulationConfig, Simulator, TimeSeriesSample};
use js_sys::{Array, Float64Array};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmSimulator {
    config: SimulationConfig,
    simulator: Simulator,
}

impl WasmSimulator {
    pub(crate) fn from_config(config: SimulationConfig) -> Result<WasmSimulator, ConfigError> {
        let simulator = Simulator::new(&config)?;
        Ok(WasmSimulator { config, simulator })
    }

    fn drain(&mut self) -> Vec<TimeSeriesSample> {
        let mut samples = Vec::with_capacity(self.simulator.remaining_steps() + 1);
        self.simulator.run_with(|sample| samples.push(sample));
        samples
    }
}

#[wasm_bindgen]
impl WasmSimulator {
    /// Builds a simulator from a (possibly partial) config object. Missing
    /// fields, or an `undefined` config, fall back to the reference scenario.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmSimulator, JsValue> {
        console_error_panic_hook::set_once();

        let config = if config.is_undefined() || config.is_null() {
            SimulationConfig::default()
        } else {
            from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid simulation config: {e}")))?
        };
        WasmSimulator::from_config(config).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Advances one step. Returns false once the window is exhausted.
    pub fn step(&mut self) -> bool {
        self.simulator.step().is_some()
    }

    /// Current `[v, m, n, h]`.
    pub fn get_state(&self) -> Vec<f64> {
        self.simulator.state().to_array().to_vec()
    }

    /// Time label of the current state, matching the `t` that `run` and
    /// `run_columns` report for it under the configured `time_label`.
    pub fn get_t(&self) -> f64 {
        self.simulator.current_sample().t
    }

    pub fn remaining_steps(&self) -> usize {
        self.simulator.remaining_steps()
    }

    pub fn is_finished(&self) -> bool {
        self.simulator.is_finished()
    }

    /// Restarts from the configured initial state.
    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.simulator =
            Simulator::new(&self.config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(())
    }

    /// Runs the rest of the window and returns the samples as
    /// `[{ t, v, m, n, h }, ...]`, starting with the current one.
    pub fn run(&mut self) -> Result<JsValue, JsValue> {
        let samples = self.drain();
        to_value(&samples).map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
    }

    /// Runs the rest of the window and returns `[t, v, m, n, h]` columns.
    pub fn run_columns(&mut self) -> Array {
        let samples = self.drain();
        let column = |field: fn(&TimeSeriesSample) -> f64| {
            let values: Vec<f64> = samples.iter().map(field).collect();
            Float64Array::from(values.as_slice())
        };

        let columns = Array::new();
        columns.push(&column(|s| s.t));
        columns.push(&column(|s| s.v));
        columns.push(&column(|s| s.m));
        columns.push(&column(|s| s.n));
        columns.push(&column(|s| s.h));
        columns
    }
}
