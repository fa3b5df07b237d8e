//! Free-standing analysis bindings.

use hh_core::analysis::{self, SpikeSettings};
use hh_core::equilibrium::{self, NewtonSettings};
use hh_core::model::SimulationConstants;
use hh_core::simulation::{SimulationConfig, TimeSeries};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Deserializes `value`, or returns the default when it is `undefined`/`null`.
fn value_or_default<T>(value: JsValue, what: &str) -> Result<T, JsValue>
where
    T: DeserializeOwned + Default,
{
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid {what}: {e}")))
}

fn serialize<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
}

/// The reference scenario as a config object.
#[wasm_bindgen]
pub fn default_config() -> Result<JsValue, JsValue> {
    serialize(&SimulationConfig::default())
}

/// Summary of the spikes in a `[{ t, v, m, n, h }, ...]` series.
#[derive(Serialize)]
struct SpikeReport {
    spikes: Vec<analysis::Spike>,
    firing_rate_hz: Option<f64>,
    interspike_intervals: Vec<f64>,
}

#[wasm_bindgen]
pub fn detect_spikes(series: JsValue, settings: JsValue) -> Result<JsValue, JsValue> {
    let series: TimeSeries =
        from_value(series).map_err(|e| JsValue::from_str(&format!("Invalid time series: {e}")))?;
    let settings: SpikeSettings = value_or_default(settings, "spike settings")?;

    let spikes = analysis::detect_spikes(&series, settings)
        .map_err(|e| JsValue::from_str(&format!("Spike detection failed: {e}")))?;
    let firing_rate_hz = match (series.first(), series.last()) {
        (Some(first), Some(last)) if last.t > first.t => {
            analysis::firing_rate(&spikes, last.t - first.t).ok()
        }
        _ => None,
    };

    serialize(&SpikeReport {
        interspike_intervals: analysis::interspike_intervals(&spikes),
        firing_rate_hz,
        spikes,
    })
}

#[wasm_bindgen]
pub fn resting_state(
    constants: JsValue,
    initial_voltage: f64,
    max_steps: u32,
    damping: f64,
) -> Result<JsValue, JsValue> {
    let constants: SimulationConstants = value_or_default(constants, "membrane constants")?;
    let settings = NewtonSettings {
        max_steps: max_steps as usize,
        damping,
        ..NewtonSettings::default()
    };

    let result = equilibrium::resting_state(&constants, initial_voltage, settings)
        .map_err(|e| JsValue::from_str(&format!("Resting state solve failed: {e}")))?;
    serialize(&result)
}
