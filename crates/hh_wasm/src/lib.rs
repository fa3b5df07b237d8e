//! WebAssembly bindings for `hh_core`.

mod analysis;
mod simulator;

pub use analysis::{default_config, detect_spikes, resting_state};
pub use simulator::WasmSimulator;
