//! Spike detection and firing statistics over a simulated voltage trace.

use crate::simulation::{TimeSeries, TimeSeriesSample};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeSettings {
    /// Upward crossing of this voltage (mV) starts a spike.
    pub threshold: f64,
    /// The detector re-arms once the voltage falls back below this level.
    pub rearm_level: f64,
}

impl Default for SpikeSettings {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            rearm_level: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    /// Time of the first sample at or above threshold.
    pub onset: f64,
    pub peak_time: f64,
    pub peak_voltage: f64,
}

/// Sample with the largest membrane potential.
pub fn peak(series: &TimeSeries) -> Result<TimeSeriesSample> {
    let mut samples = series.iter();
    let Some(first) = samples.next() else {
        bail!("Cannot locate a peak in an empty time series.");
    };
    Ok(samples.fold(*first, |best, s| if s.v > best.v { *s } else { best }))
}

pub fn detect_spikes(series: &TimeSeries, settings: SpikeSettings) -> Result<Vec<Spike>> {
    if !settings.threshold.is_finite() || !settings.rearm_level.is_finite() {
        bail!("Spike threshold and re-arm level must be finite.");
    }
    if settings.rearm_level > settings.threshold {
        bail!(
            "Re-arm level ({}) must not exceed the spike threshold ({}).",
            settings.rearm_level,
            settings.threshold
        );
    }

    let mut spikes = Vec::new();
    let mut current: Option<Spike> = None;
    let mut armed = true;

    for sample in series {
        if let Some(spike) = current.as_mut() {
            if sample.v > spike.peak_voltage {
                spike.peak_voltage = sample.v;
                spike.peak_time = sample.t;
            }
            if sample.v < settings.rearm_level {
                spikes.extend(current.take());
                armed = true;
            }
        } else if armed && sample.v >= settings.threshold {
            current = Some(Spike {
                onset: sample.t,
                peak_time: sample.t,
                peak_voltage: sample.v,
            });
            armed = false;
        }
    }
    // A spike still above the re-arm level at the end of the trace counts.
    spikes.extend(current);

    Ok(spikes)
}

/// Mean firing rate in Hz over `duration_ms`.
pub fn firing_rate(spikes: &[Spike], duration_ms: f64) -> Result<f64> {
    if !(duration_ms.is_finite() && duration_ms > 0.0) {
        bail!("Duration must be positive (got {duration_ms} ms).");
    }
    Ok(spikes.len() as f64 * 1000.0 / duration_ms)
}

/// Intervals (ms) between consecutive spike onsets.
pub fn interspike_intervals(spikes: &[Spike]) -> Vec<f64> {
    spikes.windows(2).map(|w| w[1].onset - w[0].onset).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MembraneState;
    use crate::simulation::{simulate, SimulationConfig};

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn series_from_voltages(voltages: &[f64]) -> TimeSeries {
        let mut series = TimeSeries::with_capacity(voltages.len());
        for (idx, &v) in voltages.iter().enumerate() {
            series.push(TimeSeriesSample::new(
                idx as f64,
                MembraneState {
                    v,
                    ..MembraneState::default()
                },
            ));
        }
        series
    }

    #[test]
    fn peak_finds_maximum_voltage() {
        let series = series_from_voltages(&[0.0, 30.0, 95.0, 40.0, -5.0]);
        let best = peak(&series).expect("non-empty series");
        assert_eq!(best.t, 2.0);
        assert_eq!(best.v, 95.0);
    }

    #[test]
    fn peak_rejects_empty_series() {
        assert_err_contains(peak(&TimeSeries::default()), "empty time series");
    }

    #[test]
    fn detect_spikes_uses_hysteresis() {
        // The dip to 45 stays above the re-arm level, so it is one spike.
        let series = series_from_voltages(&[
            0.0, 60.0, 90.0, 45.0, 70.0, 10.0, 0.0, 55.0, 80.0, 5.0,
        ]);
        let spikes = detect_spikes(&series, SpikeSettings::default()).expect("valid settings");
        assert_eq!(spikes.len(), 2);
        assert_eq!(spikes[0].onset, 1.0);
        assert_eq!(spikes[0].peak_time, 2.0);
        assert_eq!(spikes[0].peak_voltage, 90.0);
        assert_eq!(spikes[1].onset, 7.0);
        assert_eq!(spikes[1].peak_voltage, 80.0);
        assert_eq!(interspike_intervals(&spikes), vec![6.0]);
    }

    #[test]
    fn detect_spikes_keeps_unfinished_spike() {
        let series = series_from_voltages(&[0.0, 70.0, 100.0]);
        let spikes = detect_spikes(&series, SpikeSettings::default()).expect("valid settings");
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].peak_voltage, 100.0);
    }

    #[test]
    fn detect_spikes_rejects_inverted_levels() {
        let settings = SpikeSettings {
            threshold: 10.0,
            rearm_level: 30.0,
        };
        assert_err_contains(
            detect_spikes(&TimeSeries::default(), settings),
            "must not exceed",
        );
    }

    #[test]
    fn reference_scenario_spikes_repetitively() {
        let config = SimulationConfig::default();
        let series = simulate(&config).expect("default config is valid");
        let spikes = detect_spikes(&series, SpikeSettings::default()).expect("valid settings");

        assert!(spikes.len() >= 2, "found {} spikes", spikes.len());
        assert!(spikes[0].onset < 20.0);
        assert!(spikes.iter().all(|s| s.peak_voltage > 80.0));

        let rate = firing_rate(&spikes, config.t_end - config.t_start).expect("positive duration");
        assert!(rate > 0.0);
        assert!(interspike_intervals(&spikes).iter().all(|&isi| isi > 0.0));
    }

    #[test]
    fn quiet_membrane_has_no_spikes() {
        let mut config = SimulationConfig::default();
        config.constants.injected_current = 0.0;
        let series = simulate(&config).expect("valid config");
        let spikes = detect_spikes(&series, SpikeSettings::default()).expect("valid settings");
        assert!(spikes.is_empty());
    }

    #[test]
    fn firing_rate_converts_to_hertz() {
        let spike = Spike {
            onset: 0.0,
            peak_time: 0.0,
            peak_voltage: 100.0,
        };
        let rate = firing_rate(&[spike; 4], 200.0).expect("positive duration");
        assert!((rate - 20.0).abs() < 1e-12);
        assert_err_contains(firing_rate(&[spike], 0.0), "Duration must be positive");
    }
}
