//! DC gain and -3 dB cutoff extraction from a gain trace

use serde::{Deserialize, Serialize};

use crate::error::{Result, WizardError};
use crate::waveform::WaveformSeries;

/// Drop below the DC gain that defines the cutoff
pub const CUTOFF_DROP_DB: f64 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Gain at the lowest sampled frequency (dB)
    pub dc_gain_db: f64,
    /// First sampled frequency more than 3 dB below the DC gain (Hz)
    pub cutoff_hz: f64,
}

impl Measurement {
    pub fn summary(&self) -> String {
        format!(
            "Simulation results for this design:  Gain = {} dB, Cutoff Frequency = {} Hz",
            self.dc_gain_db, self.cutoff_hz
        )
    }
}

/// Scan a gain-in-dB trace from its lowest frequency for the first sample
/// strictly more than 3 dB under the first sample.
///
/// The reported cutoff is the sampled frequency, not an interpolated one.
pub fn measure_cutoff(gain: &WaveformSeries) -> Result<Measurement> {
    let first = gain.points.first().ok_or(WizardError::EmptyCutoffMeasurement)?;
    let dc_gain_db = first.value;

    gain.points
        .iter()
        .find(|p| p.value + CUTOFF_DROP_DB < dc_gain_db)
        .map(|p| Measurement {
            dc_gain_db,
            cutoff_hz: p.frequency_hz,
        })
        .ok_or(WizardError::EmptyCutoffMeasurement)
}
