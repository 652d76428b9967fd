//! Sampled frequency-domain traces returned by a simulation run

use serde::{Deserialize, Serialize};

/// One sample of a trace: gain in dB or phase in degrees at a frequency
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveformPoint {
    pub frequency_hz: f64,
    pub value: f64,
}

/// A named trace, ascending by frequency
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveformSeries {
    pub name: String,
    pub points: Vec<WaveformPoint>,
}

impl WaveformSeries {
    pub fn new(name: impl Into<String>, points: Vec<WaveformPoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn from_pairs(name: impl Into<String>, pairs: &[(f64, f64)]) -> Self {
        Self::new(
            name,
            pairs
                .iter()
                .map(|&(frequency_hz, value)| WaveformPoint { frequency_hz, value })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Gain and phase traces of one completed run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodeResult {
    pub gain: WaveformSeries,
    pub phase: WaveformSeries,
}

impl BodeResult {
    /// Binary frame for dashboard subscribers
    pub fn to_binary(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(16 + 8 * (self.gain.len() + self.phase.len()));

        // Header
        data.extend_from_slice(b"BODE\0\0\0\0");

        // Point counts
        data.extend_from_slice(&(self.gain.len() as u32).to_le_bytes());
        data.extend_from_slice(&(self.phase.len() as u32).to_le_bytes());

        for series in [&self.gain, &self.phase] {
            for p in &series.points {
                data.extend_from_slice(&(p.frequency_hz as f32).to_le_bytes());
            }
            for p in &series.points {
                data.extend_from_slice(&(p.value as f32).to_le_bytes());
            }
        }

        data
    }
}
