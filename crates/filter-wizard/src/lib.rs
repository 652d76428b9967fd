//! filter-wizard: Active lowpass filter design and remote verification
//!
//! This crate provides:
//! - Closed-form component equations for three lowpass topologies
//! - A write-run-poll-fetch client for the SystemVision simulation service
//! - DC gain and -3 dB cutoff extraction from simulated Bode data
//! - Clients for the R1 regression predictor and the parts catalog
//! - Markdown design reports
//!
//! Capacitances are entered in nF and stored in F. Resistances are in ohms.

pub mod config;
pub mod equations;
pub mod error;
pub mod measure;
pub mod parts;
pub mod predictor;
pub mod report;
pub mod sim;
pub mod topology;
pub mod waveform;

pub use config::{PartsConfig, PollPolicy, PredictorConfig, SimulationConfig, WizardConfig};
pub use equations::{compute, ComponentValue, ComponentValueSet, DesignParameters, FreeValues, PropertyKind, Targets};
pub use error::{Result, Stage, WizardError};
pub use measure::{measure_cutoff, Measurement};
pub use parts::{PartListing, PartsClient};
pub use predictor::PredictorClient;
pub use report::render_report;
pub use sim::{SimulationBackend, SimulationInput, SimulationOutcome, Simulator, SystemVisionClient};
pub use topology::Topology;
pub use waveform::{BodeResult, WaveformPoint, WaveformSeries};

use serde_json::Value;

/// Identifiers arrive as either JSON strings or numbers
pub(crate) fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric value stored as a JSON number or a numeric string
pub(crate) fn json_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_id() {
        assert_eq!(json_id(&json!("4411")), Some("4411".to_string()));
        assert_eq!(json_id(&json!(4411)), Some("4411".to_string()));
        assert_eq!(json_id(&json!(null)), None);
        assert_eq!(json_id(&json!("")), None);
    }

    #[test]
    fn test_json_f64() {
        assert_eq!(json_f64(&json!(1.5e-9)), Some(1.5e-9));
        assert_eq!(json_f64(&json!(" 2200 ")), Some(2200.0));
        assert_eq!(json_f64(&json!("1k")), None);
        assert_eq!(json_f64(&json!([1.0])), None);
    }
}
