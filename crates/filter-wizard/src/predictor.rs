//! Client for the regression endpoint that predicts R1 from the targets

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::PredictorConfig;
use crate::equations::{cutoff_hz, Targets};
use crate::error::{Result, WizardError};

const ENDPOINT: &str = "predictor";

pub struct PredictorClient {
    http: Client,
    url: String,
    api_key: String,
}

impl PredictorClient {
    pub fn new(http: Client, config: &PredictorConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Predicted R1 in ohms for the given targets
    pub async fn predict(&self, targets: &Targets) -> Result<f64> {
        targets.validate()?;
        let body = prediction_request(targets.gain, targets.freq_exp);

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| WizardError::remote(ENDPOINT, e))?
            .error_for_status()
            .map_err(|e| WizardError::remote(ENDPOINT, e))?;
        let answer: Value = response
            .json()
            .await
            .map_err(|e| WizardError::PredictionParse(e.to_string()))?;
        debug!("Prediction response: {}", answer);

        let resistance = parse_prediction(&answer)?;
        info!(
            "Predicted R1 = {:.4} ohm for gain {} and cutoff exponent {}",
            resistance, targets.gain, targets.freq_exp
        );
        Ok(resistance)
    }
}

/// Scoring payload. The model was trained on two-row input, so each target
/// is repeated across both columns of its own row.
pub fn prediction_request(gain: f64, freq_exp: f64) -> Value {
    let freq = cutoff_hz(freq_exp);
    json!({
        "Inputs": {
            "input1": {
                "ColumnNames": ["DC_Gain", "CutoffFrequency"],
                "Values": [[gain, gain], [freq, freq]],
            },
        },
        "GlobalParameters": {},
    })
}

/// Pull `Results.output1.value.Values[0][0]` out of a scoring response
pub fn parse_prediction(answer: &Value) -> Result<f64> {
    let cell = answer
        .pointer("/Results/output1/value/Values/0/0")
        .ok_or_else(|| WizardError::PredictionParse(format!("no prediction in {answer}")))?;
    crate::json_f64(cell)
        .filter(|v| v.is_finite())
        .ok_or_else(|| WizardError::PredictionParse(format!("non-numeric prediction {cell}")))
}

/// Text shown under the predict button
pub fn prediction_message(resistance: f64, targets: &Targets) -> String {
    format!(
        "Set R1 to {:.4} for DC Gain of {:.2} dB and Cutoff Freq of {:.2} Hz",
        resistance,
        targets.gain_db(),
        targets.cutoff_hz()
    )
}
