//! HTTP client for the SystemVision simulation API

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{DesignRecord, DesignSummary, RunState, SimulationBackend, WaveformEntry};
use crate::config::SimulationConfig;
use crate::error::{Result, WizardError};
use crate::waveform::{WaveformPoint, WaveformSeries};

const DESIGNS: &str = "designs";
const SIMULATIONS: &str = "simulations";
const WAVEFORMS: &str = "waveforms";

/// Connection handle owning the base URL and bearer token
#[derive(Debug, Clone)]
pub struct SystemVisionClient {
    http: Client,
    base_url: String,
    token: String,
    user_id: Option<String>,
}

impl SystemVisionClient {
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WizardError::remote(&config.base_url, e))?;
        Ok(Self::with_client(http, config))
    }

    /// Reuse an existing connection pool
    pub fn with_client(http: Client, config: &SimulationConfig) -> Self {
        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            http,
            base_url,
            token: config.token.clone(),
            user_id: config.user_id.clone(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| WizardError::remote(endpoint, e))?;
        response
            .error_for_status()
            .map_err(|e| WizardError::remote(endpoint, e))
    }

    async fn send_json<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> Result<T> {
        let body = self
            .send(endpoint, request)
            .await?
            .bytes()
            .await
            .map_err(|e| WizardError::remote(endpoint, e))?;
        serde_json::from_slice(&body).map_err(|e| WizardError::unexpected(endpoint, e.to_string()))
    }
}

#[derive(Deserialize)]
struct SimulationStatus {
    #[serde(rename = "State")]
    state: String,
}

#[derive(Deserialize)]
struct WaveformIndex {
    #[serde(rename = "Children", default)]
    children: Vec<WaveformEntry>,
}

#[derive(Deserialize)]
struct TransferResponse {
    #[serde(rename = "TransferData", default)]
    transfer_data: Vec<Transfer>,
}

#[derive(Deserialize)]
struct Transfer {
    #[serde(rename = "Data")]
    data: TransferPayload,
}

#[derive(Deserialize)]
struct TransferPayload {
    #[serde(rename = "Data")]
    data: TwoVariableData,
}

#[derive(Deserialize)]
struct Sample {
    #[serde(rename = "XData")]
    x: f64,
    #[serde(rename = "YData")]
    y: f64,
}

/// Samples come either row-wise or as two parallel columns
#[derive(Deserialize)]
#[serde(untagged)]
enum TwoVariableData {
    Rows(Vec<Sample>),
    Columns {
        #[serde(rename = "XData")]
        x: Vec<f64>,
        #[serde(rename = "YData")]
        y: Vec<f64>,
    },
}

impl TwoVariableData {
    fn into_points(self) -> Option<Vec<WaveformPoint>> {
        match self {
            TwoVariableData::Rows(rows) => Some(
                rows.into_iter()
                    .map(|s| WaveformPoint { frequency_hz: s.x, value: s.y })
                    .collect(),
            ),
            TwoVariableData::Columns { x, y } if x.len() == y.len() => Some(
                x.into_iter()
                    .zip(y)
                    .map(|(frequency_hz, value)| WaveformPoint { frequency_hz, value })
                    .collect(),
            ),
            TwoVariableData::Columns { .. } => None,
        }
    }
}

#[async_trait]
impl SimulationBackend for SystemVisionClient {
    async fn list_designs(&self) -> Result<Vec<DesignSummary>> {
        let mut request = self.http.get(self.url(DESIGNS));
        if let Some(user_id) = &self.user_id {
            request = request.query(&[("UserID", user_id)]);
        }
        let designs: Vec<DesignSummary> = self.send_json(DESIGNS, request).await?;
        debug!("Listed {} designs", designs.len());
        Ok(designs)
    }

    async fn get_design(&self, design_id: &str, revision_id: &str) -> Result<DesignRecord> {
        let request = self
            .http
            .get(self.url(DESIGNS))
            .query(&[("designID", design_id), ("revisionID", revision_id)]);
        self.send_json(DESIGNS, request).await
    }

    async fn create_revision(&self, design: &DesignRecord) -> Result<DesignRecord> {
        let request = self.http.post(self.url(DESIGNS)).json(design);
        self.send_json(DESIGNS, request).await
    }

    async fn write_revision(&self, design: &DesignRecord) -> Result<()> {
        let request = self.http.put(self.url(DESIGNS)).json(design);
        self.send(DESIGNS, request).await?;
        Ok(())
    }

    async fn start_run(&self, design_id: &str, revision_id: &str) -> Result<String> {
        let request = self
            .http
            .post(self.url(SIMULATIONS))
            .query(&[("designID", design_id), ("revisionID", revision_id)]);
        let body: Value = self.send_json(SIMULATIONS, request).await?;
        crate::json_id(&body)
            .ok_or_else(|| WizardError::unexpected(SIMULATIONS, format!("no simulation id in {body}")))
    }

    async fn run_state(&self, run_id: &str) -> Result<RunState> {
        let request = self
            .http
            .get(self.url(SIMULATIONS))
            .query(&[("simulationID", run_id)]);
        let status: SimulationStatus = self.send_json(SIMULATIONS, request).await?;
        Ok(RunState::parse(&status.state))
    }

    async fn list_waveforms(&self, run_id: &str) -> Result<Vec<WaveformEntry>> {
        let request = self.http.get(self.url(WAVEFORMS)).query(&[("resultId", run_id)]);
        let index: WaveformIndex = self.send_json(WAVEFORMS, request).await?;
        Ok(index.children)
    }

    async fn fetch_waveform(
        &self,
        run_id: &str,
        waveform: &WaveformEntry,
        divisions: u32,
    ) -> Result<WaveformSeries> {
        let form = json!({
            "DataRequests": [{
                "resultId": run_id,
                "waveformId": waveform.id,
                "divisions": divisions,
                "xmin": null,
                "xmax": null,
                "includeMetadata": true,
            }]
        });
        let request = self.http.post(self.url(WAVEFORMS)).json(&form);
        let response: TransferResponse = self.send_json(WAVEFORMS, request).await?;

        let transfer = response
            .transfer_data
            .into_iter()
            .next()
            .ok_or_else(|| WizardError::unexpected(WAVEFORMS, "empty TransferData"))?;
        let points = transfer.data.data.into_points().ok_or_else(|| {
            WizardError::unexpected(WAVEFORMS, format!("XData/YData length mismatch for {}", waveform.name))
        })?;
        debug!("Fetched {} samples of {}", points.len(), waveform.name);
        Ok(WaveformSeries::new(waveform.name.clone(), points))
    }
}
