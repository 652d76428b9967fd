//! JSON endpoints over the design, simulation, prediction, and parts clients

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use filter_wizard::{
    compute, measure_cutoff,
    predictor::prediction_message,
    render_report,
    topology::FreeParameter,
    ComponentValueSet, DesignParameters, FreeValues, Measurement, PartListing, SimulationInput, Targets, Topology,
    WaveformSeries, WizardError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::AppState;

/// Library error carried to an HTTP response
pub struct ApiError(WizardError);

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &WizardError) -> StatusCode {
    match err.root() {
        WizardError::InvalidParameter { .. } | WizardError::UnknownTopology(_) => StatusCode::BAD_REQUEST,
        WizardError::DesignNotFound(_)
        | WizardError::WaveformNotFound(_)
        | WizardError::ComponentPropertyNotFound { .. } => StatusCode::NOT_FOUND,
        WizardError::RemoteService { .. }
        | WizardError::UnexpectedResponse { .. }
        | WizardError::RunFailed { .. }
        | WizardError::PredictionParse(_) => StatusCode::BAD_GATEWAY,
        WizardError::RunTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        WizardError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        WizardError::EmptyCutoffMeasurement => StatusCode::UNPROCESSABLE_ENTITY,
        WizardError::Template(_) | WizardError::Stage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        let body = json!({
            "error": self.0.to_string(),
            "stage": self.0.stage().map(|s| s.as_str()),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct TopologyInfo {
    pub id: Topology,
    pub design_name: &'static str,
    pub schematic_url: &'static str,
    pub sourcing_component: &'static str,
    pub free_parameters: &'static [FreeParameter],
    pub equations: String,
}

pub async fn topologies() -> Json<Vec<TopologyInfo>> {
    let info = Topology::ALL
        .into_iter()
        .map(|t| TopologyInfo {
            id: t,
            design_name: t.design_name(),
            schematic_url: t.schematic_url(),
            sourcing_component: t.sourcing_component(),
            free_parameters: t.free_parameters(),
            equations: t.equations_markdown(),
        })
        .collect();
    Json(info)
}

pub async fn designs(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    let names = state.simulator.list_designs().await?;
    Ok(Json(names))
}

#[derive(Debug, Deserialize)]
pub struct DesignRequest {
    pub topology: Topology,
    /// Free component values by name; omitted ones take the slider default
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub targets: Targets,
}

#[derive(Debug, Serialize)]
pub struct DesignResponse {
    pub topology: Topology,
    pub values: ComponentValueSet,
    pub gain_db: f64,
    pub cutoff_hz: f64,
    pub report: String,
}

pub async fn design(Json(req): Json<DesignRequest>) -> ApiResult<DesignResponse> {
    let params = DesignParameters {
        free: FreeValues::from_params(req.topology, &req.params)?,
        targets: req.targets,
    };
    let values = compute(&params)?;
    let report = render_report(req.topology, &req.targets, &values, None)?;
    Ok(Json(DesignResponse {
        topology: req.topology,
        values,
        gain_db: req.targets.gain_db(),
        cutoff_hz: req.targets.cutoff_hz(),
        report,
    }))
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub resistance: f64,
    pub message: String,
}

pub async fn predict(State(state): State<Arc<AppState>>, Json(targets): Json<Targets>) -> ApiResult<PredictResponse> {
    let resistance = state.predictor.predict(&targets).await?;
    Ok(Json(PredictResponse {
        resistance,
        message: prediction_message(resistance, &targets),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub topology: Topology,
    pub input: SimulationInput,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub topology: Topology,
    pub run_id: String,
    pub polls: usize,
    pub gain: WaveformSeries,
    pub phase: WaveformSeries,
    pub measurement: Option<Measurement>,
    pub summary: Option<String>,
    pub sourcing_resistance: Option<f64>,
}

pub async fn simulate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulateRequest>,
) -> ApiResult<SimulateResponse> {
    let cancel = state.shutdown.child_token();
    let outcome = state.simulator.simulate(req.topology, &req.input, &cancel).await?;

    let measurement = match measure_cutoff(&outcome.bode.gain) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!("Run {}: {}", outcome.run_id, e);
            None
        }
    };

    let frame = outcome.bode.to_binary();
    info!("Broadcasting {} byte Bode frame for run {}", frame.len(), outcome.run_id);
    *state.current_bode.write().await = Some(frame.clone());
    let _ = state.bode_tx.send(frame);

    let bode = outcome.bode;
    Ok(Json(SimulateResponse {
        topology: outcome.topology,
        run_id: outcome.run_id,
        polls: outcome.polls,
        gain: bode.gain,
        phase: bode.phase,
        summary: measurement.as_ref().map(Measurement::summary),
        measurement,
        sourcing_resistance: req.input.sourcing_resistance(req.topology),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PartsQuery {
    pub resistance: f64,
}

pub async fn parts(State(state): State<Arc<AppState>>, Query(query): Query<PartsQuery>) -> ApiResult<Vec<PartListing>> {
    let listings = state.parts.search(query.resistance).await?;
    Ok(Json(listings))
}
