//! Remote simulation: design revisions, runs, and waveform retrieval
//!
//! [`SimulationBackend`] is the call surface of the remote service;
//! [`SystemVisionClient`] implements it over HTTP. [`Simulator`] drives the
//! write-run-poll-fetch sequence against any backend.

mod design;
mod http;
mod orchestrator;
mod poll;

pub use design::{ComponentInstance, DesignRecord, InstanceProperty};
pub use http::SystemVisionClient;
pub use orchestrator::{DesignLocks, SimulationInput, SimulationOutcome, Simulator};
pub use poll::{wait_for_completion, PollOutcome};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, WizardError};
use crate::waveform::WaveformSeries;

/// Entry of the remote design listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSummary {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "DesignID", deserialize_with = "id_string")]
    pub design_id: String,
    #[serde(rename = "LatestRevisionID", deserialize_with = "id_string")]
    pub revision_id: String,
}

/// Entry of a run's waveform index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Id", deserialize_with = "id_string")]
    pub id: String,
}

/// Reported status of a simulation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Created, queued, or running
    Pending(String),
    CompletedNormally,
    /// Any other terminal state
    Failed(String),
}

impl RunState {
    pub fn parse(state: &str) -> Self {
        let upper = state.to_ascii_uppercase();
        if upper == "COMPLETED_NORMALLY" {
            return RunState::CompletedNormally;
        }
        let terminal = upper.starts_with("COMPLETED")
            || ["FAIL", "ERROR", "ABORT", "CANCEL", "KILL"]
                .iter()
                .any(|marker| upper.contains(marker));
        if terminal {
            RunState::Failed(state.to_string())
        } else {
            RunState::Pending(state.to_string())
        }
    }
}

/// Call surface of the remote simulation service
#[async_trait]
pub trait SimulationBackend: Send + Sync {
    /// Every design visible to the configured account
    async fn list_designs(&self) -> Result<Vec<DesignSummary>>;

    /// Full record of one design revision
    async fn get_design(&self, design_id: &str, revision_id: &str) -> Result<DesignRecord>;

    /// Create an editable revision from a fetched record, returning the new record
    async fn create_revision(&self, design: &DesignRecord) -> Result<DesignRecord>;

    /// Persist a modified revision
    async fn write_revision(&self, design: &DesignRecord) -> Result<()>;

    /// Start a run, returning its id
    async fn start_run(&self, design_id: &str, revision_id: &str) -> Result<String>;

    async fn run_state(&self, run_id: &str) -> Result<RunState>;

    async fn list_waveforms(&self, run_id: &str) -> Result<Vec<WaveformEntry>>;

    async fn fetch_waveform(
        &self,
        run_id: &str,
        waveform: &WaveformEntry,
        divisions: u32,
    ) -> Result<WaveformSeries>;
}

/// Exact-name lookup of a design in a listing
pub fn find_design<'a>(designs: &'a [DesignSummary], name: &str) -> Result<&'a DesignSummary> {
    designs
        .iter()
        .find(|d| d.name.as_deref() == Some(name))
        .ok_or_else(|| WizardError::DesignNotFound(name.to_string()))
}

/// Exact-name lookup of a waveform in a run's index
pub fn find_waveform<'a>(waveforms: &'a [WaveformEntry], name: &str) -> Result<&'a WaveformEntry> {
    waveforms
        .iter()
        .find(|w| w.name == name)
        .ok_or_else(|| WizardError::WaveformNotFound(name.to_string()))
}

/// Design names for the topology picker: duplicates and embed-only copies dropped
pub fn selectable_design_names(designs: &[DesignSummary]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in designs.iter().filter_map(|d| d.name.as_deref()) {
        if name.contains("iFrame") || names.iter().any(|n| n == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names
}

/// Ids arrive as strings or bare numbers
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    crate::json_id(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid id {value}")))
}
