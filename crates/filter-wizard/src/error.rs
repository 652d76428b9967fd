//! Error taxonomy shared by the equation engine and the remote clients

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Orchestration stage a simulation failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DesignLookup,
    RevisionCreate,
    ValueApplication,
    RunStart,
    RunCompletion,
    WaveformFetch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DesignLookup => "design lookup",
            Stage::RevisionCreate => "revision create",
            Stage::ValueApplication => "value application",
            Stage::RunStart => "run start",
            Stage::RunCompletion => "run completion",
            Stage::WaveformFetch => "waveform fetch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unknown topology: {0}")]
    UnknownTopology(String),

    #[error("no design named {0:?}")]
    DesignNotFound(String),

    #[error("waveform {0:?} not found in simulation results")]
    WaveformNotFound(String),

    #[error("component {component:?} has no property {property:?}")]
    ComponentPropertyNotFound { component: String, property: String },

    #[error("request to {endpoint} failed: {message}")]
    RemoteService { endpoint: String, message: String },

    #[error("unexpected response from {endpoint}: {message}")]
    UnexpectedResponse { endpoint: String, message: String },

    #[error("simulation run {run_id} ended in state {state}")]
    RunFailed { run_id: String, state: String },

    #[error("simulation run {run_id} still incomplete after {elapsed:?} ({polls} polls)")]
    RunTimeout {
        run_id: String,
        elapsed: Duration,
        polls: usize,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("could not parse prediction: {0}")]
    PredictionParse(String),

    #[error("no sample falls 3 dB below the DC gain")]
    EmptyCutoffMeasurement,

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<WizardError>,
    },
}

impl WizardError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        WizardError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn remote(endpoint: impl Into<String>, err: impl fmt::Display) -> Self {
        WizardError::RemoteService {
            endpoint: endpoint.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn unexpected(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        WizardError::UnexpectedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Stage this error was raised in, if it came out of an orchestration.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WizardError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, skipping stage attribution.
    pub fn root(&self) -> &WizardError {
        match self {
            WizardError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, WizardError>;

/// Attach a [`Stage`] to the error side of a result.
pub(crate) trait StageExt<T> {
    fn at(self, stage: Stage) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn at(self, stage: Stage) -> Result<T> {
        self.map_err(|source| match source {
            // Cancellation stays unwrapped
            WizardError::Cancelled => WizardError::Cancelled,
            source => WizardError::Stage {
                stage,
                source: Box::new(source),
            },
        })
    }
}
