//! Connection settings for the remote services

use std::time::Duration;

pub const DEFAULT_SIMULATION_URL: &str = "https://stage-api.systemvision.com/api/1.0/";
pub const DEFAULT_PREDICTOR_URL: &str = "https://ussouthcentral.services.azureml.net/workspaces/0977ffcf86024f65a37b3eaddad8a420/services/b38910b37f00402eb21c752874a9bac5/execute?api-version=2.0&details=true";
pub const DEFAULT_PARTS_URL: &str = "http://octopart.com/api/v3/parts/search";

/// Simulation backend connection
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// API root; endpoint names are joined onto it
    pub base_url: String,
    /// Bearer token
    pub token: String,
    /// Owner filter for the design listing
    pub user_id: Option<String>,
    /// Samples requested per waveform
    pub divisions: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SIMULATION_URL.to_string(),
            token: String::new(),
            user_id: None,
            divisions: 1500,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Regression scoring endpoint
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    pub url: String,
    pub api_key: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PREDICTOR_URL.to_string(),
            api_key: String::new(),
        }
    }
}

/// Parts catalog search endpoint
#[derive(Debug, Clone)]
pub struct PartsConfig {
    pub url: String,
    pub api_key: String,
    /// Maximum listings returned
    pub limit: usize,
}

impl Default for PartsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PARTS_URL.to_string(),
            api_key: String::new(),
            limit: 5,
        }
    }
}

/// Backoff schedule for run status polling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Delay after the first incomplete status
    pub initial_delay: Duration,
    /// Growth factor applied after each incomplete status
    pub multiplier: f64,
    /// Ceiling for a single delay
    pub max_delay: Duration,
    /// Total wait before giving up on the run
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            max_wait: Duration::from_secs(600),
        }
    }
}

impl PollPolicy {
    /// Delay before poll number `attempt + 1`, starting at zero
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Everything the wizard needs to reach its collaborators
#[derive(Debug, Clone, Default)]
pub struct WizardConfig {
    pub simulation: SimulationConfig,
    pub predictor: PredictorConfig,
    pub parts: PartsConfig,
    pub poll: PollPolicy,
}
