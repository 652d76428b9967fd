//! Write-run-poll-fetch sequence for one topology

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{find_design, find_waveform, selectable_design_names, wait_for_completion, SimulationBackend};
use crate::config::PollPolicy;
use crate::equations::{ComponentValue, ComponentValueSet};
use crate::error::{Result, Stage, StageExt, WizardError};
use crate::topology::Topology;
use crate::waveform::BodeResult;

/// Component values to push before a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SimulationInput {
    /// Full set from the equation engine
    Equations { values: ComponentValueSet },
    /// Predicted R1 from the regression model
    Predicted { resistance: f64 },
}

impl SimulationInput {
    /// Reject values that cannot be written to a design. Equation sets may
    /// carry signed entries; a predicted resistance must be positive.
    pub fn validate(&self) -> Result<()> {
        match self {
            SimulationInput::Equations { values } => {
                if values.is_empty() {
                    return Err(WizardError::invalid("values", "no component values given"));
                }
                match values.iter().find(|v| !v.value.is_finite()) {
                    Some(bad) => Err(WizardError::invalid(
                        "values",
                        format!("{} {} = {} is not finite", bad.component, bad.property, bad.value),
                    )),
                    None => Ok(()),
                }
            }
            SimulationInput::Predicted { resistance } if resistance.is_finite() && *resistance > 0.0 => Ok(()),
            SimulationInput::Predicted { resistance } => Err(WizardError::invalid(
                "resistance",
                format!("{resistance} is not a positive finite resistance"),
            )),
        }
    }

    pub fn component_values(&self) -> ComponentValueSet {
        match self {
            SimulationInput::Equations { values } => values.clone(),
            SimulationInput::Predicted { resistance } => {
                std::iter::once(ComponentValue::resistance("r1", *resistance)).collect()
            }
        }
    }

    /// Resistance to look up in the parts catalog after this run
    pub fn sourcing_resistance(&self, topology: Topology) -> Option<f64> {
        match self {
            SimulationInput::Equations { values } => {
                values.get(topology.sourcing_component()).map(|v| v.value)
            }
            SimulationInput::Predicted { resistance } => Some(*resistance),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub topology: Topology,
    pub run_id: String,
    pub polls: usize,
    pub bode: BodeResult,
}

/// One async mutex per design name
#[derive(Debug, Clone, Default)]
pub struct DesignLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl DesignLocks {
    pub async fn acquire(&self, design_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(design_name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Drives simulations against a shared backend handle
pub struct Simulator<B: ?Sized> {
    backend: Arc<B>,
    policy: PollPolicy,
    divisions: u32,
    locks: DesignLocks,
}

impl<B: SimulationBackend + ?Sized> Simulator<B> {
    pub fn new(backend: Arc<B>, policy: PollPolicy, divisions: u32) -> Self {
        Self {
            backend,
            policy,
            divisions,
            locks: DesignLocks::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Design names suitable for the topology picker
    pub async fn list_designs(&self) -> Result<Vec<String>> {
        let designs = self.backend.list_designs().await?;
        Ok(selectable_design_names(&designs))
    }

    /// Push `input` into a fresh revision of the topology's design, run it,
    /// and fetch its gain and phase traces.
    ///
    /// Runs against the same design name are serialized.
    pub async fn simulate(
        &self,
        topology: Topology,
        input: &SimulationInput,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutcome> {
        input.validate()?;
        let design_name = topology.design_name();
        let values = input.component_values();

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WizardError::Cancelled),
            guard = self.locks.acquire(design_name) => guard,
        };
        info!("Simulating {} with {} component values", design_name, values.len());

        let designs = self.backend.list_designs().await.at(Stage::DesignLookup)?;
        let summary = find_design(&designs, design_name).at(Stage::DesignLookup)?;

        let current = self
            .backend
            .get_design(&summary.design_id, &summary.revision_id)
            .await
            .at(Stage::RevisionCreate)?;
        let mut revision = self
            .backend
            .create_revision(&current)
            .await
            .at(Stage::RevisionCreate)?;

        revision.apply(&values).at(Stage::ValueApplication)?;
        self.backend
            .write_revision(&revision)
            .await
            .at(Stage::ValueApplication)?;
        info!("Wrote {} values to {}", values.len(), design_name);

        // The written revision is now the design's latest
        let designs = self.backend.list_designs().await.at(Stage::RunStart)?;
        let latest = find_design(&designs, design_name).at(Stage::RunStart)?;
        let run_id = self
            .backend
            .start_run(&latest.design_id, &latest.revision_id)
            .await
            .at(Stage::RunStart)?;
        info!("Started run {} for {} revision {}", run_id, design_name, latest.revision_id);

        let outcome = wait_for_completion(self.backend.as_ref(), &run_id, &self.policy, cancel)
            .await
            .at(Stage::RunCompletion)?;
        info!(
            "Run {} completed after {} polls in {:?}",
            run_id, outcome.polls, outcome.elapsed
        );

        let bode = self.fetch_bode(topology, &run_id).await.at(Stage::WaveformFetch)?;
        info!(
            "Fetched {} gain and {} phase samples for run {}",
            bode.gain.len(),
            bode.phase.len(),
            run_id
        );

        Ok(SimulationOutcome {
            topology,
            run_id,
            polls: outcome.polls,
            bode,
        })
    }

    async fn fetch_bode(&self, topology: Topology, run_id: &str) -> Result<BodeResult> {
        let waveforms = self.backend.list_waveforms(run_id).await?;
        let gain_entry = find_waveform(&waveforms, topology.gain_waveform())?;
        let phase_entry = find_waveform(&waveforms, topology.phase_waveform())?;

        let gain = self
            .backend
            .fetch_waveform(run_id, gain_entry, self.divisions)
            .await?;
        let phase = self
            .backend
            .fetch_waveform(run_id, phase_entry, self.divisions)
            .await?;
        Ok(BodeResult { gain, phase })
    }
}
