//! Cancellable run status polling with exponential backoff

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{RunState, SimulationBackend};
use crate::config::PollPolicy;
use crate::error::{Result, WizardError};

/// Floor for a single delay so a zero policy cannot spin
const MIN_POLL_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOutcome {
    /// Status checks made, including the final one
    pub polls: usize,
    pub elapsed: Duration,
}

/// Poll `run_id` until it completes normally.
///
/// Other terminal states yield [`WizardError::RunFailed`]; exceeding
/// `policy.max_wait` yields [`WizardError::RunTimeout`].
pub async fn wait_for_completion<B: SimulationBackend + ?Sized>(
    backend: &B,
    run_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<PollOutcome> {
    let start = Instant::now();
    let mut polls = 0usize;
    let mut attempt = 0u32;

    loop {
        let state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WizardError::Cancelled),
            state = backend.run_state(run_id) => state?,
        };
        polls += 1;

        match state {
            RunState::CompletedNormally => {
                return Ok(PollOutcome {
                    polls,
                    elapsed: start.elapsed(),
                })
            }
            RunState::Failed(state) => {
                return Err(WizardError::RunFailed {
                    run_id: run_id.to_string(),
                    state,
                })
            }
            RunState::Pending(state) => debug!("Run {} is {} (poll {})", run_id, state, polls),
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.max_wait {
            return Err(WizardError::RunTimeout {
                run_id: run_id.to_string(),
                elapsed,
                polls,
            });
        }

        let delay = policy
            .delay(attempt)
            .min(policy.max_wait - elapsed)
            .max(MIN_POLL_DELAY);
        attempt = attempt.saturating_add(1);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WizardError::Cancelled),
            _ = sleep(delay) => {}
        }
    }
}
