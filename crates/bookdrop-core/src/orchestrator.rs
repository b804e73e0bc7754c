use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::{domain::ImportTarget, ports::RemoteLibrary};

/// Retry policy for one orchestration run: fixed delay, bounded attempts, a
/// single deadline for the whole run.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub run_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(3),
            run_timeout: Duration::from_secs(60),
        }
    }
}

/// Phase an orchestration run failed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePhase {
    /// The initial rescan call failed; no finalize was attempted.
    Rescan,
    /// A finalize call returned an error.
    Finalize,
    /// The run deadline elapsed while waiting between attempts.
    Timeout,
}

/// Terminal outcome of one orchestration run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Imported { count: i64 },
    PartiallyImported { imported: i64, failed: i64 },
    NoNewImports,
    Failed { phase: FailurePhase, error: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Imported { .. })
    }

    /// The single human-readable status line reported to the caller. A
    /// stored-but-not-imported file reads differently from a total failure.
    pub fn user_message(&self) -> String {
        match self {
            RunOutcome::Imported { count } => format!(
                "📚 File downloaded and imported to the library ({count} books imported)"
            ),
            RunOutcome::PartiallyImported { imported, failed } => format!(
                "📚 File downloaded; {imported} books imported, {failed} failed"
            ),
            RunOutcome::NoNewImports => {
                "📥 File downloaded to bookdrop, but no new books were imported after multiple attempts"
                    .to_string()
            }
            RunOutcome::Failed { phase: FailurePhase::Rescan, error } => format!(
                "📥 File downloaded, but failed to trigger a library scan: {error}"
            ),
            RunOutcome::Failed { phase: FailurePhase::Finalize, error } => format!(
                "📥 File downloaded, but failed to complete the library import: {error}"
            ),
            RunOutcome::Failed { phase: FailurePhase::Timeout, .. } => {
                "📥 File downloaded, but the library import timed out".to_string()
            }
        }
    }
}

/// Drives a stored file to remote-imported status.
///
/// One run per inbound file event: rescan strictly precedes every finalize
/// attempt, attempts are strictly sequential, and a zero-import result is
/// retried with a fixed delay because the remote side may still be processing
/// the file. True errors are terminal for the run; only the ambiguous
/// zero-count success is retried.
pub struct ImportOrchestrator {
    api: Arc<dyn RemoteLibrary>,
    policy: RetryPolicy,
}

impl ImportOrchestrator {
    pub fn new(api: Arc<dyn RemoteLibrary>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    pub async fn run(&self, target: ImportTarget) -> RunOutcome {
        let deadline = Instant::now() + self.policy.run_timeout;

        if let Err(e) = self.api.rescan().await {
            warn!(error = %e, "failed to rescan staging area");
            return RunOutcome::Failed {
                phase: FailurePhase::Rescan,
                error: e.to_string(),
            };
        }

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                info!(
                    attempt,
                    delay = ?self.policy.retry_delay,
                    "waiting before finalize retry"
                );
                if !wait_within_deadline(self.policy.retry_delay, deadline).await {
                    return RunOutcome::Failed {
                        phase: FailurePhase::Timeout,
                        error: "run deadline elapsed between attempts".to_string(),
                    };
                }
            }

            let outcome = match self.api.finalize_all(target).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(attempt, error = %e, "finalize attempt failed");
                    return RunOutcome::Failed {
                        phase: FailurePhase::Finalize,
                        error: e.to_string(),
                    };
                }
            };

            if outcome.imported_count > 0 {
                info!(
                    attempt,
                    imported = outcome.imported_count,
                    failed = outcome.failed_count,
                    "import completed"
                );
                if outcome.failed_count > 0 {
                    return RunOutcome::PartiallyImported {
                        imported: outcome.imported_count,
                        failed: outcome.failed_count,
                    };
                }
                return RunOutcome::Imported {
                    count: outcome.imported_count,
                };
            }

            // Zero imports is ambiguous between "nothing staged" and "not yet
            // processed"; retry until attempts run out.
            info!(
                attempt,
                remaining = max_attempts - attempt,
                "no files imported on this attempt"
            );
        }

        RunOutcome::NoNewImports
    }
}

/// Sleeps for `delay`, capped by `deadline`. Returns false when the deadline
/// elapses first.
async fn wait_within_deadline(delay: Duration, deadline: Instant) -> bool {
    let wake = Instant::now() + delay;
    if wake >= deadline {
        tokio::time::sleep_until(deadline).await;
        return false;
    }
    tokio::time::sleep_until(wake).await;
    true
}
