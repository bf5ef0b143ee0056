//! Bounded retry with an optional one-time recovery step.
//!
//! Used for handshakes that fail until the other side is ready, or until a
//! missing listener has been injected.

use std::future::Future;
use std::time::Duration;

use crate::domain::{AppError, Result};

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait and try again.
    Retry,
    /// Run the recovery action (first time only), then try again.
    RecoverThenRetry,
    /// Return the error immediately.
    GiveUp,
}

/// Attempt cap and fixed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Run `op` until it succeeds, the classifier gives up, or attempts run out.
///
/// `recover` runs at most once per call; a recovery failure is returned as-is.
/// Running out of attempts yields [`AppError::Transient`].
///
/// # Errors
/// Returns the first non-retryable error, a recovery error, or `Transient`.
pub async fn retry_with_recovery<T, Op, OpFut, Classify, Recover, RecFut>(
    policy: RetryPolicy,
    classify: Classify,
    mut recover: Recover,
    mut op: Op,
) -> Result<T>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T>>,
    Classify: Fn(&AppError) -> RetryDecision,
    Recover: FnMut() -> RecFut,
    RecFut: Future<Output = Result<()>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut recovered = false;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let decision = classify(&err);
        if decision == RetryDecision::GiveUp {
            return Err(err);
        }

        if attempt >= max_attempts {
            tracing::warn!(attempts = attempt, error = %err, "Retry budget exhausted");
            return Err(AppError::Transient {
                attempts: attempt,
                message: err.to_string(),
            });
        }

        if decision == RetryDecision::RecoverThenRetry && !recovered {
            tracing::info!(error = %err, "Running recovery before retry");
            recover().await?;
            recovered = true;
        } else {
            tracing::debug!(attempt, error = %err, "Attempt failed, retrying");
        }

        if !policy.backoff.is_zero() {
            tokio::time::sleep(policy.backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::domain::HandshakeFailure;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    fn classify(err: &AppError) -> RetryDecision {
        match err {
            AppError::Handshake {
                kind: HandshakeFailure::ListenerAbsent,
                ..
            } => RetryDecision::RecoverThenRetry,
            AppError::Handshake {
                kind: HandshakeFailure::NotReady,
                ..
            } => RetryDecision::Retry,
            _ => RetryDecision::GiveUp,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = retry_with_recovery(
            policy(5),
            classify,
            || async { Ok(()) },
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(AppError::handshake(HandshakeFailure::NotReady, "loading"))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_recovery_runs_once() {
        let recoveries = Cell::new(0);
        let calls = Cell::new(0);
        let result: Result<()> = retry_with_recovery(
            policy(4),
            classify,
            || {
                recoveries.set(recoveries.get() + 1);
                async { Ok(()) }
            },
            || {
                calls.set(calls.get() + 1);
                async {
                    Err(AppError::handshake(
                        HandshakeFailure::ListenerAbsent,
                        "no listener",
                    ))
                }
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Transient { attempts: 4, .. })));
        assert_eq!(calls.get(), 4);
        assert_eq!(recoveries.get(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_with_recovery(
            policy(5),
            classify,
            || async { Ok(()) },
            || {
                calls.set(calls.get() + 1);
                async {
                    Err(AppError::Delivery {
                        message: "rejected".into(),
                    })
                }
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Delivery { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_recovery_failure_is_returned() {
        let result: Result<()> = retry_with_recovery(
            policy(5),
            classify,
            || async { Err(AppError::not_found("target tab")) },
            || async {
                Err(AppError::handshake(
                    HandshakeFailure::ListenerAbsent,
                    "no listener",
                ))
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }
}
