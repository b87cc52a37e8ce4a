//! Session (re-)establishment with bounded exponential backoff.

use crate::error::{BotError, Result};
use crate::session::Session;
use crate::utils::RetryConfig;

/// Connect `session`, retrying per `policy`.
///
/// Returns the 1-based attempt that succeeded. A logout reported by the
/// session is returned immediately; exhausting the attempts yields
/// [`BotError::ReconnectExhausted`].
pub async fn establish(session: &dyn Session, policy: &RetryConfig) -> Result<u32> {
    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tracing::info!(
                "Session: reconnect attempt {}/{} in {:?}",
                attempt,
                policy.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(policy.attempt_timeout, session.connect()).await {
            Ok(Ok(())) => return Ok(attempt),
            Ok(Err(BotError::LoggedOut)) => return Err(BotError::LoggedOut),
            Ok(Err(e)) => {
                tracing::warn!(
                    "Session: connect attempt {}/{} failed: {}",
                    attempt,
                    policy.max_attempts,
                    e
                );
            }
            Err(_) => {
                tracing::warn!(
                    "Session: connect attempt {}/{} timed out after {:?}",
                    attempt,
                    policy.max_attempts,
                    policy.attempt_timeout
                );
            }
        }
    }

    Err(BotError::ReconnectExhausted {
        attempts: policy.max_attempts,
    })
}
