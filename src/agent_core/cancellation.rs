//! Abort handling for suspension points.
//!
//! The abort signal is a `CancellationToken`. Every await in the loop goes
//! through [`race_with_abort`]; once the token fires the race resolves to
//! `AgentError::Aborted` even if the raced future would have completed.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::errors::AgentError;

/// Fail with `Aborted` if the signal has already fired.
pub fn throw_if_aborted(signal: Option<&CancellationToken>) -> Result<(), AgentError> {
    match signal {
        Some(token) if token.is_cancelled() => Err(AgentError::Aborted),
        _ => Ok(()),
    }
}

/// Await `future` unless the signal fires first.
pub async fn race_with_abort<F>(
    future: F,
    signal: Option<&CancellationToken>,
) -> Result<F::Output, AgentError>
where
    F: Future,
{
    let Some(token) = signal else {
        return Ok(future.await);
    };
    throw_if_aborted(Some(token))?;
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(AgentError::Aborted),
        output = future => Ok(output),
    }
}
