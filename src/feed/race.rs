//! First-success race over a set of fallible futures.
//!
//! Unlike `select`, a failure does not decide the race: the remaining
//! attempts keep running until one succeeds or none are left.

use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::future::Future;

/// Why a race produced no value.
#[derive(Debug)]
pub enum RaceError<E> {
    /// Nothing was raced
    Empty,
    /// Every attempt failed; errors are in completion order
    AllFailed(Vec<E>),
}

impl<E> fmt::Display for RaceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceError::Empty => write!(f, "no attempts to race"),
            RaceError::AllFailed(errors) => write!(f, "all {} attempts failed", errors.len()),
        }
    }
}

impl<E: fmt::Debug> std::error::Error for RaceError<E> {}

/// Polls every attempt concurrently and returns the first `Ok`.
///
/// Attempts still in flight when a winner appears are dropped, which
/// cancels them. Only when the outstanding count reaches zero without a
/// success is [`RaceError::AllFailed`] returned.
pub async fn first_success<I, F, T, E>(attempts: I) -> Result<T, RaceError<E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<F> = attempts.into_iter().collect();
    if pending.is_empty() {
        return Err(RaceError::Empty);
    }

    let mut errors = Vec::with_capacity(pending.len());
    while let Some(outcome) = pending.next().await {
        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }

    Err(RaceError::AllFailed(errors))
}
