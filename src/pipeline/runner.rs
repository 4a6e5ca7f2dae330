//! Sliding-window execution of a lazily produced stream of tasks.
//!
//! Up to `limit` tasks are in flight at once. The task stream and the
//! in-flight set are polled together, so a task starts as soon as it is
//! produced even while the producer is still working on the next one. The
//! first failure, whether from a task, from the stream or from an expired
//! [`Deadline`], stops scheduling. Tasks already running are drained, never
//! cancelled.

use std::future::{Future, pending};
use std::pin::pin;
use std::time::Duration;

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error};

use crate::error::{DeployError, Result};

/// Point in time after which no new task may start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// A deadline `limit` from now
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Fail with [`DeployError::Timeout`] once the deadline has passed
    pub fn check(&self) -> Result<()> {
        if self.has_passed() {
            Err(DeployError::Timeout(self.limit))
        } else {
            Ok(())
        }
    }
}

/// Run every task produced by `tasks` with at most `limit` in flight.
///
/// Returns all task outputs (in completion order) or the first failure.
pub async fn run_bounded<S, Fut, T>(tasks: S, limit: usize) -> Result<Vec<T>>
where
    S: Stream<Item = Result<Fut>>,
    Fut: Future<Output = Result<T>>,
{
    run_bounded_until(tasks, limit, None).await
}

/// Like [`run_bounded`], but stops scheduling once `deadline` passes.
///
/// Tasks in flight at that moment still run to completion, then
/// [`DeployError::Timeout`] is returned.
pub async fn run_bounded_until<S, Fut, T>(
    tasks: S,
    limit: usize,
    deadline: Option<Deadline>,
) -> Result<Vec<T>>
where
    S: Stream<Item = Result<Fut>>,
    Fut: Future<Output = Result<T>>,
{
    let limit = limit.max(1);
    let mut tasks = pin!(tasks);
    let mut in_flight = FuturesUnordered::new();
    let mut outcomes = Vec::new();
    let mut failure: Option<DeployError> = None;
    let mut exhausted = false;

    let mut expired = pin!(async move {
        match deadline {
            Some(deadline) => sleep_until(deadline.at).await,
            None => pending::<()>().await,
        }
    });

    loop {
        let scheduling = failure.is_none() && !exhausted;
        if !scheduling && in_flight.is_empty() {
            break;
        }

        tokio::select! {
            biased;

            () = &mut expired, if scheduling => {
                if let Some(deadline) = deadline {
                    error!(
                        "Deadline of {:?} passed, draining {} in-flight task(s)",
                        deadline.limit,
                        in_flight.len()
                    );
                    failure = Some(DeployError::Timeout(deadline.limit));
                }
            }

            Some(outcome) = in_flight.next(), if !in_flight.is_empty() => match outcome {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    if failure.is_none() {
                        error!("Task failed, draining {} in-flight task(s): {}", in_flight.len(), e);
                        failure = Some(e);
                    } else {
                        debug!("Additional task failure while draining: {}", e);
                    }
                }
            },

            next = tasks.next(), if scheduling && in_flight.len() < limit => match next {
                Some(Ok(task)) => in_flight.push(task),
                Some(Err(e)) => {
                    error!("Task source failed, no further tasks will start: {}", e);
                    failure = Some(e);
                }
                None => exhausted = true,
            },
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}
