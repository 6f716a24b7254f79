//! First-qualifying-success combinator.
//!
//! Runs a set of independent attempts concurrently and classifies each
//! result as it arrives:
//!
//! ```text
//! Accept(T)  → winner; remaining attempts are dropped
//! Reject(R)  → recorded; keep waiting for the others
//! Abort(A)   → stop immediately; remaining attempts are dropped
//! ```
//!
//! Completion order decides the winner, not submission order.

use std::future::Future;

use futures_util::stream::{FuturesUnordered, StreamExt};

/// Classification of a single attempt's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<T, R, A> {
    Accept(T),
    Reject(R),
    Abort(A),
}

/// Result of a race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome<T, R, A> {
    /// The first accepted value, with the index of the attempt that produced it.
    Won { index: usize, value: T },
    /// An attempt aborted the race.
    Aborted { index: usize, reason: A },
    /// Every attempt was rejected. Rejections are in completion order.
    Exhausted(Vec<R>),
}

/// Race `attempts`, classifying each output with `classify`.
pub async fn first_qualifying<I, F, C, T, R, A>(attempts: I, classify: C) -> RaceOutcome<T, R, A>
where
    I: IntoIterator<Item = F>,
    F: Future,
    C: Fn(F::Output) -> Verdict<T, R, A>,
{
    let mut pending: FuturesUnordered<_> = attempts
        .into_iter()
        .enumerate()
        .map(|(index, fut)| async move { (index, fut.await) })
        .collect();

    let mut rejections = Vec::new();
    while let Some((index, output)) = pending.next().await {
        match classify(output) {
            Verdict::Accept(value) => return RaceOutcome::Won { index, value },
            Verdict::Abort(reason) => return RaceOutcome::Aborted { index, reason },
            Verdict::Reject(r) => rejections.push(r),
        }
    }
    RaceOutcome::Exhausted(rejections)
}
