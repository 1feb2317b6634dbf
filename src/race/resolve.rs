use super::{Policy, RaceError};
use crate::outcome::{Address, Outcome};
use crate::scope::{CancelReason, Cancelled, Scope};
use crate::source::SourceError;

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use fixedbitset::FixedBitSet;
use pin_project::{pin_project, pinned_drop};
use tokio::sync::mpsc::Receiver;
use tokio::time::Instant;

/// A single source's answer, sent once over the completion queue.
#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) index: usize,
    pub(crate) result: Result<Address, SourceError>,
}

/// A future which resolves a running race to its single [`Outcome`].
///
/// This `struct` is created by the [`start`] method on [`Race`]. See its
/// documentation for more.
///
/// Dropping a `Resolve` before it completes cancels the race scope, which
/// stops every source still running.
///
/// [`start`]: crate::race::Race::start
/// [`Race`]: crate::race::Race
#[pin_project(PinnedDrop)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Resolve {
    scope: Scope,
    #[pin]
    expired: Cancelled,
    reports: Receiver<Report>,
    tally: Tally,
    started: Instant,
    done: bool,
}

/// What has been heard from the sources so far.
struct Tally {
    policy: Policy,
    answered: FixedBitSet,
    first_failure: Option<SourceError>,
}

impl Resolve {
    pub(super) fn new(scope: Scope, reports: Receiver<Report>, policy: Policy, len: usize) -> Self {
        Self {
            expired: scope.cancelled(),
            scope,
            reports,
            tally: Tally {
                policy,
                answered: FixedBitSet::with_capacity(len),
                first_failure: None,
            },
            started: Instant::now(),
            done: false,
        }
    }

    /// The scope shared with every source of this race.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl Tally {
    /// Record a report, returning the outcome if it decides the race.
    fn record(&mut self, report: Report) -> Option<Outcome> {
        self.answered.insert(report.index);
        match report.result {
            Ok(address) => {
                tracing::debug!(source = %address.source_name, "source answered");
                Some(Outcome::Success(address))
            }
            Err(err) => {
                tracing::debug!(source = err.source_name(), error = %err, "source failed");
                match self.policy {
                    Policy::FailFast => Some(Outcome::Failure(err)),
                    Policy::AwaitAllOrSuccess => {
                        let first = self.first_failure.get_or_insert(err);
                        if self.answered.count_ones(..) == self.answered.len() {
                            Some(Outcome::Failure(first.clone()))
                        } else {
                            None
                        }
                    }
                }
            }
        }
    }

    /// The outcome once the deadline has passed.
    fn expire(&mut self) -> Outcome {
        match self.first_failure.take() {
            Some(err) => Outcome::Failure(err),
            None => Outcome::TimedOut,
        }
    }
}

impl Future for Resolve {
    type Output = Result<Outcome, RaceError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        assert!(!*this.done, "`Resolve` polled after completing");

        // Drain every report already queued before looking at the deadline,
        // so an answer that beat the timer is never reported as a timeout.
        // `try_recv` ignores the cooperative budget; `poll_recv` only
        // registers the waker once the queue is empty.
        let mut decided = None;
        loop {
            let report = match this.reports.try_recv() {
                Ok(report) => report,
                Err(_) => match this.reports.poll_recv(cx) {
                    Poll::Ready(Some(report)) => report,
                    Poll::Ready(None) | Poll::Pending => break,
                },
            };
            if let Some(outcome) = this.tally.record(report) {
                decided = Some(Ok(outcome));
                break;
            }
        }

        let result = match decided {
            Some(result) => result,
            None => match this.expired.poll(cx) {
                Poll::Ready(CancelReason::DeadlineExceeded) => Ok(this.tally.expire()),
                Poll::Ready(CancelReason::Cancelled) => Err(RaceError::Aborted),
                Poll::Pending => return Poll::Pending,
            },
        };

        *this.done = true;
        this.scope.cancel();
        match &result {
            Ok(outcome) => tracing::debug!(
                outcome = outcome.kind(),
                source = outcome.source_name(),
                elapsed = ?this.started.elapsed(),
                "race resolved"
            ),
            Err(err) => tracing::debug!(error = %err, "race aborted"),
        }
        Poll::Ready(result)
    }
}

#[pinned_drop]
impl PinnedDrop for Resolve {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if !*this.done && this.scope.cancel() {
            tracing::debug!("race dropped before resolving");
        }
    }
}

impl fmt::Debug for Resolve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolve")
            .field("scope", &self.scope)
            .field("policy", &self.tally.policy)
            .field("answered", &self.tally.answered.count_ones(..))
            .field("done", &self.done)
            .finish()
    }
}
