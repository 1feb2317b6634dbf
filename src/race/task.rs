use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_lite::FutureExt as _;
use tokio::sync::mpsc::Sender;

use super::resolve::Report;
use crate::future::FutureExt as _;
use crate::scope::Scope;
use crate::source::{ErrorKind, Query, Source, SourceError};

/// Fetch from one source and report the result, at most once.
///
/// Returns without reporting if the scope is cancelled first, including when
/// the source itself gives up with [`ErrorKind::Cancelled`]: cancellation is
/// not an answer. A report sent after the race resolved finds the queue
/// closed and is discarded.
pub(super) async fn run_source(
    index: usize,
    source: Arc<dyn Source>,
    query: Query,
    scope: Scope,
    reports: Sender<Report>,
) {
    let fetch = {
        let source = source.clone();
        let scope = scope.clone();
        // `fetch` itself may panic before handing back a future.
        AssertUnwindSafe(async move { source.fetch(query, scope).await }).catch_unwind()
    };
    let result = match fetch.until_cancelled(&scope).await {
        Ok(Ok(Err(err))) if matches!(err.kind(), ErrorKind::Cancelled(_)) => {
            tracing::debug!(source = source.name(), error = %err, "source stopped by its scope");
            return;
        }
        Ok(Ok(result)) => result,
        Ok(Err(_)) => {
            tracing::warn!(source = source.name(), "source panicked");
            Err(SourceError::panicked(source.name()))
        }
        Err(reason) => {
            tracing::debug!(source = source.name(), %reason, "source cancelled");
            return;
        }
    };

    if reports.try_send(Report { index, result }).is_err() {
        tracing::trace!(source = source.name(), "race already resolved, discarding report");
    }
}
