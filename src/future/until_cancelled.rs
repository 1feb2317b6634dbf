use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use crate::scope::{CancelReason, Cancelled};

/// Runs a future until its scope is cancelled.
///
/// This `struct` is created by the [`until_cancelled`] method on
/// [`FutureExt`]. See its documentation for more.
///
/// [`until_cancelled`]: crate::future::FutureExt::until_cancelled
/// [`FutureExt`]: crate::future::FutureExt
#[derive(Debug)]
#[pin_project::pin_project]
#[must_use = "futures do nothing unless polled or .awaited"]
pub struct UntilCancelled<F> {
    #[pin]
    future: Option<F>,
    #[pin]
    cancelled: Cancelled,
}

impl<F> UntilCancelled<F> {
    pub(super) fn new(future: F, cancelled: Cancelled) -> Self {
        Self {
            future: Some(future),
            cancelled,
        }
    }
}

impl<F: Future> Future for UntilCancelled<F> {
    type Output = Result<F::Output, CancelReason>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        let future = match this.future.as_mut().as_pin_mut() {
            Some(future) => future,
            None => panic!("future polled after completing"),
        };
        if let Poll::Ready(value) = future.poll(cx) {
            this.future.set(None);
            return Poll::Ready(Ok(value));
        }

        match this.cancelled.poll(cx) {
            Poll::Ready(reason) => {
                // Release the inner future even if this wrapper is kept.
                this.future.set(None);
                Poll::Ready(Err(reason))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
