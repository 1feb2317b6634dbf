use super::{CancelReason, Scope};

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use pin_project::{pin_project, pinned_drop};
use tokio::time::{sleep_until, Sleep};

/// A future which resolves once a [`Scope`] is cancelled.
///
/// This `struct` is created by the [`cancelled`] method on [`Scope`]. See its
/// documentation for more.
///
/// [`cancelled`]: crate::scope::Scope::cancelled
#[derive(Debug)]
#[pin_project(PinnedDrop)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Cancelled {
    scope: Scope,
    key: Option<usize>,
    #[pin]
    timer: Option<Sleep>,
}

impl Cancelled {
    pub(super) fn new(scope: Scope) -> Self {
        Self {
            scope,
            key: None,
            timer: None,
        }
    }
}

impl Future for Cancelled {
    type Output = CancelReason;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        if let Some(reason) = this.scope.reason() {
            return Poll::Ready(reason);
        }
        if let Some(reason) = this.scope.inner.register(this.key, cx.waker()) {
            return Poll::Ready(reason);
        }

        // Created on first poll: constructing a `Cancelled` needs no runtime,
        // polling one with a deadline does.
        if let Some(deadline) = this.scope.deadline() {
            if this.timer.is_none() {
                this.timer.set(Some(sleep_until(deadline)));
            }
            if let Some(timer) = this.timer.as_mut().as_pin_mut() {
                if timer.poll(cx).is_ready() {
                    this.scope.inner.cancel_with(CancelReason::DeadlineExceeded);
                    let reason = this.scope.reason();
                    return Poll::Ready(reason.unwrap_or(CancelReason::DeadlineExceeded));
                }
            }
        }

        Poll::Pending
    }
}

#[pinned_drop]
impl PinnedDrop for Cancelled {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if let Some(key) = this.key.take() {
            this.scope.inner.deregister(key);
        }
    }
}
