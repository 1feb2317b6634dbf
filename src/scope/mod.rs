//! Cancellation scopes.
//!
//! A [`Scope`] is a cheaply clonable handle to a shared cancellation signal.
//! Scopes form a tree: a child derived with [`Scope::child`] or
//! [`Scope::with_timeout`] is cancelled whenever its parent is, but cancelling
//! a child never reaches back up to its parent.
//!
//! A scope is cancelled either explicitly through [`Scope::cancel`] or because
//! its deadline passed. Both are observable synchronously through
//! [`Scope::reason`] and asynchronously through [`Scope::cancelled`].
//!
//! # Examples
//!
//! ```
//! use cep_race::scope::{CancelReason, Scope};
//!
//! let root = Scope::new();
//! let child = root.child();
//!
//! assert!(root.cancel());
//! assert_eq!(child.reason(), Some(CancelReason::Cancelled));
//!
//! // Cancelling twice is a no-op.
//! assert!(!root.cancel());
//! ```

use core::fmt;
use core::task::Waker;
use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use slab::Slab;
use smallvec::SmallVec;
use tokio::time::Instant;

pub use cancelled::Cancelled;

mod cancelled;

/// Why a scope was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The scope, or one of its ancestors, was cancelled explicitly.
    Cancelled,
    /// The scope's deadline, or one of its ancestors' deadlines, elapsed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("cancelled"),
            CancelReason::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// A propagating cancellation signal with an optional deadline.
///
/// Cloning a `Scope` does not create a new scope: all clones observe and
/// trigger the same signal.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Inner>,
}

struct Inner {
    deadline: Option<Instant>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    reason: Option<CancelReason>,
    wakers: Slab<Waker>,
    children: SmallVec<[Weak<Inner>; 2]>,
}

impl Scope {
    /// Create a new root scope without a deadline.
    pub fn new() -> Self {
        Self::from_parts(None, None)
    }

    /// Derive a child scope which inherits this scope's deadline.
    pub fn child(&self) -> Self {
        Self::derive(self, self.inner.deadline)
    }

    /// Derive a child scope which expires `timeout` from now, or at this
    /// scope's deadline if that comes first.
    ///
    /// A timeout too large to represent as an instant adds no deadline of its
    /// own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derive a child scope which expires at `deadline`, or at this scope's
    /// deadline if that comes first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.inner.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self::derive(self, Some(deadline))
    }

    /// The instant at which this scope expires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left until the deadline. Returns `None` for scopes without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Cancel this scope and every scope derived from it.
    ///
    /// Returns `true` if this call cancelled the scope, `false` if it had
    /// already been cancelled.
    pub fn cancel(&self) -> bool {
        self.inner.cancel_with(CancelReason::Cancelled)
    }

    /// Returns `true` once the scope has been cancelled or has expired.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// The reason this scope was cancelled, or `None` while it is live.
    ///
    /// An expired deadline is observed here even if no timer has fired yet.
    pub fn reason(&self) -> Option<CancelReason> {
        if let Some(reason) = self.inner.lock().reason {
            return Some(reason);
        }
        if self.inner.is_expired() {
            self.inner.cancel_with(CancelReason::DeadlineExceeded);
            return self.inner.lock().reason;
        }
        None
    }

    /// Wait until this scope is cancelled.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled::new(self.clone())
    }

    /// Returns `true` if both handles refer to the same scope.
    pub fn same_scope(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn from_parts(deadline: Option<Instant>, reason: Option<CancelReason>) -> Self {
        let state = State {
            reason,
            ..State::default()
        };
        Self {
            inner: Arc::new(Inner {
                deadline,
                state: Mutex::new(state),
            }),
        }
    }

    fn derive(parent: &Scope, deadline: Option<Instant>) -> Self {
        let mut state = parent.inner.lock();
        let child = Self::from_parts(deadline, state.reason);
        if state.reason.is_none() {
            state.children.retain(|child| child.strong_count() > 0);
            state.children.push(Arc::downgrade(&child.inner));
        }
        child
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("deadline", &self.inner.deadline)
            .field("reason", &self.inner.lock().reason)
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Transition to cancelled, then wake waiters and cancel children outside
    /// of the lock.
    fn cancel_with(&self, reason: CancelReason) -> bool {
        let (wakers, children) = {
            let mut state = self.lock();
            if state.reason.is_some() {
                return false;
            }
            state.reason = Some(reason);
            let wakers: Vec<Waker> = state.wakers.drain().collect();
            (wakers, core::mem::take(&mut state.children))
        };

        for waker in wakers {
            waker.wake();
        }
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel_with(reason);
        }
        true
    }

    /// Register `waker` under `key`, unless the scope is already cancelled.
    fn register(&self, key: &mut Option<usize>, waker: &Waker) -> Option<CancelReason> {
        let mut state = self.lock();
        if let Some(reason) = state.reason {
            return Some(reason);
        }
        match key.and_then(|key| state.wakers.get_mut(key)) {
            Some(existing) => {
                if !existing.will_wake(waker) {
                    existing.clone_from(waker);
                }
            }
            None => *key = Some(state.wakers.insert(waker.clone())),
        }
        None
    }

    fn deregister(&self, key: usize) {
        let mut state = self.lock();
        if state.wakers.contains(key) {
            state.wakers.remove(key);
        }
    }
}
