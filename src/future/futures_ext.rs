use core::future::Future;

use super::UntilCancelled;
use crate::scope::Scope;

/// An extension trait for the `Future` trait.
pub trait FutureExt: Future {
    /// Run the future until it completes or `scope` is cancelled, whichever
    /// happens first.
    ///
    /// Resolves to `Ok(output)` when the future completes, or to
    /// `Err(reason)` once the scope is cancelled. A future that completes in
    /// the same poll in which cancellation is observed still yields its
    /// output.
    ///
    /// # Example
    ///
    /// ```
    /// use cep_race::prelude::*;
    /// use cep_race::scope::Scope;
    /// use futures_lite::future::block_on;
    ///
    /// block_on(async {
    ///     let scope = Scope::new();
    ///     let res = async { "meow" }.until_cancelled(&scope).await;
    ///     assert_eq!(res, Ok("meow"));
    /// });
    /// ```
    fn until_cancelled(self, scope: &Scope) -> UntilCancelled<Self>
    where
        Self: Sized,
    {
        UntilCancelled::new(self, scope.cancelled())
    }
}

impl<F> FutureExt for F where F: Future {}
