//! Cancellation-aware futures.
//!
//! Any future can be tied to a [`Scope`] with [`FutureExt::until_cancelled`].
//! Once the scope is cancelled the inner future is dropped, which aborts
//! whatever I/O it had in flight.
//!
//! # Examples
//!
//! ```
//! use cep_race::prelude::*;
//! use cep_race::scope::{CancelReason, Scope};
//! use futures_lite::future::{block_on, pending};
//!
//! block_on(async {
//!     let scope = Scope::new();
//!     scope.cancel();
//!
//!     let res = pending::<()>().until_cancelled(&scope).await;
//!     assert_eq!(res, Err(CancelReason::Cancelled));
//! });
//! ```
//!
//! [`Scope`]: crate::scope::Scope

pub use futures_ext::FutureExt;
pub use until_cancelled::UntilCancelled;

mod futures_ext;
mod until_cancelled;
