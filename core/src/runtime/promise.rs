//! Promise traits
//!
//! The promise is the per-frame object through which a coroutine talks to
//! its client: it picks the initial and final awaiters, receives yielded and
//! returned values, and absorbs exceptions nothing in the body caught.

use crate::error::Exception;
use crate::runtime::awaiter::Awaiter;

pub trait Promise: Sized {
    type Initial: Awaiter<Self, Output = ()>;
    type Final: Awaiter<Self, Output = ()>;

    fn initial_suspend(&mut self) -> Self::Initial;

    fn final_suspend(&mut self) -> Self::Final;

    /// Receives an exception no catch region handled
    ///
    /// Runs after every live local has been destroyed, before the final
    /// awaiter.
    fn unhandled_exception(&mut self, err: Exception);
}

/// Promises that accept yielded values
pub trait YieldValue<T>: Promise {
    type Awaiter: Awaiter<Self, Output = ()>;

    fn yield_value(&mut self, value: T) -> Self::Awaiter;
}

/// Promises that accept a returned value
pub trait ReturnValue<T>: Promise {
    fn return_value(&mut self, value: T);
}

/// Promises for bodies that return nothing
pub trait ReturnVoid: Promise {
    fn return_void(&mut self);
}
