//! Short-circuiting optional computations
//!
//! A maybe frame runs eagerly to completion inside its ramp. Awaiting a
//! present value continues without pausing; awaiting an absent one writes
//! `None` to the result slot and abandons the frame, tearing down whatever is
//! live at that point. Exceptions nothing in the body catches also turn into
//! `None`.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::error::{protocol_violation, Exception};
use crate::runtime::{
    ramp, Awaiter, Coroutine, Placement, Promise, ReturnValue, Suspend, SuspendNever, Suspension,
};

/* ===================== Result slot ===================== */

/// Where a maybe computation leaves its outcome
///
/// Shared between the caller and the promise, because a boxed frame may be
/// freed before its ramp returns.
pub struct ReturnSlot<T> {
    outcome: Rc<Cell<Option<Option<T>>>>,
}

impl<T> ReturnSlot<T> {
    pub fn new() -> Self {
        Self {
            outcome: Rc::new(Cell::new(None)),
        }
    }

    fn set(&self, value: Option<T>) {
        let previous = self.outcome.replace(Some(value));
        debug_assert!(previous.is_none(), "maybe result written twice");
    }

    /// The outcome, once written
    pub fn take(&self) -> Option<Option<T>> {
        self.outcome.take()
    }
}

impl<T> Clone for ReturnSlot<T> {
    fn clone(&self) -> Self {
        Self {
            outcome: Rc::clone(&self.outcome),
        }
    }
}

impl<T> Default for ReturnSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/* ===================== Promise ===================== */

pub struct MaybePromise<T> {
    slot: ReturnSlot<T>,
}

impl<T> MaybePromise<T> {
    pub fn new(slot: ReturnSlot<T>) -> Self {
        Self { slot }
    }
}

impl<T> Promise for MaybePromise<T> {
    type Initial = SuspendNever;
    type Final = SuspendNever;

    fn initial_suspend(&mut self) -> SuspendNever {
        SuspendNever
    }

    fn final_suspend(&mut self) -> SuspendNever {
        SuspendNever
    }

    fn unhandled_exception(&mut self, err: Exception) {
        debug!(error = %err, "maybe computation failed, producing None");
        self.slot.set(None);
    }
}

impl<T> ReturnValue<T> for MaybePromise<T> {
    fn return_value(&mut self, value: T) {
        self.slot.set(Some(value));
    }
}

/* ===================== Awaiter ===================== */

/// Unwraps a present value or abandons the computation
#[derive(Debug)]
pub struct MaybeAwaiter<T> {
    value: Option<T>,
}

/// Await an optional value inside a maybe computation
pub fn maybe<T>(value: Option<T>) -> MaybeAwaiter<T> {
    MaybeAwaiter { value }
}

impl<T, U> Awaiter<MaybePromise<U>> for MaybeAwaiter<T> {
    type Output = T;

    fn ready(&self) -> bool {
        self.value.is_some()
    }

    fn suspend(&mut self, mut cx: Suspension<'_, MaybePromise<U>>) -> Suspend {
        cx.promise().slot.set(None);
        Suspend::Abandon
    }

    fn resume(self) -> Result<T, Exception> {
        match self.value {
            Some(value) => Ok(value),
            None => protocol_violation("resumed past an absent value"),
        }
    }
}

/* ===================== Evaluation ===================== */

/// Run a maybe computation to completion
pub fn evaluate<'a, S, B, T>(body: B) -> Option<T>
where
    S: Placement,
    B: Coroutine<Promise = MaybePromise<T>> + 'a,
{
    let slot = ReturnSlot::new();
    let handle = ramp::<S, B>(body, MaybePromise::new(slot.clone()));
    drop(handle);
    match slot.take() {
        Some(outcome) => outcome,
        None => protocol_violation("maybe computation finished without a result"),
    }
}
