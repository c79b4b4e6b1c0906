//! Lazy tasks with symmetric transfer
//!
//! A task frame is boxed, starts parked, and produces one result. Awaiting a
//! task from another boxed frame records the awaiting frame as the task's
//! continuation and transfers straight into the task; when the task finishes,
//! its final awaiter transfers back to the continuation. Both hops go through
//! the [`RawHandle`] trampoline, so arbitrarily long chains of awaits run in
//! constant native stack.

use std::fmt;

use tracing::trace;

use crate::error::{protocol_violation, Exception, TaskError};
use crate::runtime::{
    ramp, Awaiter, BoxedHandle, Coroutine, FrameHandle, Heap, Promise, RawHandle, ResultSink,
    ReturnValue, ReturnVoid, Suspend, SuspendAlways, Suspension,
};

/* ===================== Promise ===================== */

pub struct TaskPromise<T> {
    sink: ResultSink<T>,
    continuation: Option<RawHandle>,
}

impl<T> TaskPromise<T> {
    pub const fn new() -> Self {
        Self {
            sink: ResultSink::new(),
            continuation: None,
        }
    }

    pub fn continuation(&self) -> Option<RawHandle> {
        self.continuation
    }
}

impl<T> Default for TaskPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise for TaskPromise<T> {
    type Initial = SuspendAlways;
    type Final = FinalAwaiter;

    fn initial_suspend(&mut self) -> SuspendAlways {
        SuspendAlways
    }

    fn final_suspend(&mut self) -> FinalAwaiter {
        FinalAwaiter
    }

    fn unhandled_exception(&mut self, err: Exception) {
        self.sink.fail(err);
    }
}

impl<T> ReturnValue<T> for TaskPromise<T> {
    fn return_value(&mut self, value: T) {
        self.sink.write(value);
    }
}

impl ReturnVoid for TaskPromise<()> {
    fn return_void(&mut self) {
        self.sink.write(());
    }
}

/// Parks a finished task and hands control to its continuation
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalAwaiter;

impl<T> Awaiter<TaskPromise<T>> for FinalAwaiter {
    type Output = ();

    fn ready(&self) -> bool {
        false
    }

    fn suspend(&mut self, mut cx: Suspension<'_, TaskPromise<T>>) -> Suspend {
        let next = cx.promise().continuation.take().unwrap_or_else(RawHandle::noop);
        Suspend::Transfer(next)
    }

    fn resume(self) -> Result<(), Exception> {
        Ok(())
    }
}

/* ===================== Task ===================== */

/// Owner of a lazily started computation producing a `T`
pub struct Task<T: 'static> {
    handle: BoxedHandle<'static, TaskPromise<T>>,
}

impl<T: 'static> Task<T> {
    /// Ramp `body` into a parked task
    pub fn new<B>(body: B) -> Self
    where
        B: Coroutine<Promise = TaskPromise<T>> + 'static,
    {
        Self {
            handle: ramp::<Heap, B>(body, TaskPromise::new()),
        }
    }

    /// Run the task until it parks or finishes
    ///
    /// Tasks the body awaits run as part of this call.
    pub fn start(&mut self) {
        if self.handle.done() {
            protocol_violation("start() on a finished task");
        }
        self.handle.resume();
    }

    pub fn is_done(&self) -> bool {
        self.handle.done()
    }

    /// Move the result out
    ///
    /// Returns the task's exception if it failed, [`TaskError::Pending`]
    /// before it finished and [`TaskError::Taken`] on a second call.
    pub fn take_result(&mut self) -> Result<T, Exception> {
        if !self.is_done() {
            return Err(TaskError::Pending.into());
        }
        match self.handle.promise_mut().sink.take() {
            Some(outcome) => outcome,
            None => Err(TaskError::Taken.into()),
        }
    }

    /// Start the task and wait for its result in place
    pub fn run(mut self) -> Result<T, Exception> {
        self.start();
        self.take_result()
    }

    pub fn into_awaiter(self) -> TaskAwaiter<T> {
        TaskAwaiter { task: self }
    }

    fn raw(&self) -> RawHandle {
        match self.handle.raw() {
            Some(raw) => raw,
            None => protocol_violation("task frame already released"),
        }
    }
}

impl<T: 'static> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("handle", &self.handle).finish()
    }
}

/// Pauses the awaiting frame until a task finishes
///
/// Owns the awaited task, so the task's frame lives exactly as long as the
/// awaiting frame is parked on it.
pub struct TaskAwaiter<T: 'static> {
    task: Task<T>,
}

impl<P, T: 'static> Awaiter<P> for TaskAwaiter<T> {
    type Output = T;

    fn ready(&self) -> bool {
        self.task.is_done()
    }

    fn suspend(&mut self, cx: Suspension<'_, P>) -> Suspend {
        match cx.handle() {
            Some(caller) => {
                self.task.handle.promise_mut().continuation = Some(caller);
                trace!("transferring into awaited task");
                Suspend::Transfer(self.task.raw())
            }
            None => {
                // An inline caller has no stable address to resume, so the
                // task runs to completion right here.
                self.task.start();
                if self.task.is_done() {
                    Suspend::Decline
                } else {
                    Suspend::Park
                }
            }
        }
    }

    fn resume(mut self) -> Result<T, Exception> {
        self.task.take_result()
    }
}
