//! The three-phase awaiter protocol
//!
//! A body pauses by handing an awaiter to the frame driver:
//!
//! 1. `ready()` - if true, no pause happens and the body continues in the
//!    same step
//! 2. `suspend()` - decides what happens to the frame (stay parked, continue
//!    anyway, transfer control to another frame, or abandon the frame)
//! 3. `resume()` - produces the awaited value when the body continues
//!
//! Awaiters are stored in a storage cell for as long as the frame is parked
//! on them, so the cleanup table destroys them like any other local.

use std::fmt;

use crate::error::Exception;
use crate::runtime::handle::RawHandle;

/// Decision returned by [`Awaiter::suspend`]
#[derive(Clone, Copy)]
pub enum Suspend {
    /// Stay parked; control returns to whoever resumed the frame
    Park,

    /// Do not pause after all; the body continues in the same step
    Decline,

    /// Stay parked and continue with another frame (symmetric transfer)
    Transfer(RawHandle),

    /// Stop the computation for good; the frame's live locals are torn down
    /// without running anything else in the body
    Abandon,
}

impl fmt::Debug for Suspend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Park => f.write_str("Park"),
            Self::Decline => f.write_str("Decline"),
            Self::Transfer(_) => f.write_str("Transfer"),
            Self::Abandon => f.write_str("Abandon"),
        }
    }
}

/// What an awaiter sees of the frame it suspends
pub struct Suspension<'a, P> {
    promise: &'a mut P,
    handle: Option<RawHandle>,
}

impl<'a, P> Suspension<'a, P> {
    pub(crate) fn new(promise: &'a mut P, handle: Option<RawHandle>) -> Self {
        Self { promise, handle }
    }

    pub fn promise(&mut self) -> &mut P {
        self.promise
    }

    /// Handle to the suspending frame
    ///
    /// `None` for inline frames, which cannot be resumed through an erased
    /// handle once their owner moves them.
    pub fn handle(&self) -> Option<RawHandle> {
        self.handle
    }
}

/// An operand of a pause
pub trait Awaiter<P> {
    type Output;

    fn ready(&self) -> bool;

    fn suspend(&mut self, cx: Suspension<'_, P>) -> Suspend;

    fn resume(self) -> Result<Self::Output, Exception>;
}

/// Always pauses
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspendAlways;

impl<P> Awaiter<P> for SuspendAlways {
    type Output = ();

    fn ready(&self) -> bool {
        false
    }

    fn suspend(&mut self, _cx: Suspension<'_, P>) -> Suspend {
        Suspend::Park
    }

    fn resume(self) -> Result<(), Exception> {
        Ok(())
    }
}

/// Never pauses
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspendNever;

impl<P> Awaiter<P> for SuspendNever {
    type Output = ();

    fn ready(&self) -> bool {
        true
    }

    fn suspend(&mut self, _cx: Suspension<'_, P>) -> Suspend {
        Suspend::Decline
    }

    fn resume(self) -> Result<(), Exception> {
        Ok(())
    }
}
