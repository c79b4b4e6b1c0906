//! Resumption handles
//!
//! Three kinds of handle sit on top of a frame:
//!
//! - [`RawHandle`] is a copyable, non-owning reference to any frame. Awaiters
//!   hand it around as a continuation or a transfer target. Resuming through
//!   it runs a trampoline, so chains of symmetric transfers never grow the
//!   native stack.
//! - [`BoxedHandle`] owns a heap-placed frame. It is the only party that
//!   frees frame memory: right after a resume it drove observes the frame
//!   finalized, or when it is dropped.
//! - [`InlineHandle`] owns its frame by value. Destroying it only runs the
//!   frame's cleanup; the memory goes with the handle.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use tracing::trace;

use crate::config::transfer_budget;
use crate::error::protocol_violation;
use crate::runtime::frame::{Coroutine, Frame};
use crate::runtime::promise::Promise;
use crate::runtime::state::{FrameState, Phase};

/* ===================== Erased frame interface ===================== */

pub(crate) trait ErasedFrame {
    /// Run one step; returns the frame to continue with, if any
    fn resume_erased(&mut self) -> Option<RawHandle>;

    fn is_done(&self) -> bool;
}

pub(crate) trait PromiseFrame<P>: ErasedFrame {
    fn promise(&self) -> &P;

    fn promise_mut(&mut self) -> &mut P;

    fn state(&self) -> FrameState;

    fn raw(&self) -> RawHandle;

    fn destroy(&mut self);

    fn assert_torn_down(&mut self);
}

/// Target of [`RawHandle::noop`]
struct NoopFrame;

impl ErasedFrame for NoopFrame {
    fn resume_erased(&mut self) -> Option<RawHandle> {
        None
    }

    fn is_done(&self) -> bool {
        false
    }
}

/* ===================== Raw handle ===================== */

/// Non-owning reference to a suspended frame
#[derive(Clone, Copy)]
pub struct RawHandle {
    frame: NonNull<dyn ErasedFrame>,
}

impl RawHandle {
    /// A handle whose resume does nothing
    ///
    /// Used as the transfer target when there is no frame to continue with.
    pub fn noop() -> Self {
        let frame: NonNull<dyn ErasedFrame> = NonNull::<NoopFrame>::dangling();
        Self { frame }
    }

    pub(crate) fn erase<'f>(frame: NonNull<dyn ErasedFrame + 'f>) -> Self {
        // SAFETY: only the lifetime bound changes. Every path that
        // dereferences a raw handle is unsafe and requires the frame to
        // still be alive.
        let frame = unsafe {
            std::mem::transmute::<NonNull<dyn ErasedFrame + 'f>, NonNull<dyn ErasedFrame>>(frame)
        };
        Self { frame }
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::noop()
    }

    /// Resume the frame and every frame it transfers to, until one parks
    ///
    /// # Safety
    ///
    /// The frame must be alive, suspended, and not done. Every frame reached
    /// by transfer must satisfy the same contract.
    pub unsafe fn resume(self) {
        let budget = transfer_budget();
        let mut transfers: u64 = 0;
        let mut next = self.resume_once();
        while let Some(handle) = next {
            transfers += 1;
            if let Some(limit) = budget.filter(|&limit| transfers > limit) {
                protocol_violation(format_args!(
                    "symmetric transfer chain exceeded its budget of {limit} hops"
                ));
            }
            next = handle.resume_once();
        }
        if transfers > 0 {
            trace!(transfers, "transfer chain settled");
        }
    }

    unsafe fn resume_once(self) -> Option<RawHandle> {
        (*self.frame.as_ptr()).resume_erased()
    }

    /// # Safety
    ///
    /// The frame must be alive.
    pub unsafe fn done(self) -> bool {
        (*self.frame.as_ptr()).is_done()
    }
}

impl PartialEq for RawHandle {
    fn eq(&self, other: &Self) -> bool {
        self.frame.cast::<()>() == other.frame.cast::<()>()
    }
}

impl Eq for RawHandle {}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            f.write_str("RawHandle(noop)")
        } else {
            write!(f, "RawHandle({:p})", self.frame.cast::<()>())
        }
    }
}

/* ===================== Owning handles ===================== */

/// Common surface of the owning handles, used by client abstractions
pub trait FrameHandle {
    type Promise;

    fn is_null(&self) -> bool {
        false
    }

    /// Resume the frame once (plus any transfers it makes)
    ///
    /// The frame must be suspended and not done.
    fn resume(&mut self);

    /// True for a finished frame, and for a null handle
    fn done(&self) -> bool;

    fn promise(&self) -> &Self::Promise;

    fn promise_mut(&mut self) -> &mut Self::Promise;

    /// Header snapshot; `None` once the frame memory is gone
    fn state(&self) -> Option<FrameState>;
}

/// Single owner of a heap-placed frame
pub struct BoxedHandle<'a, P> {
    frame: Option<NonNull<dyn PromiseFrame<P> + 'a>>,
    _owns: PhantomData<Box<dyn PromiseFrame<P> + 'a>>,
}

impl<'a, P> BoxedHandle<'a, P> {
    pub const fn null() -> Self {
        Self {
            frame: None,
            _owns: PhantomData,
        }
    }

    pub(crate) fn ramp<B>(frame: Frame<B>) -> Self
    where
        P: Promise,
        B: Coroutine<Promise = P> + 'a,
    {
        let placed = NonNull::from(Box::leak(Box::new(frame)));
        let erased: NonNull<dyn ErasedFrame + 'a> = placed;
        let this = RawHandle::erase(erased);

        // Owned before the first step, so unwinding out of `begin` frees it
        let owned: NonNull<dyn PromiseFrame<P> + 'a> = placed;
        let mut handle = Self {
            frame: Some(owned),
            _owns: PhantomData,
        };

        // SAFETY: `placed` was just leaked from a box and the handle does
        // not touch it until the ramp returns.
        let next = unsafe {
            let frame = &mut *placed.as_ptr();
            frame.attach(this);
            frame.begin()
        };
        if let Some(next) = next {
            // SAFETY: transfer targets come from awaiters, which only hand
            // out handles to live suspended frames.
            unsafe { next.resume() };
        }

        handle.release_if_finalized();
        handle
    }

    /// Raw handle to the frame, for use as a continuation
    pub fn raw(&self) -> Option<RawHandle> {
        self.frame.map(|frame| unsafe { frame.as_ref() }.raw())
    }

    /// Tear the frame down and free it
    pub fn destroy(self) {
        drop(self)
    }

    fn release_if_finalized(&mut self) {
        if let Some(frame) = self.frame {
            if unsafe { frame.as_ref() }.state().phase == Phase::Finalized {
                self.release();
            }
        }
    }

    fn release(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };
        // SAFETY: the pointer came from `Box::leak` in `ramp` and this
        // handle is its only owner.
        let mut frame = unsafe { Box::from_raw(frame.as_ptr()) };
        if !frame.state().is_torn_down() {
            frame.destroy();
        }
        frame.assert_torn_down();
        trace!("frame released");
    }
}

impl<P> FrameHandle for BoxedHandle<'_, P> {
    type Promise = P;

    fn is_null(&self) -> bool {
        self.frame.is_none()
    }

    fn resume(&mut self) {
        let Some(frame) = self.frame else {
            protocol_violation("resume() on a null handle");
        };
        let raw = unsafe { frame.as_ref() }.raw();
        // SAFETY: this handle owns the frame, so it is alive. The frame
        // itself rejects a resume after done.
        unsafe { raw.resume() };
        self.release_if_finalized();
    }

    fn done(&self) -> bool {
        self.frame
            .map_or(true, |frame| unsafe { frame.as_ref() }.state().is_done())
    }

    fn promise(&self) -> &P {
        match self.frame {
            Some(frame) => unsafe { frame.as_ref() }.promise(),
            None => protocol_violation("promise() on a null handle"),
        }
    }

    fn promise_mut(&mut self) -> &mut P {
        match self.frame {
            Some(mut frame) => unsafe { frame.as_mut() }.promise_mut(),
            None => protocol_violation("promise_mut() on a null handle"),
        }
    }

    fn state(&self) -> Option<FrameState> {
        self.frame.map(|frame| unsafe { frame.as_ref() }.state())
    }
}

impl<P> Default for BoxedHandle<'_, P> {
    fn default() -> Self {
        Self::null()
    }
}

impl<P> Drop for BoxedHandle<'_, P> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<P> fmt::Debug for BoxedHandle<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// Owner of a frame stored in place
pub struct InlineHandle<B: Coroutine> {
    frame: Frame<B>,
}

impl<B: Coroutine> InlineHandle<B> {
    pub(crate) fn ramp(frame: Frame<B>) -> Self {
        let mut handle = Self { frame };
        if let Some(next) = handle.frame.begin() {
            // SAFETY: transfer targets come from awaiters, which only hand
            // out handles to live suspended frames.
            unsafe { next.resume() };
        }
        handle
    }

    /// Run the frame's cleanup; memory goes with the handle
    pub fn destroy(self) {
        drop(self)
    }
}

impl<B: Coroutine> FrameHandle for InlineHandle<B> {
    type Promise = B::Promise;

    fn resume(&mut self) {
        if let Some(next) = self.frame.resume_step() {
            // SAFETY: as in `ramp`.
            unsafe { next.resume() };
        }
    }

    fn done(&self) -> bool {
        self.frame.state().is_done()
    }

    fn promise(&self) -> &B::Promise {
        self.frame.promise()
    }

    fn promise_mut(&mut self) -> &mut B::Promise {
        self.frame.promise_mut()
    }

    fn state(&self) -> Option<FrameState> {
        Some(self.frame.state())
    }
}

impl<B: Coroutine> Drop for InlineHandle<B> {
    fn drop(&mut self) {
        if !self.frame.state().is_torn_down() {
            self.frame.destroy();
        }
        self.frame.assert_torn_down();
    }
}

impl<B: Coroutine> fmt::Debug for InlineHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineHandle")
            .field("frame", &B::NAME)
            .field("state", &self.frame.state())
            .finish()
    }
}
