//! Frames and the step-function driver
//!
//! A coroutine body is lowered by hand into a [`Coroutine`]: its locals become
//! storage cells, every pause gets a [`SuspendIndex`], and a single `step`
//! function dispatches on the current index, runs straight-line code until
//! the next pause, and reports what happened. The [`Frame`] wraps a body with
//! its promise, its header state, and the initial/final awaiters, and drives
//! the protocol around the step function:
//!
//! 1. Ramp: place the frame, await the promise's initial awaiter at index 0
//! 2. Resume: re-enter the step function at the recorded index
//! 3. Exceptions: walk catch regions innermost first, destroying each
//!    region's scoped locals before its handler runs; with no handler left,
//!    destroy everything and hand the exception to the promise
//! 4. Completion: run the cleanup table for the return index, mark done,
//!    await the final awaiter, finalize if it does not pause
//! 5. Destroy: run the cleanup table for wherever the frame is parked
//!
//! The cleanup table (`Coroutine::live_at`) is data: for each suspension
//! index it lists exactly the locals that are live while parked there.

use tracing::{debug, trace};

use crate::error::{protocol_violation, Exception};
use crate::runtime::awaiter::{Awaiter, Suspend, Suspension};
use crate::runtime::cell::{Locals, Slot, StorageCell};
use crate::runtime::handle::{
    BoxedHandle, ErasedFrame, FrameHandle, InlineHandle, PromiseFrame, RawHandle,
};
use crate::runtime::promise::{Promise, ReturnValue, ReturnVoid, YieldValue};
use crate::runtime::state::{FrameState, Phase, Region, RegionId, SuspendIndex};

/* ===================== Body interface ===================== */

/// Outcome of one pass through a step function
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Parked at the recorded index
    Park,

    /// Parked, continue with another frame
    Transfer(RawHandle),

    /// The computation was cancelled by an awaiter
    Abandon,

    /// The body returned; the index names its return point
    Return(SuspendIndex),
}

/// What a catch handler decided
#[derive(Debug)]
pub enum Catch {
    /// Handled; re-enter the step function at this index
    Continue(SuspendIndex),

    /// Handled, and the handler itself paused or returned
    Pause(Step),

    /// Not handled here; try the enclosing region
    Rethrow(Exception),
}

/// A hand-lowered coroutine body
pub trait Coroutine: Sized {
    type Promise: Promise;
    type Local: Locals;

    /// Name used in diagnostics
    const NAME: &'static str;

    /// Catch regions, indexed by [`RegionId`]
    const REGIONS: &'static [Region<Self::Local>] = &[];

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception>;

    /// Locals live while parked at `index`
    fn live_at(index: SuspendIndex) -> &'static [Self::Local];

    fn slot(&mut self, local: Self::Local) -> &mut dyn Slot;

    /// Handler for `region`, called after its scoped locals are destroyed
    /// and the frame's region has been reset to the parent
    fn catch(
        &mut self,
        region: RegionId,
        err: Exception,
        cx: &mut Cx<'_, Self::Promise>,
    ) -> Catch {
        let _ = (region, cx);
        Catch::Rethrow(err)
    }
}

/* ===================== Step context ===================== */

/// The frame as seen from inside a step function
pub struct Cx<'f, P> {
    state: &'f mut FrameState,
    promise: &'f mut P,
    handle: Option<RawHandle>,
}

impl<'f, P: Promise> Cx<'f, P> {
    fn new(state: &'f mut FrameState, promise: &'f mut P, handle: Option<RawHandle>) -> Self {
        Self {
            state,
            promise,
            handle,
        }
    }

    pub fn index(&self) -> SuspendIndex {
        self.state.index
    }

    /// Move to another index without pausing
    pub fn goto(&mut self, index: SuspendIndex) {
        self.state.index = index;
    }

    pub fn promise(&mut self) -> &mut P {
        self.promise
    }

    pub fn handle(&self) -> Option<RawHandle> {
        self.handle
    }

    pub fn region(&self) -> Option<RegionId> {
        self.state.region
    }

    pub fn enter_region(&mut self, region: RegionId) {
        self.state.region = Some(region);
    }

    /// Leave the innermost region, restoring its parent
    pub fn leave_region(&mut self, parent: Option<RegionId>) {
        self.state.region = parent;
    }

    /// Pause on `awaiter`, stored in `cell`, recording `at` as the resume point
    ///
    /// Returns `None` when the awaiter does not pause; the body then resumes
    /// it immediately (usually by looping back into its `at` arm).
    pub fn await_on<A>(
        &mut self,
        cell: &mut StorageCell<A>,
        awaiter: A,
        at: SuspendIndex,
    ) -> Option<Step>
    where
        A: Awaiter<P>,
    {
        let awaiter = cell.construct(awaiter);
        self.state.index = at;
        if awaiter.ready() {
            return None;
        }
        let decision = awaiter.suspend(Suspension::new(self.promise, self.handle));
        match decision {
            Suspend::Park => Some(Step::Park),
            Suspend::Decline => None,
            Suspend::Transfer(next) => Some(Step::Transfer(next)),
            Suspend::Abandon => Some(Step::Abandon),
        }
    }

    /// Take the awaiter out of `cell` and produce its value
    pub fn resume_from<A>(&mut self, cell: &mut StorageCell<A>) -> Result<A::Output, Exception>
    where
        A: Awaiter<P>,
    {
        cell.take().resume()
    }

    pub fn yield_value<T>(
        &mut self,
        cell: &mut StorageCell<<P as YieldValue<T>>::Awaiter>,
        value: T,
        at: SuspendIndex,
    ) -> Option<Step>
    where
        P: YieldValue<T>,
    {
        let awaiter = self.promise.yield_value(value);
        self.await_on(cell, awaiter, at)
    }

    pub fn return_value<T>(&mut self, value: T, at: SuspendIndex) -> Step
    where
        P: ReturnValue<T>,
    {
        self.promise.return_value(value);
        Step::Return(at)
    }

    pub fn return_void(&mut self, at: SuspendIndex) -> Step
    where
        P: ReturnVoid,
    {
        self.promise.return_void();
        Step::Return(at)
    }
}

/* ===================== Frame ===================== */

enum Dispatch {
    Reenter,
    Pause(Step),
    Finished(Option<RawHandle>),
}

/// A coroutine body together with everything the driver keeps for it
pub struct Frame<B: Coroutine> {
    state: FrameState,
    promise: B::Promise,
    initial: StorageCell<<B::Promise as Promise>::Initial>,
    last: StorageCell<<B::Promise as Promise>::Final>,
    this: Option<RawHandle>,
    body: B,
}

impl<B: Coroutine> Frame<B> {
    pub(crate) fn new(body: B, promise: B::Promise) -> Self {
        Self {
            state: FrameState::new(),
            promise,
            initial: StorageCell::new(),
            last: StorageCell::new(),
            this: None,
            body,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn promise(&self) -> &B::Promise {
        &self.promise
    }

    pub fn promise_mut(&mut self) -> &mut B::Promise {
        &mut self.promise
    }

    pub(crate) fn attach(&mut self, this: RawHandle) {
        self.this = Some(this);
    }

    /// Await the initial awaiter; the frame ends up parked at index 0 or
    /// running its first step
    pub(crate) fn begin(&mut self) -> Option<RawHandle> {
        trace!(frame = B::NAME, "ramp");
        let initial = self.promise.initial_suspend();
        let initial = self.initial.construct(initial);
        self.state.index = SuspendIndex::NOT_STARTED;
        if !initial.ready() {
            let decision = initial.suspend(Suspension::new(&mut self.promise, self.this));
            match decision {
                Suspend::Park => return self.park(None),
                Suspend::Transfer(next) => return self.park(Some(next)),
                Suspend::Abandon => {
                    self.abandon();
                    return None;
                }
                Suspend::Decline => {}
            }
        }
        self.resume_step()
    }

    /// Re-enter the body at the recorded index
    pub(crate) fn resume_step(&mut self) -> Option<RawHandle> {
        if self.state.phase != Phase::Suspended {
            protocol_violation(format_args!(
                "resume() on {} while {:?}",
                B::NAME,
                self.state.phase
            ));
        }
        trace!(frame = B::NAME, index = self.state.index.get(), "resume");
        if self.initial.is_live() {
            if let Err(err) = self.initial.take().resume() {
                return match self.dispatch(err) {
                    Dispatch::Reenter => self.run(),
                    Dispatch::Pause(step) => self.settle(step),
                    Dispatch::Finished(next) => next,
                };
            }
        }
        self.run()
    }

    fn run(&mut self) -> Option<RawHandle> {
        loop {
            self.state.phase = Phase::Running;
            let outcome = self.body.step(&mut Cx::new(
                &mut self.state,
                &mut self.promise,
                self.this,
            ));
            let step = match outcome {
                Ok(step) => step,
                Err(err) => match self.dispatch(err) {
                    Dispatch::Reenter => continue,
                    Dispatch::Pause(step) => step,
                    Dispatch::Finished(next) => return next,
                },
            };
            return self.settle(step);
        }
    }

    fn settle(&mut self, step: Step) -> Option<RawHandle> {
        match step {
            Step::Park => self.park(None),
            Step::Transfer(next) => self.park(Some(next)),
            Step::Abandon => {
                self.abandon();
                None
            }
            Step::Return(at) => self.complete(at),
        }
    }

    fn park(&mut self, next: Option<RawHandle>) -> Option<RawHandle> {
        self.state.phase = Phase::Suspended;
        trace!(
            frame = B::NAME,
            index = self.state.index.get(),
            transfer = next.is_some(),
            "suspended"
        );
        next
    }

    /* ===================== Exceptions ===================== */

    fn dispatch(&mut self, mut err: Exception) -> Dispatch {
        loop {
            let Some(region) = self.state.region else {
                return Dispatch::Finished(self.unhandled(err));
            };
            let Some(table) = B::REGIONS.get(region.index()) else {
                protocol_violation(format_args!("{} has no {region}", B::NAME));
            };
            debug!(frame = B::NAME, region = region.get(), error = %err, "dispatching exception");

            for &local in table.scoped.iter().rev() {
                let slot = self.body.slot(local);
                if slot.is_live() {
                    slot.destroy();
                }
            }
            self.state.region = table.parent;

            let caught = self.body.catch(
                region,
                err,
                &mut Cx::new(&mut self.state, &mut self.promise, self.this),
            );
            match caught {
                Catch::Continue(at) => {
                    self.state.index = at;
                    return Dispatch::Reenter;
                }
                Catch::Pause(step) => return Dispatch::Pause(step),
                Catch::Rethrow(next) => err = next,
            }
        }
    }

    fn unhandled(&mut self, err: Exception) -> Option<RawHandle> {
        debug!(frame = B::NAME, error = %err, "unhandled exception");
        self.destroy_live_locals();
        self.state.region = None;
        self.promise.unhandled_exception(err);
        self.finish()
    }

    /* ===================== Completion ===================== */

    fn complete(&mut self, at: SuspendIndex) -> Option<RawHandle> {
        self.cleanup(at);
        self.state.index = at;
        self.state.region = None;
        trace!(frame = B::NAME, index = at.get(), "returned");
        self.finish()
    }

    fn finish(&mut self) -> Option<RawHandle> {
        self.state.phase = Phase::FinalSuspended;
        let last = self.promise.final_suspend();
        let last = self.last.construct(last);
        if !last.ready() {
            let decision = last.suspend(Suspension::new(&mut self.promise, self.this));
            match decision {
                Suspend::Park => return None,
                Suspend::Transfer(next) => {
                    trace!(frame = B::NAME, "final transfer");
                    return Some(next);
                }
                Suspend::Decline | Suspend::Abandon => {}
            }
        }
        self.finalize();
        None
    }

    fn finalize(&mut self) {
        if let Err(err) = self.last.take().resume() {
            protocol_violation(format_args!("final awaiter of {} failed: {err}", B::NAME));
        }
        self.state.phase = Phase::Finalized;
        trace!(frame = B::NAME, "finalized");
    }

    fn abandon(&mut self) {
        debug!(frame = B::NAME, index = self.state.index.get(), "abandoned");
        self.cleanup(self.state.index);
        self.state.region = None;
        self.state.phase = Phase::Finalized;
    }

    /* ===================== Teardown ===================== */

    /// Destroy exactly the locals the cleanup table lists for `at`
    fn cleanup(&mut self, at: SuspendIndex) {
        if at == SuspendIndex::NOT_STARTED && self.initial.is_live() {
            self.initial.destroy();
        }
        for &local in B::live_at(at) {
            self.body.slot(local).destroy();
        }
    }

    /// Destroy every local still live, wherever the body stopped
    fn destroy_live_locals(&mut self) {
        for &local in B::Local::ALL.iter().rev() {
            let slot = self.body.slot(local);
            if slot.is_live() {
                slot.destroy();
            }
        }
        if self.initial.is_live() {
            self.initial.destroy();
        }
    }

    pub(crate) fn destroy(&mut self) {
        trace!(frame = B::NAME, index = self.state.index.get(), phase = ?self.state.phase, "destroy");
        match self.state.phase {
            Phase::Suspended => self.cleanup(self.state.index),
            Phase::FinalSuspended if self.last.is_live() => {
                if let Err(err) = self.last.take().resume() {
                    debug!(frame = B::NAME, error = %err, "final awaiter failed during destroy");
                }
            }
            Phase::FinalSuspended => {}
            Phase::Finalized => {}
            // The body panicked mid-step; no index describes what is live
            Phase::Running if std::thread::panicking() => {
                debug!(frame = B::NAME, "destroyed while unwinding");
                self.destroy_live_locals();
                if self.last.is_live() {
                    self.last.destroy();
                }
            }
            Phase::Running => protocol_violation(format_args!("destroy() on running {}", B::NAME)),
            Phase::Destroyed => protocol_violation(format_args!("{} destroyed twice", B::NAME)),
        }
        self.state.phase = Phase::Destroyed;
    }

    /// Verify teardown left no local alive
    pub(crate) fn assert_torn_down(&mut self) {
        if !cfg!(debug_assertions) || std::thread::panicking() {
            return;
        }
        for &local in B::Local::ALL {
            if self.body.slot(local).is_live() {
                protocol_violation(format_args!("{} leaked local {local:?}", B::NAME));
            }
        }
        if self.initial.is_live() || self.last.is_live() {
            protocol_violation(format_args!("{} leaked an awaiter", B::NAME));
        }
    }
}

impl<B: Coroutine> ErasedFrame for Frame<B> {
    fn resume_erased(&mut self) -> Option<RawHandle> {
        self.resume_step()
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }
}

impl<B: Coroutine> PromiseFrame<B::Promise> for Frame<B> {
    fn promise(&self) -> &B::Promise {
        &self.promise
    }

    fn promise_mut(&mut self) -> &mut B::Promise {
        &mut self.promise
    }

    fn state(&self) -> FrameState {
        self.state
    }

    fn raw(&self) -> RawHandle {
        match self.this {
            Some(this) => this,
            None => protocol_violation(format_args!("{} is not addressable", B::NAME)),
        }
    }

    fn destroy(&mut self) {
        Frame::destroy(self)
    }

    fn assert_torn_down(&mut self) {
        Frame::assert_torn_down(self)
    }
}

/* ===================== Placement ===================== */

/// Where a frame lives, and which owning handle it comes back in
pub trait Placement {
    type Handle<'a, B: Coroutine + 'a>: FrameHandle<Promise = B::Promise>;

    fn ramp<'a, B: Coroutine + 'a>(body: B, promise: B::Promise) -> Self::Handle<'a, B>;
}

/// Frames boxed on the heap, addressable through [`RawHandle`]
#[derive(Debug, Clone, Copy)]
pub struct Heap;

/// Frames stored by value inside their handle
#[derive(Debug, Clone, Copy)]
pub struct Inline;

impl Placement for Heap {
    type Handle<'a, B: Coroutine + 'a> = BoxedHandle<'a, B::Promise>;

    fn ramp<'a, B: Coroutine + 'a>(body: B, promise: B::Promise) -> BoxedHandle<'a, B::Promise> {
        BoxedHandle::ramp(Frame::new(body, promise))
    }
}

impl Placement for Inline {
    type Handle<'a, B: Coroutine + 'a> = InlineHandle<B>;

    fn ramp<'a, B: Coroutine + 'a>(body: B, promise: B::Promise) -> InlineHandle<B> {
        InlineHandle::ramp(Frame::new(body, promise))
    }
}

/// Create a frame for `body`, place it, and run it up to its first pause
pub fn ramp<'a, S, B>(body: B, promise: B::Promise) -> S::Handle<'a, B>
where
    S: Placement,
    B: Coroutine + 'a,
{
    S::ramp(body, promise)
}
