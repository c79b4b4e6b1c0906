//! # Frame runtime
//!
//! Stackless coroutines expressed as explicit state machines. A body keeps its
//! locals in storage cells, records a suspension index at every pause, and is
//! re-entered through a step function. The runtime supplies the pieces every
//! body shares:
//!
//! - `cell`: owning and referencing storage for locals
//! - `state`: the frame header (suspension index, catch region, phase)
//! - `awaiter` / `promise`: the pause protocol and the client-facing promise
//! - `frame`: the driver (ramp, resume, exception dispatch, completion, destroy)
//! - `handle`: raw, boxed, and inline handles
//! - `sink`: write-once outcome storage for promises

pub mod awaiter;
pub mod cell;
pub mod frame;
pub mod handle;
pub mod promise;
pub mod sink;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;

pub use awaiter::{Awaiter, Suspend, SuspendAlways, SuspendNever, Suspension};
pub use cell::{BorrowCell, Locals, NoLocals, Slot, StorageCell};
pub use frame::{ramp, Catch, Coroutine, Cx, Frame, Heap, Inline, Placement, Step};
pub use handle::{BoxedHandle, FrameHandle, InlineHandle, RawHandle};
pub use promise::{Promise, ReturnValue, ReturnVoid, YieldValue};
pub use sink::ResultSink;
pub use state::{FrameState, Phase, Region, RegionId, SuspendIndex};
