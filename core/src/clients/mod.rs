//! Client abstractions built on the frame runtime
//!
//! Each client pairs a promise type with a user-facing owner:
//!
//! - [`Generator`]: lazy sequence of yielded values
//! - [`Task`]: lazy single result, awaitable with symmetric transfer
//! - maybe computations: eager, short-circuit on an absent value

pub mod generator;
pub mod maybe;
pub mod task;

pub use generator::{Generator, GeneratorPromise, HeapGenerator, InlineGenerator, Values};
pub use maybe::{evaluate, maybe, MaybeAwaiter, MaybePromise, ReturnSlot};
pub use task::{FinalAwaiter, Task, TaskAwaiter, TaskPromise};
