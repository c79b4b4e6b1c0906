//! # coframe-core
//!
//! Suspendable computations lowered by hand into explicit frame state
//! machines, plus the clients that drive them: lazy generators, lazy tasks
//! with symmetric transfer, and short-circuiting maybe computations.
//!
//! - [`runtime`]: storage cells, frame header, awaiter protocol, frame
//!   driver, handles
//! - [`clients`]: generator, task, maybe
//! - [`lowered`]: sample computations written against the runtime

pub mod clients;
pub mod config;
pub mod error;
pub mod init;
pub mod lowered;
pub mod runtime;

pub use clients::{Generator, HeapGenerator, InlineGenerator, Task};
pub use error::{Exception, TaskError};
pub use init::{initialize, InitBuilder, InitOptions};
pub use runtime::{Heap, Inline};
