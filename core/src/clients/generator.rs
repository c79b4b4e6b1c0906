//! Lazy generators
//!
//! A generator frame starts parked (initial `SuspendAlways`) and parks again
//! after every yielded value and after returning. The first `advance` starts
//! it; each later `advance` resumes it past its last yield. The current value
//! is lent out until the next `advance`.
//!
//! Generators work over either placement:
//!
//! ```ignore
//! let mut numbers = iota::<Heap>(0, 3);
//! while let Some(n) = numbers.advance()? {
//!     println!("{n}");
//! }
//! ```

use std::fmt;

use crate::error::Exception;
use crate::runtime::{
    BoxedHandle, FrameHandle, InlineHandle, Promise, ResultSink, ReturnVoid, StorageCell,
    SuspendAlways, YieldValue,
};

/* ===================== Promise ===================== */

pub struct GeneratorPromise<T> {
    current: StorageCell<T>,
    outcome: ResultSink<()>,
}

impl<T> GeneratorPromise<T> {
    pub const fn new() -> Self {
        Self {
            current: StorageCell::new(),
            outcome: ResultSink::new(),
        }
    }

    /// The most recently yielded value
    pub fn current(&self) -> Option<&T> {
        self.current.is_live().then(|| self.current.get())
    }

    fn take_current(&mut self) -> Option<T> {
        self.current.is_live().then(|| self.current.take())
    }

    fn clear_current(&mut self) {
        if self.current.is_live() {
            self.current.destroy();
        }
    }

    fn rethrow_if_pending(&mut self) -> Result<(), Exception> {
        self.outcome.rethrow_if_pending()
    }
}

impl<T> Default for GeneratorPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise for GeneratorPromise<T> {
    type Initial = SuspendAlways;
    type Final = SuspendAlways;

    fn initial_suspend(&mut self) -> SuspendAlways {
        SuspendAlways
    }

    fn final_suspend(&mut self) -> SuspendAlways {
        SuspendAlways
    }

    fn unhandled_exception(&mut self, err: Exception) {
        self.outcome.fail(err);
    }
}

impl<T> YieldValue<T> for GeneratorPromise<T> {
    type Awaiter = SuspendAlways;

    fn yield_value(&mut self, value: T) -> SuspendAlways {
        self.clear_current();
        self.current.construct(value);
        SuspendAlways
    }
}

impl<T> ReturnVoid for GeneratorPromise<T> {
    fn return_void(&mut self) {
        self.outcome.write(());
    }
}

/* ===================== Generator ===================== */

/// Iterator-like view over a generator frame
pub struct Generator<H> {
    handle: H,
}

/// Generator over a boxed frame; may be null
pub type HeapGenerator<'a, T> = Generator<BoxedHandle<'a, GeneratorPromise<T>>>;

/// Generator over a frame stored in place
pub type InlineGenerator<B> = Generator<InlineHandle<B>>;

impl<T, H> Generator<H>
where
    H: FrameHandle<Promise = GeneratorPromise<T>>,
{
    pub fn new(handle: H) -> Self {
        Self { handle }
    }

    /// Run to the next yield
    ///
    /// Returns the yielded value, `None` once the body returned, or the
    /// exception the body failed with. After `None` or an error the
    /// generator is exhausted and stays that way.
    pub fn advance(&mut self) -> Result<Option<&T>, Exception> {
        if self.is_exhausted() {
            return Ok(None);
        }
        self.handle.resume();
        if self.handle.done() {
            if self.handle.is_null() {
                return Ok(None);
            }
            let promise = self.handle.promise_mut();
            promise.clear_current();
            promise.rethrow_if_pending()?;
            return Ok(None);
        }
        Ok(self.handle.promise().current())
    }

    /// The value produced by the last `advance`
    pub fn current(&self) -> Option<&T> {
        if self.is_exhausted() {
            return None;
        }
        self.handle.promise().current()
    }

    /// True for a null generator and for one whose body finished
    pub fn is_exhausted(&self) -> bool {
        self.handle.is_null() || self.handle.done()
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn into_handle(self) -> H {
        self.handle
    }

    /// Consume the generator as an iterator of owned values
    pub fn into_values(self) -> Values<H> {
        Values {
            generator: self,
            failed: false,
        }
    }
}

impl<'a, T> HeapGenerator<'a, T> {
    /// A generator with no frame; already exhausted
    pub const fn empty() -> Self {
        Self {
            handle: BoxedHandle::null(),
        }
    }
}

impl<'a, T> Default for HeapGenerator<'a, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<H: FrameHandle + fmt::Debug> fmt::Debug for Generator<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("handle", &self.handle)
            .finish()
    }
}

/// Owning iterator returned by [`Generator::into_values`]
pub struct Values<H> {
    generator: Generator<H>,
    failed: bool,
}

impl<T, H> Iterator for Values<H>
where
    H: FrameHandle<Promise = GeneratorPromise<T>>,
{
    type Item = Result<T, Exception>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let produced = match self.generator.advance() {
            Ok(value) => value.is_some(),
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        };
        if !produced {
            return None;
        }
        self.generator.handle.promise_mut().take_current().map(Ok)
    }
}
