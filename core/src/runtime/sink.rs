//! Write-once result sinks
//!
//! A promise that produces a single outcome keeps it here: either the value
//! handed to `return_value`, or the exception the frame did not handle.

use crate::error::Exception;
use crate::runtime::cell::StorageCell;

#[derive(Debug)]
pub struct ResultSink<T> {
    value: StorageCell<T>,
    error: StorageCell<Exception>,
}

impl<T> ResultSink<T> {
    pub const fn new() -> Self {
        Self {
            value: StorageCell::new(),
            error: StorageCell::new(),
        }
    }

    pub fn write(&mut self, value: T) {
        debug_assert!(!self.is_written(), "result sink written twice");
        self.value.construct(value);
    }

    pub fn fail(&mut self, err: Exception) {
        debug_assert!(!self.is_written(), "result sink written twice");
        self.error.construct(err);
    }

    pub fn is_written(&self) -> bool {
        self.value.is_live() || self.error.is_live()
    }

    pub fn has_exception(&self) -> bool {
        self.error.is_live()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.is_live().then(|| self.value.get())
    }

    /// Move the outcome out; `None` if nothing is written (or it was taken)
    pub fn take(&mut self) -> Option<Result<T, Exception>> {
        if self.error.is_live() {
            Some(Err(self.error.take()))
        } else if self.value.is_live() {
            Some(Ok(self.value.take()))
        } else {
            None
        }
    }

    /// Surface a stored exception, leaving any value in place
    pub fn rethrow_if_pending(&mut self) -> Result<(), Exception> {
        if self.error.is_live() {
            return Err(self.error.take());
        }
        Ok(())
    }
}

impl<T> Default for ResultSink<T> {
    fn default() -> Self {
        Self::new()
    }
}
