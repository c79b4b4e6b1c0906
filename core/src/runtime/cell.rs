//! Storage cells for frame locals
//!
//! Every local that must survive a suspension point lives in a cell inside the
//! coroutine body. A cell starts empty, is constructed explicitly when the
//! local comes into scope, and is torn down exactly once by whoever leaves the
//! scope: the body itself, the cleanup table on destroy, or exception dispatch.
//!
//! Two modes exist:
//!
//! 1. [`StorageCell`] owns its value
//! 2. [`BorrowCell`] refers to a value owned elsewhere (a range being iterated,
//!    a caller-supplied slice) and never runs its destructor

use std::fmt;

use crate::error::protocol_violation;

/* ===================== Slot ===================== */

/// A local the frame driver can inspect and tear down without knowing its type
pub trait Slot {
    fn is_live(&self) -> bool;

    /// Tear down the live value. The cell must be live.
    fn destroy(&mut self);
}

/// The closed set of locals a coroutine body declares
///
/// Implemented by a fieldless enum per body. Cleanup tables and catch regions
/// name locals through it.
pub trait Locals: Copy + fmt::Debug + 'static {
    const ALL: &'static [Self];
}

/// Local set for bodies that keep nothing across suspension points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoLocals {}

impl Locals for NoLocals {
    const ALL: &'static [Self] = &[];
}

/* ===================== Owning cell ===================== */

/// Uninitialized-until-constructed storage for one local
pub struct StorageCell<T> {
    value: Option<T>,
}

impl<T> StorageCell<T> {
    pub const fn new() -> Self {
        Self { value: None }
    }

    /// Bring the local into scope. The cell must be empty.
    pub fn construct(&mut self, value: T) -> &mut T {
        debug_assert!(self.value.is_none(), "construct() on a live storage cell");
        self.value.insert(value)
    }

    #[track_caller]
    pub fn get(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => protocol_violation("get() on an empty storage cell"),
        }
    }

    #[track_caller]
    pub fn get_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => protocol_violation("get_mut() on an empty storage cell"),
        }
    }

    /// Move the value out, leaving the cell empty
    ///
    /// Counts as the local's single teardown.
    #[track_caller]
    pub fn take(&mut self) -> T {
        match self.value.take() {
            Some(value) => value,
            None => protocol_violation("take() on an empty storage cell"),
        }
    }

    pub fn destroy(&mut self) {
        debug_assert!(self.value.is_some(), "destroy() on an empty storage cell");
        self.value = None;
    }

    pub fn is_live(&self) -> bool {
        self.value.is_some()
    }
}

impl<T> Default for StorageCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for StorageCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => f.debug_tuple("StorageCell").field(value).finish(),
            None => f.write_str("StorageCell(<empty>)"),
        }
    }
}

impl<T> Slot for StorageCell<T> {
    fn is_live(&self) -> bool {
        StorageCell::is_live(self)
    }

    fn destroy(&mut self) {
        StorageCell::destroy(self)
    }
}

/* ===================== Referencing cell ===================== */

/// A local bound to a value owned outside the frame
///
/// Destroying it only unbinds the reference.
pub struct BorrowCell<'a, T: ?Sized> {
    target: Option<&'a T>,
}

impl<'a, T: ?Sized> BorrowCell<'a, T> {
    pub const fn new() -> Self {
        Self { target: None }
    }

    pub fn construct(&mut self, target: &'a T) -> &'a T {
        debug_assert!(self.target.is_none(), "construct() on a live borrow cell");
        self.target = Some(target);
        target
    }

    #[track_caller]
    pub fn get(&self) -> &'a T {
        match self.target {
            Some(target) => target,
            None => protocol_violation("get() on an empty borrow cell"),
        }
    }

    pub fn destroy(&mut self) {
        debug_assert!(self.target.is_some(), "destroy() on an empty borrow cell");
        self.target = None;
    }

    pub fn is_live(&self) -> bool {
        self.target.is_some()
    }
}

impl<T: ?Sized> Default for BorrowCell<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for BorrowCell<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => f.debug_tuple("BorrowCell").field(&target).finish(),
            None => f.write_str("BorrowCell(<empty>)"),
        }
    }
}

impl<T: ?Sized> Slot for BorrowCell<'_, T> {
    fn is_live(&self) -> bool {
        BorrowCell::is_live(self)
    }

    fn destroy(&mut self) {
        BorrowCell::destroy(self)
    }
}
