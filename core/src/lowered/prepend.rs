//! Prefixing generator over borrowed strings
//!
//! ```text
//! generator prepend(items: &[String], prefix) {
//!     for item in items { yield prefix + item; }
//! }
//! ```
//!
//! The loop variable refers into the caller's slice, so it lives in a
//! referencing cell and the frame borrows `items` for its whole life.

use crate::clients::{Generator, GeneratorPromise};
use crate::error::Exception;
use crate::runtime::{
    ramp, BorrowCell, Coroutine, Cx, Locals, Placement, Slot, Step, StorageCell, SuspendAlways,
    SuspendIndex,
};

const YIELDED: SuspendIndex = SuspendIndex::new(1);
const RETURNED: SuspendIndex = SuspendIndex::new(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrependLocal {
    Item,
    Pending,
}

impl Locals for PrependLocal {
    const ALL: &'static [Self] = &[Self::Item, Self::Pending];
}

pub struct Prepend<'a> {
    items: &'a [String],
    prefix: String,
    position: usize,
    item: BorrowCell<'a, String>,
    pending: StorageCell<SuspendAlways>,
}

impl<'a> Prepend<'a> {
    pub fn new(items: &'a [String], prefix: impl Into<String>) -> Self {
        Self {
            items,
            prefix: prefix.into(),
            position: 0,
            item: BorrowCell::new(),
            pending: StorageCell::new(),
        }
    }
}

impl<'a> Coroutine for Prepend<'a> {
    type Promise = GeneratorPromise<String>;
    type Local = PrependLocal;

    const NAME: &'static str = "prepend";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {}
                YIELDED => {
                    cx.resume_from(&mut self.pending)?;
                    self.item.destroy();
                    self.position += 1;
                }
                other => other.unknown(Self::NAME),
            }

            let Some(item) = self.items.get(self.position) else {
                return Ok(cx.return_void(RETURNED));
            };
            let item = self.item.construct(item);
            let joined = format!("{}{}", self.prefix, item);
            if let Some(step) = cx.yield_value(&mut self.pending, joined, YIELDED) {
                return Ok(step);
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [PrependLocal] {
        match index {
            YIELDED => &[PrependLocal::Pending, PrependLocal::Item],
            _ => &[],
        }
    }

    fn slot(&mut self, local: PrependLocal) -> &mut dyn Slot {
        match local {
            PrependLocal::Item => &mut self.item,
            PrependLocal::Pending => &mut self.pending,
        }
    }
}

/// Yields `prefix + item` for every item, borrowing `items`
pub fn prepend<'a, S: Placement>(
    items: &'a [String],
    prefix: impl Into<String>,
) -> Generator<S::Handle<'a, Prepend<'a>>> {
    Generator::new(ramp::<S, Prepend<'a>>(
        Prepend::new(items, prefix),
        GeneratorPromise::new(),
    ))
}
