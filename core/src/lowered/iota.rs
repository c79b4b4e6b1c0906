//! Counting generator
//!
//! ```text
//! generator iota(start, end) {
//!     for i in start..end { yield i; }
//! }
//! ```

use crate::clients::{Generator, GeneratorPromise};
use crate::error::Exception;
use crate::runtime::{
    ramp, Coroutine, Cx, Locals, Placement, Slot, Step, StorageCell, SuspendAlways, SuspendIndex,
};

const YIELDED: SuspendIndex = SuspendIndex::new(1);
const RETURNED: SuspendIndex = SuspendIndex::new(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IotaLocal {
    Pending,
}

impl Locals for IotaLocal {
    const ALL: &'static [Self] = &[Self::Pending];
}

pub struct Iota {
    current: i64,
    end: i64,
    pending: StorageCell<SuspendAlways>,
}

impl Iota {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            current: start,
            end,
            pending: StorageCell::new(),
        }
    }
}

impl Coroutine for Iota {
    type Promise = GeneratorPromise<i64>;
    type Local = IotaLocal;

    const NAME: &'static str = "iota";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {}
                YIELDED => {
                    cx.resume_from(&mut self.pending)?;
                    self.current += 1;
                }
                other => other.unknown(Self::NAME),
            }

            if self.current >= self.end {
                return Ok(cx.return_void(RETURNED));
            }
            if let Some(step) = cx.yield_value(&mut self.pending, self.current, YIELDED) {
                return Ok(step);
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [IotaLocal] {
        match index {
            YIELDED => &[IotaLocal::Pending],
            _ => &[],
        }
    }

    fn slot(&mut self, local: IotaLocal) -> &mut dyn Slot {
        match local {
            IotaLocal::Pending => &mut self.pending,
        }
    }
}

/// Yields `start, start + 1, ..., end - 1`
pub fn iota<S: Placement>(start: i64, end: i64) -> Generator<S::Handle<'static, Iota>> {
    Generator::new(ramp::<S, Iota>(Iota::new(start, end), GeneratorPromise::new()))
}
