//! Task computations
//!
//! ```text
//! task compute_value(x) { return x * 2; }
//!
//! task add_values(a, b) {
//!     total = 0;
//!     while a < b {
//!         total += await compute_value(a) + await compute_value(b);
//!         a += 1; b -= 1;
//!     }
//!     return total;
//! }
//!
//! task sum_chain(n) {
//!     total = 0;
//!     for i in 0..n { total += await compute_value(i); }
//!     return total;
//! }
//!
//! task nested(depth) {
//!     if depth == 0 { return 0; }
//!     return await nested(depth - 1) + 1;
//! }
//! ```

use crate::clients::{Task, TaskAwaiter, TaskPromise};
use crate::error::Exception;
use crate::lowered::arithmetic::Overflow;
use crate::runtime::{Coroutine, Cx, Locals, NoLocals, Slot, Step, StorageCell, SuspendIndex};

/// Single pending-await local shared by the awaiting bodies below
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitLocal {
    Pending,
}

impl Locals for AwaitLocal {
    const ALL: &'static [Self] = &[Self::Pending];
}

/* ===================== compute_value ===================== */

pub struct ComputeValue {
    x: u64,
}

impl Coroutine for ComputeValue {
    type Promise = TaskPromise<u64>;
    type Local = NoLocals;

    const NAME: &'static str = "compute_value";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        match cx.index() {
            SuspendIndex::NOT_STARTED => {
                let doubled = self.x.checked_mul(2).ok_or(Overflow(Self::NAME))?;
                Ok(cx.return_value(doubled, SuspendIndex::new(1)))
            }
            other => other.unknown(Self::NAME),
        }
    }

    fn live_at(_index: SuspendIndex) -> &'static [NoLocals] {
        &[]
    }

    fn slot(&mut self, local: NoLocals) -> &mut dyn Slot {
        match local {}
    }
}

pub fn compute_value(x: u64) -> Task<u64> {
    Task::new(ComputeValue { x })
}

/* ===================== add_values ===================== */

const FIRST: SuspendIndex = SuspendIndex::new(1);
const SECOND: SuspendIndex = SuspendIndex::new(2);
const ADDED: SuspendIndex = SuspendIndex::new(3);

pub struct AddValues {
    a: u64,
    b: u64,
    first: u64,
    total: u64,
    pending: StorageCell<TaskAwaiter<u64>>,
}

impl Coroutine for AddValues {
    type Promise = TaskPromise<u64>;
    type Local = AwaitLocal;

    const NAME: &'static str = "add_values";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {}
                FIRST => {
                    self.first = cx.resume_from(&mut self.pending)?;
                    let second = compute_value(self.b).into_awaiter();
                    if let Some(step) = cx.await_on(&mut self.pending, second, SECOND) {
                        return Ok(step);
                    }
                    continue;
                }
                SECOND => {
                    let second = cx.resume_from(&mut self.pending)?;
                    self.total = self
                        .first
                        .checked_add(second)
                        .and_then(|pair| self.total.checked_add(pair))
                        .ok_or(Overflow(Self::NAME))?;
                    self.a += 1;
                    self.b -= 1;
                }
                other => other.unknown(Self::NAME),
            }

            if self.a >= self.b {
                return Ok(cx.return_value(self.total, ADDED));
            }
            let first = compute_value(self.a).into_awaiter();
            if let Some(step) = cx.await_on(&mut self.pending, first, FIRST) {
                return Ok(step);
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [AwaitLocal] {
        match index {
            FIRST | SECOND => &[AwaitLocal::Pending],
            _ => &[],
        }
    }

    fn slot(&mut self, local: AwaitLocal) -> &mut dyn Slot {
        match local {
            AwaitLocal::Pending => &mut self.pending,
        }
    }
}

/// Sum of `2a + 2b` over the pairs walking inward from both ends
pub fn add_values(a: u64, b: u64) -> Task<u64> {
    Task::new(AddValues {
        a,
        b,
        first: 0,
        total: 0,
        pending: StorageCell::new(),
    })
}

/* ===================== sum_chain ===================== */

const SUMMED: SuspendIndex = SuspendIndex::new(1);
const SUM_RETURNED: SuspendIndex = SuspendIndex::new(2);

pub struct SumChain {
    n: u64,
    i: u64,
    total: u64,
    pending: StorageCell<TaskAwaiter<u64>>,
}

impl Coroutine for SumChain {
    type Promise = TaskPromise<u64>;
    type Local = AwaitLocal;

    const NAME: &'static str = "sum_chain";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {}
                SUMMED => {
                    let term = cx.resume_from(&mut self.pending)?;
                    self.total = self.total.checked_add(term).ok_or(Overflow(Self::NAME))?;
                    self.i += 1;
                }
                other => other.unknown(Self::NAME),
            }

            if self.i >= self.n {
                return Ok(cx.return_value(self.total, SUM_RETURNED));
            }
            let next = compute_value(self.i).into_awaiter();
            if let Some(step) = cx.await_on(&mut self.pending, next, SUMMED) {
                return Ok(step);
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [AwaitLocal] {
        match index {
            SUMMED => &[AwaitLocal::Pending],
            _ => &[],
        }
    }

    fn slot(&mut self, local: AwaitLocal) -> &mut dyn Slot {
        match local {
            AwaitLocal::Pending => &mut self.pending,
        }
    }
}

/// `2 * (0 + 1 + ... + n - 1)`, one awaited task per term
pub fn sum_chain(n: u64) -> Task<u64> {
    Task::new(SumChain {
        n,
        i: 0,
        total: 0,
        pending: StorageCell::new(),
    })
}

/* ===================== nested ===================== */

const INNER: SuspendIndex = SuspendIndex::new(1);
const NESTED_RETURNED: SuspendIndex = SuspendIndex::new(2);

pub struct Nested {
    depth: u64,
    pending: StorageCell<TaskAwaiter<u64>>,
}

impl Coroutine for Nested {
    type Promise = TaskPromise<u64>;
    type Local = AwaitLocal;

    const NAME: &'static str = "nested";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {
                    if self.depth == 0 {
                        return Ok(cx.return_value(0, NESTED_RETURNED));
                    }
                    let inner = nested(self.depth - 1).into_awaiter();
                    if let Some(step) = cx.await_on(&mut self.pending, inner, INNER) {
                        return Ok(step);
                    }
                }
                INNER => {
                    let inner = cx.resume_from(&mut self.pending)?;
                    let depth = inner.checked_add(1).ok_or(Overflow(Self::NAME))?;
                    return Ok(cx.return_value(depth, NESTED_RETURNED));
                }
                other => other.unknown(Self::NAME),
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [AwaitLocal] {
        match index {
            INNER => &[AwaitLocal::Pending],
            _ => &[],
        }
    }

    fn slot(&mut self, local: AwaitLocal) -> &mut dyn Slot {
        match local {
            AwaitLocal::Pending => &mut self.pending,
        }
    }
}

/// Awaits a chain of `depth` tasks, each awaiting the next; returns `depth`
pub fn nested(depth: u64) -> Task<u64> {
    Task::new(Nested {
        depth,
        pending: StorageCell::new(),
    })
}
