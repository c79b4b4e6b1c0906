//! Optional arithmetic as maybe computations
//!
//! ```text
//! maybe chained_calculation(a, b, c, reps) {
//!     total = 0;
//!     repeat reps {
//!         q = await safe_divide(a, b);
//!         r = await safe_sqrt(c);
//!         total += q + r;
//!     }
//!     return total;
//! }
//! ```
//!
//! The first absent step abandons the computation; later steps never run.
//! Overflow raises [`Overflow`], which the maybe promise turns into `None`.

use thiserror::Error;

use crate::clients::{evaluate, maybe, MaybeAwaiter, MaybePromise};
use crate::error::Exception;
use crate::runtime::{
    Coroutine, Cx, Inline, Locals, NoLocals, Placement, Slot, Step, StorageCell, SuspendIndex,
};

/// An intermediate result left the range of its integer type
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("arithmetic overflow in {0}")]
pub struct Overflow(pub &'static str);

pub fn safe_divide(numerator: i32, denominator: i32) -> Option<i32> {
    numerator.checked_div(denominator)
}

/// Integer square root, absent for negative input
pub fn safe_sqrt(value: i32) -> Option<i32> {
    if value < 0 {
        return None;
    }
    Some(f64::from(value).sqrt() as i32)
}

/* ===================== Chained calculation ===================== */

const DIVIDED: SuspendIndex = SuspendIndex::new(1);
const ROOTED: SuspendIndex = SuspendIndex::new(2);
const RETURNED: SuspendIndex = SuspendIndex::new(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLocal {
    Pending,
}

impl Locals for ChainLocal {
    const ALL: &'static [Self] = &[Self::Pending];
}

/// Repeated divide-then-root, with pluggable steps
pub struct Chained<D, R> {
    a: i32,
    b: i32,
    c: i32,
    reps: u32,
    iteration: u32,
    quotient: i32,
    total: i32,
    divide: D,
    root: R,
    pending: StorageCell<MaybeAwaiter<i32>>,
}

impl<D, R> Chained<D, R>
where
    D: FnMut(i32, i32) -> Option<i32>,
    R: FnMut(i32) -> Option<i32>,
{
    pub fn new(a: i32, b: i32, c: i32, reps: u32, divide: D, root: R) -> Self {
        Self {
            a,
            b,
            c,
            reps,
            iteration: 0,
            quotient: 0,
            total: 0,
            divide,
            root,
            pending: StorageCell::new(),
        }
    }
}

impl<D, R> Coroutine for Chained<D, R>
where
    D: FnMut(i32, i32) -> Option<i32>,
    R: FnMut(i32) -> Option<i32>,
{
    type Promise = MaybePromise<i32>;
    type Local = ChainLocal;

    const NAME: &'static str = "chained_calculation";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {}
                DIVIDED => {
                    self.quotient = cx.resume_from(&mut self.pending)?;
                    let root = maybe((self.root)(self.c));
                    if let Some(step) = cx.await_on(&mut self.pending, root, ROOTED) {
                        return Ok(step);
                    }
                    continue;
                }
                ROOTED => {
                    let root = cx.resume_from(&mut self.pending)?;
                    self.total = self
                        .quotient
                        .checked_add(root)
                        .and_then(|round| self.total.checked_add(round))
                        .ok_or(Overflow(Self::NAME))?;
                    self.iteration += 1;
                }
                other => other.unknown(Self::NAME),
            }

            if self.iteration >= self.reps {
                return Ok(cx.return_value(self.total, RETURNED));
            }
            let quotient = maybe((self.divide)(self.a, self.b));
            if let Some(step) = cx.await_on(&mut self.pending, quotient, DIVIDED) {
                return Ok(step);
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [ChainLocal] {
        match index {
            DIVIDED | ROOTED => &[ChainLocal::Pending],
            _ => &[],
        }
    }

    fn slot(&mut self, local: ChainLocal) -> &mut dyn Slot {
        match local {
            ChainLocal::Pending => &mut self.pending,
        }
    }
}

/// Sum of `a / b + sqrt(c)` over `reps` rounds, in frames placed by `S`
pub fn chained_calculation_in<S: Placement>(a: i32, b: i32, c: i32, reps: u32) -> Option<i32> {
    evaluate::<S, _, _>(Chained::new(a, b, c, reps, safe_divide, safe_sqrt))
}

pub fn chained_calculation(a: i32, b: i32, c: i32, reps: u32) -> Option<i32> {
    chained_calculation_in::<Inline>(a, b, c, reps)
}

/// `a / b + sqrt(c)`
pub fn chain(a: i32, b: i32, c: i32) -> Option<i32> {
    chained_calculation(a, b, c, 1)
}

/* ===================== Exceptions ===================== */

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("negative input {0}")]
pub struct NegativeInput(pub i32);

const CHECKED: SuspendIndex = SuspendIndex::new(1);

/// `x * 2`, failing with an exception for negative input
pub struct Doubled {
    x: i32,
}

impl Coroutine for Doubled {
    type Promise = MaybePromise<i32>;
    type Local = NoLocals;

    const NAME: &'static str = "with_exceptions";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        match cx.index() {
            SuspendIndex::NOT_STARTED => {
                if self.x < 0 {
                    return Err(NegativeInput(self.x).into());
                }
                let doubled = self.x.checked_mul(2).ok_or(Overflow(Self::NAME))?;
                Ok(cx.return_value(doubled, CHECKED))
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

/// `Some(2x)`, or `None` when the body throws for negative `x` or overflow
pub fn with_exceptions(x: i32) -> Option<i32> {
    evaluate::<Inline, _, _>(Doubled { x })
}
