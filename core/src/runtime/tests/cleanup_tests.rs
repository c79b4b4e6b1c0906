//! Tests for cleanup tables, completion, and unhandled exceptions

use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::anyhow;

use crate::clients::{evaluate, Generator, GeneratorPromise, MaybePromise};
use crate::error::Exception;
use crate::runtime::testing::{Census, Tracked};
use crate::runtime::{
    ramp, Coroutine, Cx, Heap, Inline, Locals, Placement, Slot, Step, StorageCell, SuspendAlways,
    SuspendIndex,
};

/* ===================== Helpers ===================== */

const FIRST: SuspendIndex = SuspendIndex::new(1);
const SECOND: SuspendIndex = SuspendIndex::new(2);
const THIRD: SuspendIndex = SuspendIndex::new(3);
const RETURNED: SuspendIndex = SuspendIndex::new(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopedLocal {
    A,
    B,
    Pending,
}

impl Locals for ScopedLocal {
    const ALL: &'static [Self] = &[Self::A, Self::B, Self::Pending];
}

/// ```text
/// let a = track("a"); yield 1;
/// let b = track("b"); yield 2;
/// drop(a);            yield 3;
/// drop(b);
/// ```
struct Scoped {
    census: Census,
    a: StorageCell<Tracked>,
    b: StorageCell<Tracked>,
    pending: StorageCell<SuspendAlways>,
}

impl Coroutine for Scoped {
    type Promise = GeneratorPromise<i32>;
    type Local = ScopedLocal;

    const NAME: &'static str = "scoped";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {
                    self.a.construct(self.census.track("a"));
                    if let Some(step) = cx.yield_value(&mut self.pending, 1, FIRST) {
                        return Ok(step);
                    }
                }
                FIRST => {
                    cx.resume_from(&mut self.pending)?;
                    self.b.construct(self.census.track("b"));
                    if let Some(step) = cx.yield_value(&mut self.pending, 2, SECOND) {
                        return Ok(step);
                    }
                }
                SECOND => {
                    cx.resume_from(&mut self.pending)?;
                    self.a.destroy();
                    if let Some(step) = cx.yield_value(&mut self.pending, 3, THIRD) {
                        return Ok(step);
                    }
                }
                THIRD => {
                    cx.resume_from(&mut self.pending)?;
                    self.b.destroy();
                    return Ok(cx.return_void(RETURNED));
                }
                other => other.unknown(Self::NAME),
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [ScopedLocal] {
        match index {
            FIRST => &[ScopedLocal::Pending, ScopedLocal::A],
            SECOND => &[ScopedLocal::Pending, ScopedLocal::B, ScopedLocal::A],
            THIRD => &[ScopedLocal::Pending, ScopedLocal::B],
            _ => &[],
        }
    }

    fn slot(&mut self, local: ScopedLocal) -> &mut dyn Slot {
        match local {
            ScopedLocal::A => &mut self.a,
            ScopedLocal::B => &mut self.b,
            ScopedLocal::Pending => &mut self.pending,
        }
    }
}

fn scoped<S: Placement>(census: &Census) -> Generator<S::Handle<'static, Scoped>> {
    let body = Scoped {
        census: census.clone(),
        a: StorageCell::new(),
        b: StorageCell::new(),
        pending: StorageCell::new(),
    };
    Generator::new(ramp::<S, Scoped>(body, GeneratorPromise::new()))
}

/// Yields `0..`, failing at `fail_at` while holding a tracked local
struct Faulty {
    census: Census,
    fail_at: i32,
    next: i32,
    guard: StorageCell<Tracked>,
    pending: StorageCell<SuspendAlways>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultyLocal {
    Guard,
    Pending,
}

impl Locals for FaultyLocal {
    const ALL: &'static [Self] = &[Self::Guard, Self::Pending];
}

impl Coroutine for Faulty {
    type Promise = GeneratorPromise<i32>;
    type Local = FaultyLocal;

    const NAME: &'static str = "faulty";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {
                    self.guard.construct(self.census.track("guard"));
                }
                FIRST => {
                    cx.resume_from(&mut self.pending)?;
                    self.next += 1;
                }
                other => other.unknown(Self::NAME),
            }

            if self.next == self.fail_at {
                return Err(anyhow!("failed at {}", self.next));
            }
            if let Some(step) = cx.yield_value(&mut self.pending, self.next, FIRST) {
                return Ok(step);
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [FaultyLocal] {
        match index {
            FIRST => &[FaultyLocal::Pending, FaultyLocal::Guard],
            _ => &[],
        }
    }

    fn slot(&mut self, local: FaultyLocal) -> &mut dyn Slot {
        match local {
            FaultyLocal::Guard => &mut self.guard,
            FaultyLocal::Pending => &mut self.pending,
        }
    }
}

fn faulty<S: Placement>(census: &Census, fail_at: i32) -> Generator<S::Handle<'static, Faulty>> {
    let body = Faulty {
        census: census.clone(),
        fail_at,
        next: 0,
        guard: StorageCell::new(),
        pending: StorageCell::new(),
    };
    Generator::new(ramp::<S, Faulty>(body, GeneratorPromise::new()))
}

/// Yields 0 while holding a tracked local, then panics on the next resume
struct Panicky {
    census: Census,
    guard: StorageCell<Tracked>,
    pending: StorageCell<SuspendAlways>,
}

impl Coroutine for Panicky {
    type Promise = GeneratorPromise<i32>;
    type Local = FaultyLocal;

    const NAME: &'static str = "panicky";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {
                    self.guard.construct(self.census.track("guard"));
                    if let Some(step) = cx.yield_value(&mut self.pending, 0, FIRST) {
                        return Ok(step);
                    }
                }
                FIRST => {
                    cx.resume_from(&mut self.pending)?;
                    panic!("body gave up");
                }
                other => other.unknown(Self::NAME),
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [FaultyLocal] {
        match index {
            FIRST => &[FaultyLocal::Pending, FaultyLocal::Guard],
            _ => &[],
        }
    }

    fn slot(&mut self, local: FaultyLocal) -> &mut dyn Slot {
        match local {
            FaultyLocal::Guard => &mut self.guard,
            FaultyLocal::Pending => &mut self.pending,
        }
    }
}

fn panicky<S: Placement>(census: &Census) -> Generator<S::Handle<'static, Panicky>> {
    let body = Panicky {
        census: census.clone(),
        guard: StorageCell::new(),
        pending: StorageCell::new(),
    };
    Generator::new(ramp::<S, Panicky>(body, GeneratorPromise::new()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EagerLocal {
    Guard,
}

impl Locals for EagerLocal {
    const ALL: &'static [Self] = &[Self::Guard];
}

/// Panics in its ramp while holding a tracked local
struct PanicsEagerly {
    census: Census,
    guard: StorageCell<Tracked>,
}

impl Coroutine for PanicsEagerly {
    type Promise = MaybePromise<i32>;
    type Local = EagerLocal;

    const NAME: &'static str = "panics_eagerly";

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        match cx.index() {
            SuspendIndex::NOT_STARTED => {
                self.guard.construct(self.census.track("guard"));
                panic!("body gave up");
            }
            other => other.unknown(Self::NAME),
        }
    }

    fn live_at(_index: SuspendIndex) -> &'static [EagerLocal] {
        &[]
    }

    fn slot(&mut self, local: EagerLocal) -> &mut dyn Slot {
        match local {
            EagerLocal::Guard => &mut self.guard,
        }
    }
}

fn collect<S: Placement>(census: &Census) -> Vec<i32> {
    let mut generator = scoped::<S>(census);
    let mut values = Vec::new();
    while let Some(value) = generator.advance().unwrap() {
        values.push(*value);
    }
    values
}

/* ===================== Completion ===================== */

#[test]
fn test_runs_to_completion_heap() {
    let census = Census::new();
    assert_eq!(collect::<Heap>(&census), vec![1, 2, 3]);
    assert_eq!(census.constructed(), 2);
    assert_eq!(census.live(), 0);
}

#[test]
fn test_runs_to_completion_inline() {
    let census = Census::new();
    assert_eq!(collect::<Inline>(&census), vec![1, 2, 3]);
    assert_eq!(census.constructed(), 2);
    assert_eq!(census.live(), 0);
}

#[test]
fn test_lazy_start() {
    let census = Census::new();
    let generator = scoped::<Heap>(&census);
    assert_eq!(census.constructed(), 0);
    assert!(!generator.is_exhausted());
    drop(generator);
    assert_eq!(census.constructed(), 0);
}

/* ===================== Destroy while parked ===================== */

fn destroy_after<S: Placement>(advances: usize) -> Census {
    let census = Census::new();
    let mut generator = scoped::<S>(&census);
    for _ in 0..advances {
        generator.advance().unwrap();
    }
    drop(generator);
    census
}

#[test]
fn test_destroy_at_every_index_heap() {
    for (advances, expected) in [(0, 0), (1, 1), (2, 2), (3, 2), (4, 2)] {
        let census = destroy_after::<Heap>(advances);
        assert_eq!(census.constructed(), expected, "after {advances} advances");
        assert_eq!(census.live(), 0, "after {advances} advances");
    }
}

#[test]
fn test_destroy_at_every_index_inline() {
    for (advances, expected) in [(0, 0), (1, 1), (2, 2), (3, 2), (4, 2)] {
        let census = destroy_after::<Inline>(advances);
        assert_eq!(census.constructed(), expected, "after {advances} advances");
        assert_eq!(census.live(), 0, "after {advances} advances");
    }
}

#[test]
fn test_explicit_destroy_releases_locals() {
    let census = Census::new();
    let mut generator = scoped::<Heap>(&census);
    generator.advance().unwrap();
    generator.advance().unwrap();
    assert_eq!(census.live(), 2);

    generator.into_handle().destroy();
    assert_eq!(census.live(), 0);
}

/* ===================== Unhandled exceptions ===================== */

#[test]
fn test_unhandled_exception_is_rethrown_then_done() {
    let census = Census::new();
    let mut generator = faulty::<Heap>(&census, 2);

    assert_eq!(generator.advance().unwrap(), Some(&0));
    assert_eq!(generator.advance().unwrap(), Some(&1));
    assert_eq!(census.live(), 1);

    let err = generator.advance().unwrap_err();
    assert_eq!(err.to_string(), "failed at 2");
    assert!(generator.is_exhausted());
    assert_eq!(census.live(), 0);

    assert_eq!(generator.advance().unwrap(), None);
    assert_eq!(generator.current(), None);
}

#[test]
fn test_exception_before_first_yield_inline() {
    let census = Census::new();
    let mut generator = faulty::<Inline>(&census, 0);

    assert!(generator.advance().is_err());
    assert!(generator.is_exhausted());
    assert_eq!(census.constructed(), 1);
    assert_eq!(census.live(), 0);
}

#[test]
fn test_values_iterator_stops_after_error() {
    let census = Census::new();
    let items: Vec<_> = faulty::<Heap>(&census, 3).into_values().collect();

    assert_eq!(items.len(), 4);
    assert_eq!(*items[0].as_ref().unwrap(), 0);
    assert_eq!(*items[2].as_ref().unwrap(), 2);
    assert!(items[3].is_err());
    assert_eq!(census.live(), 0);
}

/* ===================== Panicking bodies ===================== */

#[test]
#[should_panic(expected = "body gave up")]
fn test_panicking_body_unwinds_heap() {
    let census = Census::new();
    let mut generator = panicky::<Heap>(&census);
    assert_eq!(generator.advance().unwrap(), Some(&0));
    let _ = generator.advance();
}

#[test]
#[should_panic(expected = "body gave up")]
fn test_panicking_body_unwinds_inline() {
    let census = Census::new();
    let mut generator = panicky::<Inline>(&census);
    assert_eq!(generator.advance().unwrap(), Some(&0));
    let _ = generator.advance();
}

fn unwind_after_first_value<S: Placement>() -> Census {
    let census = Census::new();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut generator = panicky::<S>(&census);
        generator.advance().unwrap();
        let _ = generator.advance();
    }));
    assert!(outcome.is_err());
    census
}

#[test]
fn test_panicking_body_releases_locals() {
    for census in [unwind_after_first_value::<Heap>(), unwind_after_first_value::<Inline>()] {
        assert_eq!(census.constructed(), 1);
        assert_eq!(census.live(), 0);
    }
}

#[test]
fn test_panic_during_ramp_releases_locals() {
    let census = Census::new();
    let heap = catch_unwind(AssertUnwindSafe(|| {
        evaluate::<Heap, _, _>(PanicsEagerly {
            census: census.clone(),
            guard: StorageCell::new(),
        })
    }));
    let inline = catch_unwind(AssertUnwindSafe(|| {
        evaluate::<Inline, _, _>(PanicsEagerly {
            census: census.clone(),
            guard: StorageCell::new(),
        })
    }));
    assert!(heap.is_err());
    assert!(inline.is_err());
    assert_eq!(census.constructed(), 2);
    assert_eq!(census.live(), 0);
}
