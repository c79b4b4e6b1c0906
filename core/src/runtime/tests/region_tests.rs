//! Tests for catch regions and exception dispatch

use anyhow::anyhow;
use thiserror::Error;

use crate::clients::{Generator, GeneratorPromise};
use crate::error::Exception;
use crate::runtime::testing::{Census, Tracked};
use crate::runtime::{
    ramp, Catch, Coroutine, Cx, Heap, Inline, Locals, Placement, Region, RegionId, Slot, Step,
    StorageCell, SuspendAlways, SuspendIndex,
};

/* ===================== Helpers ===================== */

#[derive(Debug, Error)]
#[error("inner fault")]
struct InnerFault;

#[derive(Debug, Error)]
#[error("outer fault")]
struct OuterFault;

#[derive(Debug, Clone, Copy)]
enum Event {
    Value(i32),
    Inner,
    Outer,
    Other,
}

const YIELDED_VALUE: SuspendIndex = SuspendIndex::new(1);
const YIELDED_FALLBACK: SuspendIndex = SuspendIndex::new(2);
const NEXT_EVENT: SuspendIndex = SuspendIndex::new(3);
const RETURNED: SuspendIndex = SuspendIndex::new(4);

const OUTER: RegionId = RegionId::new(0);
const INNER: RegionId = RegionId::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardedLocal {
    Outer,
    Inner,
    Pending,
}

impl Locals for GuardedLocal {
    const ALL: &'static [Self] = &[Self::Outer, Self::Inner, Self::Pending];
}

/// ```text
/// for event in events {
///     try {
///         let outer = track("outer");
///         try {
///             let inner = track("inner");
///             match event {
///                 Value(v) => yield v,
///                 Inner => throw InnerFault,
///                 Outer => throw OuterFault,
///                 Other => throw "unexpected",
///             }
///         } catch (InnerFault) {
///             yield -1;
///         }
///     } catch (OuterFault) {
///         continue;
///     }
/// }
/// ```
struct Guarded {
    census: Census,
    events: Vec<Event>,
    position: usize,
    outer: StorageCell<Tracked>,
    inner: StorageCell<Tracked>,
    pending: StorageCell<SuspendAlways>,
}

impl Coroutine for Guarded {
    type Promise = GeneratorPromise<i32>;
    type Local = GuardedLocal;

    const NAME: &'static str = "guarded";

    const REGIONS: &'static [Region<GuardedLocal>] = &[
        Region {
            parent: None,
            scoped: &[GuardedLocal::Outer],
        },
        Region {
            parent: Some(OUTER),
            scoped: &[GuardedLocal::Inner],
        },
    ];

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {}
                YIELDED_VALUE => {
                    cx.resume_from(&mut self.pending)?;
                    self.inner.destroy();
                    cx.leave_region(Some(OUTER));
                    self.outer.destroy();
                    cx.leave_region(None);
                    self.position += 1;
                }
                YIELDED_FALLBACK => {
                    cx.resume_from(&mut self.pending)?;
                    self.outer.destroy();
                    cx.leave_region(None);
                    self.position += 1;
                }
                NEXT_EVENT => self.position += 1,
                other => other.unknown(Self::NAME),
            }

            let Some(&event) = self.events.get(self.position) else {
                return Ok(cx.return_void(RETURNED));
            };
            cx.enter_region(OUTER);
            self.outer.construct(self.census.track("outer"));
            cx.enter_region(INNER);
            self.inner.construct(self.census.track("inner"));
            match event {
                Event::Value(value) => {
                    if let Some(step) = cx.yield_value(&mut self.pending, value, YIELDED_VALUE) {
                        return Ok(step);
                    }
                }
                Event::Inner => return Err(InnerFault.into()),
                Event::Outer => return Err(OuterFault.into()),
                Event::Other => return Err(anyhow!("unexpected")),
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [GuardedLocal] {
        match index {
            YIELDED_VALUE => &[GuardedLocal::Pending, GuardedLocal::Inner, GuardedLocal::Outer],
            YIELDED_FALLBACK => &[GuardedLocal::Pending, GuardedLocal::Outer],
            _ => &[],
        }
    }

    fn slot(&mut self, local: GuardedLocal) -> &mut dyn Slot {
        match local {
            GuardedLocal::Outer => &mut self.outer,
            GuardedLocal::Inner => &mut self.inner,
            GuardedLocal::Pending => &mut self.pending,
        }
    }

    fn catch(&mut self, region: RegionId, err: Exception, cx: &mut Cx<'_, Self::Promise>) -> Catch {
        // Scoped locals are gone and the region has been reset before the
        // handler runs
        match region {
            INNER => {
                assert!(!self.inner.is_live());
                assert!(self.outer.is_live());
                assert_eq!(cx.region(), Some(OUTER));
                if !err.is::<InnerFault>() {
                    return Catch::Rethrow(err);
                }
                match cx.yield_value(&mut self.pending, -1, YIELDED_FALLBACK) {
                    Some(step) => Catch::Pause(step),
                    None => Catch::Continue(YIELDED_FALLBACK),
                }
            }
            OUTER => {
                assert!(!self.outer.is_live());
                assert_eq!(cx.region(), None);
                if err.is::<OuterFault>() {
                    Catch::Continue(NEXT_EVENT)
                } else {
                    Catch::Rethrow(err)
                }
            }
            other => panic!("unexpected {other}"),
        }
    }
}

fn guarded<S: Placement>(
    census: &Census,
    events: Vec<Event>,
) -> Generator<S::Handle<'static, Guarded>> {
    let body = Guarded {
        census: census.clone(),
        events,
        position: 0,
        outer: StorageCell::new(),
        inner: StorageCell::new(),
        pending: StorageCell::new(),
    };
    Generator::new(ramp::<S, Guarded>(body, GeneratorPromise::new()))
}

fn drain<S: Placement>(census: &Census, events: Vec<Event>) -> (Vec<i32>, Option<Exception>) {
    let mut generator = guarded::<S>(census, events);
    let mut values = Vec::new();
    loop {
        match generator.advance() {
            Ok(Some(value)) => values.push(*value),
            Ok(None) => return (values, None),
            Err(err) => return (values, Some(err)),
        }
    }
}

/* ===================== Dispatch ===================== */

#[test]
fn test_inner_handler_yields_from_catch() {
    let census = Census::new();
    let (values, err) = drain::<Heap>(
        &census,
        vec![Event::Value(1), Event::Inner, Event::Value(2)],
    );
    assert_eq!(values, vec![1, -1, 2]);
    assert!(err.is_none());
    assert_eq!(census.constructed(), 6);
    assert_eq!(census.live(), 0);
}

#[test]
fn test_rethrow_reaches_enclosing_region() {
    let census = Census::new();
    let (values, err) = drain::<Inline>(
        &census,
        vec![Event::Outer, Event::Value(3), Event::Outer, Event::Value(4)],
    );
    assert_eq!(values, vec![3, 4]);
    assert!(err.is_none());
    assert_eq!(census.live(), 0);
}

#[test]
fn test_unmatched_exception_escapes_both_regions() {
    let census = Census::new();
    let (values, err) = drain::<Heap>(
        &census,
        vec![Event::Value(5), Event::Inner, Event::Other, Event::Value(6)],
    );
    assert_eq!(values, vec![5, -1]);
    assert_eq!(err.unwrap().to_string(), "unexpected");
    assert_eq!(census.live(), 0);
}

#[test]
fn test_destroy_inside_handler_pause() {
    let census = Census::new();
    let mut generator = guarded::<Heap>(&census, vec![Event::Inner, Event::Value(7)]);

    assert_eq!(generator.advance().unwrap(), Some(&-1));
    // Parked inside the inner handler: only the outer local is alive
    assert_eq!(census.live(), 1);

    drop(generator);
    assert_eq!(census.live(), 0);
}

#[test]
fn test_region_recorded_while_parked() {
    let census = Census::new();
    let mut generator = guarded::<Heap>(&census, vec![Event::Value(1)]);
    generator.advance().unwrap();

    let state = crate::runtime::FrameHandle::state(generator.handle()).unwrap();
    assert_eq!(state.index, YIELDED_VALUE);
    assert_eq!(state.region, Some(INNER));
}
