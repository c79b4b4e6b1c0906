//! Integer-parsing generator with a protected region
//!
//! ```text
//! generator parse_ints(strings, catch_errors) {
//!     for s in strings {
//!         try {
//!             yield parse(s);
//!         } catch (Invalid) {
//!             if !catch_errors { throw; }
//!             continue;
//!         } catch (OutOfRange) {
//!             if !catch_errors { throw; }
//!             break;
//!         }
//!     }
//! }
//! ```

use std::num::IntErrorKind;

use thiserror::Error;

use crate::clients::{Generator, GeneratorPromise};
use crate::error::Exception;
use crate::runtime::{
    ramp, Catch, Coroutine, Cx, Locals, Placement, Region, RegionId, Slot, Step, StorageCell,
    SuspendAlways, SuspendIndex,
};

/// Why a string did not parse
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{0}' is not an integer")]
    Invalid(String),

    #[error("'{0}' does not fit in an i32")]
    OutOfRange(String),
}

/// Parse a decimal `i32`, classifying failures
pub fn parse_int(text: &str) -> Result<i32, ParseError> {
    text.trim().parse::<i32>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            ParseError::OutOfRange(text.to_string())
        }
        _ => ParseError::Invalid(text.to_string()),
    })
}

const YIELDED: SuspendIndex = SuspendIndex::new(1);
const NEXT_ITEM: SuspendIndex = SuspendIndex::new(2);
const LOOP_EXIT: SuspendIndex = SuspendIndex::new(3);
const RETURNED: SuspendIndex = SuspendIndex::new(4);

const TRY: RegionId = RegionId::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseLocal {
    Parsed,
    Pending,
}

impl Locals for ParseLocal {
    const ALL: &'static [Self] = &[Self::Parsed, Self::Pending];
}

pub struct ParseInts {
    strings: Vec<String>,
    catch_errors: bool,
    position: usize,
    parsed: StorageCell<i32>,
    pending: StorageCell<SuspendAlways>,
}

impl ParseInts {
    pub fn new(strings: Vec<String>, catch_errors: bool) -> Self {
        Self {
            strings,
            catch_errors,
            position: 0,
            parsed: StorageCell::new(),
            pending: StorageCell::new(),
        }
    }
}

impl Coroutine for ParseInts {
    type Promise = GeneratorPromise<i32>;
    type Local = ParseLocal;

    const NAME: &'static str = "parse_ints";

    const REGIONS: &'static [Region<ParseLocal>] = &[Region {
        parent: None,
        scoped: &[ParseLocal::Parsed],
    }];

    fn step(&mut self, cx: &mut Cx<'_, Self::Promise>) -> Result<Step, Exception> {
        loop {
            match cx.index() {
                SuspendIndex::NOT_STARTED => {}
                YIELDED => {
                    cx.resume_from(&mut self.pending)?;
                    self.parsed.destroy();
                    cx.leave_region(None);
                    self.position += 1;
                }
                NEXT_ITEM => self.position += 1,
                LOOP_EXIT => return Ok(cx.return_void(RETURNED)),
                other => other.unknown(Self::NAME),
            }

            let Some(text) = self.strings.get(self.position) else {
                return Ok(cx.return_void(RETURNED));
            };
            cx.enter_region(TRY);
            let value = parse_int(text)?;
            let value = *self.parsed.construct(value);
            if let Some(step) = cx.yield_value(&mut self.pending, value, YIELDED) {
                return Ok(step);
            }
        }
    }

    fn live_at(index: SuspendIndex) -> &'static [ParseLocal] {
        match index {
            YIELDED => &[ParseLocal::Pending, ParseLocal::Parsed],
            _ => &[],
        }
    }

    fn slot(&mut self, local: ParseLocal) -> &mut dyn Slot {
        match local {
            ParseLocal::Parsed => &mut self.parsed,
            ParseLocal::Pending => &mut self.pending,
        }
    }

    fn catch(&mut self, region: RegionId, err: Exception, _cx: &mut Cx<'_, Self::Promise>) -> Catch {
        debug_assert_eq!(region, TRY);
        if !self.catch_errors {
            return Catch::Rethrow(err);
        }
        match err.downcast_ref::<ParseError>() {
            Some(ParseError::Invalid(_)) => Catch::Continue(NEXT_ITEM),
            Some(ParseError::OutOfRange(_)) => Catch::Continue(LOOP_EXIT),
            None => Catch::Rethrow(err),
        }
    }
}

/// Yields each string parsed as an `i32`
///
/// With `catch_errors`, strings that are not integers are skipped and the
/// first out-of-range string ends the sequence. Without it, either failure
/// is rethrown to the consumer.
pub fn parse_ints<S: Placement>(
    strings: Vec<String>,
    catch_errors: bool,
) -> Generator<S::Handle<'static, ParseInts>> {
    Generator::new(ramp::<S, ParseInts>(
        ParseInts::new(strings, catch_errors),
        GeneratorPromise::new(),
    ))
}
