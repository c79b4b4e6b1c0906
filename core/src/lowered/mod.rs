//! Hand-lowered sample computations
//!
//! Each module shows the source-level computation in its header and the
//! state machine it lowers to: storage cells for locals, one suspension
//! index per pause, a cleanup table, and catch regions where the source
//! has `try`.

pub mod arithmetic;
pub mod iota;
pub mod parse_ints;
pub mod prepend;
pub mod tasks;

#[cfg(test)]
mod tests;

pub use arithmetic::{
    chain, chained_calculation, chained_calculation_in, safe_divide, safe_sqrt, with_exceptions,
    Overflow,
};
pub use iota::iota;
pub use parse_ints::{parse_int, parse_ints, ParseError};
pub use prepend::prepend;
pub use tasks::{add_values, compute_value, nested, sum_chain};
