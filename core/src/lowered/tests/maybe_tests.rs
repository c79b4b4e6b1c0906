//! Tests for maybe computations

use std::cell::Cell;
use std::rc::Rc;

use crate::clients::evaluate;
use crate::lowered::arithmetic::Chained;
use crate::lowered::{
    chain, chained_calculation, chained_calculation_in, safe_divide, safe_sqrt, with_exceptions,
};
use crate::runtime::{Heap, Inline};

#[test]
fn test_safe_steps() {
    assert_eq!(safe_divide(10, 2), Some(5));
    assert_eq!(safe_divide(1, 0), None);
    assert_eq!(safe_divide(i32::MIN, -1), None);
    assert_eq!(safe_sqrt(16), Some(4));
    assert_eq!(safe_sqrt(17), Some(4));
    assert_eq!(safe_sqrt(-4), None);
}

#[test]
fn test_chain() {
    assert_eq!(chain(10, 2, 16), Some(9));
    assert_eq!(chain(10, 0, 16), None);
    assert_eq!(chain(10, 2, -4), None);
}

#[test]
fn test_chained_calculation_repeats() {
    assert_eq!(chained_calculation(10, 2, 16, 3), Some(27));
    assert_eq!(chained_calculation(10, 2, 16, 0), Some(0));
    assert_eq!(chained_calculation(10, 0, 16, 3), None);
}

#[test]
fn test_boxed_and_inline_agree() {
    for (a, b, c) in [(10, 2, 16), (7, 0, 9), (9, 3, -1), (100, 7, 50)] {
        assert_eq!(
            chained_calculation_in::<Heap>(a, b, c, 2),
            chained_calculation_in::<Inline>(a, b, c, 2),
            "inputs ({a}, {b}, {c})"
        );
    }
}

#[test]
fn test_with_exceptions() {
    assert_eq!(with_exceptions(5), Some(10));
    assert_eq!(with_exceptions(0), Some(0));
    assert_eq!(with_exceptions(-1), None);
}

#[test]
fn test_overflow_becomes_none() {
    assert_eq!(with_exceptions(i32::MAX), None);
    assert_eq!(with_exceptions(i32::MAX / 2), Some(i32::MAX - 1));

    assert_eq!(chained_calculation(i32::MAX, 1, 0, 1), Some(i32::MAX));
    assert_eq!(chained_calculation(i32::MAX, 1, 0, 2), None);
    assert_eq!(chained_calculation_in::<Heap>(i32::MAX, 1, 0, 2), None);
    assert_eq!(chain(i32::MAX, 1, 1), None);
}

#[test]
fn test_absent_divide_skips_root() {
    let divides = Rc::new(Cell::new(0));
    let roots = Rc::new(Cell::new(0));

    let (d, r) = (Rc::clone(&divides), Rc::clone(&roots));
    let body = Chained::new(
        10,
        0,
        16,
        3,
        move |a, b| {
            d.set(d.get() + 1);
            safe_divide(a, b)
        },
        move |c| {
            r.set(r.get() + 1);
            safe_sqrt(c)
        },
    );
    assert_eq!(evaluate::<Inline, _, _>(body), None);
    assert_eq!(divides.get(), 1);
    assert_eq!(roots.get(), 0);
}

#[test]
fn test_failure_in_later_round_stops_there() {
    let divides = Rc::new(Cell::new(0));
    let roots = Rc::new(Cell::new(0));

    let (d, r) = (Rc::clone(&divides), Rc::clone(&roots));
    let body = Chained::new(
        10,
        2,
        16,
        5,
        move |a, b| {
            d.set(d.get() + 1);
            // Absent on the second round
            if d.get() == 2 {
                None
            } else {
                safe_divide(a, b)
            }
        },
        move |c| {
            r.set(r.get() + 1);
            safe_sqrt(c)
        },
    );
    assert_eq!(evaluate::<Heap, _, _>(body), None);
    assert_eq!(divides.get(), 2);
    assert_eq!(roots.get(), 1);
}
