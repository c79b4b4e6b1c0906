//! Tests for the sample computations

mod maybe_tests;
