//! Tests for the frame runtime
//!
//! Organized by component

mod cleanup_tests;
mod region_tests;
