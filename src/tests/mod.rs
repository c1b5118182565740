//! Scenario tests for the coordinator.
//!
//! Each case wires a `Coordinator` to an in-process registry and drives peers
//! through it, checking which outcome fires and what the templates saw.

mod cases_ordering_test;

pub mod support;
