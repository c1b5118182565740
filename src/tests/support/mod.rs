// Shared test support code for scenario tests.

pub mod doubles;
pub mod harness;

pub use doubles::{CapturingRenderer, FixedPorts, FlakyRegistry, NoPorts, RecordingService};
pub use harness::{peer, wait_for, Harness};
