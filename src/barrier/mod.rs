//! One-shot rendezvous barrier with timeout-based failure.

pub mod barrier;


pub use barrier::{Barrier, BarrierError, BarrierState, FailureReason};
