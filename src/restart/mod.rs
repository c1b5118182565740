//! Crash-restart persistence of this instance's own registration.

pub mod store;

#[cfg(test)]
mod store_test;

pub use store::{RestartError, RestartState, RestartStore};
