#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod barrier;
pub mod config;
pub mod coordinator;
pub mod ports;
pub mod registry;
pub mod render;
pub mod requirement;
pub mod restart;
pub mod scenario;
pub mod variables;
