//! Discovery-gated configuration: register, await peers, resolve, render.

pub mod coordinator;
pub mod error;
pub mod state;


pub use coordinator::{ConfiguredService, Coordinator, GeneratedConfigurations, Registration, RequirementProgress};
pub use error::{ConfigError, CoordinatorError, RegistrationError};
pub use state::State;
