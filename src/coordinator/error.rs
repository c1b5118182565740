use std::net::IpAddr;

use crate::barrier::BarrierError;
use crate::registry::{FilterError, RegistryError, UrlError};
use crate::render::RenderError;
use crate::restart::RestartError;
use crate::variables::ResolveError;

use super::state::State;

/// Static configuration rejected before any registration happens.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("requirement {variable:?} has an invalid filter: {source}")]
    Filter {
        variable: String,
        #[source]
        source: FilterError,
    },
    #[error("service url template {template:?} is invalid: {source}")]
    InvalidServiceUrl {
        template: String,
        #[source]
        source: UrlError,
    },
    #[error("total ordering source {0:?} is not a configured service collection")]
    UnknownOrderingSource(String),
    #[error("variable {0:?} is assigned to more than one requirement")]
    DuplicateVariable(String),
}

/// Failure to advertise this instance.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("no free port on {0}")]
    PortExhausted(IpAddr),
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("configure called while {0}")]
    AlreadyConfiguring(State),
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),
    #[error("listener for {variable:?} failed: {source}")]
    Listener {
        variable: String,
        #[source]
        source: RegistryError,
    },
    #[error("cannot arm timeout: {0}")]
    Timer(#[from] BarrierError),
    #[error("restart failed: {0}")]
    Restart(#[from] RestartError),
    #[error("variable resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
}
