//! Registry client contract consumed by the coordinator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::filter::Filter;
use super::url::ServiceUrl;

/// String-keyed service metadata.
pub type Properties = BTreeMap<String, String>;

/// Identity handed out by the registry for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Handle of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A registered service as seen through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReference {
    pub registration: RegistrationId,
    pub url: ServiceUrl,
    pub properties: Properties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Registered,
    Modified,
    Unregistered,
}

#[derive(Debug, Clone)]
pub struct ServiceEvent {
    pub kind: EventKind,
    pub reference: ServiceReference,
}

/// Callback invoked for every event matching a listener's filter.
/// May run concurrently on several registry threads.
pub type Listener = Arc<dyn Fn(&ServiceEvent) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry unreachable: {0}")]
    Unreachable(String),
    #[error("unknown registration {0}")]
    UnknownRegistration(RegistrationId),
    #[error("unknown listener {0:?}")]
    UnknownListener(ListenerId),
    #[error("listener rejected for filter {filter}: {reason}")]
    ListenerRejected { filter: String, reason: String },
}

/// Discovery registry where instances advertise themselves and subscribe to peers.
pub trait Registry: Send + Sync {
    fn register(&self, url: &ServiceUrl, properties: &Properties) -> Result<RegistrationId, RegistryError>;

    fn unregister(&self, id: RegistrationId) -> Result<(), RegistryError>;

    /// Replaces the properties of an existing registration.
    fn set_properties(&self, id: RegistrationId, properties: &Properties) -> Result<(), RegistryError>;

    /// Subscribes to events matching `filter`. Implementations deliver a
    /// `Registered` event for every already-registered match.
    fn add_listener(&self, filter: &Filter, listener: Listener) -> Result<ListenerId, RegistryError>;

    fn remove_listener(&self, id: ListenerId) -> Result<(), RegistryError>;

    fn reference(&self, id: RegistrationId) -> Option<ServiceReference>;
}
