//! Discovery registry: service URLs, filters, the client contract and an in-process implementation.

pub mod filter;
pub mod local;
pub mod registry;
pub mod url;


pub use filter::{Filter, FilterError, SERVICE_TYPE};
pub use local::LocalRegistry;
pub use registry::{
    EventKind, Listener, ListenerId, Properties, RegistrationId, Registry, RegistryError, ServiceEvent,
    ServiceReference,
};
pub use url::{address_host, format_service_url, ServiceUrl, UrlError};
