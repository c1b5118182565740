//! In-process registry.
//!
//! Events are delivered synchronously on the thread performing the mutation, so
//! concurrent `register` calls produce concurrent listener invocations.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

use super::filter::Filter;
use super::registry::{
    EventKind, Listener, ListenerId, Properties, RegistrationId, Registry, RegistryError, ServiceEvent,
    ServiceReference,
};
use super::url::ServiceUrl;

pub struct LocalRegistry {
    registrations: DashMap<RegistrationId, ServiceReference>,
    listeners: DashMap<ListenerId, (Filter, Listener)>,
    next_listener: AtomicU64,
    // Mutations hold it shared, listener addition holds it exclusive, so a new
    // listener sees each registration exactly once: via replay or via dispatch.
    epoch: RwLock<()>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self {
            registrations: DashMap::new(),
            listeners: DashMap::new(),
            next_listener: AtomicU64::new(1),
            epoch: RwLock::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// All registrations whose URL has the given service type.
    pub fn references_of(&self, service_type: &str) -> Vec<ServiceReference> {
        self.registrations
            .iter()
            .filter(|r| r.url.service_type() == service_type)
            .map(|r| r.value().clone())
            .collect()
    }

    fn matching_listeners(&self, reference: &ServiceReference) -> Vec<Listener> {
        self.listeners
            .iter()
            .filter(|entry| entry.value().0.matches(reference))
            .map(|entry| entry.value().1.clone())
            .collect()
    }

    fn dispatch(listeners: Vec<Listener>, kind: EventKind, reference: ServiceReference) {
        if listeners.is_empty() {
            return;
        }
        let event = ServiceEvent { kind, reference };
        for listener in listeners {
            listener(&event);
        }
    }
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for LocalRegistry {
    fn register(&self, url: &ServiceUrl, properties: &Properties) -> Result<RegistrationId, RegistryError> {
        let id = RegistrationId::new();
        let reference = ServiceReference {
            registration: id,
            url: url.clone(),
            properties: properties.clone(),
        };

        let listeners = {
            let _epoch = self.epoch.read();
            self.registrations.insert(id, reference.clone());
            self.matching_listeners(&reference)
        };

        debug!(
            component = "registry",
            event = "registered",
            registration = %id,
            url = %url,
            listeners = listeners.len(),
            "service registered"
        );
        Self::dispatch(listeners, EventKind::Registered, reference);
        Ok(id)
    }

    fn unregister(&self, id: RegistrationId) -> Result<(), RegistryError> {
        let (reference, listeners) = {
            let _epoch = self.epoch.read();
            let (_, reference) = self
                .registrations
                .remove(&id)
                .ok_or(RegistryError::UnknownRegistration(id))?;
            let listeners = self.matching_listeners(&reference);
            (reference, listeners)
        };

        debug!(component = "registry", event = "unregistered", registration = %id, "service unregistered");
        Self::dispatch(listeners, EventKind::Unregistered, reference);
        Ok(())
    }

    fn set_properties(&self, id: RegistrationId, properties: &Properties) -> Result<(), RegistryError> {
        let (reference, listeners) = {
            let _epoch = self.epoch.read();
            let mut entry = self
                .registrations
                .get_mut(&id)
                .ok_or(RegistryError::UnknownRegistration(id))?;
            entry.properties = properties.clone();
            let reference = entry.value().clone();
            drop(entry);
            let listeners = self.matching_listeners(&reference);
            (reference, listeners)
        };

        Self::dispatch(listeners, EventKind::Modified, reference);
        Ok(())
    }

    fn add_listener(&self, filter: &Filter, listener: Listener) -> Result<ListenerId, RegistryError> {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));

        let existing: Vec<ServiceReference> = {
            let _epoch = self.epoch.write();
            self.listeners.insert(id, (filter.clone(), listener.clone()));
            self.registrations
                .iter()
                .filter(|r| filter.matches(r.value()))
                .map(|r| r.value().clone())
                .collect()
        };

        trace!(
            component = "registry",
            event = "listener_added",
            filter = %filter,
            replayed = existing.len(),
            "listener added"
        );
        for reference in existing {
            listener(&ServiceEvent {
                kind: EventKind::Registered,
                reference,
            });
        }
        Ok(id)
    }

    fn remove_listener(&self, id: ListenerId) -> Result<(), RegistryError> {
        let _epoch = self.epoch.write();
        self.listeners
            .remove(&id)
            .map(|_| ())
            .ok_or(RegistryError::UnknownListener(id))
    }

    fn reference(&self, id: RegistrationId) -> Option<ServiceReference> {
        self.registrations.get(&id).map(|r| r.value().clone())
    }
}
