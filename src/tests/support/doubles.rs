// Test doubles for the coordinator's collaborators.

use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

use crate::config::Template;
use crate::coordinator::{ConfiguredService, GeneratedConfigurations};
use crate::ports::PortAllocator;
use crate::registry::{
    Filter, Listener, ListenerId, LocalRegistry, Properties, RegistrationId, Registry, RegistryError,
    ServiceReference, ServiceUrl,
};
use crate::render::{RenderError, Renderer};
use crate::variables::VariableContext;

/// Counts outcome callbacks.
#[derive(Default)]
pub struct RecordingService {
    pub succeeded: AtomicUsize,
    pub failed: AtomicUsize,
    pub generated: Mutex<Option<GeneratedConfigurations>>,
    /// Makes `succeed` return an error.
    pub reject: AtomicBool,
}

impl RecordingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        let service = Self::default();
        service.reject.store(true, Ordering::SeqCst);
        service
    }

    pub fn successes(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

impl ConfiguredService for RecordingService {
    fn succeed(&self, generated: &GeneratedConfigurations) -> anyhow::Result<()> {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        *self.generated.lock() = Some(generated.clone());
        if self.reject.load(Ordering::SeqCst) {
            anyhow::bail!("service refused to start");
        }
        Ok(())
    }

    fn fail(&self, generated: &GeneratedConfigurations) -> anyhow::Result<()> {
        self.failed.fetch_add(1, Ordering::SeqCst);
        *self.generated.lock() = Some(generated.clone());
        Ok(())
    }
}

/// Registry that can be told to refuse registrations or listeners.
pub struct FlakyRegistry {
    pub inner: LocalRegistry,
    pub fail_register: AtomicBool,
    /// Refuse the n-th (1-based) `add_listener` call.
    pub fail_listener_at: AtomicUsize,
    pub add_listener_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
}

impl FlakyRegistry {
    pub fn new() -> Self {
        Self {
            inner: LocalRegistry::new(),
            fail_register: AtomicBool::new(false),
            fail_listener_at: AtomicUsize::new(0),
            add_listener_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
        }
    }

    pub fn listener_calls(&self) -> usize {
        self.add_listener_calls.load(Ordering::SeqCst)
    }
}

impl Registry for FlakyRegistry {
    fn register(&self, url: &ServiceUrl, properties: &Properties) -> Result<RegistrationId, RegistryError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(RegistryError::Unreachable("registry is down".into()));
        }
        self.inner.register(url, properties)
    }

    fn unregister(&self, id: RegistrationId) -> Result<(), RegistryError> {
        self.inner.unregister(id)
    }

    fn set_properties(&self, id: RegistrationId, properties: &Properties) -> Result<(), RegistryError> {
        self.inner.set_properties(id, properties)
    }

    fn add_listener(&self, filter: &Filter, listener: Listener) -> Result<ListenerId, RegistryError> {
        let call = self.add_listener_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_listener_at.load(Ordering::SeqCst) {
            return Err(RegistryError::ListenerRejected {
                filter: filter.to_string(),
                reason: "refused".into(),
            });
        }
        self.inner.add_listener(filter, listener)
    }

    fn remove_listener(&self, id: ListenerId) -> Result<(), RegistryError> {
        self.inner.remove_listener(id)
    }

    fn reference(&self, id: RegistrationId) -> Option<ServiceReference> {
        self.inner.reference(id)
    }
}

/// Sequential ports starting at a fixed value.
pub struct FixedPorts {
    next: AtomicU16,
}

impl FixedPorts {
    pub fn new(first: u16) -> Self {
        Self {
            next: AtomicU16::new(first),
        }
    }
}

impl PortAllocator for FixedPorts {
    fn allocate(&self, _address: IpAddr) -> Option<u16> {
        Some(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Always exhausted.
pub struct NoPorts;

impl PortAllocator for NoPorts {
    fn allocate(&self, _address: IpAddr) -> Option<u16> {
        None
    }
}

/// Records every context it is asked to render; optionally fails.
#[derive(Default)]
pub struct CapturingRenderer {
    pub rendered: Mutex<Vec<(String, VariableContext)>>,
    pub fail: AtomicBool,
}

impl CapturingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let renderer = Self::default();
        renderer.fail.store(true, Ordering::SeqCst);
        renderer
    }

    pub fn last(&self) -> Option<VariableContext> {
        self.rendered.lock().last().map(|(_, ctx)| ctx.clone())
    }

    pub fn count(&self) -> usize {
        self.rendered.lock().len()
    }
}

impl Renderer for CapturingRenderer {
    fn render(&self, template: &Template, variables: &VariableContext) -> Result<String, RenderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::TemplateNotFound {
                template: template.template.clone(),
                group: template.group.clone(),
            });
        }
        self.rendered
            .lock()
            .push((template.name.clone(), variables.clone()));
        Ok(format!("rendered {}", template.name))
    }
}
