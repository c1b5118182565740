//! The coordinator registers this instance, waits until every declared peer
//! has been discovered, then resolves variables and renders templates.
//!
//! Discovery listeners carry the index of their requirement and a weak handle
//! to the coordinator, so no listener identity lookup is ever needed. The
//! barrier decides the single outcome; both outcome paths run on whichever
//! thread tripped or cancelled it.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::barrier::{Barrier, FailureReason};
use crate::config::{Config, ConfigTrait, ThisService, Template, UniqueDirectory};
use crate::ports::PortAllocator;
use crate::registry::{
    address_host, format_service_url, EventKind, Listener, ListenerId, Properties, RegistrationId, Registry,
    ServiceEvent, ServiceUrl,
};
use crate::render::{write_generated, Renderer};
use crate::requirement::{Discovery, PeerRequirement};
use crate::restart::{RestartError, RestartState, RestartStore};
use crate::variables::{resolve, ResolveError, ResolveInputs, ServiceModel, Value};

use super::error::{ConfigError, CoordinatorError, RegistrationError};
use super::state::State;

/// Template name -> generated file.
pub type GeneratedConfigurations = BTreeMap<String, PathBuf>;

/// The application being configured. Exactly one of the two methods is called per attempt.
pub trait ConfiguredService: Send + Sync {
    fn succeed(&self, generated: &GeneratedConfigurations) -> anyhow::Result<()>;

    /// `generated` may be partial.
    fn fail(&self, generated: &GeneratedConfigurations) -> anyhow::Result<()>;
}

/// This instance's registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: RegistrationId,
    pub url: ServiceUrl,
    pub properties: Properties,
}

impl Registration {
    fn model(&self) -> ServiceModel {
        ServiceModel {
            host: self.url.host().to_string(),
            port: self.url.port(),
            properties: self.properties.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementProgress {
    pub variable: String,
    pub expected: usize,
    pub discovered: usize,
}

impl RequirementProgress {
    pub fn is_satisfied(&self) -> bool {
        self.discovered >= self.expected
    }
}

struct OrderingSource {
    collection: usize,
    variable: Option<String>,
}

/// This instance's place in the ordering collection, captured while rendering.
struct OwnPosition {
    collection: String,
    id_property: String,
    index: Option<String>,
}

struct Attempt {
    overrides: BTreeMap<String, String>,
    service: Arc<dyn ConfiguredService>,
}

struct Inner {
    registry: Arc<dyn Registry>,
    renderer: Arc<dyn Renderer>,
    ports: Arc<dyn PortAllocator>,

    service: ThisService,
    address: IpAddr,
    templates: Vec<Template>,
    constants: BTreeMap<String, String>,
    unique_directories: Vec<UniqueDirectory>,
    ordering: Option<OrderingSource>,
    restart: RestartStore,

    requirements: Vec<Mutex<PeerRequirement>>,

    state: Mutex<State>,
    state_tx: watch::Sender<State>,
    attempt: OnceCell<Attempt>,
    registration: Mutex<Option<Registration>>,
    barrier: Mutex<Option<Arc<Barrier>>>,
    listeners: Mutex<Vec<ListenerId>>,
    generated: Mutex<GeneratedConfigurations>,
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Validates the static configuration and builds one requirement per
    /// configured singleton and collection.
    pub fn new(
        cfg: &Config,
        registry: Arc<dyn Registry>,
        renderer: Arc<dyn Renderer>,
        ports: Arc<dyn PortAllocator>,
    ) -> Result<Self, ConfigError> {
        let mut requirements = Vec::new();
        for singleton in cfg.services() {
            let requirement = PeerRequirement::singleton(singleton).map_err(|source| ConfigError::Filter {
                variable: singleton.variable.clone(),
                source,
            })?;
            requirements.push(requirement);
        }
        for collection in cfg.service_collections() {
            let requirement = PeerRequirement::collection(collection).map_err(|source| ConfigError::Filter {
                variable: collection.variable.clone(),
                source,
            })?;
            requirements.push(requirement);
        }

        let mut seen = HashSet::new();
        for requirement in &requirements {
            if !seen.insert(requirement.variable().to_string()) {
                return Err(ConfigError::DuplicateVariable(requirement.variable().to_string()));
            }
        }

        // Host and port are only known at registration; check the template shape now.
        let service = cfg.service().clone();
        format_service_url(&service.url, "localhost", 1).map_err(|source| ConfigError::InvalidServiceUrl {
            template: service.url.clone(),
            source,
        })?;

        let ordering = match cfg.total_ordering() {
            None => None,
            Some(ordering) => {
                let collection = requirements
                    .iter()
                    .position(|r| !r.is_singleton() && r.variable() == ordering.from)
                    .ok_or_else(|| ConfigError::UnknownOrderingSource(ordering.from.clone()))?;
                if ordering.variable.is_none() {
                    warn!(
                        component = "coordinator",
                        event = "ordering_without_variable",
                        collection = %ordering.from,
                        "total ordering source has no variable, index lookup is skipped"
                    );
                }
                Some(OrderingSource {
                    collection,
                    variable: ordering.variable.clone(),
                })
            }
        };

        let (state_tx, _) = watch::channel(State::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                renderer,
                ports,
                service,
                address: cfg.bind_address(),
                templates: cfg.templates().to_vec(),
                constants: cfg.variables().clone(),
                unique_directories: cfg.unique_directories().to_vec(),
                ordering,
                restart: RestartStore::new(cfg.restart_state_file()),
                requirements: requirements.into_iter().map(Mutex::new).collect(),
                state: Mutex::new(State::Idle),
                state_tx,
                attempt: OnceCell::new(),
                registration: Mutex::new(None),
                barrier: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                generated: Mutex::new(GeneratedConfigurations::new()),
            }),
        })
    }

    /// Starts the single configuration attempt.
    ///
    /// Returns once listeners are in place; the outcome is delivered to
    /// `service` and observable through [`Coordinator::wait`]. Errors returned
    /// here have already been routed to `service.fail`, except
    /// `AlreadyConfiguring`.
    pub fn configure(
        &self,
        overrides: BTreeMap<String, String>,
        service: Arc<dyn ConfiguredService>,
        timeout: Duration,
    ) -> Result<(), CoordinatorError> {
        {
            let mut state = self.inner.state.lock();
            if *state != State::Idle {
                return Err(CoordinatorError::AlreadyConfiguring(*state));
            }
            *state = State::Registering;
        }
        self.inner.state_tx.send_replace(State::Registering);
        // The Idle check above admits exactly one caller.
        let _ = self.inner.attempt.set(Attempt { overrides, service });

        match self.inner.restart.load() {
            Ok(None) => {}
            Ok(Some(state)) => return self.inner.restart(state),
            Err(e) => {
                self.inner.abort(&e.to_string());
                return Err(e.into());
            }
        }

        let registration = match self.inner.register_self() {
            Ok(registration) => registration,
            Err(e) => {
                self.inner.abort(&e.to_string());
                return Err(e.into());
            }
        };
        *self.inner.registration.lock() = Some(registration);
        self.inner.advance(State::AwaitingPeers);

        let expected: usize = self.inner.requirements.iter().map(|r| r.lock().cardinality()).sum();
        info!(
            component = "coordinator",
            event = "awaiting_peers",
            expected,
            requirements = self.inner.requirements.len(),
            timeout = %humantime::format_duration(timeout),
            "waiting for peers"
        );

        let on_trip = Arc::downgrade(&self.inner);
        let on_fail = Arc::downgrade(&self.inner);
        let barrier = Barrier::new(
            expected,
            move || {
                if let Some(inner) = on_trip.upgrade() {
                    inner.on_trip();
                }
            },
            move |reason| {
                if let Some(inner) = on_fail.upgrade() {
                    inner.on_barrier_failure(reason);
                }
            },
        );
        *self.inner.barrier.lock() = Some(barrier.clone());
        if barrier.is_terminal() {
            return Ok(());
        }

        if let Err(e) = barrier.schedule_timeout(timeout) {
            error!(component = "coordinator", event = "timer_failed", error = %e, "cannot arm barrier timeout");
            barrier.cancel();
            return Err(e.into());
        }

        for (index, requirement) in self.inner.requirements.iter().enumerate() {
            let (variable, filter) = {
                let requirement = requirement.lock();
                (requirement.variable().to_string(), requirement.filter().clone())
            };
            let weak = Arc::downgrade(&self.inner);
            let listener: Listener = Arc::new(move |event: &ServiceEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_event(index, event);
                }
            });

            match self.inner.registry.add_listener(&filter, listener) {
                Ok(id) => {
                    debug!(component = "coordinator", event = "listener_added", variable = %variable, filter = %filter, "listening for peers");
                    self.inner.listeners.lock().push(id);
                }
                Err(source) => {
                    error!(
                        component = "coordinator",
                        event = "listener_failed",
                        variable = %variable,
                        filter = %filter,
                        error = %source,
                        "cannot listen for peers"
                    );
                    barrier.cancel();
                    return Err(CoordinatorError::Listener { variable, source });
                }
            }
        }
        Ok(())
    }

    pub fn state(&self) -> State {
        *self.inner.state.lock()
    }

    /// Resolves once the attempt is terminal, after the outcome callback returned.
    pub async fn wait(&self) -> State {
        let mut rx = self.inner.state_tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if state.is_terminal() {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }

    pub fn progress(&self) -> Vec<RequirementProgress> {
        self.inner.progress()
    }

    pub fn registration(&self) -> Option<Registration> {
        self.inner.registration.lock().clone()
    }

    pub fn generated(&self) -> GeneratedConfigurations {
        self.inner.generated.lock().clone()
    }

    /// Stops listening and withdraws this instance. A pending attempt fails.
    pub fn shutdown(&self) {
        let barrier = self.inner.barrier.lock().clone();
        if let Some(barrier) = barrier {
            barrier.cancel();
        }

        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        for id in listeners {
            if let Err(e) = self.inner.registry.remove_listener(id) {
                warn!(component = "coordinator", event = "remove_listener_failed", error = %e, "cannot remove listener");
            }
        }

        let registration = self.inner.registration.lock().take();
        if let Some(registration) = registration {
            match self.inner.registry.unregister(registration.id) {
                Ok(()) => info!(
                    component = "coordinator",
                    event = "unregistered",
                    url = %registration.url,
                    "service unregistered"
                ),
                Err(e) => warn!(component = "coordinator", event = "unregister_failed", error = %e, "cannot unregister service"),
            }
        }
    }
}

impl Inner {
    fn register_self(&self) -> Result<Registration, RegistrationError> {
        let host = self
            .service
            .host
            .clone()
            .unwrap_or_else(|| address_host(self.address));
        let port = self.allocate_port()?;
        let url = format_service_url(&self.service.url, &host, port)?;

        let mut properties = self.service.properties.clone();
        for name in &self.service.additional_ports {
            let port = self.allocate_port()?;
            properties.insert(name.clone(), port.to_string());
        }

        let id = self.registry.register(&url, &properties)?;
        info!(
            component = "coordinator",
            event = "registered",
            registration = %id,
            url = %url,
            "service registered"
        );
        Ok(Registration { id, url, properties })
    }

    fn allocate_port(&self) -> Result<u16, RegistrationError> {
        self.ports
            .allocate(self.address)
            .filter(|port| *port != 0)
            .ok_or(RegistrationError::PortExhausted(self.address))
    }

    fn restart(&self, state: RestartState) -> Result<(), CoordinatorError> {
        let registered = state.url().and_then(|url| {
            let id = self
                .registry
                .register(&url, &state.service_properties)
                .map_err(RestartError::Register)?;
            Ok(Registration {
                id,
                url,
                properties: state.service_properties.clone(),
            })
        });

        let registration = match registered {
            Ok(registration) => registration,
            Err(e) => {
                error!(
                    component = "coordinator",
                    event = "restart_failed",
                    path = %self.restart.path().display(),
                    error = %e,
                    "cannot restart from saved state"
                );
                self.abort(&e.to_string());
                return Err(e.into());
            }
        };

        info!(
            component = "coordinator",
            event = "restarted",
            registration = %registration.id,
            url = %registration.url,
            "re-registered from restart state, skipping discovery"
        );
        *self.registration.lock() = Some(registration);

        {
            let mut generated = self.generated.lock();
            for template in &self.templates {
                if template.generated.exists() {
                    generated.insert(template.name.clone(), template.generated.clone());
                }
            }
        }
        self.complete();
        Ok(())
    }

    fn on_event(&self, index: usize, event: &ServiceEvent) {
        let Some(requirement) = self.requirements.get(index) else {
            return;
        };
        if event.kind != EventKind::Registered {
            debug!(
                component = "coordinator",
                event = "ignored_event",
                kind = ?event.kind,
                url = %event.reference.url,
                "only registrations are tracked"
            );
            return;
        }

        let Some(barrier) = self.barrier.lock().clone() else {
            return;
        };
        if barrier.is_terminal() {
            debug!(component = "coordinator", event = "late_discovery", url = %event.reference.url, "attempt already settled");
            return;
        }

        let own = self.registration.lock().as_ref().map(|r| r.id);
        let outcome = {
            let mut requirement = requirement.lock();
            if requirement.is_singleton() && own == Some(event.reference.registration) {
                return;
            }
            requirement.discover(event.reference.clone())
        };

        if outcome == Discovery::Accepted {
            barrier.arrive();
        }
    }

    fn on_trip(&self) {
        self.advance(State::Rendering);
        info!(component = "coordinator", event = "peers_discovered", "all peers discovered, rendering");
        match self.render_all() {
            Ok(()) => self.complete(),
            Err(e) => {
                error!(component = "coordinator", event = "render_failed", error = %e, "configuration failed");
                self.abort(&e.to_string());
            }
        }
    }

    fn on_barrier_failure(&self, reason: FailureReason) {
        for progress in self.progress().iter().filter(|p| !p.is_satisfied()) {
            warn!(
                component = "coordinator",
                event = "unsatisfied",
                variable = %progress.variable,
                expected = progress.expected,
                discovered = progress.discovered,
                "requirement not satisfied"
            );
        }
        let cause = match reason {
            FailureReason::Timeout => "timed out waiting for peers",
            FailureReason::Cancelled => "cancelled while waiting for peers",
        };
        self.abort(cause);
    }

    fn render_all(&self) -> Result<(), CoordinatorError> {
        let registration = self
            .registration
            .lock()
            .clone()
            .ok_or_else(|| ResolveError::Undiscovered(self.service.url.clone()))?;

        let mut singletons = Vec::new();
        let mut collections = Vec::new();
        let mut own_position = None;
        for (slot, requirement) in self.requirements.iter().enumerate() {
            let requirement = requirement.lock();
            match &*requirement {
                PeerRequirement::Singleton(s) => {
                    let discovered = s
                        .discovered()
                        .ok_or_else(|| ResolveError::Undiscovered(requirement.variable().to_string()))?;
                    singletons.push((requirement.variable().to_string(), discovered.model()));
                }
                PeerRequirement::Collection(c) => {
                    // Index and rendered members come from the same membership.
                    if let Some(OrderingSource {
                        collection,
                        variable: Some(_),
                    }) = &self.ordering
                    {
                        if *collection == slot {
                            own_position = Some(OwnPosition {
                                collection: requirement.variable().to_string(),
                                id_property: c.id_property().to_string(),
                                index: c.index_of(registration.id),
                            });
                        }
                    }
                    let members = c.members().iter().map(|m| m.model()).collect();
                    collections.push((requirement.variable().to_string(), members));
                }
            }
        }

        let (registration, index) = self.publish_ordering(registration, own_position)?;
        let ordering = match (&self.ordering, index) {
            (Some(OrderingSource { variable: Some(variable), .. }), Some(index)) => Some((variable.clone(), index)),
            _ => None,
        };

        let attempt = self.attempt.get();
        let variables = resolve(ResolveInputs {
            constants: Some(&self.constants),
            unique_directories: &self.unique_directories,
            singletons,
            collections,
            ordering,
            overrides: attempt.map(|a| &a.overrides),
        })?;

        for template in &self.templates {
            let mut context = variables.clone();
            context.insert_if_absent(template.this_service.clone(), Value::Service(registration.model()));
            let text = self.renderer.render(template, &context)?;
            write_generated(&template.generated, &text)?;
            info!(
                component = "coordinator",
                event = "generated",
                template = %template.name,
                path = %template.generated.display(),
                "configuration generated"
            );
            self.generated
                .lock()
                .insert(template.name.clone(), template.generated.clone());
        }

        let properties = self
            .registry
            .reference(registration.id)
            .map(|r| r.properties)
            .unwrap_or_else(|| registration.properties.clone());
        self.restart.save(&RestartState {
            service_url: registration.url.to_string(),
            service_properties: properties,
        })?;
        Ok(())
    }

    /// Pushes this instance's ordering index into its registered properties.
    /// Returns the updated registration and index.
    fn publish_ordering(
        &self,
        mut registration: Registration,
        position: Option<OwnPosition>,
    ) -> Result<(Registration, Option<String>), CoordinatorError> {
        let Some(OwnPosition {
            collection,
            id_property,
            index,
        }) = position
        else {
            return Ok((registration, None));
        };
        let index = index.ok_or(ResolveError::NotInOrderingCollection { collection })?;

        registration.properties.insert(id_property, index.clone());
        self.registry
            .set_properties(registration.id, &registration.properties)
            .map_err(ResolveError::PropertyUpdate)?;
        info!(
            component = "coordinator",
            event = "ordering_index",
            index = %index,
            "total ordering index published"
        );
        *self.registration.lock() = Some(registration.clone());
        Ok((registration, Some(index)))
    }

    fn progress(&self) -> Vec<RequirementProgress> {
        self.requirements
            .iter()
            .map(|r| {
                let r = r.lock();
                RequirementProgress {
                    variable: r.variable().to_string(),
                    expected: r.cardinality(),
                    discovered: r.discovered_count(),
                }
            })
            .collect()
    }

    fn advance(&self, to: State) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = to;
        }
        self.state_tx.send_replace(to);
    }

    fn complete(&self) {
        let generated = self.generated.lock().clone();
        let result = match self.attempt.get() {
            Some(attempt) => attempt.service.succeed(&generated),
            None => Ok(()),
        };
        match result {
            Ok(()) => {
                info!(component = "coordinator", event = "succeeded", generated = generated.len(), "configuration succeeded");
                self.settle(State::Succeeded);
            }
            Err(e) => {
                error!(component = "coordinator", event = "succeed_failed", error = %format!("{:#}", e), "service rejected configuration");
                self.abort("service rejected configuration");
            }
        }
    }

    fn abort(&self, cause: &str) {
        warn!(component = "coordinator", event = "failed", cause = %cause, "configuration failed");
        let generated = self.generated.lock().clone();
        if let Some(attempt) = self.attempt.get() {
            if let Err(e) = attempt.service.fail(&generated) {
                error!(component = "coordinator", event = "fail_callback_failed", error = %format!("{:#}", e), "failure callback returned an error");
            }
        }
        self.settle(State::Failed);
    }

    // Published only after the outcome callback returned.
    fn settle(&self, terminal: State) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = terminal;
        }
        self.state_tx.send_replace(terminal);
    }
}
