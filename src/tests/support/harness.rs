// Coordinator test harness.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::config::{self, Config, ServiceCollection, SingletonService, Template, TotalOrdering};
use crate::coordinator::{Coordinator, State};
use crate::ports::PortAllocator;
use crate::registry::{Properties, RegistrationId, Registry, ServiceUrl};
use crate::render::Renderer;

use super::doubles::{CapturingRenderer, FixedPorts};

/// Test config rooted in a scratch directory that also holds the restart state.
pub struct Harness {
    pub dir: TempDir,
    pub cfg: Config,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("scratch dir");
        let mut cfg = config::new_test_config();
        cfg.autoconfigure.restart_state_file = Some(dir.path().join("restart.state"));
        Self { dir, cfg }
    }

    pub fn singleton(mut self, variable: &str, service: &str) -> Self {
        self.cfg.autoconfigure.services.push(SingletonService {
            service: service.to_string(),
            variable: variable.to_string(),
            properties: Properties::new(),
        });
        self
    }

    pub fn collection(mut self, variable: &str, service: &str, cardinality: usize) -> Self {
        self.cfg.autoconfigure.service_collections.push(ServiceCollection {
            service: service.to_string(),
            variable: variable.to_string(),
            cardinality,
            id_property: config::DEFAULT_ID_PROPERTY.to_string(),
            properties: Properties::new(),
        });
        self
    }

    pub fn ordering(mut self, from: &str, variable: Option<&str>) -> Self {
        self.cfg.autoconfigure.total_ordering = Some(TotalOrdering {
            from: from.to_string(),
            variable: variable.map(str::to_string),
        });
        self
    }

    /// Adds a template whose group file holds `text` under the default template name.
    pub fn template(mut self, name: &str, text: &str) -> Self {
        let group = self.dir.path().join(format!("{}.group.yaml", name));
        let mut templates = BTreeMap::new();
        templates.insert(config::DEFAULT_TEMPLATE.to_string(), text.to_string());
        std::fs::write(&group, serde_yaml::to_string(&templates).expect("group yaml")).expect("write group");
        self.cfg.autoconfigure.templates.push(Template {
            name: name.to_string(),
            group,
            template: config::DEFAULT_TEMPLATE.to_string(),
            generated: self.generated_path(name),
            this_service: config::DEFAULT_THIS_SERVICE.to_string(),
        });
        self
    }

    pub fn generated_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("generated").join(format!("{}.conf", name))
    }

    pub fn restart_path(&self) -> PathBuf {
        self.dir.path().join("restart.state")
    }

    pub fn coordinator(&self, registry: Arc<dyn Registry>) -> Coordinator {
        self.coordinator_with(registry, Arc::new(CapturingRenderer::new()), Arc::new(FixedPorts::new(4000)))
    }

    pub fn coordinator_with(
        &self,
        registry: Arc<dyn Registry>,
        renderer: Arc<dyn Renderer>,
        ports: Arc<dyn PortAllocator>,
    ) -> Coordinator {
        Coordinator::new(&self.cfg, registry, renderer, ports).expect("valid coordinator config")
    }
}

/// Registers a peer at `type://host:port`.
pub fn peer(registry: &dyn Registry, service_type: &str, host: &str, port: u16) -> RegistrationId {
    registry
        .register(&ServiceUrl::new(service_type, host, port), &Properties::new())
        .expect("register peer")
}

/// Waits for a terminal state, failing the test after `limit`.
pub async fn wait_for(coordinator: &Coordinator, limit: Duration) -> State {
    tokio::time::timeout(limit, coordinator.wait())
        .await
        .expect("coordinator did not settle in time")
}
