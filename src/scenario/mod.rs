//! Mocked peers for exercising templates without a live cluster.
//!
//! A scenario file maps a label (usually the requirement variable) to the
//! peers that should appear in the registry:
//!
//! ```yaml
//! db:
//!   - url: service:db:tcp://db1:5432
//! workers:
//!   - url: service:worker:tcp://w1:7001
//!     properties: { zone: eu }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::registry::{Properties, RegistrationId, Registry, RegistryError, ServiceUrl};

#[derive(Debug, Clone, Deserialize)]
pub struct MockPeer {
    pub url: ServiceUrl,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Scenario {
    pub peers: BTreeMap<String, Vec<MockPeer>>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).with_context(|| format!("read scenario file {:?}", path))?;
        Self::from_yaml(&data).with_context(|| format!("unmarshal scenario from {:?}", path))
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        // An empty document means no peers.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn len(&self) -> usize {
        self.peers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers every peer, returning their registrations in file order.
    pub fn publish(&self, registry: &dyn Registry) -> Result<Vec<RegistrationId>, RegistryError> {
        let mut ids = Vec::with_capacity(self.len());
        for (label, peers) in &self.peers {
            for peer in peers {
                let id = registry.register(&peer.url, &peer.properties)?;
                info!(
                    component = "scenario",
                    event = "peer_published",
                    label = %label,
                    url = %peer.url,
                    "mock peer registered"
                );
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
