// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::Properties;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const TEST: &str = "test";

pub const RESTART_STATE_FILE: &str = ".autoconfigure.restart.state";
pub const DEFAULT_ID_PROPERTY: &str = "totalOrderingIndex";
pub const DEFAULT_TEMPLATE: &str = "configuration";
pub const DEFAULT_THIS_SERVICE: &str = "thisService";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Autoconfigure {
    #[serde(rename = "autoconfigure")]
    pub autoconfigure: AutoconfigureBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutoconfigureBox {
    pub env: String,
    pub logs: Option<Logs>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(rename = "restart_state_file")]
    pub restart_state_file: Option<PathBuf>,
    pub service: ThisService,
    #[serde(default)]
    pub services: Vec<SingletonService>,
    #[serde(default, rename = "service_collections")]
    pub service_collections: Vec<ServiceCollection>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default, rename = "unique_directories")]
    pub unique_directories: Vec<UniqueDirectory>,
    #[serde(rename = "total_ordering")]
    pub total_ordering: Option<TotalOrdering>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

/// The instance being configured.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThisService {
    /// URL template with `{host}` and `{port}` placeholders.
    pub url: String,
    pub address: Option<IpAddr>,
    /// Host name written into the URL; defaults to the address.
    pub host: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    /// Property names that each receive a freshly allocated port.
    #[serde(default, rename = "additional_ports")]
    pub additional_ports: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SingletonService {
    pub service: String,
    pub variable: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceCollection {
    pub service: String,
    pub variable: String,
    pub cardinality: usize,
    #[serde(default = "default_id_property", rename = "id_property")]
    pub id_property: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Template {
    pub name: String,
    /// Template group file.
    pub group: PathBuf,
    #[serde(default = "default_template")]
    pub template: String,
    /// Output file.
    pub generated: PathBuf,
    #[serde(default = "default_this_service", rename = "this_service")]
    pub this_service: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UniqueDirectory {
    pub base: PathBuf,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    pub variable: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TotalOrdering {
    /// Variable name of the collection providing the ordering.
    pub from: String,
    /// Variable receiving this instance's index.
    pub variable: Option<String>,
}

fn default_id_property() -> String {
    DEFAULT_ID_PROPERTY.to_string()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_this_service() -> String {
    DEFAULT_THIS_SERVICE.to_string()
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn timeout(&self) -> Duration;
    fn restart_state_file(&self) -> PathBuf;
    fn service(&self) -> &ThisService;
    fn bind_address(&self) -> IpAddr;
    fn services(&self) -> &[SingletonService];
    fn service_collections(&self) -> &[ServiceCollection];
    fn templates(&self) -> &[Template];
    fn variables(&self) -> &BTreeMap<String, String>;
    fn unique_directories(&self) -> &[UniqueDirectory];
    fn total_ordering(&self) -> Option<&TotalOrdering>;
}

// Config type alias for convenience
pub type Config = Autoconfigure;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.autoconfigure.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.autoconfigure.env == PROD
    }

    fn is_test(&self) -> bool {
        self.autoconfigure.env == TEST
    }

    fn timeout(&self) -> Duration {
        self.autoconfigure.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    fn restart_state_file(&self) -> PathBuf {
        self.autoconfigure
            .restart_state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(RESTART_STATE_FILE))
    }

    fn service(&self) -> &ThisService {
        &self.autoconfigure.service
    }

    fn bind_address(&self) -> IpAddr {
        self.autoconfigure
            .service
            .address
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn services(&self) -> &[SingletonService] {
        &self.autoconfigure.services
    }

    fn service_collections(&self) -> &[ServiceCollection] {
        &self.autoconfigure.service_collections
    }

    fn templates(&self) -> &[Template] {
        &self.autoconfigure.templates
    }

    fn variables(&self) -> &BTreeMap<String, String> {
        &self.autoconfigure.variables
    }

    fn unique_directories(&self) -> &[UniqueDirectory] {
        &self.autoconfigure.unique_directories
    }

    fn total_ordering(&self) -> Option<&TotalOrdering> {
        self.autoconfigure.total_ordering.as_ref()
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::from_yaml(&data).with_context(|| format!("unmarshal yaml from {:?}", abs_path))
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(data)?;

        if cfg.autoconfigure.service.url.trim().is_empty() {
            anyhow::bail!("service.url must not be empty");
        }
        for collection in &cfg.autoconfigure.service_collections {
            if collection.id_property.trim().is_empty() {
                anyhow::bail!("service collection {:?} has an empty id_property", collection.variable);
            }
        }

        Ok(cfg)
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;

#[cfg(test)]
mod config_test;
