use super::{AutoconfigureBox, Config, ThisService};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Creates a new test configuration: a loopback service with no peer requirements.
pub fn new_test_config() -> Config {
    Config {
        autoconfigure: AutoconfigureBox {
            env: super::TEST.to_string(),
            logs: Some(super::Logs {
                level: Some("debug".to_string()),
            }),
            timeout: Some(Duration::from_secs(5)),
            restart_state_file: None,
            service: ThisService {
                url: "service:test:tcp://{host}:{port}".to_string(),
                address: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                host: Some("localhost".to_string()),
                properties: BTreeMap::new(),
                additional_ports: Vec::new(),
            },
            services: Vec::new(),
            service_collections: Vec::new(),
            templates: Vec::new(),
            variables: BTreeMap::new(),
            unique_directories: Vec::new(),
            total_ordering: None,
        },
    }
}
