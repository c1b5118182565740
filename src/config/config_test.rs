//! Tests for configuration parsing.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::{Config, ConfigTrait, DEFAULT_ID_PROPERTY, DEFAULT_TEMPLATE, RESTART_STATE_FILE};

    const YAML: &str = r#"
autoconfigure:
  env: prod
  logs:
    level: info
  timeout: 45s
  service:
    url: "service:web:http://{host}:{port}/"
    address: 10.0.0.5
    properties:
      role: frontend
    additional_ports: [adminPort]
  services:
    - service: "service:db:tcp"
      variable: db
      properties:
        role: primary
  service_collections:
    - service: "service:worker:tcp"
      variable: workers
      cardinality: 3
  templates:
    - name: app.properties
      group: templates/app.yaml
      generated: out/app.properties
  variables:
    cluster: blue
  unique_directories:
    - base: /tmp
      prefix: data-
      variable: dataDir
  total_ordering:
    from: workers
    variable: myId
"#;

    #[test]
    fn test_parses_full_document() {
        let cfg = Config::from_yaml(YAML).unwrap();
        assert!(cfg.is_prod());
        assert_eq!(cfg.timeout(), Duration::from_secs(45));
        assert_eq!(cfg.bind_address().to_string(), "10.0.0.5");
        assert_eq!(cfg.service().additional_ports, vec!["adminPort".to_string()]);
        assert_eq!(cfg.services()[0].properties.get("role").map(String::as_str), Some("primary"));
        assert_eq!(cfg.service_collections()[0].cardinality, 3);
        assert_eq!(cfg.service_collections()[0].id_property, DEFAULT_ID_PROPERTY);
        assert_eq!(cfg.templates()[0].template, DEFAULT_TEMPLATE);
        assert_eq!(cfg.templates()[0].this_service, "thisService");
        assert_eq!(cfg.unique_directories()[0].suffix, "");
        assert_eq!(cfg.total_ordering().unwrap().variable.as_deref(), Some("myId"));
        assert_eq!(cfg.restart_state_file().to_str(), Some(RESTART_STATE_FILE));
    }

    #[test]
    fn test_defaults_for_minimal_document() {
        let cfg = Config::from_yaml(
            "autoconfigure:\n  env: dev\n  service:\n    url: \"service:x:tcp://{host}:{port}\"\n",
        )
        .unwrap();
        assert!(!cfg.is_prod());
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
        assert!(cfg.services().is_empty());
        assert!(cfg.service_collections().is_empty());
        assert_eq!(cfg.bind_address().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_rejects_empty_service_url() {
        assert!(Config::from_yaml("autoconfigure:\n  env: dev\n  service:\n    url: \"\"\n").is_err());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, YAML).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.variables().get("cluster").map(String::as_str), Some("blue"));
        assert!(Config::load(dir.path().join("missing.yaml")).is_err());
    }
}
