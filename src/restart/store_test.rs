//! Tests for the restart state file.

#[cfg(test)]
mod tests {
    use crate::registry::Properties;
    use crate::restart::{RestartError, RestartState, RestartStore};

    fn state() -> RestartState {
        let mut properties = Properties::new();
        properties.insert("totalOrderingIndex".into(), "2".into());
        RestartState {
            service_url: "service:app:tcp://localhost:4000".into(),
            service_properties: properties,
        }
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::new(dir.path().join("state"));
        assert!(!store.exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::new(dir.path().join("nested").join("state"));
        store.save(&state()).unwrap();

        assert!(store.exists());
        assert_eq!(store.load().unwrap(), Some(state()));
        assert_eq!(store.load().unwrap().unwrap().url().unwrap().port(), 4000);
    }

    #[test]
    fn test_file_layout_uses_service_url_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::new(dir.path().join("state"));
        store.save(&state()).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(json["serviceURL"], "service:app:tcp://localhost:4000");
        assert_eq!(json["serviceProperties"]["totalOrderingIndex"], "2");
    }

    #[test]
    fn test_loads_existing_service_url_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::new(dir.path().join("state"));
        std::fs::write(
            store.path(),
            br#"{"serviceURL":"service:app:tcp://localhost:4000","serviceProperties":{"totalOrderingIndex":"2"}}"#,
        )
        .unwrap();

        assert_eq!(store.load().unwrap(), Some(state()));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestartStore::new(dir.path().join("state"));
        std::fs::write(store.path(), b"{not json").unwrap();
        assert!(matches!(store.load(), Err(RestartError::Corrupt { .. })));
    }

    #[test]
    fn test_invalid_url() {
        let state = RestartState {
            service_url: "no-separator".into(),
            service_properties: Properties::new(),
        };
        assert!(matches!(state.url(), Err(RestartError::InvalidUrl(_))));
    }
}
