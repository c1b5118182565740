// Scenario tests for total ordering among collection members.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::coordinator::State;
use crate::registry::{LocalRegistry, Registry};
use crate::restart::RestartStore;
use crate::support::{peer, wait_for, CapturingRenderer, FixedPorts, Harness, RecordingService};
use crate::variables::Value;

const MEMBER: &str = "service:test:tcp";
const LIMIT: Duration = Duration::from_secs(5);

/// This instance belongs to its own ordering collection: it learns its index,
/// exposes it as a variable and publishes it in its registration.
#[tokio::test]
async fn test_ordering_index_is_published() {
    let harness = Harness::new()
        .collection("members", MEMBER, 3)
        .ordering("members", Some("memberIndex"))
        .template("app", "unused");
    let registry = Arc::new(LocalRegistry::new());
    let renderer = Arc::new(CapturingRenderer::new());
    let coordinator = harness.coordinator_with(registry.clone(), renderer.clone(), Arc::new(FixedPorts::new(4000)));
    let service = Arc::new(RecordingService::new());

    // Own URL is service:test:tcp://localhost:4000; these sort before and after it.
    peer(registry.as_ref(), MEMBER, "alpha", 4000);
    coordinator
        .configure(BTreeMap::new(), service.clone(), Duration::from_secs(5))
        .unwrap();
    peer(registry.as_ref(), MEMBER, "zulu", 4000);

    assert_eq!(wait_for(&coordinator, LIMIT).await, State::Succeeded);

    let ctx = renderer.last().unwrap();
    assert_eq!(ctx.get("memberIndex"), Some(&Value::from("2")));

    let registration = coordinator.registration().unwrap();
    assert_eq!(registration.properties["totalOrderingIndex"], "2");
    let published = registry.reference(registration.id).unwrap();
    assert_eq!(published.properties["totalOrderingIndex"], "2");

    let saved = RestartStore::new(harness.restart_path()).load().unwrap().unwrap();
    assert_eq!(saved.service_url, "service:test:tcp://localhost:4000");
    assert_eq!(saved.service_properties["totalOrderingIndex"], "2");

    // thisService sees the published index too.
    match ctx.get("thisService") {
        Some(Value::Service(this)) => {
            assert_eq!(this.port, 4000);
            assert_eq!(this.properties["totalOrderingIndex"], "2");
        }
        other => panic!("unexpected thisService value {:?}", other),
    }
}

#[tokio::test]
async fn test_absent_from_ordering_collection_is_fatal() {
    let harness = Harness::new()
        .collection("workers", "service:worker:tcp", 1)
        .ordering("workers", Some("workerIndex"));
    let registry = Arc::new(LocalRegistry::new());
    let coordinator = harness.coordinator(registry.clone());
    let service = Arc::new(RecordingService::new());

    coordinator
        .configure(BTreeMap::new(), service.clone(), Duration::from_secs(5))
        .unwrap();
    peer(registry.as_ref(), "service:worker:tcp", "w1", 7000);

    assert_eq!(wait_for(&coordinator, LIMIT).await, State::Failed);
    assert_eq!(service.failures(), 1);
    assert_eq!(service.successes(), 0);
}

#[tokio::test]
async fn test_ordering_without_variable_is_skipped() {
    let harness = Harness::new()
        .collection("workers", "service:worker:tcp", 1)
        .ordering("workers", None);
    let registry = Arc::new(LocalRegistry::new());
    let coordinator = harness.coordinator(registry.clone());
    let service = Arc::new(RecordingService::new());

    coordinator
        .configure(BTreeMap::new(), service.clone(), Duration::from_secs(5))
        .unwrap();
    peer(registry.as_ref(), "service:worker:tcp", "w1", 7000);

    assert_eq!(wait_for(&coordinator, LIMIT).await, State::Succeeded);
    let registration = coordinator.registration().unwrap();
    assert!(!registration.properties.contains_key("totalOrderingIndex"));
}
