use serde_json::json;

use super::{Reconciler, StreamCreateMode, StreamPass, find_consumer};
use crate::tests::memory::{Call, MemoryBroker};
use crate::topology::{
    AckPolicy, ConsumerSpec, DeliverPolicy, RetentionPolicy, StreamSpec, StreamTopology, Topology,
};

fn opd() -> StreamSpec {
    StreamSpec::new("OPD", ["order.>", "patient.>"]).with_retention(RetentionPolicy::Interest)
}

fn consumer(durable: &str) -> ConsumerSpec {
    ConsumerSpec::durable(durable)
        .filter_subject(format!("{durable}.>"))
        .ack_policy(AckPolicy::Explicit)
        .deliver_policy(DeliverPolicy::Last)
}

fn creates(broker: &MemoryBroker) -> usize {
    broker
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::CreateStream(_) | Call::CreateConsumer(..)))
        .count()
}

#[tokio::test]
async fn missing_stream_is_created_verbatim() {
    let broker = MemoryBroker::new();
    let reconciler = Reconciler::new(broker.clone());

    reconciler.reconcile_streams(&[opd()]).await.unwrap();

    assert_eq!(broker.calls(), vec![Call::ListStreams, Call::CreateStream(opd())]);
}

#[tokio::test]
async fn second_pass_issues_no_creates() {
    let broker = MemoryBroker::new();
    let reconciler = Reconciler::new(broker.clone());

    reconciler.reconcile_streams(&[opd()]).await.unwrap();
    broker.clear_calls();
    let pass = reconciler.reconcile_streams(&[opd()]).await.unwrap();

    assert_eq!(creates(&broker), 0);
    assert_eq!(pass.updated, vec!["OPD".to_string()]);
    assert_eq!(broker.stream("OPD").unwrap().config, opd());
}

#[tokio::test]
async fn pass_stops_after_first_create() {
    let broker = MemoryBroker::new();
    let reconciler = Reconciler::new(broker.clone());
    let second = StreamSpec::new("BILLING", ["billing.>"]);

    let pass = reconciler
        .reconcile_streams(&[opd(), second.clone()])
        .await
        .unwrap();

    assert_eq!(
        pass,
        StreamPass {
            created: vec!["OPD".to_string()],
            updated: vec![],
            skipped: vec!["BILLING".to_string()],
        }
    );
    assert!(broker.stream("BILLING").is_none());
    assert!(!broker.calls().contains(&Call::CreateStream(second)));
}

#[tokio::test]
async fn pass_updates_before_stopping_at_a_create() {
    let broker = MemoryBroker::new().with_stream(opd());
    let reconciler = Reconciler::new(broker.clone());

    let pass = reconciler
        .reconcile_streams(&[
            opd(),
            StreamSpec::new("BILLING", ["billing.>"]),
            StreamSpec::new("AUDIT", ["audit.>"]),
        ])
        .await
        .unwrap();

    assert_eq!(pass.updated, vec!["OPD".to_string()]);
    assert_eq!(pass.created, vec!["BILLING".to_string()]);
    assert_eq!(pass.skipped, vec!["AUDIT".to_string()]);
}

#[tokio::test]
async fn continue_all_creates_every_missing_stream() {
    let broker = MemoryBroker::new();
    let reconciler = Reconciler::new(broker.clone()).with_create_mode(StreamCreateMode::ContinueAll);

    let pass = reconciler
        .reconcile_streams(&[opd(), StreamSpec::new("BILLING", ["billing.>"])])
        .await
        .unwrap();

    assert_eq!(pass.created, vec!["OPD".to_string(), "BILLING".to_string()]);
    assert!(pass.skipped.is_empty());
    assert!(broker.stream("BILLING").is_some());
}

#[tokio::test]
async fn update_lays_spec_over_broker_config() {
    let mut current = StreamSpec::new("OPD", ["order.>"]);
    current.retention = Some(RetentionPolicy::Limits);
    current.description = Some("managed elsewhere".to_string());
    current.num_replicas = Some(3);
    current.other.insert("max_consumers".to_string(), json!(7));
    let broker = MemoryBroker::new().with_stream(current);
    let reconciler = Reconciler::new(broker.clone());

    reconciler.reconcile_streams(&[opd()]).await.unwrap();

    let updated = broker
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::UpdateStream(name, config) => Some((name, config)),
            _ => None,
        })
        .expect("update issued");
    assert_eq!(updated.0, "OPD");
    let config = updated.1;
    assert_eq!(config.subjects, opd().subjects);
    assert_eq!(config.retention, Some(RetentionPolicy::Interest));
    assert_eq!(config.description.as_deref(), Some("managed elsewhere"));
    assert_eq!(config.num_replicas, Some(3));
    assert_eq!(config.other.get("max_consumers"), Some(&json!(7)));
}

#[tokio::test]
async fn failed_stream_listing_stops_before_any_write() {
    let broker = MemoryBroker::new();
    broker.fail_on("list streams");
    let reconciler = Reconciler::new(broker.clone());

    let err = reconciler.reconcile_streams(&[opd()]).await.unwrap_err();

    assert_eq!(err.operation(), "list streams");
    assert!(broker.writes().is_empty());
}

#[tokio::test]
async fn durable_name_match_wins_over_name() {
    let broker = MemoryBroker::new()
        .with_stream(opd())
        .with_consumer("OPD", "order", consumer("order"));
    let reconciler = Reconciler::new(broker.clone());
    let mut spec = consumer("order");
    spec.name = Some("something-else".to_string());

    let pass = reconciler.reconcile_consumers("OPD", &[spec.clone()]).await.unwrap();

    assert_eq!(pass.updated, vec!["order".to_string()]);
    assert!(broker.calls().contains(&Call::UpdateConsumer(
        "OPD".to_string(),
        "order".to_string(),
        spec
    )));
}

#[tokio::test]
async fn name_is_the_fallback_key_without_durable_name() {
    let existing = ConsumerSpec {
        name: Some("pull-1".to_string()),
        ..Default::default()
    };
    let broker = MemoryBroker::new()
        .with_stream(opd())
        .with_consumer("OPD", "pull-1", existing);
    let reconciler = Reconciler::new(broker.clone());
    let spec = ConsumerSpec {
        name: Some("pull-1".to_string()),
        filter_subject: Some("order.>".to_string()),
        ..Default::default()
    };

    let pass = reconciler.reconcile_consumers("OPD", &[spec]).await.unwrap();

    assert_eq!(pass.updated, vec!["pull-1".to_string()]);
    assert_eq!(
        broker.consumer("OPD", "pull-1").unwrap().config.filter_subject.as_deref(),
        Some("order.>")
    );
}

#[tokio::test]
async fn name_is_ignored_when_durable_name_is_set() {
    let broker = MemoryBroker::new()
        .with_stream(opd())
        .with_consumer("OPD", "order", consumer("order"));
    let reconciler = Reconciler::new(broker.clone());
    let mut spec = consumer("fresh");
    spec.name = Some("order".to_string());

    let pass = reconciler.reconcile_consumers("OPD", &[spec]).await.unwrap();

    assert_eq!(pass.created, vec!["fresh".to_string()]);
    assert!(pass.updated.is_empty());
}

#[tokio::test]
async fn update_and_create_both_happen_in_one_pass() {
    let broker = MemoryBroker::new()
        .with_stream(opd())
        .with_consumer("OPD", "order", consumer("order"));
    let reconciler = Reconciler::new(broker.clone());
    let changed = consumer("order").ack_wait(5_000_000_000);

    let pass = reconciler
        .reconcile_consumers("OPD", &[changed.clone(), consumer("patient")])
        .await
        .unwrap();

    assert_eq!(pass.updated, vec!["order".to_string()]);
    assert_eq!(pass.created, vec!["patient".to_string()]);
    assert_eq!(broker.consumer("OPD", "order").unwrap().config, changed);
    assert!(broker.consumer("OPD", "patient").is_some());
}

#[tokio::test]
async fn consumer_failure_keeps_earlier_writes() {
    let broker = MemoryBroker::new()
        .with_stream(opd())
        .with_consumer("OPD", "order", consumer("order"));
    broker.fail_on("update consumer");
    let reconciler = Reconciler::new(broker.clone());

    let err = reconciler
        .reconcile_consumers(
            "OPD",
            &[consumer("patient"), consumer("order"), consumer("news")],
        )
        .await
        .unwrap_err();

    assert_eq!(err.operation(), "update consumer");
    assert!(broker.consumer("OPD", "patient").is_some());
    assert!(broker.consumer("OPD", "news").is_none());
}

#[tokio::test]
async fn consumers_are_listed_again_for_every_spec() {
    let broker = MemoryBroker::new().with_stream(opd());
    let reconciler = Reconciler::new(broker.clone());

    reconciler
        .reconcile_consumers("OPD", &[consumer("order"), consumer("patient")])
        .await
        .unwrap();

    let listings = broker
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::ListConsumers(_)))
        .count();
    assert_eq!(listings, 2);
}

#[tokio::test]
async fn ephemeral_specs_are_always_created() {
    let broker = MemoryBroker::new().with_stream(opd());
    let reconciler = Reconciler::new(broker.clone());
    let ephemeral = ConsumerSpec::default().filter_subject("order.>");

    reconciler.reconcile_consumers("OPD", &[ephemeral.clone()]).await.unwrap();
    let pass = reconciler.reconcile_consumers("OPD", &[ephemeral]).await.unwrap();

    assert_eq!(pass.created.len(), 1);
    assert!(pass.updated.is_empty());
}

#[tokio::test]
async fn apply_leaves_consumers_of_skipped_streams_alone() {
    let broker = MemoryBroker::new();
    let reconciler = Reconciler::new(broker.clone());
    let topology = Topology::new(vec![
        StreamTopology::new(opd()).with_consumer(consumer("order")),
        StreamTopology::new(StreamSpec::new("BILLING", ["billing.>"])).with_consumer(consumer("billing")),
    ]);

    reconciler.apply(&topology).await.unwrap();

    assert!(broker.consumer("OPD", "order").is_some());
    assert!(!broker.calls().contains(&Call::ListConsumers("BILLING".to_string())));

    // the next pass picks up where this one stopped
    reconciler.apply(&topology).await.unwrap();
    assert!(broker.consumer("BILLING", "billing").is_some());
}

#[tokio::test]
async fn inspection_and_deletes_pass_through() {
    let broker = MemoryBroker::new()
        .with_stream(opd())
        .with_consumer("OPD", "order", consumer("order"))
        .with_consumer("OPD", "patient", consumer("patient"));
    let reconciler = Reconciler::new(broker.clone());

    assert_eq!(reconciler.streams().await.unwrap().len(), 1);
    assert_eq!(reconciler.consumers("OPD").await.unwrap().len(), 2);
    assert_eq!(reconciler.consumer("OPD", "patient").await.unwrap().name, "patient");

    reconciler.delete_consumer("OPD", "order").await.unwrap();
    assert!(broker.consumer("OPD", "order").is_none());

    reconciler.delete_stream("OPD").await.unwrap();
    assert!(reconciler.streams().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_consumer_info_is_an_error() {
    let broker = MemoryBroker::new().with_stream(opd());
    let reconciler = Reconciler::new(broker);

    let err = reconciler.consumer("OPD", "nobody").await.unwrap_err();

    assert_eq!(err.operation(), "consumer info");
}

#[test]
fn find_consumer_matches_persisted_name_or_durable_name() {
    use crate::topology::ConsumerInfo;

    let info = |name: &str, durable: Option<&str>| ConsumerInfo {
        stream_name: "OPD".to_string(),
        name: name.to_string(),
        created: chrono::Utc::now(),
        config: ConsumerSpec {
            durable_name: durable.map(str::to_string),
            ..Default::default()
        },
        num_pending: 0,
        num_ack_pending: 0,
    };
    let existing = vec![info("order", Some("order")), info("generated-1", Some("patient"))];

    assert_eq!(find_consumer(&existing, &consumer("order")).unwrap().name, "order");
    assert_eq!(
        find_consumer(&existing, &consumer("patient")).unwrap().name,
        "generated-1"
    );
    assert!(find_consumer(&existing, &consumer("news")).is_none());
    assert!(find_consumer(&existing, &ConsumerSpec::default()).is_none());
}
