use std::time::SystemTime;

use serde_json::json;
use telepush::DataStore;
use telepush::Datastore;
use telepush::NotificationKind;
use telepush::OamStatus;
use telepush::Subscription;
use telepush::TreePath;
use tokio::time::sleep;
use tokio::time::Instant;

use crate::common::interfaces_tree;
use crate::common::secs;
use crate::common::start_service;

#[tokio::test(start_paused = true)]
async fn test_periodic_operational_subscription() {
    let ctx = start_service().await;
    let origin = Instant::now();

    let id = ctx.service.generate_id();
    assert_eq!(id, "200");
    ctx.service
        .establish(Subscription::periodic(&id, "OPERATIONAL", secs(10)))
        .await
        .unwrap();
    ctx.service.register_periodic(&id).await.unwrap();

    sleep(secs(5)).await;
    ctx.store
        .merge(Datastore::Operational, &TreePath::from("/interfaces"), interfaces_tree(512))
        .await
        .unwrap();
    sleep(secs(10)).await;

    let sent = ctx.transport.sent_for(&id);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0.duration_since(origin), secs(0));
    assert_eq!(sent[1].0.duration_since(origin), secs(10));

    let first = sent[0].1.document().unwrap().as_value();
    let second = sent[1].1.document().unwrap().as_value();
    assert_eq!(sent[0].1.kind(), NotificationKind::PeriodicUpdate);
    assert_eq!(first["interfaces"]["interface"]["in-octets"], json!("0"));
    assert_eq!(second["interfaces"]["interface"]["in-octets"], json!("512"));
}

#[tokio::test(start_paused = true)]
async fn test_bounded_window_delivers_exactly_four_times() {
    let ctx = start_service().await;
    let now = SystemTime::now();

    ctx.service
        .establish(
            Subscription::periodic("200", "CONFIGURATION", secs(10))
                .with_start_time(now)
                .with_stop_time(now + secs(30)),
        )
        .await
        .unwrap();
    ctx.service.register_periodic("200").await.unwrap();

    sleep(secs(120)).await;

    assert_eq!(ctx.transport.count("200", NotificationKind::PeriodicUpdate), 4);
    let (_, last) = ctx.transport.sent_for("200").pop().unwrap();
    assert_eq!(last.oam_status(), Some(OamStatus::NotificationComplete));
    assert_eq!(ctx.transport.closed(), vec!["200".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_composite_stream_reads_both_partitions_per_tick() {
    let ctx = start_service().await;

    ctx.service
        .establish(Subscription::periodic("200", "YANG-PUSH", secs(10)))
        .await
        .unwrap();
    ctx.service.register_periodic("200").await.unwrap();
    sleep(secs(15)).await;

    let sent = ctx.transport.sent_for("200");
    assert_eq!(sent.len(), 4);
    for tick in sent.chunks(2) {
        assert!(tick[0].1.document().unwrap().as_value().get("interfaces").is_some());
        assert_eq!(
            tick[1].1.document().unwrap().as_value(),
            &json!({ "system": { "hostname": "r1" } })
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_unknown_stream_sends_nothing() {
    let ctx = start_service().await;

    ctx.service
        .establish(Subscription::periodic("200", "SYSLOG", secs(10)))
        .await
        .unwrap();
    ctx.service.register_periodic("200").await.unwrap();
    sleep(secs(25)).await;

    assert!(ctx.transport.sent_for("200").is_empty());
}
