use serde_json::json;
use telepush::DataStore;
use telepush::Datastore;
use telepush::NotificationKind;
use telepush::Subscription;
use telepush::TreePath;
use tokio::time::sleep;
use tokio::time::Instant;

use crate::common::secs;
use crate::common::start_service;
use crate::common::system_tree;

#[tokio::test(start_paused = true)]
async fn test_on_change_subscription_with_initial_sync() {
    let ctx = start_service().await;
    let origin = Instant::now();

    ctx.service
        .establish(Subscription::on_change("201", "CONFIGURATION", secs(5), false))
        .await
        .unwrap();
    ctx.service.register_on_change("201").await.unwrap();

    sleep(secs(1)).await;
    ctx.store
        .merge(Datastore::Configuration, &TreePath::from("/system"), system_tree("r2"))
        .await
        .unwrap();
    sleep(secs(10)).await;

    let sent = ctx.transport.sent_for("201");
    assert_eq!(sent.len(), 2);

    assert_eq!(sent[0].0, origin);
    assert_eq!(sent[0].1.kind(), NotificationKind::OnChangeUpdate);
    assert_eq!(
        sent[0].1.document().unwrap().as_value(),
        &json!({ "system": { "hostname": "r1" } })
    );

    assert!(sent[1].0.duration_since(origin) <= secs(5));
    assert_eq!(sent[1].1.kind(), NotificationKind::OnChangeUpdate);
    assert_eq!(
        sent[1].1.document().unwrap().as_value(),
        &json!({ "system": { "hostname": "r2" } })
    );
}

#[tokio::test(start_paused = true)]
async fn test_burst_inside_dampening_window_collapses_to_one_delivery() {
    let ctx = start_service().await;

    ctx.service
        .establish(Subscription::on_change("201", "CONFIGURATION", secs(5), false))
        .await
        .unwrap();
    ctx.service.register_on_change("201").await.unwrap();

    for hostname in ["a", "b", "c", "d"] {
        sleep(secs(1)).await;
        ctx.store
            .merge(Datastore::Configuration, &TreePath::from("/system"), system_tree(hostname))
            .await
            .unwrap();
    }
    sleep(secs(10)).await;

    let changes: Vec<_> = ctx
        .transport
        .sent_for("201")
        .into_iter()
        .skip(1)
        .collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(
        changes[0].1.document().unwrap().as_value(),
        &json!({ "system": { "hostname": "d" } })
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_initial_sync_waits_for_first_change() {
    let ctx = start_service().await;

    ctx.service
        .establish(Subscription::on_change("201", "CONFIGURATION", secs(5), true))
        .await
        .unwrap();
    ctx.service.register_on_change("201").await.unwrap();
    sleep(secs(10)).await;
    assert!(ctx.transport.sent_for("201").is_empty());

    ctx.store
        .merge(Datastore::Configuration, &TreePath::from("/system"), system_tree("r9"))
        .await
        .unwrap();
    sleep(secs(1)).await;
    assert_eq!(ctx.transport.count("201", NotificationKind::OnChangeUpdate), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deleted_subtree_is_delivered_as_empty_document() {
    let ctx = start_service().await;

    ctx.service
        .establish(Subscription::on_change("201", "CONFIGURATION", secs(0), true))
        .await
        .unwrap();
    ctx.service.register_on_change("201").await.unwrap();
    sleep(secs(1)).await;

    ctx.store
        .delete(Datastore::Configuration, &TreePath::from("/system"))
        .await
        .unwrap();
    sleep(secs(1)).await;

    let sent = ctx.transport.sent_for("201");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.document().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_operational_watcher_ignores_other_subscriptions_lifecycle() {
    let ctx = start_service().await;

    ctx.service
        .establish(Subscription::on_change("201", "OPERATIONAL", secs(0), true))
        .await
        .unwrap();
    ctx.service.register_on_change("201").await.unwrap();
    sleep(secs(1)).await;

    ctx.service
        .establish(Subscription::periodic("202", "CONFIGURATION", secs(10)))
        .await
        .unwrap();
    ctx.service.suspend("202", Some("maintenance")).await;
    ctx.service.terminate("202", None).await;
    ctx.service.delete("202").await;
    sleep(secs(5)).await;

    assert!(ctx.transport.sent_for("201").is_empty());
}
