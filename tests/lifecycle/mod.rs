use telepush::Error;
use telepush::NotificationKind;
use telepush::OamStatus;
use telepush::StreamStatus;
use telepush::Subscription;
use tokio::time::sleep;

use crate::common::secs;
use crate::common::start_service;

#[tokio::test(start_paused = true)]
async fn test_establish_exists_delete() {
    let ctx = start_service().await;

    let id = ctx.service.generate_id();
    assert!(ctx
        .service
        .establish(Subscription::periodic(&id, "CONFIGURATION", secs(10)))
        .await
        .unwrap());
    assert!(ctx.service.registry().exists(&id));

    // Second establish with the same id keeps the first record
    assert!(!ctx
        .service
        .establish(Subscription::periodic(&id, "OPERATIONAL", secs(1)))
        .await
        .unwrap());
    assert_eq!(ctx.service.registry().get(&id).unwrap().stream, "CONFIGURATION");

    assert!(ctx.service.delete(&id).await);
    assert!(!ctx.service.registry().exists(&id));
}

#[tokio::test(start_paused = true)]
async fn test_suspend_and_resume() {
    let ctx = start_service().await;
    ctx.service
        .establish(Subscription::periodic("200", "CONFIGURATION", secs(10)))
        .await
        .unwrap();
    ctx.service.register_periodic("200").await.unwrap();
    sleep(secs(5)).await;

    assert!(ctx.service.suspend("200", Some("resource shortage")).await);
    assert_eq!(ctx.service.registry().get("200").unwrap().status, StreamStatus::Suspended);
    sleep(secs(40)).await;
    assert_eq!(ctx.transport.count("200", NotificationKind::PeriodicUpdate), 1);

    assert!(ctx.service.resume("200").await);
    sleep(secs(10)).await;
    assert_eq!(ctx.transport.count("200", NotificationKind::PeriodicUpdate), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_while_running_stops_delivery() {
    let ctx = start_service().await;
    ctx.service
        .establish(Subscription::on_change("201", "CONFIGURATION", secs(5), false))
        .await
        .unwrap();
    ctx.service
        .establish(Subscription::periodic("202", "CONFIGURATION", secs(10)))
        .await
        .unwrap();
    ctx.service.register_on_change("201").await.unwrap();
    ctx.service.register_periodic("202").await.unwrap();
    sleep(secs(1)).await;

    assert!(ctx.service.delete("201").await);
    assert!(ctx.service.delete("202").await);
    let delivered = ctx.transport.sent_for("201").len() + ctx.transport.sent_for("202").len();

    sleep(secs(60)).await;
    assert_eq!(
        ctx.transport.sent_for("201").len() + ctx.transport.sent_for("202").len(),
        delivered
    );
}

#[tokio::test(start_paused = true)]
async fn test_unregister_unknown_does_not_disturb_others() {
    let ctx = start_service().await;
    ctx.service
        .establish(Subscription::periodic("200", "CONFIGURATION", secs(10)))
        .await
        .unwrap();
    ctx.service.register_periodic("200").await.unwrap();

    ctx.service.unregister("404").await;
    sleep(secs(25)).await;

    assert_eq!(ctx.transport.count("200", NotificationKind::PeriodicUpdate), 3);
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_oam_is_unsupported() {
    let ctx = start_service().await;

    let result = ctx
        .service
        .oam_notify(None, OamStatus::SubscriptionTerminated, Some("shutdown"))
        .await;

    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_keeps_records() {
    let ctx = start_service().await;
    ctx.service
        .establish(Subscription::periodic("200", "CONFIGURATION", secs(10)))
        .await
        .unwrap();
    ctx.service.register_periodic("200").await.unwrap();
    sleep(secs(1)).await;

    ctx.service.shutdown().await;
    sleep(secs(30)).await;

    assert!(ctx.service.registry().exists("200"));
    assert!(!ctx.service.engine().is_registered("200"));
    assert_eq!(ctx.transport.count("200", NotificationKind::PeriodicUpdate), 1);
}
