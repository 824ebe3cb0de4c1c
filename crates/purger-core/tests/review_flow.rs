//! End-to-end flows through the owner task with in-memory gateways.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::broadcast;

use purger_core::domain::{
    ActionMode, Asset, AssetId, AssetKind, EngineEvent, MediaView, MonthBucket, MonthKey,
    RejectReason, ReviewError, SessionState,
};
use purger_core::engine::PrefetchWindow;
use purger_core::impls::{AdScript, InMemoryMediaLibrary, ScriptedAdGateway};
use purger_core::{EngineBuilder, EngineConfig, EngineHandle, load_catalog};

const WAIT: Duration = Duration::from_secs(2);

fn photos(ids: &[&str]) -> InMemoryMediaLibrary {
    InMemoryMediaLibrary::new(ids.iter().enumerate().map(|(i, id)| {
        let created_at = Utc.with_ymd_and_hms(2025, 4, 1 + i as u32, 10, 0, 0).unwrap();
        let asset = Asset {
            id: AssetId::new(*id),
            kind: AssetKind::Photo,
            created_at,
        };
        (asset, 1_000 * (i as u64 + 1))
    }))
}

fn april() -> MonthKey {
    MonthKey::new(2025, 4).unwrap()
}

fn spawn(library: &InMemoryMediaLibrary, ads: &ScriptedAdGateway, ad_threshold: u32) -> EngineHandle {
    let config = EngineConfig {
        ad_threshold,
        ..Default::default()
    };
    EngineBuilder::new(Arc::new(library.clone()), Arc::new(ads.clone()))
        .config(config)
        .build()
        .unwrap()
        .spawn()
}

async fn first_bucket(library: &InMemoryMediaLibrary) -> MonthBucket {
    load_catalog(library).await.unwrap().first().cloned().unwrap()
}

async fn next_event(events: &mut broadcast::Receiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

fn shown(media: &MediaView) -> Option<&str> {
    media.asset_id().map(AssetId::as_str)
}

#[tokio::test]
async fn keep_delete_keep_deletes_the_marked_photo() {
    let library = photos(&["A", "B", "C"]);
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let mut events = handle.subscribe();

    let snap = handle.select_month(first_bucket(&library).await).await.unwrap();
    assert_eq!(snap.month_label(), "April, 2025");
    assert_eq!(snap.position_label(), "1 of 3");
    assert_eq!(shown(&snap.media), Some("A"));
    assert_eq!(snap.action_mode, ActionMode::Normal);

    handle.keep().await.unwrap();
    handle.delete().await.unwrap();
    let snap = handle.keep().await.unwrap();
    assert_eq!(snap.session_state(), SessionState::Exhausted);
    assert_eq!(snap.pending_delete, vec![AssetId::new("B")]);
    assert!(!snap.undo_available);

    let EngineEvent::Deleted { result, .. } = next_event(&mut events).await else {
        panic!("expected a deletion");
    };
    assert_eq!(result.month, april());
    assert_eq!(result.photos_deleted, 1);
    assert_eq!(result.videos_deleted, 0);
    assert_eq!(result.total_bytes, 2_000);
    assert!(!library.contains("B"));
    assert!(library.contains("A"));

    let idle = handle.wait_for(WAIT, |s| s.session_state() == SessionState::Idle).await;
    assert!(idle.is_some());
    assert!(library.caching_ids().is_empty());
}

#[tokio::test]
async fn undo_after_confirmation_request_reopens_last_asset() {
    let library = photos(&["A", "B", "C"]).with_confirmations(1);
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let mut events = handle.subscribe();

    handle.select_month(first_bucket(&library).await).await.unwrap();
    handle.keep().await.unwrap();
    handle.delete().await.unwrap();
    handle.keep().await.unwrap();

    let EngineEvent::Notice(notice) = next_event(&mut events).await else {
        panic!("expected a notice");
    };
    assert_eq!(notice.error, ReviewError::DeleteNeedsConfirmation);
    assert!(!notice.blocking);
    assert!(!notice.auto_advance);

    let snap = handle
        .wait_for(WAIT, |s| s.action_mode == ActionMode::ConfirmDelete)
        .await
        .unwrap();
    assert!(snap.undo_available);
    assert!(library.contains("B"));

    let snap = handle.undo().await.unwrap();
    assert_eq!(snap.session_state(), SessionState::Reviewing);
    assert_eq!(snap.position_label(), "3 of 3");
    assert_eq!(shown(&snap.media), Some("C"));
    assert_eq!(snap.decisions_made, 2);
    assert_eq!(snap.pending_delete, vec![AssetId::new("B")]);

    handle.keep().await.unwrap();
    assert!(matches!(next_event(&mut events).await, EngineEvent::Deleted { .. }));

    let calls = library.delete_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], vec![AssetId::new("B")]);
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test]
async fn keeping_everything_signals_auto_advance() {
    let library = photos(&["A", "B", "C"]);
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let mut events = handle.subscribe();

    handle.select_month(first_bucket(&library).await).await.unwrap();
    for _ in 0..3 {
        handle.keep().await.unwrap();
    }

    let EngineEvent::Notice(notice) = next_event(&mut events).await else {
        panic!("expected a notice");
    };
    assert_eq!(notice.error, ReviewError::DeleteEmptySet);
    assert!(notice.auto_advance);
    assert!(library.delete_calls().is_empty());
    assert!(handle.wait_for(WAIT, |s| s.session_state() == SessionState::Idle).await.is_some());
}

#[tokio::test]
async fn empty_month_goes_straight_to_nothing_to_delete() {
    let library = photos(&[]);
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let mut events = handle.subscribe();

    let snap = handle.select_month(MonthBucket::new(april(), Vec::new())).await.unwrap();
    assert_eq!(snap.session_state(), SessionState::Exhausted);
    assert_eq!(snap.media, MediaView::Empty);

    let EngineEvent::Notice(notice) = next_event(&mut events).await else {
        panic!("expected a notice");
    };
    assert!(notice.auto_advance);
}

#[tokio::test]
async fn ad_pause_holds_the_cursor_until_dismissed() {
    let library = photos(&["A", "B", "C", "D"]);
    let ads = ScriptedAdGateway::new(AdScript::HoldUntilDismissed);
    let handle = spawn(&library, &ads, 2);

    handle.select_month(first_bucket(&library).await).await.unwrap();
    let snap = handle.keep().await.unwrap();
    assert_eq!(shown(&snap.media), Some("B"));

    let snap = handle.keep().await.unwrap();
    assert_eq!(snap.session_state(), SessionState::AdPause);
    assert_eq!(snap.media, MediaView::AdPlaceholder);
    assert_eq!(snap.action_mode, ActionMode::HiddenForAd);
    assert_eq!(snap.position_label(), "2 of 4");
    assert_eq!(snap.decisions_made, 2);
    assert!(!snap.undo_available);

    assert_eq!(handle.keep().await, Err(ReviewError::Rejected(RejectReason::AdOnScreen)));
    assert_eq!(handle.undo().await, Err(ReviewError::Rejected(RejectReason::AdOnScreen)));

    ads.dismiss();
    let snap = handle
        .wait_for(WAIT, |s| s.session_state() == SessionState::Reviewing)
        .await
        .unwrap();
    assert_eq!(snap.position_label(), "3 of 4");
    assert_eq!(shown(&snap.media), Some("C"));
    assert_eq!(ads.presentations(), 1);
    // one preload at startup, the next one once the ad is gone
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ads.loads(), 2);

    // counter restarted after the pause
    let snap = handle.keep().await.unwrap();
    assert_eq!(shown(&snap.media), Some("D"));
    let snap = handle.keep().await.unwrap();
    assert_eq!(snap.session_state(), SessionState::AdPause);

    // caller-driven dismissal works as well
    let snap = handle.ad_dismissed().await.unwrap();
    assert_eq!(snap.session_state(), SessionState::Exhausted);
    assert_eq!(snap.decisions_made, 4);
}

#[tokio::test]
async fn dismissal_outside_a_pause_changes_nothing() {
    let library = photos(&["A", "B"]);
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);

    let before = handle.select_month(first_bucket(&library).await).await.unwrap();
    let after = handle.ad_dismissed().await.unwrap();
    assert_eq!(before.position, after.position);
    assert_eq!(after.decisions_made, 0);
}

#[tokio::test]
async fn failed_fetch_is_reported_and_retry_recovers() {
    let library = photos(&["A", "B"]).with_fetch_failure("A");
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let mut events = handle.subscribe();

    handle.select_month(first_bucket(&library).await).await.unwrap();
    let snap = handle
        .wait_for(WAIT, |s| matches!(s.media, MediaView::Unavailable { .. }))
        .await
        .unwrap();
    assert_eq!(shown(&snap.media), Some("A"));
    assert_eq!(snap.action_mode, ActionMode::Normal);

    let EngineEvent::Notice(notice) = next_event(&mut events).await else {
        panic!("expected a notice");
    };
    assert!(matches!(
        notice.error,
        ReviewError::FetchFailed { index: 0, ref asset, .. } if asset.as_str() == "A"
    ));
    assert!(!notice.blocking);

    library.clear_fetch_failure("A");
    handle.retry_current().await.unwrap();
    let snap = handle.wait_for(WAIT, |s| s.media.is_ready()).await.unwrap();
    assert_eq!(shown(&snap.media), Some("A"));
}

#[tokio::test]
async fn late_fetch_for_a_previous_position_is_ignored() {
    let library = photos(&["A", "B", "C"]).with_fetch_delay("A", Duration::from_millis(150));
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);

    let snap = handle.select_month(first_bucket(&library).await).await.unwrap();
    assert!(matches!(snap.media, MediaView::Loading { .. }));
    handle.keep().await.unwrap();

    handle.wait_for(WAIT, |s| s.media.is_ready()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    let snap = handle.snapshot();
    assert_eq!(shown(&snap.media), Some("B"));
    assert!(snap.media.is_ready());
}

#[tokio::test]
async fn caching_hints_track_the_window() {
    let library = InMemoryMediaLibrary::synthetic(april(), 1, 30, 3);
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let bucket = first_bucket(&library).await;
    let total = bucket.len();

    handle.select_month(bucket.clone()).await.unwrap();
    for cursor in 0..total {
        let snap = handle
            .wait_for(WAIT, |s| {
                s.media.is_ready() && s.position.map(|p| p.index) == Some(cursor + 1)
            })
            .await
            .unwrap();

        let window = PrefetchWindow::around(cursor, total, 10);
        let expected: BTreeSet<AssetId> = window
            .range()
            .filter_map(|i| bucket.get(i))
            .map(|a| a.id.clone())
            .collect();
        assert_eq!(library.caching_ids(), expected, "cursor {cursor}");

        let MediaView::Ready { asset, hot, .. } = &snap.media else {
            unreachable!();
        };
        assert_eq!(*hot, asset.is_video());

        handle.keep().await.unwrap();
    }
}

#[tokio::test]
async fn videos_leaving_the_window_are_cancelled() {
    let mut library = InMemoryMediaLibrary::synthetic(april(), 1, 30, 2);
    for i in 0..30 {
        library = library.with_stalled_fetch(format!("VID_{i:04}"));
    }
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let bucket = first_bucket(&library).await;

    handle.select_month(bucket.clone()).await.unwrap();
    for _ in 0..12 {
        handle.keep().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let window = PrefetchWindow::around(12, bucket.len(), 10);
    let expected: BTreeSet<AssetId> = window
        .range()
        .filter_map(|i| bucket.get(i))
        .filter(|a| a.is_video())
        .map(|a| a.id.clone())
        .collect();
    assert!(!expected.is_empty());
    assert_eq!(library.inflight_video_fetches(), expected);
}

#[tokio::test]
async fn reselecting_a_month_discards_the_previous_session() {
    // April's videos never finish preparing
    let mut library = InMemoryMediaLibrary::synthetic(april(), 2, 20, 2);
    for i in (1..20).step_by(2) {
        library = library.with_stalled_fetch(format!("VID_{i:04}"));
    }
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let catalog = load_catalog(&library).await.unwrap();
    let april_bucket = catalog.first().cloned().unwrap();
    let may_bucket = catalog.next_after(april()).cloned().unwrap();

    let april_videos: BTreeSet<AssetId> = april_bucket
        .assets()
        .iter()
        .filter(|a| a.is_video())
        .map(|a| a.id.clone())
        .collect();

    let first = handle.select_month(april_bucket).await.unwrap();
    handle.delete().await.unwrap();
    handle.keep().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!library.inflight_video_fetches().is_disjoint(&april_videos));

    let second = handle.select_month(may_bucket.clone()).await.unwrap();
    assert_ne!(first.generation, second.generation);
    assert_eq!(second.month, MonthKey::new(2025, 5));
    assert_eq!(second.decisions_made, 0);
    assert!(second.pending_delete.is_empty());
    assert_eq!(second.position_label(), "1 of 20");

    let expected: BTreeSet<AssetId> = may_bucket.assets()[..8].iter().map(|a| a.id.clone()).collect();
    assert_eq!(library.caching_ids(), expected);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(library.inflight_video_fetches().is_disjoint(&april_videos));
}

#[tokio::test]
async fn retried_video_is_cancelled_once_it_leaves_the_window() {
    let library = InMemoryMediaLibrary::synthetic(april(), 1, 30, 2).with_stalled_fetch("VID_0001");
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);

    handle.select_month(first_bucket(&library).await).await.unwrap();
    let snap = handle.keep().await.unwrap();
    assert_eq!(shown(&snap.media), Some("VID_0001"));
    assert!(matches!(snap.media, MediaView::Loading { .. }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(library.inflight_video_count("VID_0001"), 1);

    handle.retry_current().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    // the retry replaced the stalled prefetch instead of running beside it
    assert_eq!(library.inflight_video_count("VID_0001"), 1);
    assert_eq!(library.fetch_count("VID_0001"), 2);

    for _ in 0..10 {
        handle.keep().await.unwrap();
    }
    let snap = handle.snapshot();
    assert_eq!(snap.position_label(), "12 of 30");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(library.inflight_video_count("VID_0001"), 0);
    assert!(!library.caching_ids().contains(&AssetId::new("VID_0001")));
}

#[tokio::test]
async fn fatal_deletion_keeps_the_set_for_another_attempt() {
    let library = photos(&["A", "B"]).with_delete_failure("library busy");
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let mut events = handle.subscribe();

    handle.select_month(first_bucket(&library).await).await.unwrap();
    handle.delete().await.unwrap();
    handle.delete().await.unwrap();

    let EngineEvent::Notice(notice) = next_event(&mut events).await else {
        panic!("expected a notice");
    };
    assert!(matches!(notice.error, ReviewError::DeleteFatal(_)));
    assert!(notice.blocking);

    let snap = handle
        .wait_for(WAIT, |s| s.action_mode == ActionMode::ConfirmDelete)
        .await
        .unwrap();
    assert_eq!(snap.pending_delete.len(), 2);
    assert!(library.contains("A") && library.contains("B"));

    handle.commit_deletion().await.unwrap();
    assert!(matches!(next_event(&mut events).await, EngineEvent::Notice(_)));
    let calls = library.delete_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test]
async fn unknown_sizes_do_not_fail_the_deletion() {
    let library = photos(&["A", "B"]).with_size_failure("A");
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);
    let mut events = handle.subscribe();

    handle.select_month(first_bucket(&library).await).await.unwrap();
    handle.delete().await.unwrap();
    handle.delete().await.unwrap();

    let EngineEvent::Deleted { result, .. } = next_event(&mut events).await else {
        panic!("expected a deletion");
    };
    assert_eq!(result.photos_deleted, 2);
    assert_eq!(result.total_bytes, 2_000);
    assert_eq!(result.sizes_unknown, 1);
}

#[tokio::test]
async fn commands_are_guarded() {
    let library = photos(&["A", "B"]);
    let ads = ScriptedAdGateway::ad_free();
    let handle = spawn(&library, &ads, 10);

    assert_eq!(
        handle.keep().await,
        Err(ReviewError::Rejected(RejectReason::NoMonthSelected))
    );

    handle.select_month(first_bucket(&library).await).await.unwrap();
    assert_eq!(
        handle.commit_deletion().await,
        Err(ReviewError::Rejected(RejectReason::NotExhausted))
    );
    let snap = handle.undo().await.unwrap();
    assert_eq!(snap.decisions_made, 0);
    assert!(!snap.undo_available);

    handle.shutdown().await;
    assert_eq!(handle.keep().await, Err(ReviewError::EngineClosed));
    assert!(library.caching_ids().is_empty());
}
