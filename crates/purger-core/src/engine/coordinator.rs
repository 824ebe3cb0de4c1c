//! DeletionCoordinator - 月末の一括削除
//!
//! # フロー
//! 1. 既に送信中なら何もしない（`Busy`）
//! 2. pending が空なら `NothingToDelete`（ゲートウェイは呼ばない）
//! 3. 全件を 1 回の削除リクエストで送る（アトミック）
//! 4. 成功したら削除済みアセットのサイズを並行に問い合わせて合計する
//!
//! サイズ取得の失敗は削除結果を失敗にしません。warn ログを出して
//! 合計から除外し、`sizes_unknown` に数えます。

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::domain::{
    AssetId, AssetRef, CoordinatorState, DeletionOutcome, DeletionResult, MonthKey, ReviewError,
};
use crate::ports::{Clock, LibraryError, MediaLibraryGateway};

pub struct DeletionCoordinator {
    library: Arc<dyn MediaLibraryGateway>,
    clock: Arc<dyn Clock>,
    state: Mutex<CoordinatorState>,
}

/// Puts the coordinator back to Idle however the run ends.
struct SubmitGuard<'a> {
    state: &'a Mutex<CoordinatorState>,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = CoordinatorState::Idle;
    }
}

impl DeletionCoordinator {
    pub fn new(library: Arc<dyn MediaLibraryGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            library,
            clock,
            state: Mutex::new(CoordinatorState::Idle),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock()
    }

    fn try_begin(&self) -> Option<SubmitGuard<'_>> {
        let mut state = self.state.lock();
        if *state == CoordinatorState::Submitting {
            return None;
        }
        *state = CoordinatorState::Submitting;
        Some(SubmitGuard { state: &self.state })
    }

    /// Delete `pending` (the month's pending delete set, in decision order).
    ///
    /// On anything but `Deleted` the caller keeps the set untouched, so a
    /// second run resubmits exactly the same IDs.
    pub async fn run(&self, month: MonthKey, pending: &[AssetRef]) -> DeletionOutcome {
        let Some(_guard) = self.try_begin() else {
            return DeletionOutcome::Busy;
        };

        if pending.is_empty() {
            info!(%month, "nothing marked for deletion");
            return DeletionOutcome::NothingToDelete;
        }

        let ids: Vec<AssetId> = pending.iter().map(|a| a.id.clone()).collect();
        info!(%month, count = ids.len(), "submitting deletion");

        match self.library.delete_assets(&ids).await {
            Ok(()) => {}
            Err(LibraryError::NeedsConfirmation) => {
                info!(%month, "deletion needs user confirmation");
                return DeletionOutcome::NeedsConfirmation;
            }
            Err(LibraryError::AccessDenied) => {
                warn!(%month, "deletion refused: access denied");
                return DeletionOutcome::Failed(ReviewError::AccessDenied);
            }
            Err(err) => {
                warn!(%month, error = %err, "deletion failed");
                return DeletionOutcome::Failed(ReviewError::DeleteFatal(err.to_string()));
            }
        }

        let mut result = DeletionResult::from_deleted(month, pending, self.clock.now());
        let (total_bytes, sizes_unknown) = self.total_size(pending).await;
        result.total_bytes = total_bytes;
        result.sizes_unknown = sizes_unknown;

        info!(
            %month,
            photos = result.photos_deleted,
            videos = result.videos_deleted,
            bytes = result.total_bytes,
            sizes_unknown,
            "deletion complete"
        );
        DeletionOutcome::Deleted(result)
    }

    /// Sum of the sizes that resolved, and how many did not.
    async fn total_size(&self, deleted: &[AssetRef]) -> (u64, usize) {
        let lookups = deleted.iter().map(|asset| async move {
            (asset, self.library.fetch_byte_size(asset).await)
        });

        let mut total = 0u64;
        let mut unknown = 0usize;
        for (asset, size) in join_all(lookups).await {
            match size {
                Ok(bytes) => total = total.saturating_add(bytes),
                Err(err) => {
                    let err = ReviewError::SizeLookupFailed {
                        asset: asset.id.clone(),
                        reason: err.to_string(),
                    };
                    warn!(error = %err, "excluding asset from size total");
                    unknown += 1;
                }
            }
        }
        (total, unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Asset, AssetKind};
    use crate::impls::InMemoryMediaLibrary;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn april() -> MonthKey {
        MonthKey::new(2025, 4).unwrap()
    }

    fn library() -> InMemoryMediaLibrary {
        let at = Utc.with_ymd_and_hms(2025, 4, 2, 9, 0, 0).unwrap();
        InMemoryMediaLibrary::new(vec![
            (asset("p1", AssetKind::Photo, at), 1_000),
            (asset("p2", AssetKind::Photo, at), 2_000),
            (asset("v1", AssetKind::Video, at), 50_000),
        ])
    }

    fn asset(id: &str, kind: AssetKind, created_at: chrono::DateTime<Utc>) -> Asset {
        Asset {
            id: AssetId::new(id),
            kind,
            created_at,
        }
    }

    fn coordinator(library: &InMemoryMediaLibrary) -> DeletionCoordinator {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap());
        DeletionCoordinator::new(Arc::new(library.clone()), Arc::new(clock))
    }

    fn pending() -> Vec<AssetRef> {
        vec![AssetRef::photo("p1"), AssetRef::video("v1")]
    }

    #[tokio::test]
    async fn deletes_and_totals_sizes() {
        let library = library();
        let coordinator = coordinator(&library);

        let outcome = coordinator.run(april(), &pending()).await;
        let DeletionOutcome::Deleted(result) = outcome else {
            panic!("expected deletion, got {outcome:?}");
        };
        assert_eq!(result.photos_deleted, 1);
        assert_eq!(result.videos_deleted, 1);
        assert_eq!(result.total_bytes, 51_000);
        assert_eq!(result.sizes_unknown, 0);
        assert_eq!(result.completed_at, Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap());
        assert!(!library.contains("p1"));
        assert!(library.contains("p2"));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn empty_set_makes_no_gateway_call() {
        let library = library();
        let outcome = coordinator(&library).run(april(), &[]).await;
        assert_eq!(outcome, DeletionOutcome::NothingToDelete);
        assert!(library.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn confirmation_then_identical_resubmission() {
        let library = library().with_confirmations(1);
        let coordinator = coordinator(&library);

        assert_eq!(
            coordinator.run(april(), &pending()).await,
            DeletionOutcome::NeedsConfirmation
        );
        assert!(library.contains("p1"));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        assert!(matches!(
            coordinator.run(april(), &pending()).await,
            DeletionOutcome::Deleted(_)
        ));
        let calls = library.delete_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }

    #[tokio::test]
    async fn fatal_failure_keeps_assets() {
        let library = library().with_delete_failure("disk on fire");
        let outcome = coordinator(&library).run(april(), &pending()).await;

        assert_eq!(
            outcome,
            DeletionOutcome::Failed(ReviewError::DeleteFatal("disk on fire".into()))
        );
        assert!(outcome.as_error().is_some_and(|e| e.is_blocking()));
        assert!(library.contains("p1"));
        assert!(library.contains("v1"));
    }

    #[tokio::test]
    async fn failed_size_lookup_is_excluded_not_fatal() {
        let library = library().with_size_failure("v1");
        let outcome = coordinator(&library).run(april(), &pending()).await;

        let DeletionOutcome::Deleted(result) = outcome else {
            panic!("expected deletion, got {outcome:?}");
        };
        assert_eq!(result.total_bytes, 1_000);
        assert_eq!(result.sizes_unknown, 1);
        assert_eq!(result.videos_deleted, 1);
    }

    #[tokio::test]
    async fn second_run_while_submitting_is_busy() {
        let library = library();
        let coordinator = coordinator(&library);

        let guard = coordinator.try_begin();
        assert!(guard.is_some());
        assert_eq!(coordinator.run(april(), &pending()).await, DeletionOutcome::Busy);
        drop(guard);

        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert!(library.delete_calls().is_empty());
    }
}
