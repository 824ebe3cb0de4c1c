//! ReviewEngine - セッション状態の唯一の owner
//!
//! # 設計原則
//! - 状態を変更できるのは owner タスクだけ（single writer）
//! - コマンドは mpsc で受け取り、oneshot でスナップショットを返す
//! - 非同期の完了（広告・削除）も mpsc で owner に戻してから反映する
//! - メディア取得はすべて PrefetchCache 経由（再取得も含む）
//! - 完了には世代（SessionId）を付け、今の世代と違えば捨てる
//!
//! # ループ
//! ```text
//! select! {
//!     command    => 状態遷移 → スナップショット公開 → reply
//!     completion => 世代チェック → 反映 → スナップショット公開
//!     prefetch   => token チェック → キャッシュ更新
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::domain::{
    ActionMode, AssetRef, Decision, DeletionOutcome, DisplaySnapshot, EngineEvent, MediaHandle,
    MediaView, MonthBucket, Notice, RejectReason, RequestToken, ReviewError, SessionId,
    SessionState,
};
use crate::engine::{
    Advance, CacheEntry, DeletionCoordinator, PrefetchCache, PrefetchCompletion, Reveal,
    ReviewSession,
};
use crate::ports::{AdError, AdGateway, Clock, IdGenerator, MediaLibraryGateway};

use super::handle::EngineHandle;

pub(crate) type Reply = oneshot::Sender<Result<DisplaySnapshot, ReviewError>>;

pub(crate) enum Command {
    SelectMonth { bucket: MonthBucket, reply: Reply },
    Keep(Reply),
    Delete(Reply),
    Undo(Reply),
    AdDismissed(Reply),
    RetryCurrent(Reply),
    CommitDeletion(Reply),
    Shutdown(oneshot::Sender<()>),
}

/// Async results routed back to the owner.
enum Completion {
    AdDismissed {
        generation: SessionId,
        epoch: u64,
        result: Result<(), AdError>,
    },
    Deletion {
        generation: SessionId,
        outcome: DeletionOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeletionPhase {
    Idle,
    Submitting,
    /// Needs confirmation or failed; the set is kept for another commit.
    AwaitingRetry,
}

/// Everything the owner shares with the tasks it spawns.
struct Context {
    config: EngineConfig,
    library: Arc<dyn MediaLibraryGateway>,
    ads: Arc<dyn AdGateway>,
    ids: Arc<dyn IdGenerator>,
    coordinator: Arc<DeletionCoordinator>,
    completions: mpsc::UnboundedSender<Completion>,
    prefetched: mpsc::UnboundedSender<PrefetchCompletion>,
    events: broadcast::Sender<EngineEvent>,
}

impl Context {
    fn notify(&self, generation: SessionId, error: ReviewError) {
        // 購読者がいなくてもよい
        let _ = self.events.send(EngineEvent::Notice(Notice::new(Some(generation), error)));
    }

    fn preload_ad(&self) {
        if self.ads.is_ad_free() {
            return;
        }
        let ads = Arc::clone(&self.ads);
        tokio::spawn(async move {
            if let Err(err) = ads.load_interstitial().await {
                debug!(error = %err, "interstitial preload failed");
            }
        });
    }
}

/// One selected month: session, cache and the bits of presentation state
/// that only the owner knows about.
struct Active {
    generation: SessionId,
    session: ReviewSession,
    cache: PrefetchCache,
    media: MediaView,
    /// Refetch issued for the asset on screen; its failure is final.
    refetch: Option<RequestToken>,
    /// Parent of the ad presentation.
    cancel: CancellationToken,
    ad_epoch: u64,
    ad_presentation: Option<CancellationToken>,
    deletion: DeletionPhase,
}

fn ready_view(asset: AssetRef, handle: MediaHandle) -> MediaView {
    let hot = handle.is_video();
    MediaView::Ready { asset, handle, hot }
}

impl Active {
    fn apply(&mut self, ctx: &Context, advance: Advance) {
        match advance {
            Advance::Reveal(reveal) => self.reveal(reveal),
            Advance::AdPause => self.pause_for_ad(ctx),
            Advance::Exhausted => {
                self.cache.clear_current();
                self.media = MediaView::Empty;
                self.submit_deletion(ctx);
            }
        }
    }

    fn reveal(&mut self, reveal: Reveal) {
        self.cache.recenter(self.session.bucket(), reveal.index);
        self.cache.set_current(&reveal.asset);

        let media = match self.cache.entry(&reveal.asset.id) {
            Some(CacheEntry::Ready(handle)) => ready_view(reveal.asset.clone(), handle.clone()),
            Some(CacheEntry::Pending) => MediaView::Loading {
                asset: reveal.asset.clone(),
            },
            Some(CacheEntry::Failed(_)) | None => {
                self.refetch_current(&reveal.asset);
                MediaView::Loading {
                    asset: reveal.asset.clone(),
                }
            }
        };
        trace!(generation = %self.generation, index = reveal.index, asset = %reveal.asset.id, "revealed");
        self.media = media;
    }

    fn refetch_current(&mut self, asset: &AssetRef) {
        self.refetch = Some(self.cache.refetch(asset));
    }

    fn pause_for_ad(&mut self, ctx: &Context) {
        self.cache.clear_current();
        self.media = MediaView::AdPlaceholder;
        self.ad_epoch += 1;

        let cancel = self.cancel.child_token();
        self.ad_presentation = Some(cancel.clone());
        let ads = Arc::clone(&ctx.ads);
        let completions = ctx.completions.clone();
        let generation = self.generation;
        let epoch = self.ad_epoch;
        info!(%generation, epoch, "presenting interstitial");

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = ads.present_interstitial() => result,
            };
            let _ = completions.send(Completion::AdDismissed {
                generation,
                epoch,
                result,
            });
        });
    }

    /// Returns false when no ad was on screen.
    fn resume_after_ad(&mut self, ctx: &Context) -> bool {
        let Some(advance) = self.session.ad_dismissed() else {
            return false;
        };
        if let Some(presentation) = self.ad_presentation.take() {
            presentation.cancel();
        }
        ctx.preload_ad();
        self.apply(ctx, advance);
        true
    }

    fn submit_deletion(&mut self, ctx: &Context) {
        self.deletion = DeletionPhase::Submitting;
        let coordinator = Arc::clone(&ctx.coordinator);
        let completions = ctx.completions.clone();
        let generation = self.generation;
        let month = self.session.month();
        let pending = self.session.pending_delete().to_vec();

        // 送信した削除はキャンセルしない
        tokio::spawn(async move {
            let outcome = coordinator.run(month, &pending).await;
            let _ = completions.send(Completion::Deletion { generation, outcome });
        });
    }

    fn snapshot(&self) -> DisplaySnapshot {
        let state = self.session.state();
        let action_mode = match state {
            SessionState::Reviewing => ActionMode::Normal,
            SessionState::AdPause => ActionMode::HiddenForAd,
            SessionState::Exhausted if self.deletion == DeletionPhase::AwaitingRetry => {
                ActionMode::ConfirmDelete
            }
            SessionState::Exhausted | SessionState::Idle => ActionMode::Disabled,
        };
        DisplaySnapshot {
            generation: Some(self.generation),
            month: Some(self.session.month()),
            state: Some(state),
            media: self.media.clone(),
            position: self.session.position(),
            undo_available: self.session.undo_available()
                && self.deletion != DeletionPhase::Submitting,
            action_mode,
            decisions_made: self.session.decisions().len(),
            pending_delete: self
                .session
                .pending_delete()
                .iter()
                .map(|a| a.id.clone())
                .collect(),
        }
    }

    fn close(&mut self) {
        self.cancel.cancel();
        self.cache.shutdown();
    }
}

/// A configured engine that has not been started yet.
///
/// Build one with [`EngineBuilder`](super::EngineBuilder), then call
/// [`spawn`](Self::spawn) from inside a tokio runtime.
pub struct ReviewEngine {
    pub(crate) config: EngineConfig,
    pub(crate) library: Arc<dyn MediaLibraryGateway>,
    pub(crate) ads: Arc<dyn AdGateway>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
}

impl ReviewEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the owner task and return a handle to it.
    pub fn spawn(self) -> EngineHandle {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_capacity);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (prefetch_tx, prefetch_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(DisplaySnapshot::default());
        let (events, _) = broadcast::channel(self.config.event_capacity);

        let coordinator = Arc::new(DeletionCoordinator::new(
            Arc::clone(&self.library),
            Arc::clone(&self.clock),
        ));
        let owner = Owner {
            ctx: Context {
                config: self.config,
                library: self.library,
                ads: self.ads,
                ids: self.ids,
                coordinator,
                completions: completion_tx,
                prefetched: prefetch_tx,
                events: events.clone(),
            },
            active: None,
            snapshots: snapshot_tx,
        };
        tokio::spawn(owner.run(command_rx, completion_rx, prefetch_rx));

        EngineHandle::new(command_tx, snapshot_rx, events)
    }
}

struct Owner {
    ctx: Context,
    active: Option<Active>,
    snapshots: watch::Sender<DisplaySnapshot>,
}

impl Owner {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut prefetched: mpsc::UnboundedReceiver<PrefetchCompletion>,
    ) {
        info!("review engine started");
        self.ctx.preload_ad();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(ack)) => {
                        self.close();
                        let _ = ack.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = completions.recv() => {
                    self.handle_completion(completion);
                    self.publish();
                }
                Some(completion) = prefetched.recv() => {
                    if self.handle_prefetch(completion) {
                        self.publish();
                    }
                }
            }
        }
        self.close();
    }

    fn close(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.close();
        }
        self.publish();
        info!("review engine stopped");
    }

    fn snapshot(&self) -> DisplaySnapshot {
        self.active.as_ref().map(Active::snapshot).unwrap_or_default()
    }

    fn publish(&self) -> DisplaySnapshot {
        let snapshot = self.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    fn handle_command(&mut self, command: Command) {
        let (result, reply) = match command {
            Command::SelectMonth { bucket, reply } => (self.select_month(bucket), reply),
            Command::Keep(reply) => (self.decide(Decision::Keep), reply),
            Command::Delete(reply) => (self.decide(Decision::Delete), reply),
            Command::Undo(reply) => (self.undo(), reply),
            Command::AdDismissed(reply) => (self.ad_dismissed(), reply),
            Command::RetryCurrent(reply) => (self.retry_current(), reply),
            Command::CommitDeletion(reply) => (self.commit_deletion(), reply),
            Command::Shutdown(ack) => {
                let _ = ack.send(());
                return;
            }
        };
        let result = result.map(|()| self.publish());
        if let Err(err) = &result {
            debug!(error = %err, "command rejected");
        }
        let _ = reply.send(result);
    }

    fn select_month(&mut self, bucket: MonthBucket) -> Result<(), ReviewError> {
        if self
            .active
            .as_ref()
            .is_some_and(|a| a.deletion == DeletionPhase::Submitting)
        {
            return Err(ReviewError::Rejected(RejectReason::DeletionInFlight));
        }
        if let Some(mut previous) = self.active.take() {
            debug!(generation = %previous.generation, "discarding previous month");
            previous.close();
        }

        let generation = self.ctx.ids.generate_session_id();
        info!(%generation, month = %bucket.month(), assets = bucket.len(), "month selected");

        let (session, advance) = ReviewSession::start(bucket, self.ctx.config.ad_threshold);
        let cache = PrefetchCache::new(
            Arc::clone(&self.ctx.library),
            Arc::clone(&self.ctx.ids),
            generation,
            self.ctx.config.window_span,
            self.ctx.config.photo_target(),
            self.ctx.prefetched.clone(),
        );
        let mut active = Active {
            generation,
            session,
            cache,
            media: MediaView::Empty,
            refetch: None,
            cancel: CancellationToken::new(),
            ad_epoch: 0,
            ad_presentation: None,
            deletion: DeletionPhase::Idle,
        };
        active.apply(&self.ctx, advance);
        self.active = Some(active);
        Ok(())
    }

    fn decide(&mut self, decision: Decision) -> Result<(), ReviewError> {
        let ad_free = self.ctx.ads.is_ad_free();
        let ctx = &self.ctx;
        let active = self
            .active
            .as_mut()
            .ok_or(ReviewError::Rejected(RejectReason::NoMonthSelected))?;
        let advance = match decision {
            Decision::Keep => active.session.keep(ad_free)?,
            Decision::Delete => active.session.delete(ad_free)?,
        };
        debug!(generation = %active.generation, ?decision, decided = active.session.decisions().len(), "decision recorded");
        active.apply(ctx, advance);
        Ok(())
    }

    fn undo(&mut self) -> Result<(), ReviewError> {
        let active = self
            .active
            .as_mut()
            .ok_or(ReviewError::Rejected(RejectReason::NoMonthSelected))?;
        if active.deletion == DeletionPhase::Submitting {
            return Err(ReviewError::Rejected(RejectReason::DeletionInFlight));
        }
        if let Some(reveal) = active.session.undo()? {
            debug!(generation = %active.generation, index = reveal.index, "undo");
            active.deletion = DeletionPhase::Idle;
            active.reveal(reveal);
        }
        Ok(())
    }

    fn ad_dismissed(&mut self) -> Result<(), ReviewError> {
        let ctx = &self.ctx;
        let active = self
            .active
            .as_mut()
            .ok_or(ReviewError::Rejected(RejectReason::NoMonthSelected))?;
        if !active.resume_after_ad(ctx) {
            trace!("dismissal outside an ad pause ignored");
        }
        Ok(())
    }

    fn retry_current(&mut self) -> Result<(), ReviewError> {
        let active = self
            .active
            .as_mut()
            .ok_or(ReviewError::Rejected(RejectReason::NoMonthSelected))?;
        active.session.ensure_reviewing()?;
        let Some(reveal) = active.session.current() else {
            return Err(ReviewError::Rejected(RejectReason::Exhausted));
        };
        active.media = MediaView::Loading {
            asset: reveal.asset.clone(),
        };
        active.refetch_current(&reveal.asset);
        Ok(())
    }

    fn commit_deletion(&mut self) -> Result<(), ReviewError> {
        let ctx = &self.ctx;
        let active = self
            .active
            .as_mut()
            .ok_or(ReviewError::Rejected(RejectReason::NoMonthSelected))?;
        if active.deletion == DeletionPhase::Submitting {
            return Err(ReviewError::Rejected(RejectReason::DeletionInFlight));
        }
        if active.session.state() != SessionState::Exhausted {
            return Err(ReviewError::Rejected(RejectReason::NotExhausted));
        }
        active.submit_deletion(ctx);
        Ok(())
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::AdDismissed {
                generation,
                epoch,
                result,
            } => {
                if let Err(err) = &result {
                    warn!(error = %err, "interstitial could not be shown, resuming");
                }
                let ctx = &self.ctx;
                let Some(active) = self
                    .active
                    .as_mut()
                    .filter(|a| a.generation == generation && a.ad_epoch == epoch)
                else {
                    debug!(%generation, epoch, "stale ad dismissal dropped");
                    return;
                };
                active.resume_after_ad(ctx);
            }
            Completion::Deletion {
                generation,
                outcome,
            } => self.on_deletion(generation, outcome),
        }
    }

    /// Returns true when the displayed media changed.
    fn handle_prefetch(&mut self, completion: PrefetchCompletion) -> bool {
        let ctx = &self.ctx;
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let asset = completion.asset.clone();
        let token = completion.token;
        if !active.cache.complete(completion) {
            trace!(%asset, "stale prefetch dropped");
            return false;
        }

        // 表示待ちの現在アセットだけ画面に反映する
        let Some(reveal) = active.session.current() else {
            return false;
        };
        if reveal.asset.id != asset || !matches!(active.media, MediaView::Loading { .. }) {
            return false;
        }
        match active.cache.entry(&asset) {
            Some(CacheEntry::Ready(handle)) => {
                active.media = ready_view(reveal.asset, handle.clone());
                true
            }
            Some(CacheEntry::Failed(reason)) if active.refetch == Some(token) => {
                let reason = reason.clone();
                let error = ReviewError::FetchFailed {
                    index: reveal.index,
                    asset,
                    reason: reason.clone(),
                };
                warn!(generation = %active.generation, error = %error, "current asset unavailable");
                active.media = MediaView::Unavailable {
                    asset: reveal.asset,
                    reason,
                };
                ctx.notify(active.generation, error);
                true
            }
            Some(CacheEntry::Failed(_)) => {
                debug!(%asset, "prefetch for the current asset failed, refetching");
                active.refetch_current(&reveal.asset);
                false
            }
            _ => false,
        }
    }

    fn on_deletion(&mut self, generation: SessionId, outcome: DeletionOutcome) {
        let Some(active) = self.active.as_mut().filter(|a| a.generation == generation) else {
            warn!(%generation, "deletion outcome for a discarded month dropped");
            return;
        };

        if let DeletionOutcome::Busy = outcome {
            debug!(%generation, "coordinator busy");
            active.deletion = DeletionPhase::AwaitingRetry;
            return;
        }
        let terminal = outcome.is_terminal();
        if let Some(error) = outcome.as_error() {
            self.ctx.notify(generation, error);
        }
        if let DeletionOutcome::Deleted(result) = outcome {
            info!(
                %generation,
                month = %result.month,
                deleted = result.total_deleted(),
                size = %result.human_size(),
                "month cleaned up"
            );
            let _ = self.ctx.events.send(EngineEvent::Deleted { generation, result });
        }

        if terminal {
            self.finish_month();
        } else {
            active.deletion = DeletionPhase::AwaitingRetry;
        }
    }

    /// Exhausted → Idle.
    fn finish_month(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.session.finish();
            active.close();
        }
    }
}
