//! EngineHandle - 呼び出し側から見たエンジン
//!
//! コマンドを送ってスナップショットを受け取るだけの薄いハンドルです。
//! Clone して複数の場所から使えます（状態を持つのは owner だけ）。

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::domain::{DisplaySnapshot, EngineEvent, MonthBucket, ReviewError};

use super::engine::{Command, Reply};

#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<DisplaySnapshot>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        snapshots: watch::Receiver<DisplaySnapshot>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            commands,
            snapshots,
            events,
        }
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<DisplaySnapshot, ReviewError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ReviewError::EngineClosed)?;
        response.await.map_err(|_| ReviewError::EngineClosed)?
    }

    /// Start reviewing `bucket`, discarding any month in progress.
    pub async fn select_month(&self, bucket: MonthBucket) -> Result<DisplaySnapshot, ReviewError> {
        self.request(|reply| Command::SelectMonth { bucket, reply }).await
    }

    pub async fn keep(&self) -> Result<DisplaySnapshot, ReviewError> {
        self.request(Command::Keep).await
    }

    pub async fn delete(&self) -> Result<DisplaySnapshot, ReviewError> {
        self.request(Command::Delete).await
    }

    pub async fn undo(&self) -> Result<DisplaySnapshot, ReviewError> {
        self.request(Command::Undo).await
    }

    /// The caller's ad UI went away. No-op unless an ad pause is active.
    pub async fn ad_dismissed(&self) -> Result<DisplaySnapshot, ReviewError> {
        self.request(Command::AdDismissed).await
    }

    /// Fetch the current asset again after a failure.
    pub async fn retry_current(&self) -> Result<DisplaySnapshot, ReviewError> {
        self.request(Command::RetryCurrent).await
    }

    /// Resubmit the pending set after a confirmation request or failure.
    pub async fn commit_deletion(&self) -> Result<DisplaySnapshot, ReviewError> {
        self.request(Command::CommitDeletion).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> DisplaySnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// `None` when the timeout passes first or the engine stopped.
    pub async fn wait_for(
        &self,
        timeout: Duration,
        mut predicate: impl FnMut(&DisplaySnapshot) -> bool,
    ) -> Option<DisplaySnapshot> {
        let mut snapshots = self.snapshots.clone();
        let wait = async {
            snapshots
                .wait_for(|s| predicate(s))
                .await
                .ok()
                .map(|s| s.clone())
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }

    /// Stop the owner task. Pending async work is cancelled.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack)).await.is_ok() {
            let _ = done.await;
        }
    }
}
