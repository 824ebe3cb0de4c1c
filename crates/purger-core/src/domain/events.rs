//! Events - エンジンから呼び出し側への通知
//!
//! スナップショット（画面の状態）とは別に、一度きりの出来事をイベントとして流します。
//! - Deleted: 削除が完了した（結果画面へ）
//! - Notice: エラーや合図（auto_advance が true なら次の月へ進んでよい）

use super::errors::ReviewError;
use super::ids::SessionId;
use super::outcome::DeletionResult;

/// A one-shot error or signal for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub generation: Option<SessionId>,
    pub error: ReviewError,
    pub auto_advance: bool,
    pub blocking: bool,
}

impl Notice {
    pub fn new(generation: Option<SessionId>, error: ReviewError) -> Self {
        Self {
            generation,
            auto_advance: error.auto_advance(),
            blocking: error.is_blocking(),
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Deleted {
        generation: SessionId,
        result: DeletionResult,
    },
    Notice(Notice),
}

impl EngineEvent {
    pub fn generation(&self) -> Option<SessionId> {
        match self {
            EngineEvent::Deleted { generation, .. } => Some(*generation),
            EngineEvent::Notice(notice) => notice.generation,
        }
    }
}
