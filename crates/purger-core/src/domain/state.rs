//! State - セッションとコーディネーターの状態

use serde::{Deserialize, Serialize};

/// SessionState はレビューセッションの状態を表現
///
/// # 状態遷移
/// - Idle: 月が選ばれていない（または削除完了後）
/// - Reviewing: アセットを表示して Keep/Delete を待っている
/// - AdPause: 広告表示中（decision のスロットは消費しない）
/// - Exhausted: 全アセットに decision が付いた。削除コーディネーターへ引き渡し
///
/// `Idle → Reviewing → [AdPause] → Reviewing → … → Exhausted → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Reviewing,
    AdPause,
    Exhausted,
}

/// CoordinatorState は削除コーディネーターの再入防止用の状態
///
/// - Idle: 実行可能
/// - Submitting: 削除リクエスト送信中（この間の run() は no-op）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Submitting,
}
