//! Errors - エラー型と分類
//!
//! すべての非同期完了はここで定義した型付きの結果として owner に戻り、
//! owner が `ErrorKind` を見て扱いを決めます。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::asset::AssetId;

/// ErrorKind はエラーの運用上の分類
///
/// # 分類
/// - Blocking: ユーザーに見せて止める（設定変更や手動対応が必要）
/// - Recoverable: 同じ位置で再試行すれば回復しうる
/// - Retryable: ユーザー確認のあとで同じ操作を再実行する
/// - Signal: エラーではなく制御フロー上の合図
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Blocking,
    Recoverable,
    Retryable,
    Signal,
}

/// Why a command was refused by the session guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoMonthSelected,
    AdOnScreen,
    Exhausted,
    DeletionInFlight,
    NotExhausted,
}

/// ReviewError はエンジンが呼び出し側に返すエラー
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum ReviewError {
    #[error("photo library access denied")]
    AccessDenied,

    #[error("photo library authorization required")]
    AuthRequired,

    #[error("could not enumerate the library: {0}")]
    CatalogUnavailable(String),

    #[error("failed to fetch asset {asset} at position {index}: {reason}")]
    FetchFailed {
        index: usize,
        asset: AssetId,
        reason: String,
    },

    #[error("nothing to delete")]
    DeleteEmptySet,

    #[error("deletion needs user confirmation")]
    DeleteNeedsConfirmation,

    #[error("deletion failed: {0}")]
    DeleteFatal(String),

    #[error("size lookup failed for {asset}: {reason}")]
    SizeLookupFailed { asset: AssetId, reason: String },

    #[error("command rejected: {0:?}")]
    Rejected(RejectReason),

    #[error("review engine is closed")]
    EngineClosed,
}

impl ReviewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::AccessDenied | ReviewError::AuthRequired | ReviewError::DeleteFatal(_) => {
                ErrorKind::Blocking
            }
            ReviewError::CatalogUnavailable(_)
            | ReviewError::FetchFailed { .. }
            | ReviewError::SizeLookupFailed { .. } => ErrorKind::Recoverable,
            ReviewError::DeleteNeedsConfirmation | ReviewError::EngineClosed => {
                ErrorKind::Retryable
            }
            ReviewError::DeleteEmptySet | ReviewError::Rejected(_) => ErrorKind::Signal,
        }
    }

    /// Only these two stop the user with a modal error.
    pub fn is_blocking(&self) -> bool {
        matches!(self, ReviewError::AccessDenied | ReviewError::DeleteFatal(_))
    }

    /// Whether the caller should move on to the next month by itself.
    pub fn auto_advance(&self) -> bool {
        matches!(self, ReviewError::DeleteEmptySet)
    }

    /// A message that hides technical detail.
    pub fn user_facing_message(&self) -> String {
        match self {
            ReviewError::AccessDenied | ReviewError::AuthRequired => {
                "Allow full photo library access in Settings to review your media.".to_string()
            }
            ReviewError::CatalogUnavailable(_) => {
                "Your library could not be read. Try again later.".to_string()
            }
            ReviewError::FetchFailed { .. } => {
                "This item could not be loaded. Try again.".to_string()
            }
            ReviewError::DeleteEmptySet => "Nothing was marked for deletion.".to_string(),
            ReviewError::DeleteNeedsConfirmation => {
                "Confirm the deletion to remove the selected items.".to_string()
            }
            ReviewError::DeleteFatal(_) => {
                "The selected items could not be deleted. Your selection was kept.".to_string()
            }
            ReviewError::SizeLookupFailed { .. } => {
                "Some file sizes could not be determined.".to_string()
            }
            ReviewError::Rejected(_) => "That action is not available right now.".to_string(),
            ReviewError::EngineClosed => "The review session has ended.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ReviewError::AccessDenied, ErrorKind::Blocking, true)]
    #[case(ReviewError::AuthRequired, ErrorKind::Blocking, false)]
    #[case(ReviewError::DeleteFatal("io".into()), ErrorKind::Blocking, true)]
    #[case(ReviewError::DeleteNeedsConfirmation, ErrorKind::Retryable, false)]
    #[case(ReviewError::DeleteEmptySet, ErrorKind::Signal, false)]
    #[case(
        ReviewError::FetchFailed { index: 3, asset: AssetId::new("a"), reason: "x".into() },
        ErrorKind::Recoverable,
        false
    )]
    fn classification(#[case] err: ReviewError, #[case] kind: ErrorKind, #[case] blocking: bool) {
        assert_eq!(err.kind(), kind);
        assert_eq!(err.is_blocking(), blocking);
    }

    #[test]
    fn only_empty_set_auto_advances() {
        assert!(ReviewError::DeleteEmptySet.auto_advance());
        assert!(!ReviewError::DeleteNeedsConfirmation.auto_advance());
        assert!(!ReviewError::DeleteFatal("x".into()).auto_advance());
    }

    #[test]
    fn wire_shape_is_adjacently_tagged() {
        let v = serde_json::to_value(ReviewError::Rejected(RejectReason::AdOnScreen)).unwrap();
        assert_eq!(v, serde_json::json!({ "error": "rejected", "detail": "ad_on_screen" }));

        let v = serde_json::to_value(ReviewError::DeleteEmptySet).unwrap();
        assert_eq!(v, serde_json::json!({ "error": "delete_empty_set" }));
    }

    #[test]
    fn user_message_hides_details() {
        let err = ReviewError::DeleteFatal("PHPhotosErrorDomain 3300".into());
        assert!(!err.user_facing_message().contains("3300"));
        assert!(err.to_string().contains("3300"));
    }
}
