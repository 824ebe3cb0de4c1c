//! DisplaySnapshot - 呼び出し側に渡す不変のスナップショット
//!
//! owner は遷移のたびに新しいスナップショットを作って `watch` で公開します。
//! 呼び出し側がエンジン内部のフィールドを直接触ることはありません。

use serde::{Deserialize, Serialize};

use super::asset::{AssetId, AssetRef, MonthKey};
use super::ids::SessionId;
use super::media::MediaHandle;
use super::state::SessionState;

/// What the media area should show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MediaView {
    /// No month selected, or the bucket is exhausted.
    #[default]
    Empty,
    Loading { asset: AssetRef },
    Ready {
        asset: AssetRef,
        handle: MediaHandle,
        /// True for the single active video.
        hot: bool,
    },
    Unavailable { asset: AssetRef, reason: String },
    AdPlaceholder,
}

impl MediaView {
    pub fn asset_id(&self) -> Option<&AssetId> {
        match self {
            MediaView::Loading { asset }
            | MediaView::Ready { asset, .. }
            | MediaView::Unavailable { asset, .. } => Some(&asset.id),
            MediaView::Empty | MediaView::AdPlaceholder => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, MediaView::Ready { .. })
    }
}

/// How the keep/delete buttons are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    Normal,
    ConfirmDelete,
    HiddenForAd,
    #[default]
    Disabled,
}

/// 1-based position for the "i of N" label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub index: usize,
    pub total: usize,
}

impl Position {
    pub fn label(&self) -> String {
        format!("{} of {}", self.index, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplaySnapshot {
    pub generation: Option<SessionId>,
    pub month: Option<MonthKey>,
    pub state: Option<SessionState>,
    pub media: MediaView,
    pub position: Option<Position>,
    pub undo_available: bool,
    pub action_mode: ActionMode,
    pub decisions_made: usize,
    pub pending_delete: Vec<AssetId>,
}

impl DisplaySnapshot {
    /// "3 of 12", or empty when nothing is selected.
    pub fn position_label(&self) -> String {
        self.position.map(|p| p.label()).unwrap_or_default()
    }

    /// "April, 2025"
    pub fn month_label(&self) -> String {
        self.month.map(|m| m.label()).unwrap_or_default()
    }

    pub fn session_state(&self) -> SessionState {
        self.state.unwrap_or(SessionState::Idle)
    }
}
