//! Deletion outcome model.
//!
//! `DeletionResult` is what the caller shows on the result screen. Counts are
//! exact (they come from the kind tags of the pending delete set); the byte
//! total is best-effort because size lookups are allowed to fail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AssetKind, AssetRef, MonthKey};
use super::errors::ReviewError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    pub month: MonthKey,
    pub photos_deleted: usize,
    pub videos_deleted: usize,
    /// Sum of the sizes that could be determined.
    pub total_bytes: u64,
    /// Number of deleted assets whose size lookup failed.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sizes_unknown: usize,
    pub completed_at: DateTime<Utc>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl DeletionResult {
    /// Counts come from the kind tags; sizes are filled in by the caller.
    pub fn from_deleted(month: MonthKey, deleted: &[AssetRef], completed_at: DateTime<Utc>) -> Self {
        let photos_deleted = deleted.iter().filter(|a| a.kind == AssetKind::Photo).count();
        Self {
            month,
            photos_deleted,
            videos_deleted: deleted.len() - photos_deleted,
            total_bytes: 0,
            sizes_unknown: 0,
            completed_at,
        }
    }

    pub fn total_deleted(&self) -> usize {
        self.photos_deleted + self.videos_deleted
    }

    /// Binary units, e.g. "1.5 MiB".
    pub fn human_size(&self) -> String {
        human_bytes(self.total_bytes)
    }
}

/// What one coordinator run ended in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted(DeletionResult),
    /// Pending set was empty; no gateway call was made.
    NothingToDelete,
    /// The library wants the user to confirm; the set is untouched.
    NeedsConfirmation,
    /// Any other failure; the set is untouched.
    Failed(ReviewError),
    /// A run was already submitting.
    Busy,
}

impl DeletionOutcome {
    /// The error view of a non-success outcome, if any.
    pub fn as_error(&self) -> Option<ReviewError> {
        match self {
            DeletionOutcome::Deleted(_) | DeletionOutcome::Busy => None,
            DeletionOutcome::NothingToDelete => Some(ReviewError::DeleteEmptySet),
            DeletionOutcome::NeedsConfirmation => Some(ReviewError::DeleteNeedsConfirmation),
            DeletionOutcome::Failed(err) => Some(err.clone()),
        }
    }

    /// The session is finished with its bucket.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeletionOutcome::Deleted(_) | DeletionOutcome::NothingToDelete
        )
    }
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
