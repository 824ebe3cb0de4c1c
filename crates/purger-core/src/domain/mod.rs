//! Domain model (assets, buckets, decisions, outcomes, snapshots, ...).
//!
//! ここには I/O を含めません。ports / engine / app がこの型を共有します。

pub mod asset;
pub mod decision;
pub mod errors;
pub mod events;
pub mod ids;
pub mod media;
pub mod outcome;
pub mod snapshot;
pub mod state;

pub use self::asset::{Asset, AssetId, AssetKind, AssetRef, MonthBucket, MonthKey, group_by_year};
pub use self::decision::Decision;
pub use self::errors::{ErrorKind, RejectReason, ReviewError};
pub use self::events::{EngineEvent, Notice};
pub use self::ids::{IdParseError, RequestToken, SessionId};
pub use self::media::{MediaHandle, PhotoData, TargetSize, VideoHandle};
pub use self::outcome::{DeletionOutcome, DeletionResult, human_bytes};
pub use self::snapshot::{ActionMode, DisplaySnapshot, MediaView, Position};
pub use self::state::{CoordinatorState, SessionState};
