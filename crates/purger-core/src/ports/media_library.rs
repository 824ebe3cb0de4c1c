//! MediaLibraryGateway port - 写真ライブラリ（OS の Photos フレームワークなど）
//!
//! エンジンはこの trait 越しにしかライブラリに触りません。
//! 具体的な SDK バインディングは別クレートで実装し、開発・テストでは
//! `impls::InMemoryMediaLibrary` を使います。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AssetId, AssetRef, MonthBucket, PhotoData, ReviewError, TargetSize, VideoHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Authorized,
    /// The user granted access to a subset of the library.
    Limited,
    Denied,
    Restricted,
    NotDetermined,
}

impl AuthStatus {
    /// Map to the engine's error taxonomy. `Ok` means the library may be read.
    pub fn check(self) -> Result<(), ReviewError> {
        match self {
            AuthStatus::Authorized | AuthStatus::Limited => Ok(()),
            AuthStatus::Denied | AuthStatus::Restricted => Err(ReviewError::AccessDenied),
            AuthStatus::NotDetermined => Err(ReviewError::AuthRequired),
        }
    }
}

/// LibraryError はゲートウェイ側のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("access denied")]
    AccessDenied,

    #[error("asset not found: {0}")]
    NotFound(AssetId),

    /// The platform asked the user to confirm a destructive change.
    #[error("change needs user confirmation")]
    NeedsConfirmation,

    #[error("{0}")]
    Other(String),
}

/// MediaLibraryGateway は写真ライブラリへのアクセスを抽象化
///
/// # 設計原則
/// - すべて非同期。エンジンは結果を owner に戻してから状態を変える
/// - `delete_assets` はアトミック（全部消えるか、何も消えない）
/// - caching hint は fire-and-forget（失敗しても何も返さない）
#[async_trait]
pub trait MediaLibraryGateway: Send + Sync {
    async fn request_authorization(&self) -> AuthStatus;

    async fn fetch_assets_grouped_by_month(&self) -> Result<Vec<MonthBucket>, LibraryError>;

    async fn fetch_photo(&self, id: &AssetId, size: TargetSize) -> Result<PhotoData, LibraryError>;

    async fn fetch_video_handle(&self, id: &AssetId) -> Result<VideoHandle, LibraryError>;

    /// Delete the whole set in one change request.
    async fn delete_assets(&self, ids: &[AssetId]) -> Result<(), LibraryError>;

    /// Image byte length for photos, backing file size for videos.
    async fn fetch_byte_size(&self, asset: &AssetRef) -> Result<u64, LibraryError>;

    fn start_caching(&self, ids: &[AssetId]);

    fn stop_caching(&self, ids: &[AssetId]);
}
