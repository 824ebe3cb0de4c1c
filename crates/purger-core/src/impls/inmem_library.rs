//! InMemoryMediaLibrary - 開発・テスト用の写真ライブラリ
//!
//! # 学習ポイント
//! - parking_lot::Mutex で状態を守り、await をまたいでロックを持たない
//! - 取得の遅延・停止・失敗をアセット単位で注入できる
//! - Drop ガードで「途中でキャンセルされた取得」を観測できる
//!
//! 呼び出しは全部記録されるので、テストから「何が起きたか」を確認できます。

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::{
    Asset, AssetId, AssetKind, AssetRef, MonthBucket, MonthKey, PhotoData, TargetSize, VideoHandle,
};
use crate::ports::{AuthStatus, LibraryError, MediaLibraryGateway};

#[derive(Debug, Clone)]
struct StoredAsset {
    asset: Asset,
    byte_size: u64,
}

#[derive(Debug, Default)]
struct LibraryState {
    auth: Option<AuthStatus>,
    live: BTreeMap<AssetId, StoredAsset>,
    /// Sizes survive deletion so the post-delete lookup still works.
    sizes: HashMap<AssetId, u64>,
    listing_failure: Option<String>,
    fetch_failures: HashSet<AssetId>,
    size_failures: HashSet<AssetId>,
    stalled: HashSet<AssetId>,
    delays: HashMap<AssetId, Duration>,
    confirmations_required: u32,
    delete_failure: Option<String>,
    caching: BTreeSet<AssetId>,
    fetch_calls: Vec<AssetId>,
    delete_calls: Vec<Vec<AssetId>>,
    inflight_videos: BTreeMap<AssetId, usize>,
}

/// InMemoryMediaLibrary は開発用の MediaLibraryGateway
///
/// # 使用例
/// ```ignore
/// let library = InMemoryMediaLibrary::new(assets)
///     .with_fetch_failure("IMG_0003")
///     .with_confirmations(1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryMediaLibrary {
    state: Arc<Mutex<LibraryState>>,
}

impl InMemoryMediaLibrary {
    /// `(asset, byte size)` pairs.
    pub fn new(assets: impl IntoIterator<Item = (Asset, u64)>) -> Self {
        let mut state = LibraryState::default();
        for (asset, byte_size) in assets {
            state.sizes.insert(asset.id.clone(), byte_size);
            state.live.insert(asset.id.clone(), StoredAsset { asset, byte_size });
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A library of `months` consecutive months starting at `start`, each with
    /// `per_month` assets. Every `video_every`-th asset is a video (0 = none).
    pub fn synthetic(start: MonthKey, months: u32, per_month: u32, video_every: u32) -> Self {
        Self::new(synthetic_assets(start, months, per_month, video_every))
    }

    pub fn with_auth(self, status: AuthStatus) -> Self {
        self.state.lock().auth = Some(status);
        self
    }

    pub fn with_listing_failure(self, reason: impl Into<String>) -> Self {
        self.state.lock().listing_failure = Some(reason.into());
        self
    }

    pub fn with_fetch_failure(self, id: impl Into<String>) -> Self {
        self.state.lock().fetch_failures.insert(AssetId::new(id));
        self
    }

    pub fn with_size_failure(self, id: impl Into<String>) -> Self {
        self.state.lock().size_failures.insert(AssetId::new(id));
        self
    }

    /// Fetches for `id` never complete.
    pub fn with_stalled_fetch(self, id: impl Into<String>) -> Self {
        self.state.lock().stalled.insert(AssetId::new(id));
        self
    }

    pub fn with_fetch_delay(self, id: impl Into<String>, delay: Duration) -> Self {
        self.state.lock().delays.insert(AssetId::new(id), delay);
        self
    }

    /// The next `times` delete calls ask for user confirmation.
    pub fn with_confirmations(self, times: u32) -> Self {
        self.state.lock().confirmations_required = times;
        self
    }

    pub fn with_delete_failure(self, reason: impl Into<String>) -> Self {
        self.state.lock().delete_failure = Some(reason.into());
        self
    }

    pub fn clear_fetch_failure(&self, id: &str) {
        self.state.lock().fetch_failures.remove(&AssetId::new(id));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().live.contains_key(&AssetId::new(id))
    }

    /// IDs currently under a caching hint.
    pub fn caching_ids(&self) -> BTreeSet<AssetId> {
        self.state.lock().caching.clone()
    }

    pub fn delete_calls(&self) -> Vec<Vec<AssetId>> {
        self.state.lock().delete_calls.clone()
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        let id = AssetId::new(id);
        self.state.lock().fetch_calls.iter().filter(|c| **c == id).count()
    }

    /// Video preparations that started and have neither finished nor been
    /// dropped.
    pub fn inflight_video_fetches(&self) -> BTreeSet<AssetId> {
        self.state.lock().inflight_videos.keys().cloned().collect()
    }

    /// Outstanding preparations of one video.
    pub fn inflight_video_count(&self, id: &str) -> usize {
        self.state
            .lock()
            .inflight_videos
            .get(&AssetId::new(id))
            .copied()
            .unwrap_or_default()
    }

    fn authorized(&self) -> Result<(), LibraryError> {
        match self.state.lock().auth.unwrap_or(AuthStatus::Authorized) {
            AuthStatus::Authorized | AuthStatus::Limited => Ok(()),
            _ => Err(LibraryError::AccessDenied),
        }
    }

    /// Shared fetch prelude: record, then wait out any injected delay or stall.
    async fn begin_fetch(&self, id: &AssetId) -> Result<(), LibraryError> {
        self.authorized()?;
        let (delay, stalled) = {
            let mut state = self.state.lock();
            state.fetch_calls.push(id.clone());
            (state.delays.get(id).copied(), state.stalled.contains(id))
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        if state.fetch_failures.contains(id) {
            return Err(LibraryError::Other(format!("decode failed for {id}")));
        }
        if !state.live.contains_key(id) {
            return Err(LibraryError::NotFound(id.clone()));
        }
        Ok(())
    }
}

/// Removes the inflight marker when the fetch future ends or is dropped.
struct InflightVideo {
    state: Arc<Mutex<LibraryState>>,
    id: AssetId,
}

impl InflightVideo {
    fn enter(state: &Arc<Mutex<LibraryState>>, id: &AssetId) -> Self {
        *state.lock().inflight_videos.entry(id.clone()).or_default() += 1;
        Self {
            state: state.clone(),
            id: id.clone(),
        }
    }
}

impl Drop for InflightVideo {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(count) = state.inflight_videos.get_mut(&self.id) {
            *count -= 1;
            if *count == 0 {
                state.inflight_videos.remove(&self.id);
            }
        }
    }
}

#[async_trait]
impl MediaLibraryGateway for InMemoryMediaLibrary {
    async fn request_authorization(&self) -> AuthStatus {
        self.state.lock().auth.unwrap_or(AuthStatus::Authorized)
    }

    async fn fetch_assets_grouped_by_month(&self) -> Result<Vec<MonthBucket>, LibraryError> {
        self.authorized()?;
        let state = self.state.lock();
        if let Some(reason) = &state.listing_failure {
            return Err(LibraryError::Other(reason.clone()));
        }
        let assets: Vec<Asset> = state.live.values().map(|s| s.asset.clone()).collect();
        Ok(MonthBucket::group_assets(&assets))
    }

    async fn fetch_photo(&self, id: &AssetId, size: TargetSize) -> Result<PhotoData, LibraryError> {
        self.begin_fetch(id).await?;
        debug!(asset = %id, ?size, "in-memory photo fetched");
        Ok(PhotoData::new(id.as_str().as_bytes().to_vec()))
    }

    async fn fetch_video_handle(&self, id: &AssetId) -> Result<VideoHandle, LibraryError> {
        let _inflight = InflightVideo::enter(&self.state, id);
        self.begin_fetch(id).await?;
        Ok(VideoHandle {
            asset: id.clone(),
            uri: format!("mem://{id}"),
        })
    }

    async fn delete_assets(&self, ids: &[AssetId]) -> Result<(), LibraryError> {
        self.authorized()?;
        let mut state = self.state.lock();
        state.delete_calls.push(ids.to_vec());

        if state.confirmations_required > 0 {
            state.confirmations_required -= 1;
            return Err(LibraryError::NeedsConfirmation);
        }
        if let Some(reason) = &state.delete_failure {
            return Err(LibraryError::Other(reason.clone()));
        }
        // all-or-nothing
        if let Some(missing) = ids.iter().find(|id| !state.live.contains_key(*id)) {
            return Err(LibraryError::NotFound(missing.clone()));
        }
        for id in ids {
            state.live.remove(id);
            state.caching.remove(id);
        }
        Ok(())
    }

    async fn fetch_byte_size(&self, asset: &AssetRef) -> Result<u64, LibraryError> {
        let state = self.state.lock();
        if state.size_failures.contains(&asset.id) {
            return Err(LibraryError::Other(format!("no resource for {}", asset.id)));
        }
        state
            .sizes
            .get(&asset.id)
            .copied()
            .ok_or_else(|| LibraryError::NotFound(asset.id.clone()))
    }

    fn start_caching(&self, ids: &[AssetId]) {
        self.state.lock().caching.extend(ids.iter().cloned());
    }

    fn stop_caching(&self, ids: &[AssetId]) {
        let mut state = self.state.lock();
        for id in ids {
            state.caching.remove(id);
        }
    }
}

/// Deterministic demo library content.
pub fn synthetic_assets(
    start: MonthKey,
    months: u32,
    per_month: u32,
    video_every: u32,
) -> Vec<(Asset, u64)> {
    let mut out = Vec::new();
    for m in 0..months {
        let offset = start.month - 1 + m;
        let year = start.year + (offset / 12) as i32;
        let month = offset % 12 + 1;
        let Some(first) = first_instant(year, month) else {
            continue;
        };
        for i in 0..per_month {
            let n = m * per_month + i;
            let is_video = video_every > 0 && (i + 1) % video_every == 0;
            let (kind, prefix, size) = if is_video {
                (AssetKind::Video, "VID", 48 * 1024 * 1024 + u64::from(i) * 4096)
            } else {
                (AssetKind::Photo, "IMG", 2 * 1024 * 1024 + u64::from(i) * 1024)
            };
            let created_at = first + ChronoDuration::hours(i64::from(i) * 6);
            out.push((
                Asset {
                    id: AssetId::new(format!("{prefix}_{n:04}")),
                    kind,
                    created_at,
                },
                size,
            ));
        }
    }
    out
}

fn first_instant(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 8, 0, 0).single()
}
