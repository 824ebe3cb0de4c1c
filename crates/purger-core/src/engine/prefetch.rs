//! PrefetchCache - カーソル周辺のメディアを温めておくキャッシュ
//!
//! # 設計原則
//! - 窓 `[cursor - back, cursor + ahead)` の中だけを保持する
//! - 窓に入ったアセット: caching hint を開始し、取得リクエストを投げる
//! - 窓から出たアセット: エントリを捨て、hint を止め、リクエストをキャンセル
//! - 動画は同時に 1 本だけ hot。それ以外の動画ハンドルは inert のまま持つ
//!
//! # 完了の扱い
//! 取得結果は mpsc で owner に戻り、owner が `complete()` を呼びます。
//! リクエストごとに `RequestToken` を振っておき、token が一致しない完了
//! （窓から外れた後や、月を選び直した後に届いたもの）は黙って捨てます。
//!
//! 画面に出ているアセットの再取得（プレビュー失敗後やユーザーの再試行）も
//! `refetch()` でこのキャッシュを通します。スロットに token が載るので、
//! 窓から外れれば他のリクエストと同じようにキャンセルされます。
//!
//! キャッシュは owner だけが触るので、ロックは持ちません。

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::domain::{AssetId, AssetKind, AssetRef, MediaHandle, MonthBucket, RequestToken, SessionId, TargetSize};
use crate::ports::{IdGenerator, LibraryError, MediaLibraryGateway};

use super::window::PrefetchWindow;

/// A finished prefetch request, routed back to the owner.
#[derive(Debug)]
pub struct PrefetchCompletion {
    pub generation: SessionId,
    pub token: RequestToken,
    pub asset: AssetId,
    pub result: Result<MediaHandle, LibraryError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    Pending,
    Ready(MediaHandle),
    Failed(String),
}

#[derive(Debug)]
struct Slot {
    kind: AssetKind,
    token: RequestToken,
    cancel: CancellationToken,
    entry: CacheEntry,
}

pub struct PrefetchCache {
    library: Arc<dyn MediaLibraryGateway>,
    ids: Arc<dyn IdGenerator>,
    generation: SessionId,
    span: usize,
    target_size: TargetSize,
    completions: mpsc::UnboundedSender<PrefetchCompletion>,
    /// Parent of every request token; cancelled on shutdown.
    shutdown: CancellationToken,
    window: Option<PrefetchWindow>,
    slots: HashMap<AssetId, Slot>,
    hot_video: Option<AssetId>,
}

impl PrefetchCache {
    pub fn new(
        library: Arc<dyn MediaLibraryGateway>,
        ids: Arc<dyn IdGenerator>,
        generation: SessionId,
        span: usize,
        target_size: TargetSize,
        completions: mpsc::UnboundedSender<PrefetchCompletion>,
    ) -> Self {
        Self {
            library,
            ids,
            generation,
            span,
            target_size,
            completions,
            shutdown: CancellationToken::new(),
            window: None,
            slots: HashMap::new(),
            hot_video: None,
        }
    }

    pub fn generation(&self) -> SessionId {
        self.generation
    }

    pub fn window(&self) -> Option<PrefetchWindow> {
        self.window
    }

    /// IDs currently held (and hinted) by the cache.
    pub fn hinted_ids(&self) -> BTreeSet<AssetId> {
        self.slots.keys().cloned().collect()
    }

    /// Video requests that are still outstanding.
    pub fn inflight_video_requests(&self) -> BTreeSet<AssetId> {
        self.slots
            .iter()
            .filter(|(_, s)| s.kind == AssetKind::Video && s.entry == CacheEntry::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn hot_video(&self) -> Option<&AssetId> {
        self.hot_video.as_ref()
    }

    pub fn entry(&self, id: &AssetId) -> Option<&CacheEntry> {
        self.slots.get(id).map(|s| &s.entry)
    }

    pub fn ready_handle(&self, id: &AssetId) -> Option<MediaHandle> {
        match self.entry(id) {
            Some(CacheEntry::Ready(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Move the window so that it surrounds `cursor`.
    pub fn recenter(&mut self, bucket: &MonthBucket, cursor: usize) {
        let next = PrefetchWindow::around(cursor, bucket.len(), self.span);
        self.window = Some(next);

        let inside: HashSet<&AssetId> = next
            .range()
            .filter_map(|i| bucket.get(i))
            .map(|a| &a.id)
            .collect();
        let leaving: Vec<AssetId> = self
            .slots
            .keys()
            .filter(|id| !inside.contains(id))
            .cloned()
            .collect();
        for id in &leaving {
            if let Some(slot) = self.slots.remove(id) {
                slot.cancel.cancel();
            }
            if self.hot_video.as_ref() == Some(id) {
                self.hot_video = None;
            }
        }
        if !leaving.is_empty() {
            self.library.stop_caching(&leaving);
        }

        let entering: Vec<AssetRef> = next
            .range()
            .filter_map(|i| bucket.get(i))
            .filter(|a| !self.slots.contains_key(&a.id))
            .cloned()
            .collect();
        if !entering.is_empty() {
            let ids: Vec<AssetId> = entering.iter().map(|a| a.id.clone()).collect();
            self.library.start_caching(&ids);
        }
        for asset in &entering {
            self.request(asset);
        }

        trace!(
            cursor,
            start = next.start,
            end = next.end,
            entering = entering.len(),
            leaving = leaving.len(),
            "prefetch window moved"
        );
    }

    /// Replace whatever the slot holds with a fresh request.
    ///
    /// The previous request for `asset` is cancelled first, so at most one is
    /// outstanding per asset. Returns the new token.
    pub fn refetch(&mut self, asset: &AssetRef) -> RequestToken {
        match self.slots.remove(&asset.id) {
            Some(slot) => slot.cancel.cancel(),
            None => self.library.start_caching(std::slice::from_ref(&asset.id)),
        }
        debug!(asset = %asset.id, "refetching");
        self.request(asset)
    }

    fn request(&mut self, asset: &AssetRef) -> RequestToken {
        let token = self.ids.generate_request_token();
        let cancel = self.shutdown.child_token();
        self.slots.insert(
            asset.id.clone(),
            Slot {
                kind: asset.kind,
                token,
                cancel: cancel.clone(),
                entry: CacheEntry::Pending,
            },
        );

        let library = Arc::clone(&self.library);
        let completions = self.completions.clone();
        let generation = self.generation;
        let target_size = self.target_size;
        let asset = asset.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(asset = %asset.id, "prefetch cancelled");
                    return;
                }
                result = fetch_media(library.as_ref(), &asset, target_size) => result,
            };
            if cancel.is_cancelled() {
                return;
            }
            // owner が閉じていれば捨てる
            let _ = completions.send(PrefetchCompletion {
                generation,
                token,
                asset: asset.id,
                result,
            });
        });
        token
    }

    /// Apply a completion. Returns `false` for stale ones.
    pub fn complete(&mut self, completion: PrefetchCompletion) -> bool {
        if completion.generation != self.generation {
            return false;
        }
        let Some(slot) = self.slots.get_mut(&completion.asset) else {
            return false;
        };
        if slot.token != completion.token {
            return false;
        }
        slot.entry = match completion.result {
            Ok(handle) => CacheEntry::Ready(handle),
            Err(err) => {
                debug!(asset = %completion.asset, error = %err, "prefetch failed");
                CacheEntry::Failed(err.to_string())
            }
        };
        true
    }

    /// Mark `asset` as the one on screen. A video becomes the single hot one;
    /// a photo leaves no video hot.
    pub fn set_current(&mut self, asset: &AssetRef) {
        self.hot_video = asset.is_video().then(|| asset.id.clone());
    }

    pub fn clear_current(&mut self) {
        self.hot_video = None;
    }

    /// Cancel everything and drop every hint. Idempotent.
    pub fn shutdown(&mut self) {
        self.shutdown.cancel();
        if !self.slots.is_empty() {
            let ids: Vec<AssetId> = self.slots.drain().map(|(id, _)| id).collect();
            self.library.stop_caching(&ids);
        }
        self.window = None;
        self.hot_video = None;
    }
}

impl Drop for PrefetchCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Photo → decoded image, video → prepared handle.
async fn fetch_media(
    library: &dyn MediaLibraryGateway,
    asset: &AssetRef,
    target_size: TargetSize,
) -> Result<MediaHandle, LibraryError> {
    match asset.kind {
        AssetKind::Photo => library
            .fetch_photo(&asset.id, target_size)
            .await
            .map(MediaHandle::Photo),
        AssetKind::Video => library
            .fetch_video_handle(&asset.id)
            .await
            .map(MediaHandle::Video),
    }
}
