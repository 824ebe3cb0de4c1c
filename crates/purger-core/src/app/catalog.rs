//! Catalog - 月一覧の読み込み
//!
//! 権限を確認してからライブラリ全体を月ごとに列挙します。
//! 月選択画面（年 → 月）と、削除後に次の月へ進む処理の両方がこれを使います。

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::domain::{MonthBucket, MonthKey, ReviewError, group_by_year};
use crate::ports::{LibraryError, MediaLibraryGateway};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    buckets: Vec<MonthBucket>,
}

impl Catalog {
    pub fn new(mut buckets: Vec<MonthBucket>) -> Self {
        buckets.sort_by_key(|b| b.month());
        Self { buckets }
    }

    pub fn buckets(&self) -> &[MonthBucket] {
        &self.buckets
    }

    pub fn total_assets(&self) -> usize {
        self.buckets.iter().map(MonthBucket::len).sum()
    }

    pub fn by_year(&self) -> BTreeMap<i32, Vec<MonthBucket>> {
        group_by_year(&self.buckets)
    }

    pub fn first(&self) -> Option<&MonthBucket> {
        self.buckets.first()
    }

    /// The next non-empty month after `key`.
    pub fn next_after(&self, key: MonthKey) -> Option<&MonthBucket> {
        self.buckets
            .iter()
            .find(|b| b.month() > key && !b.is_empty())
    }
}

/// Check authorization, then enumerate the library.
pub async fn load_catalog(library: &dyn MediaLibraryGateway) -> Result<Catalog, ReviewError> {
    let status = library.request_authorization().await;
    if let Err(err) = status.check() {
        warn!(?status, "library not readable");
        return Err(err);
    }

    let buckets = library
        .fetch_assets_grouped_by_month()
        .await
        .map_err(|err| match err {
            LibraryError::AccessDenied => ReviewError::AccessDenied,
            other => ReviewError::CatalogUnavailable(other.to_string()),
        })?;

    let catalog = Catalog::new(buckets);
    info!(
        months = catalog.buckets().len(),
        assets = catalog.total_assets(),
        "library catalog loaded"
    );
    Ok(catalog)
}
