//! Asset and MonthBucket: what the review session walks over.
//!
//! The library owns the media itself; the engine only ever holds IDs plus the
//! kind tag, which is needed for exact photo/video counts after a deletion.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Opaque asset identifier issued by the media library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Photo,
    Video,
}

/// An ID together with its kind tag. This is what buckets and the pending
/// delete set hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: AssetId,
    pub kind: AssetKind,
}

impl AssetRef {
    pub fn photo(id: impl Into<String>) -> Self {
        Self {
            id: AssetId::new(id),
            kind: AssetKind::Photo,
        }
    }

    pub fn video(id: impl Into<String>) -> Self {
        Self {
            id: AssetId::new(id),
            kind: AssetKind::Video,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == AssetKind::Video
    }
}

/// Full asset metadata as enumerated by the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub kind: AssetKind,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    pub fn to_ref(&self) -> AssetRef {
        AssetRef {
            id: self.id.clone(),
            kind: self.kind,
        }
    }

    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.created_at)
    }
}

/// Start-of-month key (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    /// Returns `None` when `month` is not in 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// "April, 2025"
    pub fn label(&self) -> String {
        match self.first_day() {
            Some(d) => d.format("%B, %Y").to_string(),
            None => format!("{:04}-{:02}", self.year, self.month),
        }
    }

    /// "Apr"
    pub fn short_label(&self) -> String {
        match self.first_day() {
            Some(d) => d.format("%b").to_string(),
            None => format!("{:02}", self.month),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A month key plus its assets, ascending by creation time.
///
/// The order is fixed at construction and never changes for the lifetime of a
/// session that reviews this bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthBucket {
    month: MonthKey,
    assets: Vec<AssetRef>,
}

impl MonthBucket {
    /// Build a bucket from assets already in review order.
    pub fn new(month: MonthKey, assets: Vec<AssetRef>) -> Self {
        Self { month, assets }
    }

    /// Partition a flat asset list into month buckets.
    ///
    /// Buckets come back ascending by month; inside a bucket assets are
    /// ascending by creation time, ties broken by ID so the order is stable.
    pub fn group_assets(assets: &[Asset]) -> Vec<MonthBucket> {
        let mut sorted: Vec<&Asset> = assets.iter().collect();
        sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut grouped: BTreeMap<MonthKey, Vec<AssetRef>> = BTreeMap::new();
        for asset in sorted {
            grouped.entry(asset.month()).or_default().push(asset.to_ref());
        }

        grouped
            .into_iter()
            .map(|(month, assets)| MonthBucket::new(month, assets))
            .collect()
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AssetRef> {
        self.assets.get(index)
    }

    pub fn assets(&self) -> &[AssetRef] {
        &self.assets
    }

    pub fn photo_count(&self) -> usize {
        self.assets.iter().filter(|a| a.kind == AssetKind::Photo).count()
    }

    pub fn video_count(&self) -> usize {
        self.assets.iter().filter(|a| a.kind == AssetKind::Video).count()
    }
}

/// Month picker view: year -> buckets of that year, both ascending.
pub fn group_by_year(buckets: &[MonthBucket]) -> BTreeMap<i32, Vec<MonthBucket>> {
    let mut years: BTreeMap<i32, Vec<MonthBucket>> = BTreeMap::new();
    for bucket in buckets {
        years.entry(bucket.month().year).or_default().push(bucket.clone());
    }
    for months in years.values_mut() {
        months.sort_by_key(|b| b.month());
    }
    years
}
