//! Engine identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! セッション世代（generation）と prefetch リクエストの tag は ULID で表現します。
//! 生成順でソートできるので、ログ上で「どちらが新しい世代か」をそのまま比較できます。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を持ち、`T` はコンパイル時の区別にだけ使うマーカー型です。
//! SessionId と RequestToken を取り違えるとコンパイルエラーになります。
//!
//! AssetId はライブラリ側が発行する opaque な文字列なので、ここではなく
//! `domain::asset` に置いています。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"session-", "req-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// ログに出た ID 文字列を読み戻すときのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("expected prefix {expected:?} in {input:?}")]
    Prefix { expected: &'static str, input: String },

    #[error("invalid ulid in {input:?}")]
    Ulid { input: String },
}

/// `Display` の逆。プレフィックス付きの文字列だけを受け付けます。
impl<T: IdMarker> FromStr for Id<T> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).ok_or_else(|| IdParseError::Prefix {
            expected: T::prefix(),
            input: s.to_string(),
        })?;
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| IdParseError::Ulid {
                input: s.to_string(),
            })
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Session（月選択 1 回分の世代）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Session {}

impl IdMarker for Session {
    fn prefix() -> &'static str {
        "session-"
    }
}

/// Prefetch リクエストのマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Request {}

impl IdMarker for Request {
    fn prefix() -> &'static str {
        "req-"
    }
}

/// Generation tag of a review session. A new one is issued on every month selection.
pub type SessionId = Id<Session>;

/// Tag of one prefetch request. Completions carrying a stale token are dropped.
pub type RequestToken = Id<Request>;
