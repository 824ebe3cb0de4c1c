//! Engine - レビューの中核ロジック
//!
//! # 構成
//! - **session**: 1 か月分のレビュー状態機械（純粋、I/O なし）
//! - **throttle**: 広告を挟むタイミングの判定
//! - **window**: prefetch 窓の計算
//! - **prefetch**: 窓の中のメディアを温めるキャッシュ
//! - **coordinator**: 月末の一括削除
//!
//! ここにある型はすべて owner（`app::ReviewEngine`）から使われます。

pub mod coordinator;
pub mod prefetch;
pub mod session;
pub mod throttle;
pub mod window;

pub use self::coordinator::DeletionCoordinator;
pub use self::prefetch::{CacheEntry, PrefetchCache, PrefetchCompletion};
pub use self::session::{Advance, Reveal, ReviewSession};
pub use self::throttle::{AdThrottle, DEFAULT_AD_THRESHOLD, ThrottleVerdict};
pub use self::window::{DEFAULT_WINDOW_SPAN, PrefetchWindow};
