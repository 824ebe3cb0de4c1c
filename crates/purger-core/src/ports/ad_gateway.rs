//! AdGateway port - インタースティシャル広告 SDK
//!
//! 広告ネットワークについて保証するのは「いつか ready になるか、ならないか」だけです。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdError {
    #[error("no interstitial is loaded")]
    NotReady,

    #[error("ad failed: {0}")]
    Failed(String),
}

/// AdGateway は広告のロードと表示を抽象化
///
/// # コールバックとの対応
/// - `load_interstitial()` の完了 = onAdReady
/// - `present_interstitial()` の完了 = onAdDismissed
#[async_trait]
pub trait AdGateway: Send + Sync {
    async fn load_interstitial(&self) -> Result<(), AdError>;

    /// Resolves once the user dismissed the ad.
    async fn present_interstitial(&self) -> Result<(), AdError>;

    /// When true the ad throttle is bypassed entirely.
    fn is_ad_free(&self) -> bool;
}
