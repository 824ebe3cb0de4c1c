//! ScriptedAdGateway - 開発・テスト用の広告ゲートウェイ
//!
//! 本物の広告 SDK の代わりに、表示と dismiss のタイミングを台本どおりに動かします。
//!
//! # 挙動
//! - `DismissImmediately`: 表示してすぐ閉じる（CLI デモ向け）
//! - `HoldUntilDismissed`: `dismiss()` が呼ばれるまで閉じない
//! - `NotReady`: 表示に失敗する（ロードされていない）

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::ports::{AdError, AdGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdScript {
    DismissImmediately,
    HoldUntilDismissed,
    NotReady,
}

#[derive(Clone)]
pub struct ScriptedAdGateway {
    script: AdScript,
    ad_free: Arc<AtomicBool>,
    loads: Arc<AtomicUsize>,
    presentations: Arc<AtomicUsize>,
    dismissals: Arc<Notify>,
}

impl ScriptedAdGateway {
    pub fn new(script: AdScript) -> Self {
        Self {
            script,
            ad_free: Arc::new(AtomicBool::new(false)),
            loads: Arc::new(AtomicUsize::new(0)),
            presentations: Arc::new(AtomicUsize::new(0)),
            dismissals: Arc::new(Notify::new()),
        }
    }

    /// A user who paid to remove ads.
    pub fn ad_free() -> Self {
        let gateway = Self::new(AdScript::DismissImmediately);
        gateway.set_ad_free(true);
        gateway
    }

    pub fn set_ad_free(&self, ad_free: bool) {
        self.ad_free.store(ad_free, Ordering::SeqCst);
    }

    /// Close the ad currently held on screen.
    pub fn dismiss(&self) {
        self.dismissals.notify_one();
    }

    pub fn presentations(&self) -> usize {
        self.presentations.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdGateway for ScriptedAdGateway {
    async fn load_interstitial(&self) -> Result<(), AdError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.script {
            AdScript::NotReady => Err(AdError::NotReady),
            _ => Ok(()),
        }
    }

    async fn present_interstitial(&self) -> Result<(), AdError> {
        match self.script {
            AdScript::NotReady => Err(AdError::NotReady),
            AdScript::DismissImmediately => {
                self.presentations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            AdScript::HoldUntilDismissed => {
                self.presentations.fetch_add(1, Ordering::SeqCst);
                self.dismissals.notified().await;
                Ok(())
            }
        }
    }

    fn is_ad_free(&self) -> bool {
        self.ad_free.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn held_ad_resolves_on_dismiss() {
        let ads = ScriptedAdGateway::new(AdScript::HoldUntilDismissed);
        let shown = ads.clone();
        let task = tokio::spawn(async move { shown.present_interstitial().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!task.is_finished());
        assert_eq!(ads.presentations(), 1);

        ads.dismiss();
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn not_ready_fails_to_present() {
        let ads = ScriptedAdGateway::new(AdScript::NotReady);
        assert_eq!(ads.present_interstitial().await, Err(AdError::NotReady));
        assert!(!ads.is_ad_free());
    }
}
