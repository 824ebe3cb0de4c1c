//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! ライブラリと広告のゲートウェイだけが必須です。時計と ID 生成器は
//! テストで固定したいときだけ差し替えます（既定は SystemClock と ULID）。
//! 広告しきい値・prefetch 窓・チャネル容量は spawn の前にここで検証します。

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::ports::{AdGateway, Clock, IdGenerator, MediaLibraryGateway, SystemClock, UlidGenerator};

use super::engine::ReviewEngine;

/// EngineBuilder はエンジンを構築
///
/// # 使用例
/// ```ignore
/// let handle = EngineBuilder::new(library, ads)
///     .config(EngineConfig { ad_threshold: 5, ..Default::default() })
///     .build()?
///     .spawn();
/// ```
///
/// # Fail-fast 設計
/// 設定値の検証は build() で行い、不正なら BuildError を返します。
/// 走り出してから「広告が毎回出る」「prefetch が効かない」と気づくより早く失敗させます。
pub struct EngineBuilder {
    library: Arc<dyn MediaLibraryGateway>,
    ads: Arc<dyn AdGateway>,
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はエンジン構築時のエラー
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("ad_threshold must be at least 1")]
    ZeroAdThreshold,

    #[error("window_span must be at least 2, got {0}")]
    WindowTooSmall(usize),

    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
}

impl EngineBuilder {
    pub fn new(library: Arc<dyn MediaLibraryGateway>, ads: Arc<dyn AdGateway>) -> Self {
        Self {
            library,
            ads,
            config: EngineConfig::default(),
            clock: None,
            ids: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used for `completed_at` (and for IDs when no generator is set).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// # 検証
    /// - ad_threshold >= 1
    /// - window_span >= 2（カーソルの前後に最低 1 つずつ）
    /// - channel の容量 > 0
    pub fn build(self) -> Result<ReviewEngine, BuildError> {
        if self.config.ad_threshold == 0 {
            return Err(BuildError::ZeroAdThreshold);
        }
        if self.config.window_span < 2 {
            return Err(BuildError::WindowTooSmall(self.config.window_span));
        }
        if self.config.event_capacity == 0 {
            return Err(BuildError::ZeroCapacity("event_capacity"));
        }
        if self.config.command_capacity == 0 {
            return Err(BuildError::ZeroCapacity("command_capacity"));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(SystemClock)),
        };
        Ok(ReviewEngine {
            config: self.config,
            library: self.library,
            ads: self.ads,
            clock,
            ids,
        })
    }
}
