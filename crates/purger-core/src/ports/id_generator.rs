//! IdGenerator port - ID 生成の抽象化
//!
//! セッション世代とリクエスト tag の生成を trait にしておくことで、
//! テストでは FixedClock を使って timestamp 部分を固定できます。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース

use crate::domain::ids::{RequestToken, SessionId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は世代 tag とリクエスト tag を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（owner と prefetch の両方から使える）
pub trait IdGenerator: Send + Sync {
    /// Session ID（世代）を生成
    fn generate_session_id(&self) -> SessionId;

    /// Prefetch リクエストの tag を生成
    fn generate_request_token(&self) -> RequestToken;
}

/// UlidGenerator は ULID ベースの ID 生成器
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_session_id(&self) -> SessionId {
        SessionId::from(self.next_ulid())
    }

    fn generate_request_token(&self) -> RequestToken {
        RequestToken::from(self.next_ulid())
    }
}
