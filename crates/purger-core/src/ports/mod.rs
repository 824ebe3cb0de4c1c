//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 写真ライブラリと広告 SDK はエンジンの外側にあり、ここで定義した trait
//! 越しにだけ使います。

pub mod ad_gateway;
pub mod clock;
pub mod id_generator;
pub mod media_library;

// 主要な trait を再エクスポート
pub use self::ad_gateway::{AdError, AdGateway};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::media_library::{AuthStatus, LibraryError, MediaLibraryGateway};
