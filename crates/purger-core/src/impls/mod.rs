//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryMediaLibrary**: 開発用の写真ライブラリ（失敗・遅延を注入できる）
//! - **ScriptedAdGateway**: 台本どおりに動く広告ゲートウェイ
//!
//! # 本番用実装
//! OS の写真フレームワークや広告 SDK へのバインディングは別クレートに置きます。

pub mod inmem_library;
pub mod scripted_ads;

// 主要な型を再エクスポート
pub use self::inmem_library::{InMemoryMediaLibrary, synthetic_assets};
pub use self::scripted_ads::{AdScript, ScriptedAdGateway};
