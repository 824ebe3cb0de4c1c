//! App - アプリケーション層
//!
//! engine の部品と ports を組み合わせて、動くエンジンにします。
//!
//! # 主要コンポーネント
//! - **EngineBuilder**: 設定の検証とワイヤリング
//! - **ReviewEngine**: owner タスク（状態の唯一の書き手）
//! - **EngineHandle**: 呼び出し側のコマンド窓口
//! - **Catalog**: 権限確認と月一覧の読み込み

pub mod builder;
pub mod catalog;
pub mod engine;
pub mod handle;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, EngineBuilder};
pub use self::catalog::{Catalog, load_catalog};
pub use self::engine::ReviewEngine;
pub use self::handle::EngineHandle;
