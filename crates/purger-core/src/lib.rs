//! purger-core
//!
//! Core of the month-by-month photo library review engine: walk a month's
//! assets one at a time, mark each keep or delete, and remove the marked set
//! in one batch at the end.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（asset, decision, errors, events, ids, media, outcome, snapshot, state）
//! - **ports**: 抽象化レイヤー（MediaLibraryGateway, AdGateway, Clock, IdGenerator）
//! - **engine**: 中核ロジック（ReviewSession, AdThrottle, PrefetchCache, DeletionCoordinator）
//! - **app**: 組み立てと owner タスク（EngineBuilder, ReviewEngine, EngineHandle, Catalog）
//! - **config**: 調整値の読み込み（`Purger.toml` + `PURGER_*`）
//! - **impls**: 実装（InMemoryMediaLibrary, ScriptedAdGateway など開発用）

pub mod app;
pub mod config;
pub mod domain;
pub mod engine;
pub mod impls;
pub mod ports;

pub use crate::app::{BuildError, Catalog, EngineBuilder, EngineHandle, ReviewEngine, load_catalog};
pub use crate::config::{EngineConfig, load_configuration};
