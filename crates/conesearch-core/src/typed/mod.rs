//! Typed - 型付き Parameters / Worker API
//!
//! # 二層構造
//! - 型付き: `Parameters`, `Worker<P>`（ドメイン側が実装する）
//! - 型消去: `DynWorker`（Supervisor が呼ぶ）

pub mod parameters;
pub mod worker;

pub use self::parameters::Parameters;
pub use self::worker::{DynWorker, TypedWorker, Worker};
