//! App - アプリケーション層
//!
//! store、worker port、バックグラウンドループを組み合わせます。
//!
//! # 主要コンポーネント
//! - **ManagerBuilder**: 構築とワイヤリング、起動時検証
//! - **JobManager**: 受け口（create, get, list, update, delete, ...）
//! - **Supervisor**: FIFO ディスパッチ、同時実行数の上限、実行時間の期限
//! - **Sweeper**: 破棄時刻を過ぎたジョブの削除、任意のアーカイブ

pub mod builder;
pub mod config;
pub mod manager;
pub mod supervisor;
pub mod sweeper;

pub use self::builder::{BuildError, ManagerBuilder};
pub use self::config::ManagerConfig;
pub use self::manager::JobManager;
pub use self::supervisor::Supervisor;
pub use self::sweeper::{SweepReport, Sweeper};
