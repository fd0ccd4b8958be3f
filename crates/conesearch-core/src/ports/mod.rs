//! Ports - 抽象化レイヤー
//!
//! テストで差し替える外部との境界。

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
