//! Store - ジョブレコードの唯一の正

mod memory;

pub use memory::JobStore;
