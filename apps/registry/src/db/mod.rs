//! Record store abstraction and its implementations.

pub mod memory;
pub mod postgres;
pub mod query;
pub mod traits;

pub use memory::{MemoryRecordStore, TableDef};
pub use postgres::PostgresRecordStore;
pub use traits::RecordStore;
