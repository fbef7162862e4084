//! SQLite persistence.

pub mod batch;
pub mod pool;

pub use batch::SqliteBatchStore;
pub use pool::DatabasePool;
