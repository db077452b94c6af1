pub mod cache;
pub mod lru;
pub mod persistent;

pub use cache::{TieredCache, DEFAULT_SINGLE_FLIGHT_WAIT};
pub use lru::MemoryLru;
pub use persistent::{PersistentStore, SqlxSqliteStore};
