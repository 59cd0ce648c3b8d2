pub mod error;
pub mod repos;
pub mod store;

pub use error::{PersistError, Result};
pub use repos::{ChatRecord, ChatStore, PathStore, SummaryRecord, SummaryStore};
pub use store::{JsonFileStore, KvStore, MemoryStore};
