//! Persistence layer: the local mailbox snapshot rules are evaluated against.

pub mod libsql_backend;
pub mod memory;
pub mod schema;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryStore;
pub use traits::{MailStore, RecordStream};
