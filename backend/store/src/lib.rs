pub mod memory;
pub mod sqlite;

pub use memory::InMemoryPartnerStore;
pub use sqlite::SqlitePartnerStore;
