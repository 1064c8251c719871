pub mod entities;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod scoped;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryAuditStore;
pub use postgres::PgAuditStore;
pub use scoped::ScopedQuery;
pub use store::{AuditStore, StoreError, TenantDirectory};
