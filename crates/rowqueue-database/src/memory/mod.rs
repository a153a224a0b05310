//! In-memory storage backend.
//!
//! Every table lives behind one async mutex, so each trait method is a
//! single atomic step in the same way a single SQL statement or
//! transaction is for the PostgreSQL backend.

mod store;

pub use store::MemoryStorage;
