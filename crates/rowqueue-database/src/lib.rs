//! # rowqueue-database
//!
//! PostgreSQL connection management, migrations, and the concrete
//! implementations of every `rowqueue-core` storage trait. An in-memory
//! backend with the same semantics is available behind the `memory`
//! feature for tests and single-process use.

pub mod connection;
#[cfg(feature = "memory")]
pub mod memory;
pub mod migration;
pub mod provider;
pub mod repositories;

pub use connection::DatabasePool;
pub use provider::Storage;
