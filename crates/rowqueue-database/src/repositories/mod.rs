//! PostgreSQL implementations of the `rowqueue-core` storage traits.

pub mod collection;
pub mod counter;
pub mod expiration;
pub mod job;
pub mod lock;
pub mod queue;
pub mod server;

pub use collection::CollectionRepository;
pub use counter::CounterRepository;
pub use expiration::ExpirationRepository;
pub use job::JobRepository;
pub use lock::LockRepository;
pub use queue::QueueRepository;
pub use server::ServerRepository;
