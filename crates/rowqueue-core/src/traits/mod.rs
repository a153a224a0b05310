//! Core traits defined in `rowqueue-core` and implemented by storage
//! backends in `rowqueue-database`.

pub mod clock;
pub mod collection;
pub mod counter;
pub mod expiration;
pub mod job;
pub mod lock;
pub mod queue;
pub mod server;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::CollectionStore;
pub use counter::CounterStore;
pub use expiration::ExpirationStore;
pub use job::JobStore;
pub use lock::LockStore;
pub use queue::QueueStore;
pub use server::ServerStore;
