//! Event plumbing for the ironhive runtime.
//!
//! A typed, append-only event stream per session behind the [`EventStore`]
//! trait, with an in-process broadcast backend and a durable SQLite log,
//! fronted by the [`EventRouter`].

pub mod in_memory;
pub mod router;
pub mod sqlite;
pub mod store;

pub use in_memory::InMemoryEventStore;
pub use router::EventRouter;
pub use sqlite::SqliteEventStore;
pub use store::EventStore;
