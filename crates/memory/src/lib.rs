//! Session memory for the ironhive runtime.
//!
//! An ordered per-session message log behind the [`MessageStore`] trait,
//! with an in-process backend and a durable SQLite backend, fronted by the
//! [`MemoryRouter`] which applies the token budget at read time.

pub mod in_memory;
pub mod router;
pub mod sqlite;
pub mod store;

pub use in_memory::InMemoryMessageStore;
pub use router::MemoryRouter;
pub use sqlite::SqliteMessageStore;
pub use store::MessageStore;
