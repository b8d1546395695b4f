//! Storage layer
//!
//! SQLite (embedded) document tables and a DashMap read-through cache.

pub mod db;
pub mod document;
pub mod memory;
mod queries;

pub use db::{is_unique_violation, Database, DbTx};
pub use memory::MemoryCache;
