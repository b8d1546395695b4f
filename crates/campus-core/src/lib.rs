//! Campus Core - bookkeeping rules shared by the server
//!
//! Everything here is synchronous and free of I/O: the error type, date
//! parsing, reference generation and the balance arithmetic behind tuition
//! payments, student wallets and clerk payouts.

pub mod clerk;
pub mod dates;
pub mod error;
pub mod reference;
pub mod tuition;
pub mod validate;
pub mod wallet;

pub use error::{CampusError, Result};

// Re-export types
pub use campus_types::*;
