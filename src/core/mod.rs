/// Core Module for mongoconnect
///
/// This module contains the session wrapper and the shared error type.
/// Everything that talks to a database goes through `db::Session`.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{CommandResult, Result, SessionError};
