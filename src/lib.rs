// Core infrastructure modules
pub mod core;
pub mod driver;

// Feature-specific modules
pub mod config;
pub mod document;
pub mod repl;

#[cfg(test)]
mod test_utils;

pub use crate::core::db::{ConnectionSettings, Session, SessionStage, DEFAULT_URI};
pub use crate::core::{Result, SessionError};
