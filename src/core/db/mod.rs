/// Database Module
///
/// This module provides the session wrapper, split into focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): the `Session` type, its lifecycle and selection state
/// - **CRUD** (`crud.rs`): insert, find, update and delete on the selected collection
/// - **Names** (`names.rs`): validation of database and collection names
///
/// ## Error Handling
///
/// All operations return `SessionError`; driver errors are mapped at the call site.
pub mod connection;
pub mod crud;
pub mod names;

pub use connection::*;
