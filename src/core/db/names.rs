/// Name Validation Module
///
/// The driver binds databases and collections lazily and never checks their
/// names, so a malformed name would only fail on the first remote operation.
/// These checks follow the server's naming rules and fail at selection time.

use crate::core::{Result, SessionError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Database names must be shorter than this many bytes
pub const MAX_DATABASE_NAME_BYTES: usize = 64;

/// `<database>.<collection>` must be shorter than this many bytes
pub const MAX_NAMESPACE_BYTES: usize = 256;

static DATABASE_FORBIDDEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\. "$*<>:|?\x00]"#).expect("valid regex"));

/// Checks a database name.
///
/// # Returns
///
/// `Ok(())` for a valid name, `SessionError::InvalidOperation` otherwise.
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid("database name cannot be empty"));
    }
    if name.len() >= MAX_DATABASE_NAME_BYTES {
        return Err(invalid(&format!(
            "database name '{name}' must be shorter than {MAX_DATABASE_NAME_BYTES} bytes"
        )));
    }
    if let Some(m) = DATABASE_FORBIDDEN.find(name) {
        return Err(invalid(&format!(
            "database name '{}' contains forbidden character {:?}",
            name.escape_debug(),
            m.as_str()
        )));
    }
    Ok(())
}

/// Checks a collection name in the context of its database.
pub fn validate_collection_name(database: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid("collection name cannot be empty"));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(invalid(&format!(
            "collection name '{}' must not contain '$' or null characters",
            name.escape_debug()
        )));
    }
    if name.starts_with("system.") {
        return Err(invalid(&format!(
            "collection name '{name}' is reserved for internal use"
        )));
    }
    let namespace_len = database.len() + 1 + name.len();
    if namespace_len >= MAX_NAMESPACE_BYTES {
        return Err(invalid(&format!(
            "namespace '{database}.{name}' must be shorter than {MAX_NAMESPACE_BYTES} bytes"
        )));
    }
    Ok(())
}

fn invalid(reason: &str) -> SessionError {
    SessionError::InvalidOperation(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_database_names() {
        for name in ["app", "my_db", "Analytics-2024", "a"] {
            assert!(validate_database_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_database_names() {
        for name in ["", "bad.name", "has space", "dollar$", "slash/", "back\\slash", "quote\"", "nul\0"] {
            assert!(
                matches!(validate_database_name(name), Err(SessionError::InvalidOperation(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_database_name_length_limit() {
        let ok = "d".repeat(MAX_DATABASE_NAME_BYTES - 1);
        let too_long = "d".repeat(MAX_DATABASE_NAME_BYTES);
        assert!(validate_database_name(&ok).is_ok());
        assert!(validate_database_name(&too_long).is_err());
    }

    #[test]
    fn test_collection_names() {
        assert!(validate_collection_name("app", "users").is_ok());
        assert!(validate_collection_name("app", "logs.2024").is_ok());
        assert!(validate_collection_name("app", "").is_err());
        assert!(validate_collection_name("app", "$cmd").is_err());
        assert!(validate_collection_name("app", "system.users").is_err());
        assert!(validate_collection_name("app", "nul\0").is_err());
    }

    #[test]
    fn test_namespace_length_limit() {
        let long = "c".repeat(MAX_NAMESPACE_BYTES);
        let err = validate_collection_name("app", &long).unwrap_err();
        assert!(err.to_string().contains("namespace"));
    }
}
