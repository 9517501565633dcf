/// # Document Module
///
/// JSON ⇄ document conversion for the shell.
///
/// Input accepts MongoDB extended JSON (`{"$oid": "..."}`, `{"$date": ...}`),
/// output is rendered as relaxed extended JSON.

use crate::core::{Result, SessionError};
use mongodb::bson::{Bson, Document};
use serde_json::Value;

/// Converts a JSON object into a document.
pub fn to_document(value: Value) -> Result<Document> {
    match Bson::try_from(value) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(SessionError::Command(format!(
            "expected a JSON object, found {}",
            describe(&other)
        ))),
        Err(e) => Err(SessionError::Command(format!("invalid extended JSON: {e}"))),
    }
}

/// Converts a JSON array of objects into documents.
pub fn to_documents(value: Value) -> Result<Vec<Document>> {
    match value {
        Value::Array(items) => items.into_iter().map(to_document).collect(),
        _ => Err(SessionError::Command(
            "expected a JSON array of objects".to_string(),
        )),
    }
}

/// Parses a JSON object from text.
pub fn parse_document(text: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(text)?;
    to_document(value)
}

pub fn render_document(document: &Document) -> String {
    render(Bson::Document(document.clone()))
}

pub fn render(value: Bson) -> String {
    value.into_relaxed_extjson().to_string()
}

fn describe(value: &Bson) -> &'static str {
    match value {
        Bson::Array(_) => "an array",
        Bson::String(_) => "a string",
        Bson::Boolean(_) => "a boolean",
        Bson::Null => "null",
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => "a number",
        _ => "a non-object value",
    }
}
