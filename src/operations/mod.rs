//! Reference operations
//!
//! Small concrete operations over the engine. Each describes its request,
//! validates its own inputs and reports a typed result to an optional
//! handler.

use serde::Deserialize;

use crate::error::{CouchError, Result};
use crate::types::HttpInfo;

pub mod databases;
pub mod documents;

pub use databases::{CreateDatabase, DeleteDatabase, GetAllDatabases};
pub use documents::{DeleteDocument, GetDocument, PutDocument};

/// Typed result handler of a reference operation.
pub type ResultHandler<T> = Box<dyn FnOnce(Result<(T, HttpInfo)>) + Send>;

/// Body of a successful document write or delete.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentUpdate {
    #[serde(default)]
    pub ok: bool,
    pub id: String,
    pub rev: String,
}

/// Percent-encode one path segment.
pub(crate) fn path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        Err(CouchError::validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

const SYSTEM_DATABASES: [&str; 3] = ["_users", "_replicator", "_global_changes"];

/// CouchDB database names start with a lowercase letter and may contain
/// lowercase letters, digits and `_ $ ( ) + - /`. System databases are
/// accepted by name.
pub(crate) fn validate_database_name(name: &str) -> Result<()> {
    if SYSTEM_DATABASES.contains(&name) {
        return Ok(());
    }
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c)
        });
    if valid {
        Ok(())
    } else {
        Err(CouchError::validation(format!(
            "invalid database name {name:?}"
        )))
    }
}
