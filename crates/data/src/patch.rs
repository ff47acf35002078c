//! Partial updates over a closed set of columns.
//!
//! Each updatable record kind has a field enum whose variants carry typed
//! values. A [`FieldSet`] collects the requested changes and expands them into
//! `column = ?` assignments whose column names are static strings, so nothing
//! supplied by a caller is ever spliced into SQL.

use crate::database::SqlValue;
use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One `column = value` pair of an UPDATE statement.
pub type Assignment = (&'static str, SqlValue);

/// A single updatable field of some record kind.
pub trait Field: Sized {
    /// Parses a wire key and value. Returns `Ok(None)` for keys outside the
    /// field set; a known key with a badly typed value is a validation error.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` if the value has the wrong shape.
    fn from_json(key: &str, value: Value) -> Result<Option<Self>>;

    /// Wire name of the field; two fields with the same key replace each other.
    fn key(&self) -> &'static str;

    /// Appends the column assignments this field expands to.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` if the value violates a shape rule.
    fn assign(&self, out: &mut Vec<Assignment>) -> Result<()>;
}

/// Requested changes for one record. Setting a field twice keeps the last value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSet<F> {
    fields: Vec<F>,
}

impl<F> Default for FieldSet<F> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<F: Field> FieldSet<F> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`FieldSet::set`].
    #[must_use]
    pub fn with(mut self, field: F) -> Self {
        self.set(field);
        self
    }

    pub fn set(&mut self, field: F) {
        let key = field.key();
        self.fields.retain(|f| f.key() != key);
        self.fields.push(field);
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key() == key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &F> {
        self.fields.iter()
    }

    /// Parses a JSON object of `key: value` pairs.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for a non-object body, an unknown key
    /// or a badly typed value.
    pub fn from_json(body: Value) -> Result<Self> {
        let Value::Object(map) = body else {
            return Err(StoreError::validation("update body must be a JSON object"));
        };

        let mut set = Self::new();
        for (key, value) in map {
            let field = F::from_json(&key, value)?
                .ok_or_else(|| StoreError::validation(format!("unknown field `{key}`")))?;
            set.set(field);
        }
        Ok(set)
    }

    /// Expands every field into its column assignments.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` if the set is empty or a value
    /// violates a shape rule.
    pub fn assignments(&self) -> Result<Vec<Assignment>> {
        if self.fields.is_empty() {
            return Err(StoreError::validation("no fields to update"));
        }

        let mut out = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            field.assign(&mut out)?;
        }
        Ok(out)
    }
}

impl<F: Field> FromIterator<F> for FieldSet<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut set = Self::new();
        for field in iter {
            set.set(field);
        }
        set
    }
}

/// Builds an `UPDATE table SET … WHERE <filter>` statement. The assignment
/// values come first in the returned parameter list; filter parameters are
/// appended by the caller.
pub(crate) fn update_statement(
    table: &str,
    assignments: Vec<Assignment>,
    filter: &str,
) -> (String, Vec<SqlValue>) {
    let columns: Vec<String> = assignments
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect();
    let sql = format!("UPDATE {table} SET {} WHERE {filter}", columns.join(", "));
    let params = assignments.into_iter().map(|(_, value)| value).collect();
    (sql, params)
}

/// Decodes a field value, naming the field in the error.
pub(crate) fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::validation(format!("invalid value for `{key}`: {e}")))
}

/// Serializes an opaque JSON column.
pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StoreError::validation(e.to_string()))
}
