//! Entity schemas and write-document preparation
//!
//! Stored types implement [`Entity`]. The schema options decide which fields
//! the façade maintains on the caller's behalf; the helpers here rewrite
//! insert documents and update specifications before they reach the driver.

use super::driver::UpdateSpec;
use crate::constants::fields;
use bson::{doc, Bson, DateTime, Document};
use serde::{de::DeserializeOwned, Serialize};

/// Schema-level behavior of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchemaOptions {
    /// Maintain `createdAt` / `updatedAt`
    pub timestamps: bool,
}

/// A type stored in a document collection
///
/// ```rust
/// use persistence_core::database::{Entity, SchemaOptions};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Session {
///     token: String,
/// }
///
/// impl Entity for Session {
///     const SCHEMA: SchemaOptions = SchemaOptions { timestamps: true };
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const SCHEMA: SchemaOptions = SchemaOptions { timestamps: false };

    /// Field values written on upsert-insert when the update leaves them untouched
    fn defaults() -> Document {
        Document::new()
    }

    /// Checked before the entity is inserted
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Computed fields applied to plain-data results
    fn apply_getters(_document: &mut Document) {}
}

/// Stamp creation timestamps on a document about to be inserted
pub fn stamp_insert<T: Entity>(document: &mut Document, now: DateTime) {
    if !T::SCHEMA.timestamps {
        return;
    }
    for field in [fields::CREATED_AT, fields::UPDATED_AT] {
        if matches!(document.get(field), None | Some(Bson::Null)) {
            document.insert(field, now);
        }
    }
}

/// Rewrite an update for the entity's schema
///
/// Bare fields are wrapped into `$set`. Timestamps are maintained when the
/// schema has them and `timestamps` is set. For upserts with
/// `set_defaults_on_insert`, untouched defaults are added to `$setOnInsert`.
pub fn prepare_update<T: Entity>(
    update: UpdateSpec,
    upsert: bool,
    set_defaults_on_insert: bool,
    timestamps: bool,
    now: DateTime,
) -> UpdateSpec {
    let timestamps = timestamps && T::SCHEMA.timestamps;
    match update {
        UpdateSpec::Document(document) => {
            let mut document = wrap_bare_fields(document);
            let mut touched = touched_paths(&document);

            if timestamps {
                if !is_touched(&touched, fields::UPDATED_AT) {
                    operator_entry(&mut document, "$set").insert(fields::UPDATED_AT, now);
                    touched.push(fields::UPDATED_AT.to_string());
                }
                if upsert && !is_touched(&touched, fields::CREATED_AT) {
                    operator_entry(&mut document, "$setOnInsert").insert(fields::CREATED_AT, now);
                    touched.push(fields::CREATED_AT.to_string());
                }
            }

            if upsert && set_defaults_on_insert {
                for (field, value) in T::defaults() {
                    if !is_touched(&touched, &field) {
                        operator_entry(&mut document, "$setOnInsert").insert(field.clone(), value);
                        touched.push(field);
                    }
                }
            }

            UpdateSpec::Document(document)
        }
        UpdateSpec::Pipeline(mut stages) => {
            if timestamps {
                let mut set = Document::new();
                set.insert(fields::UPDATED_AT, "$$NOW");
                stages.push(doc! { "$set": set });
            }
            UpdateSpec::Pipeline(stages)
        }
    }
}

/// `{ name: "x", $inc: {..} }` becomes `{ $set: { name: "x" }, $inc: {..} }`
fn wrap_bare_fields(document: Document) -> Document {
    let (operators, bare): (Vec<_>, Vec<_>) =
        document.into_iter().partition(|(key, _)| key.starts_with('$'));

    let mut result: Document = operators.into_iter().collect();
    if !bare.is_empty() {
        let set = operator_entry(&mut result, "$set");
        for (key, value) in bare {
            set.insert(key, value);
        }
    }
    result
}

fn operator_entry<'a>(document: &'a mut Document, operator: &str) -> &'a mut Document {
    if !matches!(document.get(operator), Some(Bson::Document(_))) {
        document.insert(operator, Document::new());
    }
    match document.get_mut(operator) {
        Some(Bson::Document(inner)) => inner,
        _ => unreachable!("operator entry inserted above"),
    }
}

fn touched_paths(document: &Document) -> Vec<String> {
    document
        .iter()
        .filter_map(|(_, value)| value.as_document())
        .flat_map(|operand| operand.keys().cloned())
        .collect()
}

/// Paths conflict when equal or when one is a dotted prefix of the other
fn is_touched(touched: &[String], field: &str) -> bool {
    touched.iter().any(|path| {
        path == field
            || path
                .strip_prefix(field)
                .is_some_and(|rest| rest.starts_with('.'))
            || field
                .strip_prefix(path.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    })
}
