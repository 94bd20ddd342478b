//! Packument merging.
//!
//! Packuments from several registries are folded from the lowest-precedence
//! document to the highest, so that for every field the highest-precedence
//! registry that actually supplies a value wins.
//!
//! See the [package metadata format] for the fields involved.
//!
//! [package metadata format]: https://github.com/npm/registry/blob/master/docs/responses/package-metadata.md

use serde_json::{Map, Value};

/// Fields merged key by key; incoming keys overwrite, new keys are added.
const KEYED_FIELDS: &[&str] = &["versions", "dist-tags", "users", "author"];

/// Fields always present in a merged packument, even when empty.
const REQUIRED_FIELDS: &[&str] = &["versions", "dist-tags"];

/// Fields replaced only when the incoming document carries a non-empty value.
const SCALAR_FIELDS: &[&str] = &[
    "name",
    "time",
    "bugs",
    "description",
    "homepage",
    "license",
    "readme",
    "readmeFilename",
    "repository",
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MergeError {
    #[error("No packuments to merge")]
    Empty,
}

/// Merge packuments given in priority order (index 0 = highest precedence).
pub fn merge_packuments(packuments: &[Value]) -> Result<Value, MergeError> {
    if packuments.is_empty() {
        return Err(MergeError::Empty);
    }

    let mut merged = Map::new();
    for packument in packuments.iter().rev() {
        fold_into(&mut merged, packument);
    }

    for field in REQUIRED_FIELDS {
        merged
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    Ok(Value::Object(merged))
}

fn fold_into(acc: &mut Map<String, Value>, packument: &Value) {
    for field in KEYED_FIELDS {
        let Some(incoming) = packument.get(*field) else {
            continue;
        };

        match (acc.get_mut(*field), incoming) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    existing.insert(key.clone(), value.clone());
                }
            }
            (_, Value::Object(incoming)) => {
                acc.insert(field.to_string(), Value::Object(incoming.clone()));
            }
            // `author` may be a plain "Name <email>" string.
            (_, other) if is_present(other) => {
                acc.insert(field.to_string(), other.clone());
            }
            _ => {}
        }
    }

    for field in SCALAR_FIELDS {
        if let Some(value) = packument.get(*field).filter(|v| is_present(v)) {
            acc.insert(field.to_string(), value.clone());
        }
    }
}

/// JavaScript truthiness, which is what registries' own tooling assumes
/// when deciding whether a field was supplied.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Version keys of a packument, or `None` when it has no `versions` object.
pub fn version_keys(packument: &Value) -> Option<Vec<String>> {
    packument
        .get("versions")
        .and_then(Value::as_object)
        .map(|versions| versions.keys().cloned().collect())
}
