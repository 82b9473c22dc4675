//! Schema checks for directly fetched records.
//!
//! Only the post record type is understood; anything else is rejected so
//! it never reaches a post-shaped view.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::error::ValidationError;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

const MAX_TEXT_BYTES: usize = 3000;
const MAX_LANGS: usize = 3;
const MAX_TAGS: usize = 8;
const MAX_TAG_BYTES: usize = 640;

/// Validate `value` against the schema of `collection`.
pub fn validate_record(collection: &str, value: &Value) -> Result<(), ValidationError> {
    match collection {
        POST_COLLECTION => validate_post(value),
        other => Err(ValidationError::UnsupportedCollection(other.to_string())),
    }
}

pub fn validate_post(value: &Value) -> Result<(), ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    if let Some(record_type) = obj.get("$type") {
        let found = record_type.as_str().ok_or_else(|| malformed("$type", "not a string"))?;
        if found != POST_COLLECTION {
            return Err(ValidationError::WrongType {
                expected: POST_COLLECTION.to_string(),
                found: found.to_string(),
            });
        }
    }

    let text = required_str(obj, "text")?;
    if text.len() > MAX_TEXT_BYTES {
        return Err(ValidationError::TooLong {
            field: "text",
            limit: MAX_TEXT_BYTES,
            unit: "bytes",
        });
    }

    let created_at = required_str(obj, "createdAt")?;
    DateTime::parse_from_rfc3339(created_at).map_err(|e| malformed("createdAt", &e.to_string()))?;

    if let Some(langs) = optional_strings(obj, "langs")? {
        if langs.len() > MAX_LANGS {
            return Err(ValidationError::TooLong {
                field: "langs",
                limit: MAX_LANGS,
                unit: "entries",
            });
        }
    }

    if let Some(tags) = optional_strings(obj, "tags")? {
        if tags.len() > MAX_TAGS {
            return Err(ValidationError::TooLong {
                field: "tags",
                limit: MAX_TAGS,
                unit: "entries",
            });
        }
        if tags.iter().any(|t| t.len() > MAX_TAG_BYTES) {
            return Err(ValidationError::TooLong {
                field: "tags",
                limit: MAX_TAG_BYTES,
                unit: "bytes per tag",
            });
        }
    }

    if let Some(reply) = obj.get("reply") {
        let reply = reply.as_object().ok_or_else(|| malformed("reply", "not an object"))?;
        strong_ref(reply, "root", "reply.root")?;
        strong_ref(reply, "parent", "reply.parent")?;
    }

    Ok(())
}

fn malformed(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::Malformed {
        field,
        reason: reason.to_string(),
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(value) => value.as_str().ok_or_else(|| malformed(field, "not a string")),
    }
}

fn optional_strings<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<Vec<&'a str>>, ValidationError> {
    let Some(value) = obj.get(field) else {
        return Ok(None);
    };
    let items = value.as_array().ok_or_else(|| malformed(field, "not an array"))?;
    items
        .iter()
        .map(|item| item.as_str().ok_or_else(|| malformed(field, "contains a non-string")))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// `{uri, cid}` pointing at another record.
fn strong_ref(parent: &Map<String, Value>, key: &str, field: &'static str) -> Result<(), ValidationError> {
    let target = parent
        .get(key)
        .ok_or(ValidationError::MissingField(field))?
        .as_object()
        .ok_or_else(|| malformed(field, "not an object"))?;

    let uri = target
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(field, "missing uri"))?;
    if !uri.starts_with("at://") {
        return Err(malformed(field, "uri is not an at-uri"));
    }

    match target.get("cid").and_then(Value::as_str) {
        Some(cid) if !cid.is_empty() => Ok(()),
        _ => Err(malformed(field, "missing cid")),
    }
}
