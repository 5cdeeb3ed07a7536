//! Stored documents and the synthetic fields injected on read

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Reserved top-level key carrying the row identifier on read
pub const ID_FIELD: &str = "_id";
/// Reserved top-level key carrying the creation timestamp on read
pub const CREATED_AT_FIELD: &str = "_created_at";

/// A row as the store sees it: identity, creation time and the opaque body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub body: Map<String, Value>,
}

impl Document {
    /// Body with `_id` and `_created_at` injected. User keys with the same
    /// names are shadowed.
    pub fn into_api_value(self) -> Value {
        let mut body = self.body;
        body.insert(ID_FIELD.to_string(), Value::from(self.id));
        body.insert(CREATED_AT_FIELD.to_string(), Value::String(format_timestamp(&self.created_at)));
        Value::Object(body)
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Shallow merge: top-level keys in `fields` overwrite, nested objects are
/// replaced wholesale, keys absent from `fields` are kept.
pub fn merge_fields(base: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (key, value) in fields {
        base.insert(key, value);
    }
}
