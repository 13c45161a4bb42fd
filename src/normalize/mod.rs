//! Reduction of free-form LLM replies to canonical `{title, description}` records.
//!
//! Replies arrive in many shapes: a bare list of records, a record wrapped in
//! a one-key envelope (`{"solutions": [...]}`), records using synonyms for
//! the two fields (`strategy`, `details`, `solutionTitle`, ...), or a flat
//! mapping of title to description. [`normalize`] decodes the reply into an
//! [`LlmValue`] and pattern-matches on it against the static alias tables.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{NormalizeError, NormalizeResult};

/// Keys naming the title of a record, compared trimmed and lowercased.
pub const TITLE_KEYS: &[&str] = &[
    "obstacle",
    "factor",
    "solution_title",
    "strategy",
    "approach",
    "title",
    "solution",
    "name",
    "action",
    "wrappedtextarea-title",
    "solutiontitle",
];

/// Keys naming the description of a record, compared trimmed and lowercased.
pub const DESCRIPTION_KEYS: &[&str] = &[
    "description",
    "solution_description",
    "details",
    "detail",
    "solutiondescription",
    "explanation",
];

/// Description keys that demote an earlier description key to the title.
pub const DETAIL_KEYS: &[&str] = &["detail", "details"];

/// Structural view of a parsed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmValue {
    Scalar(Value),
    List(Vec<Value>),
    Map(Map<String, Value>),
}

impl From<Value> for LlmValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => LlmValue::List(items),
            Value::Object(map) => LlmValue::Map(map),
            other => LlmValue::Scalar(other),
        }
    }
}

/// The normalized unit stored as node data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    /// A string, or an object when the model nested structured detail.
    pub description: Value,
}

impl CanonicalRecord {
    pub fn new(title: impl Into<String>, description: impl Into<Value>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("title".to_string(), Value::String(self.title.clone()));
        map.insert("description".to_string(), self.description.clone());
        Value::Object(map)
    }
}

/// Result of normalizing one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(CanonicalRecord),
    Records(Vec<CanonicalRecord>),
    /// Scalars pass through unchanged.
    Leaf(Value),
}

impl Normalized {
    /// Records in reply order; a scalar yields none.
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        match self {
            Normalized::Record(record) => vec![record],
            Normalized::Records(records) => records,
            Normalized::Leaf(value) => {
                if !value.is_null() {
                    warn!(value = %value, "Scalar reply carries no records");
                }
                Vec::new()
            }
        }
    }

    /// Keep at most `max` records.
    pub fn truncate(&mut self, max: usize) {
        match self {
            Normalized::Records(records) => records.truncate(max),
            Normalized::Record(_) if max == 0 => *self = Normalized::Records(Vec::new()),
            _ => {}
        }
    }
}

/// Normalize a parsed reply.
pub fn normalize(value: Value) -> NormalizeResult<Normalized> {
    match LlmValue::from(value) {
        LlmValue::Scalar(value) => Ok(Normalized::Leaf(value)),
        LlmValue::List(items) => normalize_list(items).map(Normalized::Records),
        LlmValue::Map(map) => {
            if map.len() == 1 {
                let Some((_, only)) = map.into_iter().next() else {
                    return Ok(Normalized::Records(Vec::new()));
                };
                return normalize(only);
            }
            if map.is_empty() {
                return Ok(Normalized::Records(Vec::new()));
            }
            reduce_map(map)
        }
    }
}

/// Normalize a list element by element, dropping non-mapping elements.
pub fn normalize_list(items: Vec<Value>) -> NormalizeResult<Vec<CanonicalRecord>> {
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        if item.is_object() {
            records.push(normalize_record(item)?);
        } else {
            warn!(element = %item, "Dropping non-mapping list element");
        }
    }
    Ok(records)
}

/// Reduce one mapping to exactly one record.
pub fn normalize_record(value: Value) -> NormalizeResult<CanonicalRecord> {
    let Value::Object(map) = value else {
        return Err(NormalizeError::UnsupportedShape {
            found: value.to_string(),
        });
    };

    if map.len() == 1 {
        let Some((key, only)) = map.into_iter().next() else {
            return Err(NormalizeError::UnsupportedShape {
                found: "{}".to_string(),
            });
        };
        return match only {
            Value::Object(_) => normalize_record(only),
            Value::Array(_) | Value::Null => Err(NormalizeError::UnsupportedShape {
                found: format!("{{\"{}\": {}}}", key, only),
            }),
            scalar => Ok(CanonicalRecord::new(clean_title(&key), description_value(scalar))),
        };
    }

    match resolve_keys(&map) {
        (Some(t), Some(d)) => build_record(&map, t, d),
        (Some(_), None) => Err(NormalizeError::MissingDescription { keys: key_list(&map) }),
        (None, Some(_)) => Err(NormalizeError::MissingTitle { keys: key_list(&map) }),
        (None, None) => Err(NormalizeError::UnsupportedShape {
            found: format!("record with keys {:?}", key_list(&map)),
        }),
    }
}

fn reduce_map(map: Map<String, Value>) -> NormalizeResult<Normalized> {
    let (title_key, description_key) = resolve_keys(&map);
    if let (Some(t), Some(d)) = (title_key, description_key) {
        return build_record(&map, t, d).map(Normalized::Record);
    }

    // {"goal": "...", "obstacles": [...]}: the list is the payload
    let mut lists = map.values().filter(|v| v.is_array());
    if let (Some(list), None) = (lists.next(), lists.next()) {
        return normalize(list.clone());
    }

    let missing = match (title_key, description_key) {
        (Some(_), None) => Some(NormalizeError::MissingDescription { keys: key_list(&map) }),
        (None, Some(_)) => Some(NormalizeError::MissingTitle { keys: key_list(&map) }),
        _ => None,
    };
    match missing {
        Some(e) => Err(e),
        None => Ok(Normalized::Records(explode(map))),
    }
}

/// One record per entry of a `{title: description}` mapping.
fn explode(map: Map<String, Value>) -> Vec<CanonicalRecord> {
    let mut records = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null | Value::Array(_) => {
                warn!(key = %key, "Skipping entry without a usable description");
            }
            Value::Object(_) => match normalize_record(value.clone()) {
                Ok(record) => records.push(record),
                Err(_) => records.push(CanonicalRecord::new(clean_title(&key), value)),
            },
            scalar => records.push(CanonicalRecord::new(clean_title(&key), description_value(scalar))),
        }
    }
    records
}

/// Locate the title and description keys of a mapping.
fn resolve_keys(map: &Map<String, Value>) -> (Option<&str>, Option<&str>) {
    let mut title_key: Option<&str> = None;
    let mut description_key: Option<&str> = None;

    for key in map.keys() {
        let folded = key.trim().to_lowercase();
        if TITLE_KEYS.contains(&folded.as_str()) {
            title_key.get_or_insert(key.as_str());
        } else if DESCRIPTION_KEYS.contains(&folded.as_str()) {
            match description_key {
                None => description_key = Some(key.as_str()),
                Some(previous) if title_key.is_none() => {
                    if DETAIL_KEYS.contains(&folded.as_str()) {
                        title_key = Some(previous);
                        description_key = Some(key.as_str());
                    } else if DETAIL_KEYS.contains(&previous.trim().to_lowercase().as_str()) {
                        title_key = Some(key.as_str());
                    }
                }
                Some(_) => {}
            }
        }
    }

    if title_key.is_none() {
        title_key = map
            .keys()
            .map(String::as_str)
            .find(|k| Some(*k) != description_key && k.to_lowercase().contains("title"));
    }
    if description_key.is_none() {
        description_key = map
            .keys()
            .map(String::as_str)
            .find(|k| Some(*k) != title_key && k.to_lowercase().contains("description"));
    }

    (title_key, description_key)
}

/// Title values are kept verbatim; only keys promoted to titles are cleaned.
fn build_record(map: &Map<String, Value>, title_key: &str, description_key: &str) -> NormalizeResult<CanonicalRecord> {
    let title = match &map[title_key] {
        Value::Null => return Err(NormalizeError::MissingTitle { keys: key_list(map) }),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let description = match &map[description_key] {
        Value::Null => return Err(NormalizeError::MissingDescription { keys: key_list(map) }),
        other => description_value(other.clone()),
    };
    Ok(CanonicalRecord::new(title, description))
}

fn clean_title(text: &str) -> String {
    text.replace('_', " ")
}

fn description_value(value: Value) -> Value {
    match value {
        Value::String(_) | Value::Object(_) => value,
        other => Value::String(other.to_string()),
    }
}

fn key_list(map: &Map<String, Value>) -> Vec<String> {
    map.keys().cloned().collect()
}
