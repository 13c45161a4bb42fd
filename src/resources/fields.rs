use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::Resource;
use crate::error::{ResourceError, ResourceResult};

/// Nesting limit when following `organization` sub-objects.
pub const MAX_DEPTH: usize = 4;

const NOT_AVAILABLE: &str = "N/A";

/// Canonical resource fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceField {
    Program,
    Description,
    Organization,
    Address,
    Email,
    Website,
}

impl ResourceField {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceField::Program => "program",
            ResourceField::Description => "description",
            ResourceField::Organization => "organization",
            ResourceField::Address => "address",
            ResourceField::Email => "email",
            ResourceField::Website => "website",
        }
    }

    /// Keys the model has been seen to use for this field, in priority order.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ResourceField::Program => &[
                "name",
                "Name",
                "program_name",
                "program",
                "event_name",
                "title",
                "Effort Name",
                "EffortName",
                "Effort",
                "effort_name",
                "project_name",
                "Project Name",
                "description",
                "effort_description",
                "EffortDescription",
                "Effort_Name",
                "ProgramName",
                "Program Name",
                "ProjectName",
                "effort",
                "Title",
            ],
            ResourceField::Description => &[
                "description",
                "Description",
                "effort_description",
                "effort",
                "EffortDescription",
            ],
            ResourceField::Organization => &[
                "organization",
                "Organization",
                "address",
                "ImplementingOrganization",
                "OrganizationName",
                "Address",
            ],
            ResourceField::Address => &["address", "Address"],
            ResourceField::Email => &["email", "Email", "email unavailable"],
            ResourceField::Website => &["website", "Website", "web_page", "webpage", "WebPage", "Web Page"],
        }
    }
}

/// Resolve `field` in a raw resource object.
///
/// Aliases are tried in order. Address objects yield their `location` or
/// `central_location`; organization objects yield their `name`. When no alias
/// matches, an `organizations` array or a nested organization object is
/// searched. Email falls back to `N/A`, as do website and description once
/// nothing else matches.
pub fn resolve_field(field: ResourceField, raw: &Value) -> ResourceResult<String> {
    resolve_at(field, raw, 0)
}

fn resolve_at(field: ResourceField, raw: &Value, depth: usize) -> ResourceResult<String> {
    if depth > MAX_DEPTH {
        return Err(ResourceError::DepthExceeded {
            key: field.name().to_string(),
            depth,
        });
    }
    let Some(obj) = raw.as_object() else {
        return Err(ResourceError::MissingKey {
            key: field.name().to_string(),
            keys: Vec::new(),
        });
    };

    for alias in field.aliases() {
        match obj.get(*alias) {
            None => continue,
            Some(Value::Object(inner)) => match field {
                ResourceField::Address => {
                    let location = ["location", "central_location"]
                        .iter()
                        .find_map(|k| inner.get(*k))
                        .map(text_of)
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                    return Ok(location);
                }
                ResourceField::Organization => {
                    if let Some(name) = inner.get("name") {
                        return Ok(text_of(name));
                    }
                }
                _ => {}
            },
            Some(value) => return Ok(text_of(value)),
        }
    }

    if field == ResourceField::Email {
        return Ok(NOT_AVAILABLE.to_string());
    }

    if let Some(Value::Array(orgs)) = obj.get("organizations") {
        let key = match field {
            ResourceField::Organization => "name",
            other => other.name(),
        };
        let parts: Vec<String> = orgs.iter().filter_map(|o| o.get(key)).map(text_of).collect();
        if !parts.is_empty() {
            return Ok(parts.join(", "));
        }
    }

    if let Some(org) = nested_organization(obj) {
        match resolve_at(field, org, depth + 1) {
            Ok(value) => return Ok(value),
            Err(e @ ResourceError::DepthExceeded { .. }) => return Err(e),
            Err(e) => debug!(error = %e, "Nested organization lookup failed"),
        }
    }

    match field {
        ResourceField::Website | ResourceField::Description => Ok(NOT_AVAILABLE.to_string()),
        _ => Err(ResourceError::MissingKey {
            key: field.name().to_string(),
            keys: obj.keys().cloned().collect(),
        }),
    }
}

fn nested_organization(obj: &Map<String, Value>) -> Option<&Value> {
    ResourceField::Organization
        .aliases()
        .iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| v.is_object())
}

/// Render a JSON value as field text.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => NOT_AVAILABLE.to_string(),
        Value::Array(items) => items.iter().map(text_of).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Reduce raw resource objects to records, marking repeats.
///
/// Two records are duplicates when program and organization agree; later
/// ones get `dup` set to the id of the first.
pub fn normalize_raw(raw: &[Value]) -> ResourceResult<Vec<Resource>> {
    let mut first_seen: HashMap<String, u64> = HashMap::new();
    let mut out = Vec::with_capacity(raw.len());

    for entry in raw {
        let id = entry.get("id").and_then(Value::as_u64).ok_or_else(|| ResourceError::MissingKey {
            key: "id".to_string(),
            keys: entry
                .as_object()
                .map(|o| o.keys().cloned().collect())
                .unwrap_or_default(),
        })?;
        let program = resolve_field(ResourceField::Program, entry)?;
        let organization = resolve_field(ResourceField::Organization, entry)?;
        let address = match resolve_field(ResourceField::Address, entry) {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(id = id, error = %e, "Resource has no address");
                None
            }
        };

        let key = format!("{}|{}", program, organization);
        let dup = match first_seen.get(&key) {
            Some(first) => Some(*first),
            None => {
                first_seen.insert(key, id);
                None
            }
        };

        out.push(Resource {
            id,
            program,
            description: resolve_field(ResourceField::Description, entry)?,
            organization,
            address,
            email: resolve_field(ResourceField::Email, entry)?,
            website: resolve_field(ResourceField::Website, entry)?,
            dup,
            url_valid: None,
        });
    }

    Ok(out)
}

const PROGRAM_PROBE_KEYS: &[&str] = &[
    "name",
    "Name",
    "program_name",
    "program",
    "event_name",
    "title",
    "Effort Name",
    "Effort",
    "effort_name",
    "project_name",
];

/// Program name of a raw resource, if it has one of the usual keys.
pub fn program_value(raw: &Value) -> Option<String> {
    PROGRAM_PROBE_KEYS
        .iter()
        .find_map(|k| raw.get(*k))
        .map(text_of)
}

/// Organization name of a raw resource, reading `organization.name` for objects.
pub fn organization_value(raw: &Value) -> Option<String> {
    match raw.get("organization")? {
        Value::Object(org) => org.get("name").map(text_of),
        other => Some(text_of(other)),
    }
}
