//! Flat list of real-world resources referenced by the resource tree.
//!
//! The LLM returns resources in whatever shape it likes; those raw objects
//! are kept in `resources-raw.json` and reduced to [`Resource`] records in
//! `resources.json`. Tree nodes reference resources by `id` only.

mod fields;
mod stats;
mod urls;

pub use fields::{normalize_raw, organization_value, program_value, resolve_field, ResourceField, MAX_DEPTH};
pub use stats::{resource_stats, tag_counts, url_stats, ResourceStats, UrlStats};
pub use urls::{check_urls, is_placeholder, recheck_urls, root_url, UrlChecker};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{AppError, AppResult, ResourceError, ResourceResult};

/// Outcome of a website liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlValidity {
    Flag(bool),
    /// The page failed but its site root answered.
    Rebased(String),
}

/// A normalized resource record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: u64,
    pub program: String,
    pub description: String,
    pub organization: String,
    #[serde(default)]
    pub address: Option<String>,
    pub email: String,
    pub website: String,
    /// Id of the first record with the same program and organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dup: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_valid: Option<UrlValidity>,
}

impl Resource {
    /// Website to publish: the rebased root when the page itself failed.
    pub fn effective_website(&self) -> &str {
        match &self.url_valid {
            Some(UrlValidity::Rebased(base)) => base,
            _ => &self.website,
        }
    }

    /// `program (organization)` unless the two are the same, then
    /// `program (address)` when an address is known, else the program alone.
    pub fn link_text(&self) -> String {
        if self.program != self.organization {
            format!("{} ({})", self.program, self.organization)
        } else if let Some(address) = self.address.as_deref().filter(|a| *a != "N/A") {
            format!("{} ({})", self.program, address)
        } else {
            self.program.clone()
        }
    }
}

/// Ordered collection of normalized resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceList {
    resources: Vec<Resource>,
}

impl ResourceList {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn as_slice(&self) -> &[Resource] {
        &self.resources
    }

    pub fn as_mut_slice(&mut self) -> &mut [Resource] {
        &mut self.resources
    }

    /// The record carrying `id`, without following `dup`.
    pub fn lookup(&self, id: u64) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// The canonical record for `id`, following `dup` links.
    pub fn find_by_id(&self, id: u64) -> ResourceResult<&Resource> {
        let mut seen = HashSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                return Err(ResourceError::DupCycle { id: current });
            }
            let resource = self.lookup(current).ok_or(ResourceError::NotFound { id: current })?;
            match resource.dup {
                Some(next) if next != current => current = next,
                _ => return Ok(resource),
            }
        }
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let resources = serde_json::from_str(&text).map_err(|e| AppError::json(path, e))?;
        Ok(Self { resources })
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        let text = serde_json::to_string(&self.resources).map_err(|e| AppError::json(path, e))?;
        std::fs::write(path, text).map_err(|e| AppError::io(path, e))
    }

    /// Records as JSON objects, the form the stats probes read.
    pub fn to_values(&self) -> Vec<Value> {
        self.resources
            .iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect()
    }
}

/// Read a list of raw resource objects.
pub fn load_raw(path: &Path) -> AppResult<Vec<Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| AppError::json(path, e))
}

/// Write a list of raw resource objects.
pub fn save_raw(path: &Path, raw: &[Value]) -> AppResult<()> {
    let text = serde_json::to_string(raw).map_err(|e| AppError::json(path, e))?;
    std::fs::write(path, text).map_err(|e| AppError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(id: u64, dup: Option<u64>) -> Resource {
        Resource {
            id,
            program: format!("Program {}", id),
            description: "Weekly market".to_string(),
            organization: "Food Bank".to_string(),
            address: Some("1 Main St".to_string()),
            email: "N/A".to_string(),
            website: "https://example.org/market".to_string(),
            dup,
            url_valid: None,
        }
    }

    #[test]
    fn test_find_by_id_follows_dup() {
        let list = ResourceList::new(vec![resource(0, None), resource(1, Some(0)), resource(2, None)]);
        assert_eq!(list.find_by_id(1).unwrap(), list.lookup(0).unwrap());
        assert_eq!(list.find_by_id(2).unwrap().id, 2);
        assert_eq!(list.lookup(1).unwrap().dup, Some(0));
    }

    #[test]
    fn test_find_by_id_follows_chains() {
        let list = ResourceList::new(vec![resource(0, None), resource(1, Some(0)), resource(2, Some(1))]);
        assert_eq!(list.find_by_id(2).unwrap().id, 0);
    }

    #[test]
    fn test_find_by_id_detects_cycles() {
        let list = ResourceList::new(vec![resource(0, Some(1)), resource(1, Some(0))]);
        assert!(matches!(list.find_by_id(0), Err(ResourceError::DupCycle { .. })));
    }

    #[test]
    fn test_find_by_id_missing() {
        let list = ResourceList::new(vec![resource(0, Some(9))]);
        assert!(matches!(list.find_by_id(0), Err(ResourceError::NotFound { id: 9 })));
    }

    #[test]
    fn test_url_validity_wire_format() {
        let mut r = resource(3, None);
        r.url_valid = Some(UrlValidity::Rebased("https://example.org/".to_string()));
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["url_valid"], json!("https://example.org/"));
        assert!(value.get("dup").is_none());
        assert_eq!(r.effective_website(), "https://example.org/");

        let parsed: Resource = serde_json::from_value(json!({
            "id": 4, "program": "p", "description": "d", "organization": "o",
            "address": null, "email": "N/A", "website": "w", "url_valid": false
        }))
        .unwrap();
        assert_eq!(parsed.url_valid, Some(UrlValidity::Flag(false)));
        assert_eq!(parsed.address, None);
    }

    #[test]
    fn test_link_text() {
        let mut r = resource(0, None);
        assert_eq!(r.link_text(), "Program 0 (Food Bank)");
        r.organization = "Program 0".to_string();
        assert_eq!(r.link_text(), "Program 0 (1 Main St)");
        r.address = Some("N/A".to_string());
        assert_eq!(r.link_text(), "Program 0");
        r.address = None;
        assert_eq!(r.link_text(), "Program 0");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.json");
        let list = ResourceList::new(vec![resource(0, None), resource(1, Some(0))]);
        list.save(&path).unwrap();
        assert_eq!(ResourceList::load(&path).unwrap(), list);
    }
}
