use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

use super::{organization_value, program_value, Resource, UrlValidity};
use crate::tree::{NodeTag, Tree};

/// Counts over a resource list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub total: usize,
    pub unique_programs: usize,
    pub unique_organizations: usize,
    pub duplicate_programs: usize,
    pub duplicate_organizations: usize,
}

impl fmt::Display for ResourceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total input: {} Unique programs: {} Unique orgs: {}",
            self.total, self.unique_programs, self.unique_organizations
        )
    }
}

/// Count unique programs and organizations, warning about repeats.
///
/// Organizations are only counted for programs seen for the first time.
pub fn resource_stats(entries: &[Value]) -> ResourceStats {
    let mut programs: HashMap<Option<String>, &Value> = HashMap::new();
    let mut organizations: HashMap<Option<String>, &Value> = HashMap::new();
    let mut stats = ResourceStats {
        total: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        let program = program_value(entry);
        if let Some(original) = programs.get(&program) {
            warn!(program = ?program, original = %original, duplicate = %entry, "Duplicate program");
            stats.duplicate_programs += 1;
            continue;
        }
        programs.insert(program, entry);

        let organization = organization_value(entry);
        if let Some(original) = organizations.get(&organization) {
            warn!(organization = ?organization, original = %original, duplicate = %entry, "Duplicate organization");
            stats.duplicate_organizations += 1;
        } else {
            organizations.insert(organization, entry);
        }
    }

    for org in organizations.keys().flatten() {
        debug!(org = %org, "Organization");
    }

    stats.unique_programs = programs.len();
    stats.unique_organizations = organizations.len();
    info!("{}", stats);
    stats
}

/// Website check outcomes over non-duplicate resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlStats {
    pub total: usize,
    pub unchecked: usize,
    pub valid: usize,
    pub invalid: usize,
    pub rebased: usize,
}

impl fmt::Display for UrlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total resources: {} no_url_valid: {} true_url_valid: {} false_url_valid: {} base_url_valid: {}",
            self.total, self.unchecked, self.valid, self.invalid, self.rebased
        )
    }
}

pub fn url_stats(resources: &[Resource]) -> UrlStats {
    let mut stats = UrlStats::default();
    for r in resources.iter().filter(|r| r.dup.is_none()) {
        stats.total += 1;
        match &r.url_valid {
            None => stats.unchecked += 1,
            Some(UrlValidity::Flag(true)) => stats.valid += 1,
            Some(UrlValidity::Flag(false)) => {
                stats.invalid += 1;
                debug!(id = r.id, website = %r.website, "false_url_valid");
            }
            Some(UrlValidity::Rebased(_)) => stats.rebased += 1,
        }
    }
    stats
}

/// Node count per tag, plus `leaf_obstacles`: obstacles whose first child is a solution.
pub fn tag_counts(tree: &Tree) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for id in tree.preorder() {
        let Some(node) = tree.get(&id) else {
            continue;
        };
        *counts.entry(node.tag.to_string()).or_insert(0) += 1;

        if node.tag == NodeTag::Obstacle {
            let first = tree.children(&id).first().map(|c| c.tag);
            if first == Some(NodeTag::Solution) {
                *counts.entry("leaf_obstacles".to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}
