//! Report exports built from a finished tree.
//!
//! Every report reads one tree file (`s.json` or `r.json`) plus, where
//! resources are involved, `resources.json`, and writes its output next to
//! them in the project directory.

mod resource_csv;
mod docx;
mod maps;
mod mindmap;

pub use self::resource_csv::{write_resource_csv, RESOURCE_CSV};
pub use self::docx::{document_blocks, render_docx, write_doc, DocBlock};
pub use self::maps::{sanitize_file_name, write_maps, MapMarker, MapsReport};
pub use self::mindmap::{escape_xml, mindmap_xml, write_mindmap};

use serde::Serialize;
use tracing::warn;

use crate::config::{ProjectDir, TreeFile};
use crate::error::AppResult;
use crate::resources::{Resource, ResourceList, UrlValidity};
use crate::tree::{description_text, Node, NodeTag, Tree};

/// One resource placed in the tree: the record plus the solution it
/// implements and the obstacle that solution addresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRow {
    pub id: u64,
    pub program: String,
    pub description: String,
    pub organization: String,
    pub address: String,
    pub email: String,
    pub website: String,
    pub solving: String,
    pub solution: String,
}

impl ResourceRow {
    fn new(resource: &Resource, solving: String, solution: String) -> Self {
        Self {
            id: resource.id,
            program: resource.program.clone(),
            description: resource.description.clone(),
            organization: resource.organization.clone(),
            address: resource.address.clone().unwrap_or_else(|| "N/A".to_string()),
            email: resource.email.clone(),
            website: published_website(resource).to_string(),
            solving,
            solution,
        }
    }
}

/// Website to print: `N/A` for dead links, the site root when only that answered.
pub fn published_website(resource: &Resource) -> &str {
    match &resource.url_valid {
        Some(UrlValidity::Flag(false)) => "N/A",
        _ => resource.effective_website(),
    }
}

/// `Title. Description.` for records, the text for plain nodes.
pub fn sentence(node: &Node) -> String {
    match node.record() {
        Some((title, description)) => format!(
            "{}. {}.",
            title.trim_end_matches(['.', ' ']),
            description_text(description).trim_end_matches(['.', ' '])
        ),
        None => node.label(),
    }
}

/// Resource rows found below `start`, in pre-order.
///
/// References that do not resolve in `resources` are logged and skipped.
pub fn collect_rows(tree: &Tree, start: &str, resources: &ResourceList) -> Vec<ResourceRow> {
    let mut rows = Vec::new();
    let mut stack = vec![start.to_string()];
    while let Some(id) = stack.pop() {
        let Some(node) = tree.get(&id) else {
            continue;
        };
        if node.tag == NodeTag::Resource {
            if let Some(row) = resource_row(tree, node, resources) {
                rows.push(row);
            }
            continue;
        }
        for child in tree.children(&id).into_iter().rev() {
            stack.push(child.identifier.clone());
        }
    }
    rows
}

fn resource_row(tree: &Tree, node: &Node, resources: &ResourceList) -> Option<ResourceRow> {
    let id = node.resource_id()?;
    let resource = match resources.find_by_id(id) {
        Ok(resource) => resource,
        Err(e) => {
            warn!(node = %node.identifier, error = %e, "Skipping unresolved resource");
            return None;
        }
    };
    let solution = tree.parent(&node.identifier)?;
    let solving = tree
        .parent(&solution.identifier)
        .map(sentence)
        .unwrap_or_default();
    Some(ResourceRow::new(resource, solving, sentence(solution)))
}

/// `resources.json` when it exists.
pub(crate) fn load_resources_if_present(project: &ProjectDir) -> AppResult<Option<ResourceList>> {
    let path = project.resources_file();
    if path.exists() {
        Ok(Some(ResourceList::load(&path)?))
    } else {
        Ok(None)
    }
}

/// Load the tree a report is built from.
pub(crate) fn load_stage_tree(project: &ProjectDir, stage: TreeFile) -> AppResult<Tree> {
    Tree::load(&project.tree_file(stage))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;

    use crate::resources::{Resource, ResourceList, UrlValidity};
    use crate::tree::{NodeTag, Tree, ROOT_ID};

    pub fn resource(id: u64, program: &str, dup: Option<u64>) -> Resource {
        Resource {
            id,
            program: program.to_string(),
            description: format!("{} description", program),
            organization: "Food Bank".to_string(),
            address: Some("1 Main St".to_string()),
            email: "info@foodbank.org".to_string(),
            website: "https://foodbank.org/market".to_string(),
            dup,
            url_valid: Some(UrlValidity::Flag(true)),
        }
    }

    /// Two themes, each with one solution; the second theme's resource is a dup of the first.
    pub fn tree_and_resources() -> (Tree, ResourceList) {
        let mut tree = Tree::new();
        tree.create_root(ROOT_ID, NodeTag::Root, "Healthy Food").unwrap();
        let cost = tree
            .add_child(ROOT_ID, NodeTag::Obstacle, json!({"title": "Cost", "description": "Food is expensive."}))
            .unwrap();
        let coupons = tree
            .add_child(&cost, NodeTag::Solution, json!({"title": "Coupons", "description": "Discounts"}))
            .unwrap();
        tree.add_child(&coupons, NodeTag::Resource, json!({"id": 0})).unwrap();
        tree.add_child(&coupons, NodeTag::Resource, json!({"id": 1})).unwrap();

        let distance = tree
            .add_child(ROOT_ID, NodeTag::Obstacle, json!({"title": "Distance / Transit", "description": "Stores are far"}))
            .unwrap();
        let shuttle = tree.add_child(&distance, NodeTag::Solution, "Grocery shuttle.").unwrap();
        tree.add_child(&shuttle, NodeTag::Resource, json!({"id": 2})).unwrap();

        let mut pantry = resource(1, "Pantry", None);
        pantry.url_valid = Some(UrlValidity::Flag(false));
        let resources = ResourceList::new(vec![resource(0, "Market", None), pantry, resource(2, "Market", Some(0))]);
        (tree, resources)
    }
}
