//! Parser for indented outline text (`1.`, `a.`, `I.`, `-` bullets).
//!
//! Hierarchy is recovered from indentation alone. Numbered lines are pushed
//! two columns in and dashed lines four, so a flush-left `1.` heading followed
//! by flush-left `-` bullets still nests the bullets under the heading.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::error::{TreeError, TreeResult};
use crate::tree::{NodeTag, Tree};

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)").expect("valid outline regex"));
static LEADING_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-").expect("valid outline regex"));
static INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*").expect("valid outline regex"));
static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([\d\w]*[.)]\s*|-\s*)").expect("valid outline regex")
});

/// Insert the lines of `text` under `parent` as nodes tagged `tag`.
///
/// Lines echoing the parent's own label are skipped, as are lines whose
/// indentation never opened a level. Returns the number of nodes inserted.
pub fn parse_outline(tree: &mut Tree, parent: &str, text: &str, tag: NodeTag) -> TreeResult<usize> {
    let parent_label = tree
        .label(parent)
        .ok_or_else(|| TreeError::NodeNotFound {
            identifier: parent.to_string(),
        })?;
    debug!(parent = %parent, "Parsing outline:\n{}", text);

    let mut parents: HashMap<usize, String> = HashMap::new();
    let mut previous_indent: Option<usize> = None;
    let mut previous_node: Option<String> = None;
    let mut inserted = 0;

    for raw in text.lines() {
        if raw.trim().is_empty() {
            continue;
        }
        if !parent_label.is_empty() && raw.contains(&parent_label) {
            continue;
        }

        let line = LEADING_NUMBER.replace(raw, "  ${1}");
        let line = LEADING_DASH.replace(&line, "    -");
        let indent = INDENT
            .find(&line)
            .map(|m| m.as_str().chars().count())
            .unwrap_or(0);
        let content = BULLET.replace(&line, "").trim().to_string();

        let last = *previous_indent.get_or_insert_with(|| {
            parents.insert(indent, parent.to_string());
            indent
        });
        if indent > last {
            if let Some(node) = &previous_node {
                parents.insert(indent, node.clone());
            }
        }
        previous_indent = Some(indent);

        let Some(level_parent) = parents.get(&indent).cloned() else {
            info!(line = %line, "Skipping line at unknown indentation");
            continue;
        };

        let id = tree.add_child(&level_parent, tag, content)?;
        previous_node = Some(id);
        inserted += 1;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ROOT_ID;
    use serde_json::json;

    fn tree_with_root(label: &str) -> Tree {
        let mut tree = Tree::new();
        tree.create_root(ROOT_ID, NodeTag::Root, label).unwrap();
        tree
    }

    #[test]
    fn test_flat_dash_list() {
        let mut tree = tree_with_root("Goal");
        let n = parse_outline(&mut tree, ROOT_ID, "- one\n- two\n- three", NodeTag::Obstacle).unwrap();
        assert_eq!(n, 3);
        assert_eq!(tree.to_dict().unwrap(), json!({"Goal": {"children": ["one", "two", "three"]}}));
        assert_eq!(tree.get("root.2").unwrap().tag, NodeTag::Obstacle);
    }

    #[test]
    fn test_numbered_heading_with_bullets() {
        let mut tree = tree_with_root("Goal");
        let text = "1. Cost:\n- Rent\n- Food\n\n2) Distance";
        parse_outline(&mut tree, ROOT_ID, text, NodeTag::Obstacle).unwrap();
        assert_eq!(
            tree.to_dict().unwrap(),
            json!({"Goal": {"children": [
                {"Cost:": {"children": ["Rent", "Food"]}},
                "Distance"
            ]}})
        );
    }

    #[test]
    fn test_echo_of_parent_is_skipped() {
        let mut tree = tree_with_root("Healthy food");
        let text = "Obstacles to Healthy food:\n- Prices";
        let n = parse_outline(&mut tree, ROOT_ID, text, NodeTag::Obstacle).unwrap();
        assert_eq!(n, 1);
        assert_eq!(tree.label("root.1").unwrap(), "Prices");
    }

    #[test]
    fn test_unknown_dedent_is_skipped() {
        let mut tree = tree_with_root("Goal");
        let text = "    - deep first\n  - shallower\n    - deep again";
        let n = parse_outline(&mut tree, ROOT_ID, text, NodeTag::Obstacle).unwrap();
        assert_eq!(n, 2);
        // returning to depth 4 after the dropped line opens a new level
        assert_eq!(
            tree.to_dict().unwrap(),
            json!({"Goal": {"children": [{"deep first": {"children": ["deep again"]}}]}})
        );
    }

    #[test]
    fn test_missing_parent() {
        let mut tree = tree_with_root("Goal");
        assert!(parse_outline(&mut tree, "root.5", "- x", NodeTag::Obstacle).is_err());
    }
}
