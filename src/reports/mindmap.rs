use std::fmt::Write as _;
use tracing::info;

use super::{load_resources_if_present, load_stage_tree};
use crate::config::{ProjectDir, TreeFile};
use crate::error::{AppError, AppResult};
use crate::resources::ResourceList;
use crate::tree::{Node, NodeTag, Tree};

/// Escape text for an XML attribute value.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// FreeMind document for the whole tree.
pub fn mindmap_xml(tree: &Tree, resources: Option<&ResourceList>) -> String {
    let mut out = String::from("<map version=\"1.0.1\">\n");
    if let Some(root) = tree.root() {
        write_node(&mut out, tree, root, 0, resources);
    }
    out.push_str("</map>\n");
    out
}

fn write_node(out: &mut String, tree: &Tree, identifier: &str, indent: usize, resources: Option<&ResourceList>) {
    let Some(node) = tree.get(identifier) else {
        return;
    };
    let pad = "  ".repeat(indent);
    let _ = writeln!(out, "{}<node TEXT=\"{}\">", pad, escape_xml(&node_text(node, resources)));
    for child in tree.children(identifier) {
        write_node(out, tree, &child.identifier, indent + 2, resources);
    }
    let _ = writeln!(out, "{}</node>", pad);
}

fn node_text(node: &Node, resources: Option<&ResourceList>) -> String {
    if node.tag != NodeTag::Resource {
        return node.summary();
    }
    let resolved = node
        .resource_id()
        .zip(resources)
        .and_then(|(id, list)| list.find_by_id(id).ok());
    match resolved {
        Some(r) => format!("R:{} | {}", r.program, r.description),
        None => format!("R:{}", node.label()),
    }
}

/// Write `<stage>.mm` for `s.json` or `r.json`.
pub fn write_mindmap(project: &ProjectDir, stage: TreeFile) -> AppResult<std::path::PathBuf> {
    let tree = load_stage_tree(project, stage)?;
    let resources = load_resources_if_present(project)?;
    let xml = mindmap_xml(&tree, resources.as_ref());

    let path = project.join(format!("{}.mm", stage.stem()));
    std::fs::write(&path, xml).map_err(|e| AppError::io(&path, e))?;
    info!(path = %path.display(), nodes = tree.len(), "Wrote mind map");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::tree_and_resources;
    use crate::tree::ROOT_ID;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"Tom & Jerry's <"shop">"#), "Tom &amp; Jerry&#x27;s &lt;&quot;shop&quot;&gt;");
    }

    #[test]
    fn test_mindmap_layout() {
        let mut tree = Tree::new();
        tree.create_root(ROOT_ID, NodeTag::Root, "Food & Health").unwrap();
        let a = tree.add_child(ROOT_ID, NodeTag::Obstacle, "Cost").unwrap();
        tree.add_child(&a, NodeTag::Solution, "Coupons").unwrap();

        let expected = concat!(
            "<map version=\"1.0.1\">\n",
            "<node TEXT=\"Food &amp; Health\">\n",
            "    <node TEXT=\"Cost\">\n",
            "        <node TEXT=\"Coupons\">\n",
            "        </node>\n",
            "    </node>\n",
            "</node>\n",
            "</map>\n",
        );
        assert_eq!(mindmap_xml(&tree, None), expected);
    }

    #[test]
    fn test_resource_nodes() {
        let (tree, resources) = tree_and_resources();
        let xml = mindmap_xml(&tree, Some(&resources));
        assert!(xml.contains("<node TEXT=\"R:Market | Market description\">"));
        assert!(xml.contains("<node TEXT=\"R:Pantry | Pantry description\">"));
        assert!(xml.contains("<node TEXT=\"Cost: Food is expensive.\">"));

        let bare = mindmap_xml(&tree, None);
        assert!(bare.contains("<node TEXT=\"R:resource:0\">"));
    }

    #[test]
    fn test_write_mindmap() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir::new(dir.path());
        let (tree, resources) = tree_and_resources();
        tree.save(&project.tree_file(TreeFile::Resources)).unwrap();
        resources.save(&project.resources_file()).unwrap();

        let path = write_mindmap(&project, TreeFile::Resources).unwrap();
        assert_eq!(path, dir.path().join("r.mm"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("<map version=\"1.0.1\">\n"));
        assert!(text.ends_with("</map>\n"));
    }
}
