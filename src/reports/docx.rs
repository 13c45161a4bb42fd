use docx_rs::{BreakType, Docx, Hyperlink, HyperlinkType, Paragraph, Run, Style, StyleType};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{load_resources_if_present, load_stage_tree, published_website};
use crate::config::{ProjectConfig, ProjectDir, TreeFile};
use crate::error::{AppError, AppResult};
use crate::resources::{Resource, ResourceList};
use crate::tree::{description_text, NodeTag, Tree};

const MAX_HEADING: usize = 9;
const LIST_STYLE: &str = "ListBullet";

/// Document content in reading order, before layout.
#[derive(Debug, Clone, PartialEq)]
pub enum DocBlock {
    /// Level 0 is the document title.
    Heading { level: usize, text: String },
    Paragraph(String),
    /// Bullet linking to the `resource:<id>` bookmark.
    ResourceLink { id: u64, text: String },
    /// Bookmarked entry of the trailing resources section.
    ResourceEntry(Resource),
}

fn anchor(id: u64) -> String {
    format!("resource:{}", id)
}

/// Walk the tree into document blocks.
///
/// With `resource_section` set, every distinct linked resource is listed
/// once more under a final "Resources" title, in first-link order.
pub fn document_blocks(tree: &Tree, resources: Option<&ResourceList>, resource_section: bool) -> Vec<DocBlock> {
    let mut blocks = Vec::new();
    let Some(root) = tree.root() else {
        return blocks;
    };
    let title = tree.get(root).map(|n| n.label()).unwrap_or_default();
    blocks.push(DocBlock::Heading { level: 0, text: title });

    let mut linked = Vec::new();
    walk(tree, root, 1, resources, &mut blocks, &mut linked);

    if resource_section {
        blocks.push(DocBlock::Heading {
            level: 0,
            text: "Resources".to_string(),
        });
        if let Some(list) = resources {
            let mut seen = HashSet::new();
            for id in linked {
                if !seen.insert(id) {
                    continue;
                }
                if let Some(resource) = list.lookup(id) {
                    blocks.push(DocBlock::ResourceEntry(resource.clone()));
                }
            }
        }
    }
    blocks
}

fn walk(
    tree: &Tree,
    parent: &str,
    level: usize,
    resources: Option<&ResourceList>,
    blocks: &mut Vec<DocBlock>,
    linked: &mut Vec<u64>,
) {
    for child in tree.children(parent) {
        if child.tag == NodeTag::Resource {
            let Some(id) = child.resource_id() else {
                warn!(node = %child.identifier, "Resource node without id");
                continue;
            };
            match resources.map(|list| list.find_by_id(id)) {
                Some(Ok(resource)) => {
                    blocks.push(DocBlock::ResourceLink {
                        id: resource.id,
                        text: resource.link_text(),
                    });
                    linked.push(resource.id);
                }
                Some(Err(e)) => warn!(node = %child.identifier, error = %e, "Skipping unresolved resource"),
                None => blocks.push(DocBlock::ResourceLink { id, text: anchor(id) }),
            }
            continue;
        }

        let (header, body) = match child.record() {
            Some((title, description)) => (title.to_string(), description_text(description)),
            None => {
                let text = child.label();
                match text.split_once(':') {
                    Some((header, body)) => (header.trim().to_string(), body.trim().to_string()),
                    None => (text, String::new()),
                }
            }
        };
        blocks.push(DocBlock::Heading { level, text: header });
        if !body.is_empty() {
            blocks.push(DocBlock::Paragraph(body));
        }
        walk(tree, &child.identifier, level + 1, resources, blocks, linked);
    }
}

fn heading_style(level: usize) -> String {
    match level {
        0 => "Title".to_string(),
        n => format!("Heading{}", n.min(MAX_HEADING)),
    }
}

fn with_styles(docx: Docx) -> Docx {
    let mut docx = docx.add_style(
        Style::new("Title", StyleType::Paragraph)
            .name("Title")
            .size(56)
            .bold(),
    );
    for level in 1..=MAX_HEADING {
        let size = 36usize.saturating_sub(level * 3).max(22);
        docx = docx.add_style(
            Style::new(heading_style(level), StyleType::Paragraph)
                .name(format!("Heading {}", level))
                .size(size)
                .bold(),
        );
    }
    docx.add_style(Style::new(LIST_STYLE, StyleType::Paragraph).name("List Bullet"))
}

fn labelled(paragraph: Paragraph, label: &str, value: &str) -> Paragraph {
    paragraph
        .add_run(Run::new().add_text(label).bold())
        .add_run(Run::new().add_text(value).add_break(BreakType::TextWrapping))
}

fn resource_paragraph(bookmark: usize, resource: &Resource) -> Paragraph {
    let paragraph = Paragraph::new()
        .add_bookmark_start(bookmark, anchor(resource.id))
        .add_run(
            Run::new()
                .add_text(&resource.program)
                .bold()
                .add_break(BreakType::TextWrapping),
        )
        .add_run(
            Run::new()
                .add_text(&resource.description)
                .add_break(BreakType::TextWrapping),
        );
    let paragraph = labelled(paragraph, "Organization: ", &resource.organization);
    let paragraph = labelled(paragraph, "Address: ", resource.address.as_deref().unwrap_or("N/A"));
    let paragraph = labelled(paragraph, "Email: ", &resource.email);
    paragraph
        .add_run(Run::new().add_text("Website: ").bold())
        .add_run(Run::new().add_text(published_website(resource)))
        .add_bookmark_end(bookmark)
}

/// Lay blocks out as a Word document.
pub fn render_docx(blocks: &[DocBlock]) -> Docx {
    let mut docx = with_styles(Docx::new());
    let mut bookmark = 0usize;
    for block in blocks {
        let paragraph = match block {
            DocBlock::Heading { level, text } => Paragraph::new()
                .add_run(Run::new().add_text(text))
                .style(&heading_style(*level)),
            DocBlock::Paragraph(text) => Paragraph::new().add_run(Run::new().add_text(text)),
            DocBlock::ResourceLink { id, text } => Paragraph::new()
                .add_hyperlink(Hyperlink::new(anchor(*id), HyperlinkType::Anchor).add_run(Run::new().add_text(text)))
                .style(LIST_STYLE),
            DocBlock::ResourceEntry(resource) => {
                bookmark += 1;
                resource_paragraph(bookmark, resource)
            }
        };
        docx = docx.add_paragraph(paragraph);
    }
    docx
}

/// Write `<word_doc_title | root_node_name>.docx` for `s.json` or `r.json`.
pub fn write_doc(project: &ProjectDir, stage: TreeFile) -> AppResult<PathBuf> {
    let config = ProjectConfig::load(project)?;
    let tree = load_stage_tree(project, stage)?;
    let resources = load_resources_if_present(project)?;

    let blocks = document_blocks(&tree, resources.as_ref(), stage == TreeFile::Resources);
    let path = project.join(format!("{}.docx", config.doc_title()));
    let file = std::fs::File::create(&path).map_err(|e| AppError::io(&path, e))?;
    render_docx(&blocks)
        .build()
        .pack(file)
        .map_err(|e| AppError::Report {
            message: format!("{}: {}", path.display(), e),
        })?;

    info!(path = %path.display(), blocks = blocks.len(), "Wrote document");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::tree_and_resources;
    use pretty_assertions::assert_eq;

    fn heading(level: usize, text: &str) -> DocBlock {
        DocBlock::Heading {
            level,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_document_blocks_with_resources() {
        let (tree, resources) = tree_and_resources();
        let blocks = document_blocks(&tree, Some(&resources), true);

        assert_eq!(
            &blocks[..6],
            &[
                heading(0, "Healthy Food"),
                heading(1, "Cost"),
                DocBlock::Paragraph("Food is expensive.".to_string()),
                heading(2, "Coupons"),
                DocBlock::Paragraph("Discounts".to_string()),
                DocBlock::ResourceLink {
                    id: 0,
                    text: "Market (Food Bank)".to_string()
                },
            ]
        );
        // the dup link points at the canonical record
        assert!(blocks.contains(&DocBlock::ResourceLink {
            id: 0,
            text: "Market (Food Bank)".to_string()
        }));
        assert!(blocks.contains(&heading(2, "Grocery shuttle.")));

        let resources_at = blocks.iter().position(|b| *b == heading(0, "Resources")).unwrap();
        let entries: Vec<u64> = blocks[resources_at + 1..]
            .iter()
            .map(|b| match b {
                DocBlock::ResourceEntry(r) => r.id,
                other => panic!("unexpected block {:?}", other),
            })
            .collect();
        assert_eq!(entries, vec![0, 1]);
    }

    #[test]
    fn test_text_nodes_split_on_colon() {
        let mut tree = Tree::new();
        tree.create_root("root", NodeTag::Root, "Goal").unwrap();
        tree.add_child("root", NodeTag::Obstacle, "Cost: food is expensive").unwrap();
        tree.add_child("root", NodeTag::Obstacle, "Distance").unwrap();

        let blocks = document_blocks(&tree, None, false);
        assert_eq!(
            blocks,
            vec![
                heading(0, "Goal"),
                heading(1, "Cost"),
                DocBlock::Paragraph("food is expensive".to_string()),
                heading(1, "Distance"),
            ]
        );
    }

    #[test]
    fn test_heading_style() {
        assert_eq!(heading_style(0), "Title");
        assert_eq!(heading_style(2), "Heading2");
        assert_eq!(heading_style(14), "Heading9");
    }

    #[test]
    fn test_write_doc() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDir::new(dir.path());
        std::fs::write(
            project.config_file(),
            "root_node_name: Healthy Food\nword_doc_title: Food Plan\nlocality: Springfield\ncountry: USA\n",
        )
        .unwrap();
        let (tree, resources) = tree_and_resources();
        tree.save(&project.tree_file(TreeFile::Resources)).unwrap();
        resources.save(&project.resources_file()).unwrap();

        let path = write_doc(&project, TreeFile::Resources).unwrap();
        assert_eq!(path, dir.path().join("Food Plan.docx"));
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
