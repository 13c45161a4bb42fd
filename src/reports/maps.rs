use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::info;

use super::resource_csv::write_rows;
use super::{collect_rows, load_stage_tree, ResourceRow};
use crate::config::{ProjectDir, TreeFile};
use crate::error::{AppError, AppResult, TreeError};
use crate::resources::ResourceList;

const MAPS_DIR: &str = "Google Maps";
const MAILING_LIST: &str = "mailing_list.csv";
const MARKERS_FILE: &str = "google-maps.json";
const FIRST_MARKER_ID: u64 = 1001;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.-]").expect("valid file name regex"));
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"  +").expect("valid file name regex"));

/// One map pin. Resources sharing address and organization share a pin,
/// with their themes joined in `category`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub id: String,
    pub title: String,
    pub address: String,
    pub description: String,
    pub link: String,
    pub category: String,
}

#[derive(Debug, Serialize)]
struct MarkerFile<'a> {
    markers: &'a [MapMarker],
}

/// Mailing list entry: a resource row plus its theme.
#[derive(Debug, Serialize)]
struct MailingRow {
    id: u64,
    program: String,
    description: String,
    organization: String,
    address: String,
    email: String,
    website: String,
    solving: String,
    solution: String,
    category: String,
}

impl MailingRow {
    fn new(row: &ResourceRow, category: &str) -> Self {
        Self {
            id: row.id,
            program: row.program.clone(),
            description: row.description.clone(),
            organization: row.organization.clone(),
            address: row.address.clone(),
            email: row.email.clone(),
            website: row.website.clone(),
            solving: row.solving.clone(),
            solution: row.solution.clone(),
            category: category.to_string(),
        }
    }
}

/// Files written by [`write_maps`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapsReport {
    pub theme_files: Vec<PathBuf>,
    pub mailing_list: usize,
    pub markers: Vec<MapMarker>,
}

/// Theme name made safe for a file name.
pub fn sanitize_file_name(theme: &str) -> String {
    let name = theme.trim().replace('/', ", ").replace(':', " - ");
    let name = UNSAFE_CHARS.replace_all(&name, " ");
    SPACE_RUNS.replace_all(&name, " ").into_owned()
}

/// Per-theme Google Maps CSVs, `mailing_list.csv` and `google-maps.json`.
///
/// A theme is a child of the root; themes without resources get no file.
pub fn write_maps(project: &ProjectDir) -> AppResult<MapsReport> {
    let tree = load_stage_tree(project, TreeFile::Resources)?;
    let resources = ResourceList::load(&project.resources_file())?;
    let root = tree.root().ok_or(TreeError::NoRoot)?;

    let maps_dir = project.join(MAPS_DIR);
    std::fs::create_dir_all(&maps_dir).map_err(|e| AppError::io(&maps_dir, e))?;

    let mut report = MapsReport::default();
    let mut mailing = Vec::new();
    let mut seen = HashSet::new();
    let mut pins: HashMap<String, usize> = HashMap::new();

    for theme_node in tree.children(root) {
        let theme = theme_node.label();
        let rows = collect_rows(&tree, &theme_node.identifier, &resources);
        if rows.is_empty() {
            info!(theme = %theme, "No resources under theme");
            continue;
        }

        let path = maps_dir.join(format!("{}.csv", sanitize_file_name(&theme)));
        write_rows(&path, &rows)?;
        report.theme_files.push(path);

        for row in &rows {
            if seen.insert(row.id) {
                mailing.push(MailingRow::new(row, &theme));
            }
            add_marker(&mut report.markers, &mut pins, row, &theme);
        }
    }

    let mailing_path = project.join(MAILING_LIST);
    write_rows(&mailing_path, &mailing)?;
    report.mailing_list = mailing.len();

    let markers_path = project.join(MARKERS_FILE);
    let text = serde_json::to_string_pretty(&MarkerFile {
        markers: &report.markers,
    })
    .map_err(|e| AppError::json(&markers_path, e))?;
    std::fs::write(&markers_path, text).map_err(|e| AppError::io(&markers_path, e))?;

    info!(
        themes = report.theme_files.len(),
        mailing_list = report.mailing_list,
        markers = report.markers.len(),
        "Wrote map exports"
    );
    Ok(report)
}

fn add_marker(markers: &mut Vec<MapMarker>, pins: &mut HashMap<String, usize>, row: &ResourceRow, theme: &str) {
    let key = format!("{}|{}", row.address, row.organization);
    if let Some(&index) = pins.get(&key) {
        let marker = &mut markers[index];
        if !marker.category.split(", ").any(|c| c == theme) {
            marker.category = format!("{}, {}", marker.category, theme);
        }
        return;
    }
    let link = if row.website == "N/A" { String::new() } else { row.website.clone() };
    markers.push(MapMarker {
        id: (FIRST_MARKER_ID + markers.len() as u64).to_string(),
        title: row.program.clone(),
        address: row.address.clone(),
        description: row.description.clone(),
        link,
        category: theme.to_string(),
    });
    pins.insert(key, markers.len() - 1);
}
