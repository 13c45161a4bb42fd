use std::path::{Path, PathBuf};
use tracing::info;

use super::{collect_rows, load_stage_tree};
use crate::config::{ProjectDir, TreeFile};
use crate::error::{AppError, AppResult, TreeError};
use crate::resources::ResourceList;

/// Output file of the `csv` command.
pub const RESOURCE_CSV: &str = "resources.csv";

/// Flatten `r.json` + `resources.json` into `resources.csv`.
pub fn write_resource_csv(project: &ProjectDir) -> AppResult<PathBuf> {
    let tree = load_stage_tree(project, TreeFile::Resources)?;
    let resources = ResourceList::load(&project.resources_file())?;
    let root = tree.root().ok_or(TreeError::NoRoot)?;
    let rows = collect_rows(&tree, root, &resources);

    let path = project.join(RESOURCE_CSV);
    write_rows(&path, &rows)?;
    info!(path = %path.display(), rows = rows.len(), "Wrote resource CSV");
    Ok(path)
}

/// Serialize rows with a header line.
pub(crate) fn write_rows<T: serde::Serialize>(path: &Path, rows: &[T]) -> AppResult<()> {
    let file = std::fs::File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut writer = ::csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;
    Ok(())
}
