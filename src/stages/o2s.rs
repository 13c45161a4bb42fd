use tracing::info;

use super::{prompt_subject, StageContext, StageReport};
use crate::config::TreeFile;
use crate::error::AppResult;
use crate::progress::progress_line;
use crate::prompts::solutions_prompt;
use crate::tree::NodeTag;

/// Obstacles → solutions.
///
/// Loads `o.json` and asks for community solutions to every leaf obstacle.
/// Writes `s.json`.
pub async fn obstacles_to_solutions(ctx: &mut StageContext) -> AppResult<StageReport> {
    ctx.load_tree(TreeFile::Obstacles)?;
    let mut report = StageReport::default();

    let leaves = ctx.tree.leaves();
    let total = leaves.len();
    ctx.flush_cache()?;

    for (i, leaf) in leaves.iter().enumerate() {
        report.leaves += 1;
        let obstacle = prompt_subject(&ctx.tree, leaf);
        let prompt = solutions_prompt(&ctx.config.locality, &ctx.config.country, &obstacle);
        match ctx.ask_records(&prompt).await? {
            Some(records) => {
                report.added += ctx.insert_records(leaf, &records, NodeTag::Solution)?;
            }
            None => report.skipped += 1,
        }
        ctx.save_tree(TreeFile::Solutions)?;
        println!("{} {}", progress_line(i + 1, total), obstacle);
        ctx.flush_cache()?;
    }

    ctx.save_tree(TreeFile::Solutions)?;
    info!(
        leaves = report.leaves,
        added = report.added,
        skipped = report.skipped,
        "Obstacles to solutions complete"
    );
    Ok(report)
}
