use tracing::{debug, info};

use super::{prompt_subject, StageContext, StageReport};
use crate::config::TreeFile;
use crate::error::AppResult;
use crate::prompts::{factors_prompt, obstacles_prompt};
use crate::tree::{NodeTag, Tree, ROOT_ID};

/// Goal → obstacles.
///
/// Starts a fresh tree rooted at `root_node_name`, asks for the goal's
/// obstacles, then for the contributing factors of each obstacle. Writes
/// `o.json`.
pub async fn goal_to_obstacles(ctx: &mut StageContext) -> AppResult<StageReport> {
    let goal = ctx.config.goal()?;
    let mut report = StageReport::default();

    ctx.tree = Tree::new();
    ctx.tree
        .create_root(ROOT_ID, NodeTag::Root, ctx.config.root_node_name.clone())?;

    let prompt = obstacles_prompt(
        &ctx.config.locality,
        &ctx.config.country,
        &goal,
        &ctx.config.major_theme_obstacles,
    );
    if let Some(records) = ctx.ask_records(&prompt).await? {
        report.added += ctx.insert_records(ROOT_ID, &records, NodeTag::Obstacle)?;
    }
    ctx.flush_cache()?;
    debug!("Tree:\n{}", ctx.tree.render(ROOT_ID));

    let leaves: Vec<String> = ctx
        .tree
        .leaves()
        .into_iter()
        .filter(|id| id != ROOT_ID)
        .collect();

    for leaf in &leaves {
        report.leaves += 1;
        let obstacle = prompt_subject(&ctx.tree, leaf);
        match ctx.ask_records(&factors_prompt(&goal, &obstacle)).await? {
            Some(records) => {
                report.added += ctx.insert_records(leaf, &records, NodeTag::Obstacle)?;
            }
            None => report.skipped += 1,
        }
        ctx.flush_cache()?;
        ctx.save_tree(TreeFile::Obstacles)?;
        debug!("Tree:\n{}", ctx.tree.render(ROOT_ID));
    }

    ctx.save_tree(TreeFile::Obstacles)?;
    info!(
        leaves = report.leaves,
        added = report.added,
        skipped = report.skipped,
        "Goal to obstacles complete"
    );
    Ok(report)
}
