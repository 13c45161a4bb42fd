use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use crate::config::{ProjectDir, TreeFile};
use crate::error::AppResult;
use crate::resources::{
    check_urls, load_raw, normalize_raw, recheck_urls, resource_stats, tag_counts, url_stats, ResourceList,
    ResourceStats, UrlChecker, UrlStats,
};
use crate::tree::Tree;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const RECHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// `resources-raw.json` → normalized, deduplicated, URL-checked `resources.json`.
pub async fn normalize_resources(project: &ProjectDir) -> AppResult<ResourceList> {
    let raw = load_raw(&project.raw_resources_file())?;
    info!(count = raw.len(), "normalize");
    let mut list = ResourceList::new(normalize_raw(&raw)?);

    info!("check_urls");
    let mut checker = UrlChecker::new(CHECK_TIMEOUT)?;
    check_urls(list.as_mut_slice(), &mut checker).await;

    list.save(&project.resources_file())?;
    Ok(list)
}

/// Retry invalid websites in `resources.json`, rewriting it in place.
pub async fn recheck_resource_urls(project: &ProjectDir) -> AppResult<usize> {
    let path = project.resources_file();
    let mut list = ResourceList::load(&path)?;

    info!("re_check_urls");
    let mut checker = UrlChecker::new(RECHECK_TIMEOUT)?;
    let recovered = recheck_urls(list.as_mut_slice(), &mut checker).await;

    list.save(&path)?;
    info!(recovered = recovered, "Recheck complete");
    Ok(recovered)
}

/// Summary of a finished project.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub resources: ResourceStats,
    pub urls: UrlStats,
    pub tags: BTreeMap<String, usize>,
}

/// Resource, URL and tag statistics of `resources.json` and `r.json`.
pub fn stats(project: &ProjectDir) -> AppResult<StatsReport> {
    let list = ResourceList::load(&project.resources_file())?;
    let resources = resource_stats(&list.to_values());
    let urls = url_stats(list.as_slice());
    println!("{}", resources);
    println!("{}", urls);

    let tree = Tree::load(&project.tree_file(TreeFile::Resources))?;
    let tags = tag_counts(&tree);
    for (tag, count) in &tags {
        println!("{} {}", tag, count);
    }

    Ok(StatsReport { resources, urls, tags })
}
