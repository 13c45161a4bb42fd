//! Pipeline stage commands.
//!
//! Each LLM-backed stage runs against a [`StageContext`] built once per
//! invocation. Stages walk the leaves present when they start, expand each
//! one, and checkpoint tree and cache to disk after every leaf so an aborted
//! run can be resumed from the files.

mod g2o;
mod maintenance;
mod o2s;
mod s2r;

pub use g2o::goal_to_obstacles;
pub use maintenance::{normalize_resources, recheck_resource_urls, stats, StatsReport};
pub use o2s::obstacles_to_solutions;
pub use s2r::{harvest_resources, solutions_to_resources};

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{ProjectConfig, ProjectDir, RequestConfig, TreeFile};
use crate::error::{AppResult, LlmError};
use crate::llm::{ChatBackend, LlmCaller, ResponseCache};
use crate::normalize::{normalize, CanonicalRecord};
use crate::tree::{NodeTag, Tree};

/// Counts reported when a stage finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Leaves the stage attempted to expand.
    pub leaves: usize,
    /// Leaves skipped after exhausted retries or an unusable reply.
    pub skipped: usize,
    /// Nodes added to the tree.
    pub added: usize,
}

/// Everything a stage needs: project layout, settings, the tree and the LLM.
pub struct StageContext {
    pub project: ProjectDir,
    pub config: ProjectConfig,
    pub tree: Tree,
    pub llm: LlmCaller,
}

impl StageContext {
    pub fn new(project: ProjectDir, config: ProjectConfig, llm: LlmCaller) -> Self {
        Self {
            project,
            config,
            tree: Tree::new(),
            llm,
        }
    }

    /// Read `config.yaml` and `cache4.json` from the project directory.
    pub fn open(project: ProjectDir, backend: Box<dyn ChatBackend>, request: &RequestConfig) -> AppResult<Self> {
        let config = ProjectConfig::load(&project)?;
        let cache = ResponseCache::load(project.cache_file());
        let llm = LlmCaller::new(backend, cache, request);
        Ok(Self::new(project, config, llm))
    }

    pub fn load_tree(&mut self, which: TreeFile) -> AppResult<()> {
        let path = self.project.tree_file(which);
        self.tree = Tree::load(&path)?;
        info!(path = %path.display(), nodes = self.tree.len(), "Loaded tree");
        Ok(())
    }

    pub fn save_tree(&self, which: TreeFile) -> AppResult<()> {
        self.tree.save(&self.project.tree_file(which))
    }

    pub fn flush_cache(&mut self) -> AppResult<()> {
        self.llm.cache_mut().flush()?;
        Ok(())
    }

    /// Send a prompt, applying the leaf failure policy.
    ///
    /// Exhausted retries yield `None` so the caller can skip the leaf; any
    /// other LLM error aborts the stage.
    pub(crate) async fn ask(&mut self, prompt: &str) -> AppResult<Option<Value>> {
        info!(prompt = %prompt, "Prompt");
        match self.llm.call(prompt, true).await {
            Ok(reply) => {
                info!(reply = %reply, "Reply");
                Ok(Some(reply))
            }
            Err(e @ LlmError::ExhaustedRetries { .. }) => {
                warn!(error = %e, "Skipping after exhausted retries");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ask for a list of records, capped at `max_items_per_llm_call`.
    ///
    /// `None` means the leaf should be skipped.
    pub(crate) async fn ask_records(&mut self, prompt: &str) -> AppResult<Option<Vec<CanonicalRecord>>> {
        let Some(reply) = self.ask(prompt).await? else {
            return Ok(None);
        };
        let mut normalized = match normalize(reply) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(error = %e, "Reply has an unusable shape");
                return Ok(None);
            }
        };
        if let Some(max) = self.config.max_items_per_llm_call {
            normalized.truncate(max);
        }
        Ok(Some(normalized.into_records()))
    }

    /// Add each record as a child of `parent`.
    pub(crate) fn insert_records(
        &mut self,
        parent: &str,
        records: &[CanonicalRecord],
        tag: NodeTag,
    ) -> AppResult<usize> {
        for record in records {
            let id = self.tree.add_child(parent, tag, record.to_value())?;
            info!(id = %id, title = %record.title, "New node");
        }
        Ok(records.len())
    }
}

/// Prompt text for a node: `title: description` for records, the text
/// without a trailing period otherwise.
pub(crate) fn prompt_subject(tree: &Tree, identifier: &str) -> String {
    match tree.get(identifier) {
        Some(node) => match node.text() {
            Some(text) => text.trim_end_matches('.').to_string(),
            None => node.summary(),
        },
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatBackend;
    use crate::tree::ROOT_ID;
    use serde_json::json;

    fn config(max_items: Option<usize>) -> ProjectConfig {
        let mut config = ProjectConfig::from_yaml(
            "future_picture: Healthy food.\nroot_node_name: Food\nlocality: Springfield\ncountry: USA\n",
        )
        .unwrap();
        config.max_items_per_llm_call = max_items;
        config
    }

    fn context(mock: MockChatBackend, max_items: Option<usize>) -> StageContext {
        let llm = LlmCaller::new(Box::new(mock), ResponseCache::in_memory(), &RequestConfig::default());
        StageContext::new(ProjectDir::new("/nonexistent"), config(max_items), llm)
    }

    #[tokio::test]
    async fn test_ask_records_caps_items() {
        let mut mock = MockChatBackend::new();
        mock.expect_complete().times(1).returning(|_| {
            Ok(json!({"items": [
                {"title": "a", "description": "1"},
                {"title": "b", "description": "2"},
                {"title": "c", "description": "3"}
            ]})
            .to_string())
        });

        let mut ctx = context(mock, Some(2));
        let records = ctx.ask_records("prompt").await.unwrap().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_ask_records_skips_bad_shape() {
        let mut mock = MockChatBackend::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok(r#"{"title": "only", "color": "red"}"#.to_string()));

        let mut ctx = context(mock, None);
        assert!(ctx.ask_records("prompt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ask_aborts_on_fatal_error() {
        let mut mock = MockChatBackend::new();
        mock.expect_complete().times(1).returning(|_| {
            Err(LlmError::Api {
                status: 400,
                message: "bad request".to_string(),
            })
        });

        let mut ctx = context(mock, None);
        assert!(ctx.ask("prompt").await.is_err());
    }

    #[test]
    fn test_prompt_subject() {
        let mut tree = Tree::new();
        tree.create_root(ROOT_ID, NodeTag::Root, "Goal").unwrap();
        let a = tree.add_child(ROOT_ID, NodeTag::Obstacle, "Cost of food.").unwrap();
        let b = tree
            .add_child(ROOT_ID, NodeTag::Obstacle, json!({"title": "Distance", "description": "Far away"}))
            .unwrap();
        assert_eq!(prompt_subject(&tree, &a), "Cost of food");
        assert_eq!(prompt_subject(&tree, &b), "Distance: Far away");
    }
}
