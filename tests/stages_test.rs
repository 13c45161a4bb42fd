//! End-to-end stage runs against a scripted chat backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

use gosr::cli::{run_with_backend, Command};
use gosr::config::{Config, LogFormat, LoggingConfig, OpenAiConfig, ProjectDir, RequestConfig, TreeFile};
use gosr::error::{LlmError, LlmResult};
use gosr::llm::ChatBackend;
use gosr::resources::{load_raw, normalize_raw, ResourceList};
use gosr::stages::{goal_to_obstacles, obstacles_to_solutions, solutions_to_resources, StageContext};
use gosr::tree::{NodeTag, Tree};

const CONFIG_YAML: &str = r#"
future_picture: "Everyone in Springfield eats well."
root_node_name: "Healthy Food"
locality: "Springfield"
country: "USA"
major_theme_obstacles:
  - "High prices"
word_doc_title: "Food Plan"
"#;

/// Answers by prompt kind and records every prompt it receives.
#[derive(Clone, Default)]
struct ScriptedBackend {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let reply = if prompt.starts_with("Produce a list of obstacles") {
            json!([
                {"title": "Cost", "description": "Food is expensive"},
                {"title": "Distance", "description": "Stores are far"}
            ])
        } else if prompt.contains("contributing factors") && prompt.contains("Cost") {
            json!({"factors": [{"factor": "Rent", "details": "High rent squeezes budgets"}]})
        } else if prompt.contains("contributing factors") {
            return Err(LlmError::RateLimited {
                message: "busy".to_string(),
            });
        } else if prompt.contains("potential solutions") {
            json!({"solutions": [{"solution": {"title": "Coupons", "description": "Discounts"}}]})
        } else if prompt.contains("existing efforts") {
            json!([{
                "name": "Market",
                "organization": "Food Bank",
                "description": "Weekly market",
                "address": "1 Main St",
                "email": "info@foodbank.org",
                "website": "https://foodbank.org/market"
            }])
        } else {
            return Err(LlmError::Api {
                status: 400,
                message: "unexpected prompt".to_string(),
            });
        };
        Ok(reply.to_string())
    }
}

fn request() -> RequestConfig {
    RequestConfig {
        timeout_ms: 1000,
        retry_delay_ms: 1,
    }
}

fn project_dir(dir: &Path) -> ProjectDir {
    std::fs::write(dir.join("config.yaml"), CONFIG_YAML).unwrap();
    ProjectDir::new(dir)
}

fn open(project: &ProjectDir, backend: &ScriptedBackend) -> StageContext {
    StageContext::open(project.clone(), Box::new(backend.clone()), &request()).unwrap()
}

fn app_config() -> Config {
    Config {
        openai: OpenAiConfig {
            api_key: None,
            organization: None,
            base_url: "http://localhost".to_string(),
            model: "gpt-4o".to_string(),
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        },
        request: request(),
    }
}

#[tokio::test]
async fn test_goal_to_obstacles() {
    let dir = tempfile::tempdir().unwrap();
    let project = project_dir(dir.path());
    let backend = ScriptedBackend::default();

    let report = goal_to_obstacles(&mut open(&project, &backend)).await.unwrap();
    assert_eq!(report.leaves, 2);
    assert_eq!(report.added, 3);
    assert_eq!(report.skipped, 1);
    // obstacles + Cost factors + five attempts for Distance
    assert_eq!(backend.calls(), 7);
    assert!(backend.prompts.lock().unwrap()[0].contains("['High prices']"));

    let tree = Tree::load(&project.tree_file(TreeFile::Obstacles)).unwrap();
    assert_eq!(tree.len(), 4);
    let rent = tree.get("root.1.1").unwrap();
    assert_eq!(rent.tag, NodeTag::Obstacle);
    assert_eq!(rent.data, json!({"title": "Rent", "description": "High rent squeezes budgets"}));
    assert!(tree.is_leaf("root.2"));
    assert!(project.cache_file().exists());
}

#[tokio::test]
async fn test_rerun_replays_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let project = project_dir(dir.path());

    let first = ScriptedBackend::default();
    goal_to_obstacles(&mut open(&project, &first)).await.unwrap();

    // Only the failed prompt reaches the backend again
    let second = ScriptedBackend::default();
    goal_to_obstacles(&mut open(&project, &second)).await.unwrap();
    assert_eq!(second.calls(), 5);
    assert!(second.prompts.lock().unwrap().iter().all(|p| p.contains("Distance")));

    let tree = Tree::load(&project.tree_file(TreeFile::Obstacles)).unwrap();
    assert_eq!(tree.len(), 4);
}

#[tokio::test]
async fn test_full_pipeline_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let project = project_dir(dir.path());
    let backend = ScriptedBackend::default();

    goal_to_obstacles(&mut open(&project, &backend)).await.unwrap();

    let report = obstacles_to_solutions(&mut open(&project, &backend)).await.unwrap();
    assert_eq!(report.leaves, 2);
    assert_eq!(report.added, 2);
    let tree = Tree::load(&project.tree_file(TreeFile::Solutions)).unwrap();
    assert_eq!(tree.get("root.2.1").unwrap().tag, NodeTag::Solution);

    let before = backend.calls();
    let report = solutions_to_resources(&mut open(&project, &backend)).await.unwrap();
    assert_eq!(report.leaves, 2);
    assert_eq!(report.added, 2);
    // both solutions read "Coupons: Discounts", so the second prompt is a cache hit
    assert_eq!(backend.calls(), before + 1);

    let raw = load_raw(&project.raw_resources_file()).unwrap();
    assert_eq!(raw.len(), 2);
    assert_eq!(raw[1]["id"], json!(1));

    let tree = Tree::load(&project.tree_file(TreeFile::Resources)).unwrap();
    let resource_nodes: Vec<Value> = tree
        .preorder()
        .iter()
        .filter_map(|id| tree.get(id))
        .filter(|n| n.tag == NodeTag::Resource)
        .map(|n| n.data.clone())
        .collect();
    assert_eq!(resource_nodes, vec![json!({"id": 0}), json!({"id": 1})]);

    // resources.json without the network check
    let list = ResourceList::new(normalize_raw(&raw).unwrap());
    assert_eq!(list.lookup(1).unwrap().dup, Some(0));
    list.save(&project.resources_file()).unwrap();

    let config = app_config();
    let no_backend = || -> gosr::AppResult<Box<dyn ChatBackend>> { panic!("reports must not use the model") };
    let root = dir.path().to_path_buf();
    for command in [
        Command::Csv { project: root.clone() },
        Command::Maps { project: root.clone() },
        Command::Stats { project: root.clone() },
    ] {
        run_with_backend(&command, &config, no_backend).await.unwrap();
    }

    assert!(dir.path().join("resources.csv").exists());
    assert!(dir.path().join("mailing_list.csv").exists());
    assert!(dir.path().join("google-maps.json").exists());
    assert!(dir.path().join("Google Maps").join("Cost.csv").exists());
    assert!(dir.path().join("Google Maps").join("Distance.csv").exists());
}

#[tokio::test]
async fn test_cli_runs_stage_with_backend() {
    let dir = tempfile::tempdir().unwrap();
    let project = project_dir(dir.path());
    let backend = ScriptedBackend::default();

    let command = Command::G2o {
        project: dir.path().to_path_buf(),
    };
    let handle = backend.clone();
    run_with_backend(&command, &app_config(), move || Ok(Box::new(handle) as Box<dyn ChatBackend>))
        .await
        .unwrap();

    assert!(project.tree_file(TreeFile::Obstacles).exists());
    assert_eq!(backend.calls(), 7);
}

#[tokio::test]
async fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let command = Command::O2s {
        project: dir.path().to_path_buf(),
    };
    let result = run_with_backend(&command, &app_config(), || {
        Ok(Box::new(ScriptedBackend::default()) as Box<dyn ChatBackend>)
    })
    .await;
    assert!(result.is_err());
}
