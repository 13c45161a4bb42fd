use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Model requested for every chat completion.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// OpenAI API configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    /// Unit of the exponential backoff: attempt `n` waits `retry_delay_ms * 2^n`.
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let openai = OpenAiConfig {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            organization: env::var("OPENAI_ORG").ok().filter(|o| !o.is_empty()),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            model: env::var("GOSR_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60000),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        Ok(Config {
            openai,
            logging,
            request,
        })
    }
}

impl OpenAiConfig {
    /// The API key, required by every command that talks to the model.
    pub fn require_api_key(&self) -> AppResult<&str> {
        self.api_key.as_deref().ok_or_else(|| AppError::Config {
            message: "OPENAI_API_KEY is required".to_string(),
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60000,
            retry_delay_ms: 1000,
        }
    }
}

/// Per-project settings read from `config.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Goal statement the obstacles are generated against.
    #[serde(default)]
    pub future_picture: Option<String>,
    /// Data of the tree root.
    pub root_node_name: String,
    #[serde(default)]
    pub root_question: Option<String>,
    pub locality: String,
    pub country: String,
    /// Obstacles named by the local community, quoted in the first prompt.
    #[serde(default)]
    pub major_theme_obstacles: Vec<String>,
    #[serde(default)]
    pub max_items_per_llm_call: Option<usize>,
    #[serde(default)]
    pub max_resource_loops: Option<usize>,
    #[serde(default)]
    pub word_doc_title: Option<String>,
}

impl ProjectConfig {
    /// Parse `config.yaml` from a project directory.
    pub fn load(project: &ProjectDir) -> AppResult<Self> {
        let path = project.config_file();
        let text = std::fs::read_to_string(&path).map_err(|e| AppError::io(&path, e))?;
        Self::from_yaml(&text).map_err(|e| AppError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Parse the YAML text of a project configuration.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Goal statement with its trailing period removed.
    pub fn goal(&self) -> AppResult<String> {
        self.future_picture
            .as_deref()
            .map(|g| g.trim_end_matches('.').to_string())
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| AppError::Config {
                message: "future_picture is required in config.yaml".to_string(),
            })
    }

    /// Number of resource prompts issued per solution.
    pub fn resource_loops(&self) -> usize {
        self.max_resource_loops.unwrap_or(1).max(1)
    }

    /// Base name of the DOCX report.
    pub fn doc_title(&self) -> &str {
        self.word_doc_title.as_deref().unwrap_or(&self.root_node_name)
    }
}

/// Which tree file a report reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeFile {
    Obstacles,
    Solutions,
    Resources,
}

impl TreeFile {
    pub fn file_name(&self) -> &'static str {
        match self {
            TreeFile::Obstacles => "o.json",
            TreeFile::Solutions => "s.json",
            TreeFile::Resources => "r.json",
        }
    }

    /// Stem used for report outputs (`r.mm`, `s.mm`).
    pub fn stem(&self) -> &'static str {
        match self {
            TreeFile::Obstacles => "o",
            TreeFile::Solutions => "s",
            TreeFile::Resources => "r",
        }
    }
}

/// Layout of a project directory.
#[derive(Debug, Clone)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    pub fn config_file(&self) -> PathBuf {
        self.join("config.yaml")
    }

    pub fn tree_file(&self, which: TreeFile) -> PathBuf {
        self.join(which.file_name())
    }

    pub fn cache_file(&self) -> PathBuf {
        self.join("cache4.json")
    }

    pub fn raw_resources_file(&self) -> PathBuf {
        self.join("resources-raw.json")
    }

    pub fn resources_file(&self) -> PathBuf {
        self.join("resources.json")
    }

    pub fn log_file(&self, command: &str) -> PathBuf {
        self.join(format!("{command}.log"))
    }
}
