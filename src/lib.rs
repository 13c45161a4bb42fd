//! # GOSR
//!
//! Goal → Obstacles → Solutions → Resources. Starting from a goal statement
//! in a project's `config.yaml`, an LLM is asked, stage by stage, for the
//! obstacles in the way, the factors behind each obstacle, community
//! solutions to every leaf obstacle, and local organizations already
//! implementing each solution. Every stage expands the leaves of a tree and
//! persists it as JSON; the final tree and resource list feed the report
//! exports.
//!
//! ## Pipeline
//!
//! ```text
//! config.yaml → g2o → o.json → o2s → s.json → s2r → r.json + resources-raw.json
//!                                                        ↓ resources
//!                                  mindmap / doc / csv / maps ← resources.json
//! ```
//!
//! Model replies are cached per prompt in `cache4.json`, so rerunning a stage
//! replays it without network traffic.

/// Command line parsing and dispatch.
pub mod cli;
/// Process and project configuration.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Chat backend, reply cache and retrying caller.
pub mod llm;
/// Tracing setup and log rotation.
pub mod logging;
/// Reduction of free-form model output to title/description records.
pub mod normalize;
/// Indented outline text to tree nodes.
pub mod outline;
/// Progress lines printed by long-running stages.
pub mod progress;
/// Prompt templates.
pub mod prompts;
/// Mind map, document, CSV and map exports.
pub mod reports;
/// Resource records, website checks and statistics.
pub mod resources;
/// The LLM-backed stages and resource maintenance commands.
pub mod stages;
/// Tagged tree store.
pub mod tree;

pub use config::{Config, ProjectConfig, ProjectDir};
pub use error::{AppError, AppResult};
pub use tree::{NodeTag, Tree};
