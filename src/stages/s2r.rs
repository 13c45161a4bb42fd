use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{prompt_subject, StageContext, StageReport};
use crate::config::TreeFile;
use crate::error::AppResult;
use crate::progress::progress_line;
use crate::prompts::{omit_clause, resources_prompt};
use crate::resources::{load_raw, organization_value, program_value, resource_stats, save_raw};
use crate::tree::NodeTag;

/// Solutions → resources.
///
/// Loads `s.json` and any existing `resources.json`, asks for local efforts
/// implementing every leaf solution, appends them to the flat resource list
/// with sequential ids, and hangs `{id}` references under the solution.
/// Writes `resources-raw.json` and `r.json`.
pub async fn solutions_to_resources(ctx: &mut StageContext) -> AppResult<StageReport> {
    ctx.load_tree(TreeFile::Solutions)?;
    let mut report = StageReport::default();

    let existing = ctx.project.resources_file();
    let mut raw: Vec<Value> = if existing.exists() {
        info!("Loading existing resources");
        load_raw(&existing)?
    } else {
        Vec::new()
    };

    let leaves = ctx.tree.leaves();
    let total = leaves.len();

    for (i, leaf) in leaves.iter().enumerate() {
        report.leaves += 1;
        let solution = prompt_subject(&ctx.tree, leaf);
        println!("{} {}", progress_line(i + 1, total), solution);

        let Some(mut found) = harvest_resources(ctx, &solution).await? else {
            report.skipped += 1;
            continue;
        };
        if let Some(max) = ctx.config.max_items_per_llm_call {
            found.truncate(max);
        }

        ctx.tree.set_tag(leaf, NodeTag::Solution)?;
        for mut resource in found {
            if !resource.is_object() {
                warn!(resource = %resource, "Ignoring non-object resource");
                continue;
            }
            let id = raw.len() as u64;
            if let Value::Object(fields) = &mut resource {
                fields.insert("id".to_string(), json!(id));
            }
            raw.push(resource);
            ctx.tree.add_child(leaf, NodeTag::Resource, json!({ "id": id }))?;
            report.added += 1;
        }

        save_raw(&ctx.project.raw_resources_file(), &raw)?;
        ctx.save_tree(TreeFile::Resources)?;
        ctx.flush_cache()?;
        resource_stats(&raw);
    }

    ctx.save_tree(TreeFile::Resources)?;
    info!(
        leaves = report.leaves,
        added = report.added,
        skipped = report.skipped,
        "Solutions to resources complete"
    );
    Ok(report)
}

/// Collect raw resource objects for one solution.
///
/// Runs up to `max_resource_loops` prompts, each later one asking the model
/// to omit the names already found. Accepts a list, a single resource, or a
/// mapping whose values are lists or resources. `None` when the first prompt
/// exhausted its retries.
pub async fn harvest_resources(ctx: &mut StageContext, solution: &str) -> AppResult<Option<Vec<Value>>> {
    let base = resources_prompt(&ctx.config.locality, &ctx.config.country, solution);
    let mut found: Vec<Value> = Vec::new();
    let mut omit = String::new();

    for round in 0..ctx.config.resource_loops() {
        let Some(reply) = ctx.ask(&format!("{}{}", base, omit)).await? else {
            if round == 0 {
                return Ok(None);
            }
            break;
        };

        let reply = match reply {
            Value::Array(items) if !items.is_empty() => {
                let mut wrapper = Map::new();
                wrapper.insert("wrap_list".to_string(), Value::Array(items));
                Value::Object(wrapper)
            }
            other => other,
        };

        if program_value(&reply).is_some() && organization_value(&reply).is_some() {
            found.push(reply);
            break;
        }
        let map = match reply {
            Value::Object(map) => map,
            other => {
                warn!(reply = %other, "Unknown data value returned");
                break;
            }
        };
        if map.get("status").and_then(Value::as_str) == Some("error") {
            break;
        }
        if !map.values().next().is_some_and(Value::is_array) {
            warn!(keys = ?map.keys().collect::<Vec<_>>(), "Unknown data value returned");
            break;
        }

        for (key, value) in map {
            match value {
                Value::Array(items) => found.extend(items),
                Value::Object(_) => {
                    if program_value(&value).is_some() && organization_value(&value).is_some() {
                        found.push(value);
                    } else {
                        warn!(key = %key, value = %value, "Value does not look like a resource");
                    }
                }
                other => info!(key = %key, value = %other, "Ignoring non-list, non-dict value"),
            }
        }

        let known: Vec<String> = found
            .iter()
            .filter_map(|r| r.get("name"))
            .map(|name| match name {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        omit = omit_clause(&known);
    }

    Ok(Some(found))
}
