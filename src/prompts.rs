//! Centralized prompt definitions for the pipeline stages
//!
//! Prompt text is part of the cache key: changing a single character here
//! invalidates every cached reply for that prompt.

/// Format instruction closing the obstacles prompt.
pub const OBSTACLES_FORMAT: &str =
    r#"Return a JSON list of dicts, with each dict having key "title" and "description"."#;

/// Format instruction closing the contributing-factors prompt.
pub const FACTORS_FORMAT: &str =
    r#"Create a JSON list of dicts where each sub-obstacle dict has key "title" and "description"."#;

/// Format instruction closing the solutions prompt.
pub const SOLUTIONS_FORMAT: &str =
    r#"Each solution should have the format: {"solution": {"title":"...", "description":"..."}}"#;

/// First obstacles prompt for the goal statement.
///
/// `community_obstacles` are quoted as a bracketed list when present.
pub fn obstacles_prompt(locality: &str, country: &str, goal: &str, community_obstacles: &[String]) -> String {
    let mut text = format!(
        "Produce a list of obstacles specific to {}, {}, to this future picture goal: \"{}\"\n\n",
        locality, country, goal
    );
    if !community_obstacles.is_empty() {
        text.push_str(&format!(
            "Keep in mind the local community's own assessment of the same, which consists of these obstacles: {}.\n\n",
            quoted_list(community_obstacles)
        ));
    }
    text.push_str(OBSTACLES_FORMAT);
    text
}

/// Prompt for the contributing factors of one obstacle.
pub fn factors_prompt(goal: &str, obstacle: &str) -> String {
    format!(
        "The future picture \"{}\" has an obstacle \"{}\".\n\n\
         Produce a list of this obstacle's contributing factors or sub-obstacles.\n\n{}",
        goal, obstacle, FACTORS_FORMAT
    )
}

/// Prompt for community solutions to one obstacle.
pub fn solutions_prompt(locality: &str, country: &str, obstacle: &str) -> String {
    format!(
        "Given this undesired issue in {}, {}: \"{}\", produce a list in json format of potential \
         solutions the community can contribute to, relevant to the local community. {}",
        locality, country, obstacle, SOLUTIONS_FORMAT
    )
}

/// Prompt for existing local efforts implementing one solution.
pub fn resources_prompt(locality: &str, country: &str, solution: &str) -> String {
    format!(
        "We want to list existing efforts in {}, {} that implement this solution:\n\"{}\"\n\
         Can you list and describe each real effort and then mention the organization implementing it, \
         all in JSON format as a plain list of dicts? Include address, email, and valid web page.\n",
        locality, country, solution
    )
}

/// Suffix asking the model to skip already known resources.
pub fn omit_clause(known: &[String]) -> String {
    format!(
        "Please omit the following, since we already know about them: {}",
        known.join(", ")
    )
}

/// `['a', 'b']`, quoting each item with single quotes unless it contains one.
pub fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| {
            if item.contains('\'') && !item.contains('"') {
                format!("\"{}\"", item.replace('\\', "\\\\"))
            } else {
                format!("'{}'", item.replace('\\', "\\\\").replace('\'', "\\'"))
            }
        })
        .collect();
    format!("[{}]", quoted.join(", "))
}
