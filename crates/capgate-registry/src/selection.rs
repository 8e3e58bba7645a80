//! Toolset Selection
//!
//! Helpers for turning configuration input (`--toolsets`, `--tools`) into
//! clean name lists, expanding the `default` keyword, and rendering the
//! toolsets help text.

use std::collections::HashSet;

use crate::registry::Registry;
use crate::toolset::{ToolsetId, TOOLSET_DEFAULT};

const HELP_LINE_WIDTH: usize = 70;

/// Trim whitespace, drop empty entries and duplicates, keep first-occurrence order.
pub fn clean_tools<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed) {
            result.push(trimmed.to_string());
        }
    }
    result
}

/// Split a comma-separated configuration value and clean it.
pub fn parse_list(value: &str) -> Vec<String> {
    let parts: Vec<&str> = value.split(',').collect();
    clean_tools(&parts)
}

/// Replace the `default` keyword with the given default toolset IDs.
///
/// Expansion happens once and never duplicates a toolset that was already
/// listed explicitly. Input without the keyword is returned unchanged.
pub fn expand_default_toolset(requested: &[String], default_ids: &[ToolsetId]) -> Vec<String> {
    if !contains_toolset(requested, TOOLSET_DEFAULT) {
        return requested.to_vec();
    }

    let mut result = remove_toolset(requested, TOOLSET_DEFAULT);
    let mut seen: HashSet<String> = result.iter().cloned().collect();
    for id in default_ids {
        if seen.insert(id.as_str().to_string()) {
            result.push(id.as_str().to_string());
        }
    }
    result
}

pub fn remove_toolset(toolsets: &[String], to_remove: &str) -> Vec<String> {
    toolsets.iter().filter(|t| *t != to_remove).cloned().collect()
}

pub fn contains_toolset(toolsets: &[String], to_check: &str) -> bool {
    toolsets.iter().any(|t| t == to_check)
}

/// Help text for the toolsets option, listing every toolset in `registry`
/// and its defaults.
pub fn toolsets_help(registry: &Registry) -> String {
    let defaults: Vec<String> = registry
        .default_toolset_ids()
        .iter()
        .map(ToString::to_string)
        .collect();

    let mut lines = Vec::new();
    let mut current = String::new();
    for toolset in registry.available_toolsets() {
        let id = toolset.id.as_str();
        if current.is_empty() {
            current.push_str(id);
        } else if current.len() + id.len() + 2 <= HELP_LINE_WIDTH {
            current.push_str(", ");
            current.push_str(id);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(id);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    format!(
        "Comma-separated list of tool groups to enable (no spaces).\n\
         Available: {}\n\
         Special toolset keywords:\n  \
         - all: Enables all available toolsets\n  \
         - default: Enables the default toolset configuration of:\n\t     {}\n\
         Examples:\n  \
         - --toolsets=actions,gists,notifications\n  \
         - Default + additional: --toolsets=default,actions,gists\n  \
         - All tools: --toolsets=all",
        lines.join(",\n\t     "),
        defaults.join(", ")
    )
}
