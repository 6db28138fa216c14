//! Strategy-driven reconciliation of an existing configuration tree with an
//! incoming one.
//!
//! Generic merging operates over `serde_json::Value` so arbitrary nested
//! settings can be reconciled without a schema; the keyed collections with
//! known identity semantics (MCP server registries, profile maps, workflow
//! name lists) get specialized merges instead of blind recursion.

use crate::manifest::ConfigCategory;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Policy governing how incoming configuration is reconciled with existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MergeStrategy {
    /// Incoming wholly supersedes existing.
    Replace,
    /// Deep merge; incoming wins on scalar conflicts.
    Merge,
    /// Existing values are preserved; only new keys are added.
    SkipExisting,
}

/// Suggested or chosen resolution for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    UseExisting,
    UseIncoming,
    Merge,
    Rename,
}

/// A detected disagreement between existing and incoming configuration.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub category: ConfigCategory,
    /// Dotted path (generic trees) or element name (keyed collections).
    pub name: String,
    pub existing: Value,
    pub incoming: Value,
    pub suggestion: Resolution,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub value: Value,
    pub conflicts: Vec<Conflict>,
}

// =============================================================================
// Generic tree merge
// =============================================================================

/// Merge two configuration trees under the given strategy.
///
/// Under `SkipExisting`, a key present on both sides is recorded as a
/// conflict only when the two values differ; keys whose values already
/// agree are kept silently.
pub fn merge_configs(
    existing: &Value,
    incoming: &Value,
    strategy: MergeStrategy,
    category: ConfigCategory,
) -> MergeOutcome {
    match strategy {
        MergeStrategy::Replace => MergeOutcome {
            value: incoming.clone(),
            conflicts: Vec::new(),
        },
        MergeStrategy::Merge | MergeStrategy::SkipExisting => {
            let mut conflicts = Vec::new();
            let value = merge_value(existing, incoming, strategy, category, "", &mut conflicts);
            MergeOutcome { value, conflicts }
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn merge_value(
    existing: &Value,
    incoming: &Value,
    strategy: MergeStrategy,
    category: ConfigCategory,
    path: &str,
    conflicts: &mut Vec<Conflict>,
) -> Value {
    match (existing, incoming) {
        // Object subtrees are recursed into rather than treated as leaves.
        (Value::Object(a), Value::Object(b)) => {
            let mut out = a.clone();
            for (key, incoming_child) in b {
                let child_path = join_path(path, key);
                match a.get(key) {
                    Some(existing_child) => {
                        let merged = merge_value(
                            existing_child,
                            incoming_child,
                            strategy,
                            category,
                            &child_path,
                            conflicts,
                        );
                        out.insert(key.clone(), merged);
                    }
                    None => {
                        out.insert(key.clone(), incoming_child.clone());
                    }
                }
            }
            Value::Object(out)
        }
        // Arrays are compared by serialized equality and merged as a
        // deduplicated union.
        (Value::Array(a), Value::Array(b)) => {
            if a == b {
                return existing.clone();
            }
            let union = array_union(a, b);
            match strategy {
                MergeStrategy::Merge => {
                    conflicts.push(Conflict {
                        category,
                        name: path.to_string(),
                        existing: existing.clone(),
                        incoming: incoming.clone(),
                        suggestion: Resolution::Merge,
                    });
                    Value::Array(union)
                }
                _ => {
                    conflicts.push(Conflict {
                        category,
                        name: path.to_string(),
                        existing: existing.clone(),
                        incoming: incoming.clone(),
                        suggestion: Resolution::UseExisting,
                    });
                    existing.clone()
                }
            }
        }
        _ => {
            if existing == incoming {
                return existing.clone();
            }
            match strategy {
                MergeStrategy::Merge => {
                    conflicts.push(Conflict {
                        category,
                        name: path.to_string(),
                        existing: existing.clone(),
                        incoming: incoming.clone(),
                        suggestion: Resolution::UseIncoming,
                    });
                    incoming.clone()
                }
                _ => {
                    conflicts.push(Conflict {
                        category,
                        name: path.to_string(),
                        existing: existing.clone(),
                        incoming: incoming.clone(),
                        suggestion: Resolution::UseExisting,
                    });
                    existing.clone()
                }
            }
        }
    }
}

fn array_union(a: &[Value], b: &[Value]) -> Vec<Value> {
    let mut union = a.to_vec();
    for item in b {
        if !union.contains(item) {
            union.push(item.clone());
        }
    }
    union
}

// =============================================================================
// Keyed-collection merges
// =============================================================================

/// Merge two name-keyed object maps (MCP registries, profile maps).
///
/// Elements are compared whole: a key present on both sides with different
/// content is one conflict, never a recursive diff.
fn merge_keyed_map(
    existing: &Map<String, Value>,
    incoming: &Map<String, Value>,
    strategy: MergeStrategy,
    category: ConfigCategory,
) -> (Map<String, Value>, Vec<Conflict>) {
    let mut conflicts = Vec::new();

    if strategy == MergeStrategy::Replace {
        return (incoming.clone(), conflicts);
    }

    let mut out = existing.clone();
    for (name, incoming_entry) in incoming {
        match existing.get(name) {
            Some(existing_entry) if existing_entry != incoming_entry => {
                let (winner, suggestion) = match strategy {
                    MergeStrategy::Merge => (incoming_entry.clone(), Resolution::UseIncoming),
                    _ => (existing_entry.clone(), Resolution::UseExisting),
                };
                conflicts.push(Conflict {
                    category,
                    name: name.clone(),
                    existing: existing_entry.clone(),
                    incoming: incoming_entry.clone(),
                    suggestion,
                });
                out.insert(name.clone(), winner);
            }
            Some(_) => {}
            None => {
                out.insert(name.clone(), incoming_entry.clone());
            }
        }
    }
    (out, conflicts)
}

/// Registry values may either be the bare name-keyed map or wrap it under
/// `mcpServers`.
fn registry_servers(value: &Value) -> Map<String, Value> {
    value
        .get("mcpServers")
        .and_then(|v| v.as_object())
        .or_else(|| value.as_object())
        .cloned()
        .unwrap_or_default()
}

/// Merge MCP server registries keyed by server name.
pub fn merge_mcp_servers(
    existing: &Value,
    incoming: &Value,
    strategy: MergeStrategy,
) -> MergeOutcome {
    let wrapped = existing.get("mcpServers").is_some() || incoming.get("mcpServers").is_some();
    let (merged, conflicts) = merge_keyed_map(
        &registry_servers(existing),
        &registry_servers(incoming),
        strategy,
        ConfigCategory::Mcp,
    );
    let value = if wrapped {
        let mut root = Map::new();
        root.insert("mcpServers".to_string(), Value::Object(merged));
        Value::Object(root)
    } else {
        Value::Object(merged)
    };
    MergeOutcome { value, conflicts }
}

/// Merge named profile maps keyed by profile name.
pub fn merge_profiles(existing: &Value, incoming: &Value, strategy: MergeStrategy) -> MergeOutcome {
    let empty = Map::new();
    let (merged, conflicts) = merge_keyed_map(
        existing.as_object().unwrap_or(&empty),
        incoming.as_object().unwrap_or(&empty),
        strategy,
        ConfigCategory::Profiles,
    );
    MergeOutcome {
        value: Value::Object(merged),
        conflicts,
    }
}

/// Merge workflow name lists with set semantics.
pub fn merge_workflow_names(
    existing: &[String],
    incoming: &[String],
    strategy: MergeStrategy,
) -> (Vec<String>, Vec<Conflict>) {
    match strategy {
        MergeStrategy::Replace => (incoming.to_vec(), Vec::new()),
        MergeStrategy::Merge | MergeStrategy::SkipExisting => {
            let mut out = existing.to_vec();
            let mut conflicts = Vec::new();
            for name in incoming {
                if existing.contains(name) {
                    conflicts.push(Conflict {
                        category: ConfigCategory::Workflows,
                        name: name.clone(),
                        existing: Value::String(name.clone()),
                        incoming: Value::String(name.clone()),
                        suggestion: if strategy == MergeStrategy::Merge {
                            Resolution::Merge
                        } else {
                            Resolution::UseExisting
                        },
                    });
                } else {
                    out.push(name.clone());
                }
            }
            (out, conflicts)
        }
    }
}

// =============================================================================
// Conflict resolution
// =============================================================================

/// Apply caller-supplied resolutions to a merged config.
///
/// Conflicts without an explicit choice leave the config untouched.
/// Keyed-collection conflicts (MCP servers, profiles, workflows) name one
/// flat key; only generic-tree conflicts carry dotted paths.
pub fn resolve_conflicts(
    config: &Value,
    conflicts: &[Conflict],
    choices: &HashMap<String, Resolution>,
) -> Value {
    let mut out = config.clone();
    for conflict in conflicts {
        let Some(choice) = choices.get(&conflict.name) else {
            continue;
        };
        let flat = uses_flat_keys(conflict.category);
        match choice {
            Resolution::UseExisting => {
                set_value(&mut out, &conflict.name, conflict.existing.clone(), flat);
            }
            Resolution::UseIncoming => {
                set_value(&mut out, &conflict.name, conflict.incoming.clone(), flat);
            }
            Resolution::Merge => {
                if let Some(merged) = merge_both(&conflict.existing, &conflict.incoming) {
                    set_value(&mut out, &conflict.name, merged, flat);
                }
            }
            Resolution::Rename => {
                let renamed = format!("{}-imported", conflict.name);
                set_value(&mut out, &conflict.name, conflict.existing.clone(), flat);
                set_value(&mut out, &renamed, conflict.incoming.clone(), flat);
            }
        }
    }
    out
}

/// Collections whose conflict names are element keys, which may legally
/// contain dots (a server registered as `my.server`).
fn uses_flat_keys(category: ConfigCategory) -> bool {
    matches!(
        category,
        ConfigCategory::Mcp | ConfigCategory::Profiles | ConfigCategory::Workflows
    )
}

fn set_value(root: &mut Value, name: &str, value: Value, flat: bool) {
    if flat {
        if let Some(map) = root.as_object_mut() {
            map.insert(name.to_string(), value);
        }
    } else {
        set_by_path(root, name, value);
    }
}

/// Merge applies only when both sides are objects or both are arrays.
fn merge_both(existing: &Value, incoming: &Value) -> Option<Value> {
    match (existing, incoming) {
        (Value::Object(a), Value::Object(b)) => {
            let mut out = a.clone();
            for (k, v) in b {
                out.insert(k.clone(), v.clone());
            }
            Some(Value::Object(out))
        }
        (Value::Array(a), Value::Array(b)) => Some(Value::Array(array_union(a, b))),
        _ => None,
    }
}

/// Set a value at a dotted path, creating intermediate objects as needed.
fn set_by_path(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        if i == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}
