//! Game document validation and merging.
//!
//! The AI produces whole replacement documents, not structural diffs. Before
//! a document is accepted it is validated here, and elements the AI dropped
//! (objects, variables, layouts present in the current document but missing
//! from the reply) are carried over so a narrow edit never deletes the rest
//! of the game.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One field-keyed validation failure, surfaced to clients as HTTP 422.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// JSON-path-ish location of the problem.
    pub field: String,
    /// What is wrong.
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a game document.
///
/// Structural requirements: top-level object, `properties.name` non-empty
/// string, at least one layout, each layout named and carrying at least one
/// layer, named objects, and no circular object-group memberships.
///
/// # Errors
///
/// Returns every issue found, not just the first.
pub fn validate_game_json(game: &Value) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let Some(root) = game.as_object() else {
        return Err(vec![ValidationIssue::new(
            "",
            "game document must be a JSON object",
        )]);
    };

    match root.get("properties").and_then(Value::as_object) {
        None => issues.push(ValidationIssue::new(
            "properties",
            "missing properties object",
        )),
        Some(properties) => {
            let name_ok = properties
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| !name.trim().is_empty());
            if !name_ok {
                issues.push(ValidationIssue::new(
                    "properties.name",
                    "game must have a non-empty name",
                ));
            }
        }
    }

    let object_names = collect_names(root.get("objects"));
    if root.get("objects").is_some_and(|v| !v.is_array()) {
        issues.push(ValidationIssue::new("objects", "objects must be an array"));
    }

    match root.get("layouts").and_then(Value::as_array) {
        None => issues.push(ValidationIssue::new(
            "layouts",
            "game must have at least one layout (scene)",
        )),
        Some(layouts) if layouts.is_empty() => issues.push(ValidationIssue::new(
            "layouts",
            "game must have at least one layout (scene)",
        )),
        Some(layouts) => {
            for (index, layout) in layouts.iter().enumerate() {
                let layout_name = layout
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if layout_name.is_empty() {
                    issues.push(ValidationIssue::new(
                        format!("layouts[{index}].name"),
                        "layout must be named",
                    ));
                }
                let has_layers = layout
                    .get("layers")
                    .and_then(Value::as_array)
                    .is_some_and(|layers| !layers.is_empty());
                if !has_layers {
                    issues.push(ValidationIssue::new(
                        format!("layouts[{index}].layers"),
                        format!("layout '{layout_name}' must have at least one layer"),
                    ));
                }
                if let Some(events) = layout.get("events").and_then(Value::as_array) {
                    check_event_references(events, &object_names, index, &mut issues);
                }
            }
        }
    }

    if let Some(groups) = root.get("objectsGroups").and_then(Value::as_array) {
        check_group_cycles(groups, &mut issues);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Merge an AI-produced replacement document over the current one,
/// preserving objects, variables, and layouts that the reply dropped.
///
/// The modified document wins wherever names collide; only elements absent
/// from it entirely are carried forward.
#[must_use]
pub fn merge_preserving_existing(current: &Value, modified: Value) -> Value {
    let Some(current_root) = current.as_object() else {
        return modified;
    };
    let mut merged = modified;
    let Some(merged_root) = merged.as_object_mut() else {
        return merged;
    };

    for section in ["objects", "variables", "layouts"] {
        let Some(existing) = current_root.get(section).and_then(Value::as_array) else {
            continue;
        };
        let Some(updated) = merged_root.get_mut(section).and_then(Value::as_array_mut) else {
            continue;
        };

        let kept: HashSet<String> = updated
            .iter()
            .filter_map(|item| item.get("name").and_then(Value::as_str))
            .map(ToOwned::to_owned)
            .collect();

        for item in existing {
            let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
            if !name.is_empty() && !kept.contains(name) {
                updated.push(item.clone());
            }
        }
    }

    merged
}

/// Collect `name` fields from an array of named JSON objects.
fn collect_names(value: Option<&Value>) -> HashSet<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Flag event conditions/actions whose object parameter names nothing in
/// the document's object list.
fn check_event_references(
    events: &[Value],
    object_names: &HashSet<String>,
    layout_index: usize,
    issues: &mut Vec<ValidationIssue>,
) {
    for (event_index, event) in events.iter().enumerate() {
        for section in ["conditions", "actions"] {
            let Some(entries) = event.get(section).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                let Some(object) = entry.get("object").and_then(Value::as_str) else {
                    continue;
                };
                if !object.is_empty() && !object_names.contains(object) {
                    issues.push(ValidationIssue::new(
                        format!("layouts[{layout_index}].events[{event_index}]"),
                        format!("event references unknown object '{object}'"),
                    ));
                }
            }
        }
    }
}

/// Detect cycles in object-group membership with a depth-first walk.
fn check_group_cycles(groups: &[Value], issues: &mut Vec<ValidationIssue>) {
    let mut members: HashMap<&str, Vec<&str>> = HashMap::new();
    for group in groups {
        let Some(name) = group.get("name").and_then(Value::as_str) else {
            continue;
        };
        let children = group
            .get("objects")
            .and_then(Value::as_array)
            .map(|objects| {
                objects
                    .iter()
                    .filter_map(|o| o.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        members.insert(name, children);
    }

    for group_name in members.keys() {
        let mut visited = Vec::new();
        if has_cycle(group_name, &members, &mut visited) {
            issues.push(ValidationIssue::new(
                "objectsGroups",
                format!("circular dependency detected in object group: {group_name}"),
            ));
        }
    }
}

fn has_cycle<'a>(
    group: &'a str,
    members: &HashMap<&str, Vec<&'a str>>,
    visited: &mut Vec<&'a str>,
) -> bool {
    if visited.contains(&group) {
        return true;
    }
    visited.push(group);
    let result = members.get(group).is_some_and(|children| {
        children
            .iter()
            .filter(|child| members.contains_key(*child))
            .any(|child| has_cycle(child, members, visited))
    });
    visited.pop();
    result
}
