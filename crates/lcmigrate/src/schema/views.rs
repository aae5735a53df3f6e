//! View dependency scanning and creation ordering.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::core::schema::ViewDef;

// Relation after FROM/JOIN, possibly behind an opening paren and a dotted
// qualifier. The last path segment is the relation name.
static FROM_JOIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:FROM|JOIN)[\s(]+(?:(?:`[^`]+`|"[^"]+"|\w+)\s*\.\s*)*(?:`([^`]+)`|"([^"]+)"|(\w+))"#,
    )
    .expect("valid view dependency regex")
});

/// Names following `FROM`/`JOIN` in a view definition, first occurrence first.
///
/// Qualified names (`db`.`view`, schema.view) yield their last segment.
/// Subqueries and comments are not understood.
pub fn extract_view_dependencies(definition: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    FROM_JOIN_RE
        .captures_iter(definition)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Order views so every view comes after the views it references.
///
/// References to anything that is not in `views` are ignored. If some views
/// depend on each other in a cycle, the input order is returned unchanged.
pub fn resolve_view_order(views: Vec<ViewDef>) -> Vec<ViewDef> {
    let names: HashSet<&str> = views.iter().map(|v| v.name.as_str()).collect();

    let mut placed: HashSet<&str> = HashSet::with_capacity(views.len());
    let mut order: Vec<usize> = Vec::with_capacity(views.len());

    while order.len() < views.len() {
        let before = order.len();
        for (idx, view) in views.iter().enumerate() {
            if placed.contains(view.name.as_str()) {
                continue;
            }
            let ready = view
                .dependencies
                .iter()
                .filter(|dep| names.contains(dep.as_str()) && dep.as_str() != view.name)
                .all(|dep| placed.contains(dep.as_str()));
            if ready {
                placed.insert(view.name.as_str());
                order.push(idx);
            }
        }

        if order.len() == before {
            let stuck: Vec<&str> = views
                .iter()
                .map(|v| v.name.as_str())
                .filter(|name| !placed.contains(name))
                .collect();
            warn!(
                "Circular view dependencies among {}; keeping catalog order",
                stuck.join(", ")
            );
            return views;
        }
    }

    let mut slots: Vec<Option<ViewDef>> = views.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}
