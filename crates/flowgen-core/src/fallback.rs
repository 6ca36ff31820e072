//! Model-free flowchart built straight from the feature selection.

use std::collections::HashSet;

use crate::rules::{
    is_keyword, END_CLASS, END_CLASS_DEF, END_NODE_ID, INDENT, RECOMMENDED_CLASS,
    RECOMMENDED_CLASS_DEF, REQUIRED_CLASS, REQUIRED_CLASS_DEF, START_CLASS, START_CLASS_DEF,
    START_NODE_ID,
};
use crate::{FeatureCatalog, FeatureCategory, FeatureRef, Priority};

pub const MAX_FALLBACK_FEATURES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FallbackNode {
    id: String,
    label: String,
    class: &'static str,
}

/// Build a linear `start -> features -> end` diagram.
///
/// Only the first [`MAX_FALLBACK_FEATURES`] selections are drawn, in selection
/// order. The output is already in sanitized form.
pub fn synthesize_fallback(archetype: &str, features: &[FeatureRef], catalog: &FeatureCatalog) -> String {
    let nodes = fallback_nodes(archetype, features, catalog);

    let mut lines = vec![
        "flowchart TD".to_string(),
        format!("{INDENT}{START_NODE_ID}([\"Start\"]):::{START_CLASS}"),
    ];
    lines.extend(
        nodes
            .iter()
            .map(|n| format!("{INDENT}{}[\"{}\"]:::{}", n.id, n.label, n.class)),
    );
    lines.push(format!("{INDENT}{END_NODE_ID}([\"End\"]):::{END_CLASS}"));
    lines.push(String::new());

    let path: Vec<&str> = std::iter::once(START_NODE_ID)
        .chain(nodes.iter().map(|n| n.id.as_str()))
        .chain(std::iter::once(END_NODE_ID))
        .collect();
    lines.extend(
        path.windows(2)
            .map(|pair| format!("{INDENT}{} --> {}", pair[0], pair[1])),
    );
    lines.push(String::new());

    for class_def in [
        REQUIRED_CLASS_DEF,
        RECOMMENDED_CLASS_DEF,
        START_CLASS_DEF,
        END_CLASS_DEF,
    ] {
        lines.push(format!("{INDENT}{class_def}"));
    }
    lines.join("\n")
}

fn fallback_nodes(archetype: &str, features: &[FeatureRef], catalog: &FeatureCatalog) -> Vec<FallbackNode> {
    let mut used: HashSet<String> = [START_NODE_ID, END_NODE_ID]
        .iter()
        .map(|id| id.to_ascii_lowercase())
        .collect();

    features
        .iter()
        .take(MAX_FALLBACK_FEATURES)
        .enumerate()
        .map(|(i, feature)| {
            let mut id = safe_id(&feature.key, i);
            if used.contains(&id.to_ascii_lowercase()) || is_keyword(&id) {
                id = format!("{id}_{i}");
            }
            used.insert(id.to_ascii_lowercase());

            FallbackNode {
                id,
                label: humanize(&feature.key, i),
                class: node_class(archetype, feature, catalog),
            }
        })
        .collect()
}

/// Key with everything but ASCII letters and digits removed, or `Feature{i}`.
pub fn safe_id(key: &str, index: usize) -> String {
    let id: String = key.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if id.is_empty() {
        format!("Feature{index}")
    } else {
        id
    }
}

/// `productCatalog` -> `Product Catalog`, `live_chat` -> `Live chat`.
fn humanize(key: &str, index: usize) -> String {
    let mut words = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if !c.is_alphanumeric() {
            words.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            words.push(' ');
        }
        prev_lower = c.is_lowercase() || c.is_numeric();
        words.push(c);
    }

    let words: Vec<&str> = words.split_whitespace().collect();
    if words.is_empty() {
        return format!("Feature {}", index + 1);
    }
    let joined = words.join(" ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => joined,
    }
}

fn node_class(archetype: &str, feature: &FeatureRef, catalog: &FeatureCatalog) -> &'static str {
    match catalog.resolve(archetype, feature) {
        Some(detail) if detail.priority == Priority::Required => REQUIRED_CLASS,
        Some(_) => RECOMMENDED_CLASS,
        None if feature.category == Some(FeatureCategory::Core) => REQUIRED_CLASS,
        None => RECOMMENDED_CLASS,
    }
}
