//! Starting a new blind from the current one.
//!
//! Cloning copies the rat layer, puts the copy on top, and hides and locks
//! the original so it stays in the drawing as a record of the previous
//! blind.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::{Name, Namespaces};
use crate::document::{Document, NodeId};
use crate::error::HideRatsError;

/// Label used when sibling layer labels do not agree on a name.
pub const DEFAULT_BLIND_NAME: &str = "Blind";

static BLIND_LABEL: OnceLock<Regex> = OnceLock::new();

/// `[o...] name <number>`
fn blind_label_regex() -> &'static Regex {
    BLIND_LABEL.get_or_init(|| Regex::new(r"^(\[o.*?\].*?)\s+(\d+)\s*$").expect("invalid regex pattern"))
}

/// Label for the next blind under `parent`.
///
/// Sibling layers labelled like `[o] Blind 2` supply the name (when they
/// all agree on it) and the highest number so far.
pub fn dwim_layer_name(doc: &Document, ns: &Namespaces, parent: NodeId) -> String {
    let re = blind_label_regex();
    let mut names = BTreeSet::new();
    let mut max_index = 0u64;
    for layer in doc.element_children(parent).filter(|&n| doc.is_layer(ns, n)) {
        let Some(caps) = doc.label(ns, layer).and_then(|label| re.captures(label)) else {
            continue;
        };
        names.insert(caps[1].to_string());
        if let Ok(index) = caps[2].parse::<u64>() {
            max_index = max_index.max(index);
        }
    }
    let name = match names.len() {
        1 => names.into_iter().next().unwrap_or_else(|| DEFAULT_BLIND_NAME.to_string()),
        _ => DEFAULT_BLIND_NAME.to_string(),
    };
    format!("{} {}", name, max_index.saturating_add(1))
}

/// Copy `rat_layer` into a new blind.
///
/// Ids are stripped from the copy so the document stays id-unique; the
/// copies of `rats` get fresh ids and are returned in the same order.
pub fn clone_rat_layer(
    doc: &mut Document,
    ns: &Namespaces,
    rat_layer: NodeId,
    rats: &[NodeId],
) -> Result<(NodeId, Vec<NodeId>), HideRatsError> {
    let parent = doc
        .parent(rat_layer)
        .ok_or_else(|| HideRatsError::Structure("rat layer has no parent".to_string()))?;
    let label = dwim_layer_name(doc, ns, parent);

    let copy = doc.deep_copy(rat_layer);
    // Same shape, so pre-order positions correspond.
    let originals = doc.descendants(rat_layer);
    let copies = doc.descendants(copy);
    for &node in &copies {
        doc.remove_attr(node, Name::plain("id"));
    }
    let new_rats: Vec<NodeId> = rats
        .iter()
        .filter_map(|rat| originals.iter().position(|n| n == rat))
        .map(|index| copies[index])
        .collect();

    doc.set_attr(copy, ns.label(), label);
    doc.insert_child(parent, 0, copy);
    for &rat in &new_rats {
        let id = doc.unique_id("rat");
        doc.set_attr(rat, Name::plain("id"), id);
    }

    doc.set_style_property(rat_layer, "display", "none");
    doc.set_sensitive(ns, rat_layer, false);
    Ok((copy, new_rats))
}
