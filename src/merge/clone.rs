//! Cross-document cloning (the identity-resolver capability).
//!
//! Merge passes never reuse a node reference across documents: anything a
//! branch introduced is copied into the merged document through these
//! functions, with identity preserved verbatim and nested children cloned by
//! explicit worklist. Fresh-identity cloning exists only for materializing
//! default slot contents, which have no identity on any branch.

use std::collections::BTreeMap;

use crate::error::MergeError;
use crate::model::document::Document;
use crate::model::ids::ObjectId;
use crate::model::tpl::{ArgValue, TplKind, TplNode};

/// Clone `id` and every node it transitively owns from `source` into
/// `merged`, preserving identities and parent pointers. Nodes already present
/// in `merged` are left untouched.
///
/// # Errors
/// Fails if `source` does not contain a node the subtree references.
pub(crate) fn ensure_node(
    source: &Document,
    merged: &mut Document,
    id: ObjectId,
) -> Result<(), MergeError> {
    let mut stack = vec![id];
    while let Some(cur) = stack.pop() {
        if merged.contains_node(cur) {
            continue;
        }
        let node = source
            .node(cur)
            .ok_or(MergeError::MissingObject { what: "node", id: cur })?;
        merged.insert_node(node.clone());
        stack.extend(source.owned_children(cur));
    }
    Ok(())
}

/// Clone a component (and its whole tree) from `source` into `merged`,
/// appending it to the component list. A component already present is left
/// untouched.
///
/// # Errors
/// Fails if `source` lacks the component or part of its tree.
pub(crate) fn ensure_component(
    source: &Document,
    merged: &mut Document,
    id: ObjectId,
) -> Result<(), MergeError> {
    if merged.has_component(id) {
        return Ok(());
    }
    let comp = source
        .component(id)
        .ok_or(MergeError::MissingObject { what: "component", id })?
        .clone();
    ensure_node(source, merged, comp.root)?;
    merged.components.push(comp);
    Ok(())
}

/// Copy the subtree under `root` within `doc`, assigning every copy a fresh
/// random identity and remapping all internal references. Returns the copy's
/// root id; its parent pointer is cleared for the caller to set.
///
/// # Errors
/// Fails if `root` (or an owned descendant) is missing from `doc`.
pub(crate) fn clone_subtree_fresh(
    doc: &mut Document,
    root: ObjectId,
) -> Result<ObjectId, MergeError> {
    if !doc.contains_node(root) {
        return Err(MergeError::MissingObject { what: "node", id: root });
    }
    let order = doc.flatten_owned(root);
    let mut copies = Vec::with_capacity(order.len());
    for &old in &order {
        let node = doc
            .node(old)
            .ok_or(MergeError::MissingObject { what: "node", id: old })?
            .clone();
        copies.push(node);
    }
    let map: BTreeMap<ObjectId, ObjectId> =
        order.iter().map(|&old| (old, ObjectId::random())).collect();
    let remap = |id: &mut ObjectId| {
        if let Some(&new) = map.get(id) {
            *id = new;
        }
    };
    for mut node in copies {
        node.id = map[&node.id];
        node.parent = node.parent.and_then(|p| map.get(&p).copied());
        match &mut node.kind {
            TplKind::Tag { children, .. } => children.iter_mut().for_each(remap),
            TplKind::Slot {
                default_contents, ..
            } => default_contents.iter_mut().for_each(remap),
            TplKind::Instance { .. } => {}
        }
        for vs in &mut node.vsettings {
            for arg in &mut vs.args {
                match &mut arg.value {
                    ArgValue::Content { children } => children.iter_mut().for_each(remap),
                    ArgValue::UseDefault { contents } => contents.iter_mut().for_each(remap),
                    ArgValue::Scalar { .. } => {}
                }
            }
        }
        doc.insert_node(node);
    }
    Ok(map[&root])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
