//! Shared builders for merge integration tests.
//!
//! Documents are assembled by hand with small fixed ids so expectations read
//! as literals: components at 1.., nodes at 10.., params at 60... Every
//! helper keeps the document structurally valid (parent pointers wired both
//! ways), so builders can be chained freely before calling the engine.

#![allow(dead_code)]

use weft::model::conflict::{Picks, Side};
use weft::model::document::{Component, Document};
use weft::model::ids::ObjectId;
use weft::model::path::ModelPath;
use weft::model::tpl::{TplKind, TplNode};

pub fn id(n: u128) -> ObjectId {
    ObjectId::new(n)
}

/// Insert a tag node, wiring it under `parent` when given.
pub fn tag(doc: &mut Document, node: u128, name: &str, parent: Option<u128>) {
    let mut n = TplNode::tag(id(node), name);
    n.parent = parent.map(id);
    doc.insert_node(n);
    if let Some(p) = parent {
        push_child(doc, p, node);
    }
}

/// Append a child to a tag node's child list.
pub fn push_child(doc: &mut Document, parent: u128, child: u128) {
    if let Some(TplKind::Tag { children, .. }) = doc.node_mut(id(parent)).map(|n| &mut n.kind) {
        children.push(id(child));
    }
}

/// "Card" (component 1): root div 10 holding spans 11, 12, 13.
pub fn card() -> Document {
    let mut doc = Document::new();
    tag(&mut doc, 10, "div", None);
    tag(&mut doc, 11, "span", Some(10));
    tag(&mut doc, 12, "span", Some(10));
    tag(&mut doc, 13, "span", Some(10));
    doc.components.push(Component::new(id(1), "Card", id(10)));
    doc
}

/// Overwrite a tag node's child order.
pub fn set_children(doc: &mut Document, node: u128, order: &[u128]) {
    if let Some(TplKind::Tag { children, .. }) = doc.node_mut(id(node)).map(|n| &mut n.kind) {
        *children = order.iter().copied().map(id).collect();
    }
}

/// Child ids of a node, as raw numbers for terse assertions.
pub fn children_of(doc: &Document, node: u128) -> Vec<u128> {
    doc.tpl_children(id(node))
        .into_iter()
        .map(|c| c.as_u128())
        .collect()
}

/// Move a node under a new parent, appended to its child list.
pub fn move_under(doc: &mut Document, node: u128, new_parent: u128) {
    if let Some(old) = doc.node(id(node)).and_then(|n| n.parent) {
        doc.detach_child(old, id(node));
    }
    push_child(doc, new_parent, node);
    if let Some(n) = doc.node_mut(id(node)) {
        n.parent = Some(id(new_parent));
    }
}

/// Delete a node and its whole subtree.
pub fn delete_subtree(doc: &mut Document, node: u128) {
    if let Some(parent) = doc.node(id(node)).and_then(|n| n.parent) {
        doc.detach_child(parent, id(node));
    }
    for gone in doc.flatten_owned(id(node)) {
        doc.remove_node(gone);
    }
}

// ---------------------------------------------------------------------------
// Conflict paths and picks
// ---------------------------------------------------------------------------

pub fn component_path(comp: u128) -> ModelPath {
    ModelPath::root().field("components").id(id(comp))
}

pub fn name_path(comp: u128) -> ModelPath {
    component_path(comp).field("name")
}

pub fn parent_path(comp: u128, node: u128) -> ModelPath {
    component_path(comp).field("tpl").id(id(node)).field("parent")
}

pub fn children_order_path(comp: u128, node: u128) -> ModelPath {
    component_path(comp)
        .field("tpl")
        .id(id(node))
        .field("children_order")
}

/// A pick set resolving a single conflict.
pub fn pick_one(path: ModelPath, side: Side) -> Picks {
    let mut picks = Picks::new();
    picks.insert(path, side);
    picks
}
