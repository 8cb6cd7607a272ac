//! Default-slot materialization.
//!
//! After a merge, every component instance must carry a binding for every
//! slot its component declares, and every virtual ("use default") binding
//! must hold a materialized copy of the slot's default contents. Components
//! are processed in instantiation order — a component is fixed before any
//! tree that instantiates it — so copied defaults are themselves complete.
//! The pass is idempotent: only missing args are added and only empty caches
//! are filled.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::error::MergeError;
use crate::merge::clone::clone_subtree_fresh;
use crate::model::document::Document;
use crate::model::ids::ObjectId;
use crate::model::tpl::{Arg, ArgValue, TplKind};

/// Materialize default slot contents across the whole document.
///
/// # Errors
/// Fails if a slot's default subtree references a missing node.
pub fn materialize_default_slots(doc: &mut Document) -> Result<(), MergeError> {
    let order = instantiation_order(doc);
    let mut filled = 0_usize;
    for comp in order {
        let Some(root) = doc.component(comp).map(|c| c.root) else {
            continue;
        };
        for node in doc.flatten_owned(root) {
            filled += fix_instance(doc, node)?;
        }
    }
    if filled > 0 {
        debug!(filled, "virtual slot contents materialized");
    }
    Ok(())
}

/// Repair one node if it is an instance: drop stale args, add missing slot
/// bindings, fill empty virtual caches. Returns how many caches were filled.
fn fix_instance(doc: &mut Document, node: ObjectId) -> Result<usize, MergeError> {
    let Some(TplKind::Instance { component }) = doc.node(node).map(|n| n.kind.clone()) else {
        return Ok(0);
    };
    let Some(target) = doc.component(component) else {
        // Reference to a deleted component: expected steady state.
        return Ok(0);
    };
    let declared: BTreeSet<ObjectId> = target.params.iter().map(|p| p.id).collect();
    let slots: Vec<ObjectId> = target.slot_params().iter().map(|p| p.id).collect();
    let target_root = target.root;

    // Slot param -> slot node declaring it, in the target's tree.
    let mut slot_nodes: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
    for id in doc.flatten_owned(target_root) {
        if let Some(TplKind::Slot { param, .. }) = doc.node(id).map(|n| &n.kind) {
            slot_nodes.entry(*param).or_insert(id);
        }
    }

    if let Some(n) = doc.node_mut(node) {
        // Stale args must not survive a merge.
        for vs in &mut n.vsettings {
            vs.args.retain(|a| declared.contains(&a.param));
        }
        let base = n.base_vsetting_mut();
        for &param in &slots {
            if base.arg_for(param).is_none() {
                base.args.push(Arg::use_default(param));
            }
        }
    }

    let mut filled = 0_usize;
    for &param in &slots {
        let needs_fill = doc
            .node(node)
            .and_then(|n| n.base_vsetting())
            .and_then(|vs| vs.arg_for(param))
            .is_some_and(|arg| matches!(&arg.value, ArgValue::UseDefault { contents } if contents.is_empty()));
        if !needs_fill {
            continue;
        }
        let Some(&slot_node) = slot_nodes.get(&param) else {
            continue;
        };
        let defaults: Vec<ObjectId> = match doc.node(slot_node).map(|n| &n.kind) {
            Some(TplKind::Slot {
                default_contents, ..
            }) => default_contents.clone(),
            _ => continue,
        };
        let mut copies = Vec::with_capacity(defaults.len());
        for default in defaults {
            let copy = clone_subtree_fresh(doc, default)?;
            if let Some(c) = doc.node_mut(copy) {
                c.parent = Some(node);
            }
            copies.push(copy);
        }
        if let Some(arg) = doc
            .node_mut(node)
            .map(|n| n.base_vsetting_mut())
            .and_then(|vs| vs.arg_for_mut(param))
        {
            arg.value = ArgValue::UseDefault { contents: copies };
            filled += 1;
            trace!(instance = %node, param = %param, "default contents copied");
        }
    }
    Ok(filled)
}

/// Components in instantiation order (instantiated before instantiating),
/// computed with an explicit stack and tolerant of instantiation cycles.
fn instantiation_order(doc: &Document) -> Vec<ObjectId> {
    let mut order = Vec::with_capacity(doc.components.len());
    let mut done: BTreeSet<ObjectId> = BTreeSet::new();
    let mut in_progress: BTreeSet<ObjectId> = BTreeSet::new();
    for comp in &doc.components {
        let mut stack = vec![(comp.id, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                in_progress.remove(&id);
                if done.insert(id) {
                    order.push(id);
                }
                continue;
            }
            if done.contains(&id) || !in_progress.insert(id) {
                continue;
            }
            stack.push((id, true));
            let Some(root) = doc.component(id).map(|c| c.root) else {
                continue;
            };
            for node in doc.flatten_owned(root) {
                if let Some(TplKind::Instance { component }) = doc.node(node).map(|n| &n.kind) {
                    if doc.has_component(*component)
                        && !done.contains(component)
                        && !in_progress.contains(component)
                    {
                        stack.push((*component, false));
                    }
                }
            }
        }
    }
    order
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::{Component, Param};
    use crate::model::tpl::TplNode;

    fn id(n: u128) -> ObjectId {
        ObjectId::new(n)
    }

    /// "Widget" (component 100): root 110 holding slot 111 for param 60, with
    /// default content tag 112. "Page" (component 1): root 10 holding
    /// instance 20 of Widget.
    fn doc(with_arg: bool) -> Document {
        let mut doc = Document::new();

        let mut root = TplNode::tag(id(10), "div");
        if let TplKind::Tag { children, .. } = &mut root.kind {
            children.push(id(20));
        }
        doc.insert_node(root);
        let mut inst = TplNode::instance(id(20), id(100));
        inst.parent = Some(id(10));
        if with_arg {
            inst.base_vsetting_mut().args.push(Arg::use_default(id(60)));
        }
        doc.insert_node(inst);
        doc.components.push(Component::new(id(1), "Page", id(10)));

        let mut wroot = TplNode::tag(id(110), "div");
        if let TplKind::Tag { children, .. } = &mut wroot.kind {
            children.push(id(111));
        }
        doc.insert_node(wroot);
        let mut slot = TplNode::slot(id(111), id(60));
        slot.parent = Some(id(110));
        if let TplKind::Slot {
            default_contents, ..
        } = &mut slot.kind
        {
            default_contents.push(id(112));
        }
        doc.insert_node(slot);
        let mut fallback = TplNode::tag(id(112), "span");
        fallback.parent = Some(id(111));
        doc.insert_node(fallback);
        let mut widget = Component::new(id(100), "Widget", id(110));
        widget.params.push(Param::slot(id(60), "children"));
        doc.components.push(widget);
        doc
    }

    fn cache_of(doc: &Document) -> Vec<ObjectId> {
        match &doc
            .node(id(20))
            .unwrap()
            .base_vsetting()
            .unwrap()
            .arg_for(id(60))
            .unwrap()
            .value
        {
            ArgValue::UseDefault { contents } => contents.clone(),
            other => panic!("expected virtual binding, got {other:?}"),
        }
    }

    #[test]
    fn missing_slot_arg_is_added_and_filled() {
        let mut d = doc(false);
        materialize_default_slots(&mut d).unwrap();
        let cache = cache_of(&d);
        assert_eq!(cache.len(), 1);
        let copy = d.node(cache[0]).unwrap();
        assert_ne!(copy.id, id(112));
        assert_eq!(copy.parent, Some(id(20)));
        let TplKind::Tag { tag, .. } = &copy.kind else {
            panic!("expected tag copy");
        };
        assert_eq!(tag, "span");
        assert!(d.validate().is_ok());
    }

    #[test]
    fn materialization_is_idempotent() {
        let mut d = doc(true);
        materialize_default_slots(&mut d).unwrap();
        let first = cache_of(&d);
        materialize_default_slots(&mut d).unwrap();
        assert_eq!(cache_of(&d), first);
    }

    #[test]
    fn stale_args_are_dropped() {
        let mut d = doc(true);
        d.node_mut(id(20))
            .unwrap()
            .base_vsetting_mut()
            .args
            .push(Arg::scalar(id(999), "\"gone\""));
        materialize_default_slots(&mut d).unwrap();
        let args = &d.node(id(20)).unwrap().base_vsetting().unwrap().args;
        assert!(args.iter().all(|a| a.param == id(60)));
    }

    #[test]
    fn dangling_component_reference_is_skipped() {
        let mut d = doc(true);
        d.components.retain(|c| c.id != id(100));
        materialize_default_slots(&mut d).unwrap();
        assert!(cache_of(&d).is_empty());
    }

    #[test]
    fn concrete_bindings_are_untouched() {
        let mut d = doc(false);
        let mut child = TplNode::tag(id(30), "b");
        child.parent = Some(id(20));
        d.insert_node(child);
        d.node_mut(id(20))
            .unwrap()
            .base_vsetting_mut()
            .args
            .push(Arg::content(id(60), vec![id(30)]));
        materialize_default_slots(&mut d).unwrap();
        let arg = d
            .node(id(20))
            .unwrap()
            .base_vsetting()
            .unwrap()
            .arg_for(id(60))
            .unwrap()
            .clone();
        assert_eq!(
            arg.value,
            ArgValue::Content {
                children: vec![id(30)]
            }
        );
    }
}
