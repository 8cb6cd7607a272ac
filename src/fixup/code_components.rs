//! Duplicate external-component collapse.
//!
//! An externally registered component can be unregistered and re-registered
//! between two branch edits, reappearing under a fresh identity with the same
//! declared name. After a merge both identities can coexist, so this pass
//! groups external components by name, keeps the first as canonical, retargets
//! every instance (and its args, matched by param name) onto it, and drops the
//! rest. The same name-keyed collapse is then applied to params duplicated
//! within one surviving component.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::model::document::Document;
use crate::model::ids::ObjectId;
use crate::model::tpl::TplKind;

/// Collapse duplicate external components and duplicate params. Trees of the
/// dropped duplicates become unreachable; the caller prunes them.
pub fn collapse_duplicate_external_components(doc: &mut Document) {
    let mut canonical_by_name: BTreeMap<String, ObjectId> = BTreeMap::new();
    let mut duplicate_of: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
    for comp in &doc.components {
        if !comp.is_external() {
            continue;
        }
        match canonical_by_name.get(&comp.name) {
            Some(&canon) => {
                duplicate_of.insert(comp.id, canon);
            }
            None => {
                canonical_by_name.insert(comp.name.clone(), comp.id);
            }
        }
    }

    if !duplicate_of.is_empty() {
        // Duplicate param id -> canonical param id, matched by name.
        let mut param_map: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
        let mut canon_params: BTreeMap<ObjectId, BTreeSet<ObjectId>> = BTreeMap::new();
        for (&dup, &canon) in &duplicate_of {
            let (Some(dup_c), Some(canon_c)) = (doc.component(dup), doc.component(canon))
            else {
                continue;
            };
            for param in &dup_c.params {
                if let Some(target) = canon_c.params.iter().find(|p| p.name == param.name) {
                    param_map.insert(param.id, target.id);
                }
            }
            canon_params
                .entry(canon)
                .or_insert_with(|| canon_c.params.iter().map(|p| p.id).collect());
        }

        for id in doc.node_ids() {
            let Some(node) = doc.node_mut(id) else {
                continue;
            };
            let TplKind::Instance { component } = &mut node.kind else {
                continue;
            };
            let Some(&canon) = duplicate_of.get(component) else {
                continue;
            };
            *component = canon;
            let alive = canon_params.get(&canon);
            for vs in &mut node.vsettings {
                for arg in &mut vs.args {
                    if let Some(&mapped) = param_map.get(&arg.param) {
                        arg.param = mapped;
                    }
                }
                // Args whose param has no namesake on the canonical component
                // cannot be retargeted and are dropped.
                vs.args
                    .retain(|a| alive.is_none_or(|params| params.contains(&a.param)));
            }
        }

        debug!(dropped = duplicate_of.len(), "duplicate external components collapsed");
        doc.components.retain(|c| !duplicate_of.contains_key(&c.id));
    }

    collapse_duplicate_params(doc);
}

/// Collapse params sharing a name within each external component, keeping the
/// first and retargeting args and slot declarations onto it.
fn collapse_duplicate_params(doc: &mut Document) {
    let mut param_map: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
    for comp in &mut doc.components {
        if !comp.is_external() {
            continue;
        }
        let mut first_by_name: BTreeMap<String, ObjectId> = BTreeMap::new();
        comp.params.retain(|p| match first_by_name.get(&p.name) {
            Some(&keep) => {
                param_map.insert(p.id, keep);
                false
            }
            None => {
                first_by_name.insert(p.name.clone(), p.id);
                true
            }
        });
    }
    if param_map.is_empty() {
        return;
    }

    for id in doc.node_ids() {
        let Some(node) = doc.node_mut(id) else {
            continue;
        };
        match &mut node.kind {
            TplKind::Slot { param, .. } => {
                if let Some(&mapped) = param_map.get(param) {
                    *param = mapped;
                }
            }
            TplKind::Instance { .. } => {
                for vs in &mut node.vsettings {
                    let mut seen: BTreeSet<ObjectId> = BTreeSet::new();
                    for arg in &mut vs.args {
                        if let Some(&mapped) = param_map.get(&arg.param) {
                            arg.param = mapped;
                        }
                    }
                    // First binding per param wins after retargeting.
                    vs.args.retain(|a| seen.insert(a.param));
                }
            }
            TplKind::Tag { .. } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::{Component, ComponentOrigin, Param};
    use crate::model::tpl::{Arg, TplNode};

    fn id(n: u128) -> ObjectId {
        ObjectId::new(n)
    }

    fn external(cid: u128, name: &str, root: u128, params: &[(u128, &str)]) -> Component {
        let mut comp = Component::new(id(cid), name, id(root));
        comp.origin = ComponentOrigin::External;
        for &(pid, pname) in params {
            comp.params.push(Param::prop(id(pid), pname));
        }
        comp
    }

    /// Local component 1 holding an instance (node 20) of external component
    /// `target`, plus two external registrations of "Button".
    fn doc_with_duplicates(target: u128) -> Document {
        let mut doc = Document::new();
        let mut root = TplNode::tag(id(10), "div");
        if let TplKind::Tag { children, .. } = &mut root.kind {
            children.push(id(20));
        }
        doc.insert_node(root);
        let mut inst = TplNode::instance(id(20), id(target));
        inst.parent = Some(id(10));
        inst.base_vsetting_mut()
            .args
            .push(Arg::scalar(id(61), "\"go\""));
        doc.insert_node(inst);
        doc.components.push(Component::new(id(1), "Page", id(10)));

        doc.insert_node(TplNode::tag(id(30), "div"));
        doc.components
            .push(external(100, "Button", 30, &[(51, "label")]));
        doc.insert_node(TplNode::tag(id(31), "div"));
        doc.components
            .push(external(101, "Button", 31, &[(61, "label")]));
        doc
    }

    #[test]
    fn duplicate_registration_is_retargeted_to_first() {
        let mut doc = doc_with_duplicates(101);
        collapse_duplicate_external_components(&mut doc);
        assert!(doc.has_component(id(100)));
        assert!(!doc.has_component(id(101)));
        let node = doc.node(id(20)).unwrap();
        let TplKind::Instance { component } = node.kind else {
            panic!("expected instance");
        };
        assert_eq!(component, id(100));
        // Arg retargeted by param name: 61 ("label") -> 51 ("label").
        let args = &node.base_vsetting().unwrap().args;
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].param, id(51));
    }

    #[test]
    fn unmatched_param_args_are_dropped() {
        let mut doc = doc_with_duplicates(101);
        // Rename the canonical component's param so nothing matches.
        doc.component_mut(id(100)).unwrap().params[0].name = "text".into();
        collapse_duplicate_external_components(&mut doc);
        let node = doc.node(id(20)).unwrap();
        assert!(node.base_vsetting().unwrap().args.is_empty());
    }

    #[test]
    fn references_to_canonical_are_untouched() {
        let mut doc = doc_with_duplicates(100);
        collapse_duplicate_external_components(&mut doc);
        let TplKind::Instance { component } = doc.node(id(20)).unwrap().kind else {
            panic!("expected instance");
        };
        assert_eq!(component, id(100));
    }

    #[test]
    fn duplicate_params_collapse_within_component() {
        let mut doc = Document::new();
        doc.insert_node(TplNode::tag(id(30), "div"));
        doc.components
            .push(external(100, "Button", 30, &[(51, "label"), (52, "label")]));
        let mut root = TplNode::tag(id(10), "div");
        if let TplKind::Tag { children, .. } = &mut root.kind {
            children.push(id(20));
        }
        doc.insert_node(root);
        let mut inst = TplNode::instance(id(20), id(100));
        inst.parent = Some(id(10));
        inst.base_vsetting_mut()
            .args
            .push(Arg::scalar(id(52), "\"x\""));
        doc.insert_node(inst);
        doc.components.push(Component::new(id(1), "Page", id(10)));

        collapse_duplicate_external_components(&mut doc);
        let comp = doc.component(id(100)).unwrap();
        assert_eq!(comp.params.len(), 1);
        assert_eq!(comp.params[0].id, id(51));
        let args = &doc.node(id(20)).unwrap().base_vsetting().unwrap().args;
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].param, id(51));
    }

    #[test]
    fn local_components_are_never_collapsed() {
        let mut doc = Document::new();
        doc.insert_node(TplNode::tag(id(10), "div"));
        doc.insert_node(TplNode::tag(id(11), "div"));
        doc.components.push(Component::new(id(1), "Card", id(10)));
        doc.components.push(Component::new(id(2), "Card", id(11)));
        collapse_duplicate_external_components(&mut doc);
        assert_eq!(doc.components.len(), 2);
    }
}
