//! The document: ordered components plus a node arena.
//!
//! Nodes live in an identity-keyed arena ([`Document::node`]) and reference
//! each other (parent, children, slot args) by [`ObjectId`]. Tree surgery —
//! reparenting, detaching, pruning — is therefore explicit map/list editing,
//! and the acyclicity invariant can be re-checked after every mutation batch
//! with [`Document::validate`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

use super::ids::ObjectId;
use super::tpl::{TplKind, TplNode};

// ---------------------------------------------------------------------------
// Param
// ---------------------------------------------------------------------------

/// What a param accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// An ordinary prop (scalar expression binding).
    Prop,
    /// A slot (children binding).
    Slot,
}

/// A parameter declared by a component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Stable identity.
    pub id: ObjectId,
    /// Declared name, unique within the component (external components may
    /// transiently violate this until the duplicate-param fixup runs).
    pub name: String,
    /// Prop or slot.
    pub kind: ParamKind,
}

impl Param {
    /// Create a prop param.
    #[must_use]
    pub fn prop(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ParamKind::Prop,
        }
    }

    /// Create a slot param.
    #[must_use]
    pub fn slot(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ParamKind::Slot,
        }
    }
}

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// How a variant is identified across branches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantKind {
    /// A style variant: a set of selectors, optionally scoped to one node.
    Style {
        /// Style selectors ("hover", "pressed", ...).
        selectors: Vec<String>,
        /// Node this variant is scoped to, if any.
        for_node: Option<ObjectId>,
    },
    /// A variant owned by a named group; identity is its assigned id.
    Grouped,
}

/// A component-declared variant.
///
/// The base variant is not stored: a [`VariantSetting`](super::tpl::VariantSetting)
/// with an empty variant list is the base combination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Stable identity (authoritative only for grouped variants).
    pub id: ObjectId,
    /// Identity-derivation payload.
    pub kind: VariantKind,
}

impl Variant {
    /// Create a style variant.
    #[must_use]
    pub fn style(id: ObjectId, selectors: Vec<String>, for_node: Option<ObjectId>) -> Self {
        Self {
            id,
            kind: VariantKind::Style {
                selectors,
                for_node,
            },
        }
    }

    /// The derived, branch-independent identity of this variant.
    #[must_use]
    pub fn key(&self) -> VariantKey {
        match &self.kind {
            VariantKind::Style {
                selectors,
                for_node,
            } => {
                let mut selectors = selectors.clone();
                selectors.sort();
                VariantKey::Style {
                    selectors,
                    for_node: *for_node,
                }
            }
            VariantKind::Grouped => VariantKey::Grouped { id: self.id },
        }
    }
}

/// Derived variant identity: two variants across branches are "the same" iff
/// their keys are equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantKey {
    /// Same sorted selector set, scoped to the same node.
    Style {
        /// Sorted selectors.
        selectors: Vec<String>,
        /// Scoping node, if any.
        for_node: Option<ObjectId>,
    },
    /// Grouped variants match by assigned identity.
    Grouped {
        /// The variant id.
        id: ObjectId,
    },
}

impl VariantKey {
    /// A canonical string form, stable across runs, usable as a path step.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Style {
                selectors,
                for_node,
            } => match for_node {
                Some(node) => format!("{}@{node}", selectors.join("+")),
                None => selectors.join("+"),
            },
            Self::Grouped { id } => id.to_hex(),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A derived state declared by a component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Stable identity.
    pub id: ObjectId,
    /// Declared name.
    pub name: String,
    /// The tree node this state is attached to, if any.
    pub node: Option<ObjectId>,
    /// For implicit states, the state on the instantiated component this one
    /// mirrors.
    pub implicit: Option<ObjectId>,
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Where a component is defined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentOrigin {
    /// Authored inside this document.
    #[default]
    Local,
    /// Registered from host code. Its identity can legitimately change across
    /// registrations; its name should not.
    External,
}

/// A named unit owning one node tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Stable identity (see [`ComponentOrigin::External`] for the exception).
    pub id: ObjectId,
    /// Declared name.
    pub name: String,
    /// Root of the owned tree.
    pub root: ObjectId,
    /// Declared parameters.
    pub params: Vec<Param>,
    /// Declared non-base variants.
    pub variants: Vec<Variant>,
    /// Declared states.
    pub states: Vec<State>,
    /// Route path, for page-like components.
    pub page_path: Option<String>,
    /// Local or externally registered.
    #[serde(default)]
    pub origin: ComponentOrigin,
}

impl Component {
    /// Create a minimal local component.
    #[must_use]
    pub fn new(id: ObjectId, name: impl Into<String>, root: ObjectId) -> Self {
        Self {
            id,
            name: name.into(),
            root,
            params: Vec::new(),
            variants: Vec::new(),
            states: Vec::new(),
            page_path: None,
            origin: ComponentOrigin::Local,
        }
    }

    /// Returns `true` for externally registered components.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.origin == ComponentOrigin::External
    }

    /// Find a declared param by id.
    #[must_use]
    pub fn param(&self, id: ObjectId) -> Option<&Param> {
        self.params.iter().find(|p| p.id == id)
    }

    /// Declared slot params, in declaration order.
    #[must_use]
    pub fn slot_params(&self) -> Vec<&Param> {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Slot)
            .collect()
    }

    /// Find a declared variant by id.
    #[must_use]
    pub fn variant(&self, id: ObjectId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Derived identity of one variant-setting: the sorted multiset of its
    /// variant keys (empty = base).
    ///
    /// # Errors
    /// Fails if the setting references a variant this component does not
    /// declare — an invariant violation in the input snapshot.
    pub fn vsetting_key(
        &self,
        variants: &[ObjectId],
    ) -> Result<Vec<VariantKey>, MergeError> {
        let mut keys = Vec::with_capacity(variants.len());
        for &id in variants {
            let variant = self
                .variant(id)
                .ok_or(MergeError::MissingVariant { id })?;
            keys.push(variant.key());
        }
        keys.sort();
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// The root container: ordered components plus the node arena.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Components, in document order.
    pub components: Vec<Component>,
    nodes: BTreeMap<ObjectId, TplNode>,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- components --

    /// Find a component by id.
    #[must_use]
    pub fn component(&self, id: ObjectId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Find a component by id, mutably.
    #[must_use]
    pub fn component_mut(&mut self, id: ObjectId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.id == id)
    }

    /// Returns `true` if a component with this id exists.
    #[must_use]
    pub fn has_component(&self, id: ObjectId) -> bool {
        self.component(id).is_some()
    }

    // -- nodes --

    /// Look up a node in the arena.
    #[must_use]
    pub fn node(&self, id: ObjectId) -> Option<&TplNode> {
        self.nodes.get(&id)
    }

    /// Look up a node in the arena, mutably.
    #[must_use]
    pub fn node_mut(&mut self, id: ObjectId) -> Option<&mut TplNode> {
        self.nodes.get_mut(&id)
    }

    /// Returns `true` if the arena contains this node.
    #[must_use]
    pub fn contains_node(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Insert (or replace) a node.
    pub fn insert_node(&mut self, node: TplNode) {
        self.nodes.insert(node.id, node);
    }

    /// Remove a node from the arena.
    pub fn remove_node(&mut self, id: ObjectId) -> Option<TplNode> {
        self.nodes.remove(&id)
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every arena node id, in identity order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<ObjectId> {
        self.nodes.keys().copied().collect()
    }

    // -- traversal --

    /// The merge-visible ordered children of a node: tag children, slot
    /// default contents, or (for instances) the concrete children of every
    /// base slot arg, in arg order. Virtual-arg caches are excluded.
    #[must_use]
    pub fn tpl_children(&self, id: ObjectId) -> Vec<ObjectId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        match &node.kind {
            TplKind::Tag { children, .. } => children.clone(),
            TplKind::Slot {
                default_contents, ..
            } => default_contents.clone(),
            TplKind::Instance { .. } => node
                .base_vsetting()
                .map(|vs| {
                    vs.args
                        .iter()
                        .filter_map(|a| a.value.content_children())
                        .flatten()
                        .copied()
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Every child a node owns, including materialized virtual-slot caches.
    /// This is the relation that must form a tree.
    #[must_use]
    pub fn owned_children(&self, id: ObjectId) -> Vec<ObjectId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        match &node.kind {
            TplKind::Tag { children, .. } => children.clone(),
            TplKind::Slot {
                default_contents, ..
            } => default_contents.clone(),
            TplKind::Instance { .. } => {
                let mut out = Vec::new();
                for vs in &node.vsettings {
                    for arg in &vs.args {
                        match &arg.value {
                            super::tpl::ArgValue::Content { children } => {
                                out.extend(children.iter().copied());
                            }
                            super::tpl::ArgValue::UseDefault { contents } => {
                                out.extend(contents.iter().copied());
                            }
                            super::tpl::ArgValue::Scalar { .. } => {}
                        }
                    }
                }
                out
            }
        }
    }

    /// Preorder walk of the merge-visible tree under `root` (inclusive).
    /// Uses an explicit stack; tolerant of arbitrarily deep trees.
    #[must_use]
    pub fn flatten(&self, root: ObjectId) -> Vec<ObjectId> {
        self.walk(root, Self::tpl_children)
    }

    /// Preorder walk of the owned tree under `root` (inclusive).
    #[must_use]
    pub fn flatten_owned(&self, root: ObjectId) -> Vec<ObjectId> {
        self.walk(root, Self::owned_children)
    }

    fn walk(&self, root: ObjectId, children: fn(&Self, ObjectId) -> Vec<ObjectId>) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) || !self.contains_node(id) {
                // A cycle mid-merge must not hang the walk.
                continue;
            }
            out.push(id);
            let kids = children(self, id);
            for &child in kids.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    // -- surgery --

    /// Remove `child` from every child list of `parent`. Does not touch the
    /// child's `parent` field.
    pub fn detach_child(&mut self, parent: ObjectId, child: ObjectId) {
        let Some(node) = self.node_mut(parent) else {
            return;
        };
        match &mut node.kind {
            TplKind::Tag { children, .. } => children.retain(|&c| c != child),
            TplKind::Slot {
                default_contents, ..
            } => default_contents.retain(|&c| c != child),
            TplKind::Instance { .. } => {
                for vs in &mut node.vsettings {
                    for arg in &mut vs.args {
                        match &mut arg.value {
                            super::tpl::ArgValue::Content { children } => {
                                children.retain(|&c| c != child);
                            }
                            super::tpl::ArgValue::UseDefault { contents } => {
                                contents.retain(|&c| c != child);
                            }
                            super::tpl::ArgValue::Scalar { .. } => {}
                        }
                    }
                }
            }
        }
    }

    /// Rewrite parent pointers of the whole owned tree under `root` to match
    /// the child lists, and clear the root's own parent.
    pub fn fix_parent_pointers(&mut self, root: ObjectId) {
        if let Some(node) = self.node_mut(root) {
            node.parent = None;
        }
        let mut stack = vec![root];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for child in self.owned_children(id) {
                if let Some(node) = self.node_mut(child) {
                    node.parent = Some(id);
                }
                stack.push(child);
            }
        }
    }

    /// Drop every arena node not owned (transitively) by some component root.
    pub fn prune_unreachable(&mut self) {
        let mut keep = BTreeSet::new();
        let roots: Vec<ObjectId> = self.components.iter().map(|c| c.root).collect();
        for root in roots {
            keep.extend(self.flatten_owned(root));
        }
        self.nodes.retain(|id, _| keep.contains(id));
    }

    // -- invariants --

    /// Check the structural invariants over everything reachable from the
    /// component roots: parent/child mutual consistency, single ownership,
    /// parentless roots.
    ///
    /// # Errors
    /// Returns [`MergeError::CorruptTree`] (or `MissingObject` for a dangling
    /// root) describing the first violation found.
    pub fn validate(&self) -> Result<(), MergeError> {
        let mut owner: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
        for comp in &self.components {
            if !self.contains_node(comp.root) {
                return Err(MergeError::MissingObject {
                    what: "root node",
                    id: comp.root,
                });
            }
            let root = self
                .node(comp.root)
                .ok_or(MergeError::MissingObject {
                    what: "root node",
                    id: comp.root,
                })?;
            if root.parent.is_some() {
                return Err(MergeError::CorruptTree {
                    detail: format!("root {} of component {} has a parent", comp.root, comp.name),
                });
            }
            for id in self.flatten_owned(comp.root) {
                for child in self.owned_children(id) {
                    let Some(child_node) = self.node(child) else {
                        return Err(MergeError::CorruptTree {
                            detail: format!("node {id} owns missing child {child}"),
                        });
                    };
                    if child_node.parent != Some(id) {
                        return Err(MergeError::CorruptTree {
                            detail: format!(
                                "child {child} of {id} points at parent {:?}",
                                child_node.parent
                            ),
                        });
                    }
                    if let Some(prev) = owner.insert(child, id) {
                        return Err(MergeError::CorruptTree {
                            detail: format!("node {child} owned by both {prev} and {id}"),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tpl::{Arg, TplNode};

    fn id(n: u128) -> ObjectId {
        ObjectId::new(n)
    }

    /// A component with root tag 10 owning tags 11 and 12.
    fn small_doc() -> Document {
        let mut doc = Document::new();
        let mut root = TplNode::tag(id(10), "div");
        if let TplKind::Tag { children, .. } = &mut root.kind {
            children.extend([id(11), id(12)]);
        }
        let mut a = TplNode::tag(id(11), "span");
        a.parent = Some(id(10));
        let mut b = TplNode::tag(id(12), "span");
        b.parent = Some(id(10));
        doc.insert_node(root);
        doc.insert_node(a);
        doc.insert_node(b);
        doc.components.push(Component::new(id(1), "Card", id(10)));
        doc
    }

    // -- VariantKey --

    #[test]
    fn style_variant_key_sorts_selectors() {
        let v = Variant::style(id(1), vec!["pressed".into(), "hover".into()], None);
        assert_eq!(
            v.key(),
            VariantKey::Style {
                selectors: vec!["hover".into(), "pressed".into()],
                for_node: None
            }
        );
    }

    #[test]
    fn style_key_canonical_includes_scope() {
        let v = Variant::style(id(1), vec!["hover".into()], Some(id(9)));
        assert_eq!(v.key().canonical(), format!("hover@{}", id(9)));
    }

    #[test]
    fn grouped_variant_key_is_identity() {
        let v = Variant {
            id: id(5),
            kind: VariantKind::Grouped,
        };
        assert_eq!(v.key(), VariantKey::Grouped { id: id(5) });
        assert_eq!(v.key().canonical(), id(5).to_hex());
    }

    #[test]
    fn same_selectors_different_ids_match() {
        let a = Variant::style(id(1), vec!["hover".into()], None);
        let b = Variant::style(id(2), vec!["hover".into()], None);
        assert_eq!(a.key(), b.key());
    }

    // -- Component --

    #[test]
    fn vsetting_key_empty_is_base() {
        let comp = Component::new(id(1), "Card", id(10));
        assert_eq!(comp.vsetting_key(&[]).unwrap(), vec![]);
    }

    #[test]
    fn vsetting_key_rejects_undeclared_variant() {
        let comp = Component::new(id(1), "Card", id(10));
        let err = comp.vsetting_key(&[id(9)]).unwrap_err();
        assert_eq!(err, MergeError::MissingVariant { id: id(9) });
    }

    #[test]
    fn vsetting_key_is_order_independent() {
        let mut comp = Component::new(id(1), "Card", id(10));
        comp.variants.push(Variant::style(id(2), vec!["a".into()], None));
        comp.variants.push(Variant::style(id(3), vec!["b".into()], None));
        assert_eq!(
            comp.vsetting_key(&[id(2), id(3)]).unwrap(),
            comp.vsetting_key(&[id(3), id(2)]).unwrap()
        );
    }

    #[test]
    fn slot_params_filters_props() {
        let mut comp = Component::new(id(1), "Card", id(10));
        comp.params.push(Param::prop(id(2), "title"));
        comp.params.push(Param::slot(id(3), "children"));
        let slots = comp.slot_params();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, id(3));
    }

    // -- traversal --

    #[test]
    fn tpl_children_of_tag() {
        let doc = small_doc();
        assert_eq!(doc.tpl_children(id(10)), vec![id(11), id(12)]);
    }

    #[test]
    fn flatten_is_preorder() {
        let doc = small_doc();
        assert_eq!(doc.flatten(id(10)), vec![id(10), id(11), id(12)]);
    }

    #[test]
    fn instance_children_come_from_base_args_only() {
        let mut doc = Document::new();
        let mut inst = TplNode::instance(id(1), id(100));
        inst.base_vsetting_mut()
            .args
            .push(Arg::content(id(50), vec![id(2)]));
        inst.base_vsetting_mut().args.push(Arg::use_default(id(51)));
        doc.insert_node(inst);
        let mut child = TplNode::tag(id(2), "div");
        child.parent = Some(id(1));
        doc.insert_node(child);
        assert_eq!(doc.tpl_children(id(1)), vec![id(2)]);
    }

    #[test]
    fn flatten_survives_a_cycle() {
        let mut doc = small_doc();
        // Manufacture a cycle: 11 claims to own 10.
        if let Some(node) = doc.node_mut(id(11)) {
            node.kind = TplKind::Tag {
                tag: "span".into(),
                children: vec![id(10)],
            };
        }
        // Terminates and visits each node once.
        let flat = doc.flatten(id(10));
        assert_eq!(flat.len(), 3);
    }

    // -- surgery --

    #[test]
    fn detach_child_removes_from_list() {
        let mut doc = small_doc();
        doc.detach_child(id(10), id(11));
        assert_eq!(doc.tpl_children(id(10)), vec![id(12)]);
    }

    #[test]
    fn fix_parent_pointers_rewrites() {
        let mut doc = small_doc();
        doc.node_mut(id(11)).unwrap().parent = Some(id(99));
        doc.node_mut(id(10)).unwrap().parent = Some(id(11));
        doc.fix_parent_pointers(id(10));
        assert_eq!(doc.node(id(11)).unwrap().parent, Some(id(10)));
        assert_eq!(doc.node(id(10)).unwrap().parent, None);
    }

    #[test]
    fn prune_drops_orphans() {
        let mut doc = small_doc();
        doc.insert_node(TplNode::tag(id(99), "orphan"));
        assert_eq!(doc.node_count(), 4);
        doc.prune_unreachable();
        assert_eq!(doc.node_count(), 3);
        assert!(!doc.contains_node(id(99)));
    }

    // -- validate --

    #[test]
    fn validate_accepts_consistent_tree() {
        assert!(small_doc().validate().is_ok());
    }

    #[test]
    fn validate_rejects_parent_mismatch() {
        let mut doc = small_doc();
        doc.node_mut(id(11)).unwrap().parent = Some(id(12));
        assert!(matches!(
            doc.validate(),
            Err(MergeError::CorruptTree { .. })
        ));
    }

    #[test]
    fn validate_rejects_rooted_root() {
        let mut doc = small_doc();
        doc.node_mut(id(10)).unwrap().parent = Some(id(11));
        assert!(matches!(
            doc.validate(),
            Err(MergeError::CorruptTree { .. })
        ));
    }

    #[test]
    fn validate_rejects_shared_child() {
        let mut doc = small_doc();
        // 12 also claims to own 11.
        if let Some(node) = doc.node_mut(id(12)) {
            node.kind = TplKind::Tag {
                tag: "span".into(),
                children: vec![id(11)],
            };
        }
        assert!(matches!(
            doc.validate(),
            Err(MergeError::CorruptTree { .. })
        ));
    }

    #[test]
    fn validate_rejects_missing_root() {
        let mut doc = small_doc();
        doc.remove_node(id(10));
        assert!(matches!(
            doc.validate(),
            Err(MergeError::MissingObject { .. })
        ));
    }

    #[test]
    fn document_serde_roundtrip() {
        let doc = small_doc();
        let json = serde_json::to_string(&doc).unwrap();
        let decoded: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, doc);
    }
}
