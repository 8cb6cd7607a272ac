//! The merge engine.
//!
//! [`merge_documents`] is the top-level entry point: it seeds the merged
//! document from the ancestor, reconciles the component set and every common
//! component's tree, runs the post-merge fixups, and returns the merged
//! document together with the conflicts and auto-reconciliations collected
//! along the way.
//!
//! The submodules mirror the passes:
//!
//! - [`components`] — component-set diff, re-rooting, reparenting, cycle
//!   repair, and the per-component driver loop.
//! - [`children`] — ordered child-list reconciliation (diff3 keyed by
//!   identity), including per-slot-argument lists on instances.
//! - [`vsettings`] — variant-setting matching and component-variant union.
//! - [`fields`] — the declarative scalar three-way rules.
//! - [`clone`] — cross-document cloning with identity preserved.

pub mod children;
pub mod clone;
pub mod components;
pub mod fields;
pub mod vsettings;


use tracing::debug;

use crate::error::MergeError;
use crate::model::conflict::{AutoReconciliation, Conflict, Picks, Side};
use crate::model::document::Document;
use crate::model::ids::ObjectId;
use crate::model::path::ModelPath;
use crate::model::tpl::TplNode;

// ---------------------------------------------------------------------------
// MergeCtx
// ---------------------------------------------------------------------------

/// Shared state threaded through every merge pass: the three input snapshots,
/// the merged document being built, the caller's picks, and the collected
/// conflict and reconciliation records.
pub struct MergeCtx<'a> {
    /// The common base snapshot.
    pub ancestor: &'a Document,
    /// The left branch (consulted first wherever a default outcome exists).
    pub left: &'a Document,
    /// The right branch.
    pub right: &'a Document,
    /// The merged document, mutated in place.
    pub merged: Document,
    /// Previously collected resolutions, keyed by conflict path.
    pub picks: &'a Picks,
    conflicts: Vec<Conflict>,
    reconciliations: Vec<AutoReconciliation>,
}

impl<'a> MergeCtx<'a> {
    /// Create a context with the merged document seeded from the ancestor.
    #[must_use]
    pub fn new(
        ancestor: &'a Document,
        left: &'a Document,
        right: &'a Document,
        picks: &'a Picks,
    ) -> Self {
        Self {
            ancestor,
            left,
            right,
            merged: ancestor.clone(),
            picks,
            conflicts: Vec::new(),
            reconciliations: Vec::new(),
        }
    }

    /// The branch document for a side.
    #[must_use]
    pub fn branch(&self, side: Side) -> &'a Document {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// The caller's pick for a conflict path, if any.
    #[must_use]
    pub fn pick(&self, path: &ModelPath) -> Option<Side> {
        self.picks.get(path).copied()
    }

    /// Record an unresolved conflict.
    pub fn record(&mut self, conflict: Conflict) {
        debug!(conflict = %conflict, "recorded conflict");
        self.conflicts.push(conflict);
    }

    /// Record an auto-reconciliation.
    pub fn reconcile(&mut self, rec: AutoReconciliation) {
        debug!(reconciliation = %rec, "auto-reconciled");
        self.reconciliations.push(rec);
    }

    /// Conflicts collected so far.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }
}

// ---------------------------------------------------------------------------
// MergeOutcome
// ---------------------------------------------------------------------------

/// Everything a merge run produces.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    /// The best-effort merged document. Valid (acyclic, consistent) even when
    /// conflicts remain; conflicted locations keep the ancestor's projection.
    pub document: Document,
    /// Divergences that need a pick to resolve.
    pub conflicts: Vec<Conflict>,
    /// Unilateral repairs applied by the engine, for audit.
    pub reconciliations: Vec<AutoReconciliation>,
}

impl MergeOutcome {
    /// Returns `true` if the merge completed without unresolved conflicts.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

// ---------------------------------------------------------------------------
// merge_documents
// ---------------------------------------------------------------------------

/// Merge two branches of a document against their common ancestor.
///
/// Runs the full pipeline: component-set reconciliation, per-component tree
/// merging, and every fixup pass, then prunes unreachable nodes and verifies
/// the structural invariants. Re-run with the `picks` gathered from a
/// previous outcome to resolve reported conflicts; picks that match no
/// conflict are ignored.
///
/// # Errors
/// Fails only on invariant violations in the inputs (the three snapshots are
/// not related views of one document lineage). Genuine branch disagreements
/// are returned as [`Conflict`] data, never as errors.
pub fn merge_documents(
    ancestor: &Document,
    left: &Document,
    right: &Document,
    picks: &Picks,
) -> Result<MergeOutcome, MergeError> {
    debug!(
        ancestor_components = ancestor.components.len(),
        left_components = left.components.len(),
        right_components = right.components.len(),
        picks = picks.len(),
        "merge started"
    );

    let mut ctx = MergeCtx::new(ancestor, left, right, picks);
    components::merge_component_sets(&mut ctx)?;

    crate::fixup::code_components::collapse_duplicate_external_components(&mut ctx.merged);
    crate::fixup::swapped::repair_swapped_references(ancestor, left, right, &mut ctx.merged);
    crate::fixup::virtual_slots::materialize_default_slots(&mut ctx.merged)?;
    let renames = crate::fixup::page_paths::deduplicate_paths(&mut ctx.merged);
    for rec in renames {
        ctx.reconcile(rec);
    }

    ctx.merged.prune_unreachable();
    ctx.merged.validate()?;

    debug!(
        conflicts = ctx.conflicts.len(),
        reconciliations = ctx.reconciliations.len(),
        nodes = ctx.merged.node_count(),
        "merge finished"
    );

    Ok(MergeOutcome {
        document: ctx.merged,
        conflicts: ctx.conflicts,
        reconciliations: ctx.reconciliations,
    })
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Path of one component.
pub(crate) fn component_path(comp: ObjectId) -> ModelPath {
    ModelPath::root().field("components").id(comp)
}

/// Path of one node within a component.
pub(crate) fn node_path(comp: ObjectId, node: ObjectId) -> ModelPath {
    component_path(comp).field("tpl").id(node)
}

/// Path of a node's child ordering, or of one slot argument's ordering.
pub(crate) fn children_order_path(
    comp: ObjectId,
    node: ObjectId,
    slot_param: Option<ObjectId>,
) -> ModelPath {
    let base = node_path(comp, node);
    match slot_param {
        Some(param) => base.field("slot_args").id(param).field("children_order"),
        None => base.field("children_order"),
    }
}

/// Look up a node that must exist in a document.
pub(crate) fn node_in(doc: &Document, id: ObjectId) -> Result<&TplNode, MergeError> {
    doc.node(id).ok_or(MergeError::MissingObject { what: "node", id })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
