//! Ordered child-list reconciliation.
//!
//! A diff3 over ordered identity sequences: relative order is compared only
//! across the children common to every view, deletions win over retention,
//! and branch-new children are inserted after the last already-placed sibling
//! that preceded them on their origin branch. For component instances the
//! same machinery runs per slot parameter, and a branch flipping a slot
//! between explicit children and "use the default" participates in the same
//! conflict/pick flow as a reorder.

use tracing::trace;

use crate::error::MergeError;
use crate::model::conflict::{Conflict, ConflictKind, ConflictValue, Side};
use crate::model::document::Document;
use crate::model::ids::ObjectId;
use crate::model::path::ModelPath;
use crate::model::tpl::{Arg, ArgValue, TplKind};

use super::fields::{Resolved, three_way};
use super::{MergeCtx, children_order_path, clone};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Reconcile the ordered children of one node present in all four views.
///
/// # Errors
/// Fails if a branch references a node it does not contain.
pub(crate) fn merge_children(
    ctx: &mut MergeCtx,
    comp: ObjectId,
    node: ObjectId,
) -> Result<(), MergeError> {
    let Some(kind) = ctx.merged.node(node).map(|n| n.kind.clone()) else {
        return Ok(());
    };
    match kind {
        TplKind::Tag { .. } | TplKind::Slot { .. } => {
            let anc = ctx.ancestor.tpl_children(node);
            let left = ctx.left.tpl_children(node);
            let right = ctx.right.tpl_children(node);
            let merged = ctx.merged.tpl_children(node);
            let path = children_order_path(comp, node, None);
            let out = reconcile_list(ctx, &path, &anc, &left, &right, &merged)?;
            set_plain_children(ctx, node, out);
            Ok(())
        }
        TplKind::Instance { component } => {
            let Some(target) = ctx.merged.component(component) else {
                // Dangling reference: expected steady state, skipped.
                return Ok(());
            };
            let params: Vec<ObjectId> = target.slot_params().iter().map(|p| p.id).collect();
            for param in params {
                merge_slot_binding(ctx, comp, node, param)?;
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Plain lists
// ---------------------------------------------------------------------------

/// The diff3 core over one ordered id list. Clones branch-new children into
/// the merged document and returns the final list.
fn reconcile_list(
    ctx: &mut MergeCtx,
    path: &ModelPath,
    anc: &[ObjectId],
    left: &[ObjectId],
    right: &[ObjectId],
    merged: &[ObjectId],
) -> Result<Vec<ObjectId>, MergeError> {
    let left_doc = ctx.left;
    let right_doc = ctx.right;

    // Children still present and comparable in every view.
    let common: Vec<ObjectId> = merged
        .iter()
        .copied()
        .filter(|id| anc.contains(id) && left.contains(id) && right.contains(id))
        .collect();
    let restrict = |list: &[ObjectId]| -> Vec<ObjectId> {
        list.iter().copied().filter(|id| common.contains(id)).collect()
    };
    let ord_anc = restrict(anc);
    let ord_left = restrict(left);
    let ord_right = restrict(right);
    let ord_merged = restrict(merged);

    let target = match three_way(&ord_anc, &ord_left, &ord_right, ctx.pick(path)) {
        Resolved::Value(order) => order,
        Resolved::Divergent => {
            ctx.record(Conflict {
                kind: ConflictKind::ChildOrder,
                path: path.clone(),
                left: ConflictValue::Order {
                    ids: ord_left.clone(),
                },
                right: ConflictValue::Order {
                    ids: ord_right.clone(),
                },
            });
            ord_merged
        }
    };

    // Rewrite the common elements to the target relative order, leaving
    // non-common elements in place by interpolation.
    let mut out: Vec<ObjectId> = merged.to_vec();
    let mut next = target.iter().copied();
    for slot in &mut out {
        if common.contains(slot) {
            if let Some(id) = next.next() {
                *slot = id;
            }
        }
    }

    // Deletion by either branch wins.
    out.retain(|&id| {
        let deleted = ctx.ancestor.contains_node(id)
            && (!left_doc.contains_node(id) || !right_doc.contains_node(id));
        !deleted
    });

    // Branch-new children, left first.
    for (branch, list) in [(left_doc, left), (right_doc, right)] {
        for (idx, &id) in list.iter().enumerate() {
            if ctx.ancestor.contains_node(id) || out.contains(&id) {
                continue;
            }
            clone::ensure_node(branch, &mut ctx.merged, id)?;
            let prefix = &list[..idx];
            let pos = out
                .iter()
                .rposition(|placed| prefix.contains(placed))
                .map_or(0, |p| p + 1);
            out.insert(pos, id);
            trace!(node = %id, position = pos, "inserted branch-new child");
        }
    }

    Ok(out)
}

/// Write a tag's or slot's final child list back and repoint the children.
fn set_plain_children(ctx: &mut MergeCtx, node: ObjectId, list: Vec<ObjectId>) {
    if let Some(n) = ctx.merged.node_mut(node) {
        match &mut n.kind {
            TplKind::Tag { children, .. } => *children = list.clone(),
            TplKind::Slot {
                default_contents, ..
            } => *default_contents = list.clone(),
            TplKind::Instance { .. } => {}
        }
    }
    for id in list {
        if let Some(child) = ctx.merged.node_mut(id) {
            child.parent = Some(node);
        }
    }
}

// ---------------------------------------------------------------------------
// Slot bindings
// ---------------------------------------------------------------------------

/// A slot argument's merge-visible state on one branch.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Binding {
    /// Use the slot's default contents (explicitly, or by having no arg).
    Virtual,
    /// Explicit children.
    Concrete(Vec<ObjectId>),
}

fn binding_of(doc: &Document, node: ObjectId, param: ObjectId) -> Binding {
    doc.node(node)
        .and_then(|n| n.base_vsetting())
        .and_then(|vs| vs.arg_for(param))
        .map_or(Binding::Virtual, |arg| match &arg.value {
            ArgValue::Content { children } => Binding::Concrete(children.clone()),
            ArgValue::Scalar { .. } | ArgValue::UseDefault { .. } => Binding::Virtual,
        })
}

/// Reconcile one slot parameter of an instance node across the three views.
fn merge_slot_binding(
    ctx: &mut MergeCtx,
    comp: ObjectId,
    node: ObjectId,
    param: ObjectId,
) -> Result<(), MergeError> {
    let va = binding_of(ctx.ancestor, node, param);
    let vl = binding_of(ctx.left, node, param);
    let vr = binding_of(ctx.right, node, param);
    let vm = binding_of(&ctx.merged, node, param);
    let path = children_order_path(comp, node, Some(param));

    match (vl, vr) {
        (Binding::Concrete(l), Binding::Concrete(r)) => {
            let anc = match va {
                Binding::Concrete(a) => a,
                Binding::Virtual => Vec::new(),
            };
            let merged = match vm {
                Binding::Concrete(m) => m,
                Binding::Virtual => Vec::new(),
            };
            let out = reconcile_list(ctx, &path, &anc, &l, &r, &merged)?;
            set_concrete(ctx, node, param, out);
        }
        (Binding::Virtual, Binding::Virtual) => {
            if vm != Binding::Virtual {
                set_virtual(ctx, node, param);
            }
        }
        (Binding::Virtual, Binding::Concrete(r)) => {
            let resolution = flip_resolution(ctx, &path, &va, Side::Left, &r);
            apply_flip(ctx, node, param, resolution, Side::Right, &r)?;
        }
        (Binding::Concrete(l), Binding::Virtual) => {
            let resolution = flip_resolution(ctx, &path, &va, Side::Right, &l);
            apply_flip(ctx, node, param, resolution, Side::Left, &l)?;
        }
    }
    Ok(())
}

/// Decide a virtual-vs-concrete disagreement. `virtual_side` is the branch
/// that binds the slot virtually; `concrete` is the other branch's list.
fn flip_resolution(
    ctx: &mut MergeCtx,
    path: &ModelPath,
    anc: &Binding,
    virtual_side: Side,
    concrete: &[ObjectId],
) -> Option<Side> {
    match anc {
        // Only the concrete branch changed.
        Binding::Virtual => Some(virtual_side.opposite()),
        Binding::Concrete(a) => {
            if a == concrete {
                // Only the virtual branch changed.
                Some(virtual_side)
            } else if let Some(side) = ctx.pick(path) {
                Some(side)
            } else {
                let concrete_value = ConflictValue::Order {
                    ids: concrete.to_vec(),
                };
                let (left, right) = match virtual_side {
                    Side::Left => (ConflictValue::UseDefault, concrete_value),
                    Side::Right => (concrete_value, ConflictValue::UseDefault),
                };
                ctx.record(Conflict {
                    kind: ConflictKind::ChildOrder,
                    path: path.clone(),
                    left,
                    right,
                });
                None
            }
        }
    }
}

/// Apply a resolved flip. `concrete_side` is the branch holding `concrete`;
/// `None` keeps the merged (ancestor) projection.
fn apply_flip(
    ctx: &mut MergeCtx,
    node: ObjectId,
    param: ObjectId,
    resolution: Option<Side>,
    concrete_side: Side,
    concrete: &[ObjectId],
) -> Result<(), MergeError> {
    match resolution {
        Some(side) if side == concrete_side => {
            let branch = ctx.branch(side);
            for &id in concrete {
                clone::ensure_node(branch, &mut ctx.merged, id)?;
            }
            set_concrete(ctx, node, param, concrete.to_vec());
        }
        Some(_) => set_virtual(ctx, node, param),
        None => {}
    }
    Ok(())
}

fn set_concrete(ctx: &mut MergeCtx, node: ObjectId, param: ObjectId, list: Vec<ObjectId>) {
    if let Some(n) = ctx.merged.node_mut(node) {
        let vs = n.base_vsetting_mut();
        match vs.arg_for_mut(param) {
            Some(arg) => {
                arg.value = ArgValue::Content {
                    children: list.clone(),
                };
            }
            None => vs.args.push(Arg::content(param, list.clone())),
        }
    }
    for id in list {
        if let Some(child) = ctx.merged.node_mut(id) {
            child.parent = Some(node);
        }
    }
}

fn set_virtual(ctx: &mut MergeCtx, node: ObjectId, param: ObjectId) {
    if let Some(n) = ctx.merged.node_mut(node) {
        let vs = n.base_vsetting_mut();
        match vs.arg_for_mut(param) {
            Some(arg) => {
                arg.value = ArgValue::UseDefault {
                    contents: Vec::new(),
                };
            }
            None => vs.args.push(Arg::use_default(param)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
