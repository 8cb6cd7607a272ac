//! Component-set reconciliation and the per-component driver.
//!
//! Order of operations per merge run: diff the component sets (deletion by
//! either branch wins, additions are cloned left-first), then for every
//! component common to all three snapshots run, in order: scalar fields, root
//! re-rooting, variant union, the reparent pass, cycle repair, one-branch
//! deletion snapshots, and finally the bottom-up per-node children and
//! variant-setting merges. The component root's parent is cleared last.
//!
//! Concurrent reparenting can weave the two branches' moves into a cycle
//! (left puts X under Y while right puts Y under X). Repair walks each
//! unreachable-but-common node's merged parent chain up to the first
//! ancestor-relative move point, undoes that one move, and re-checks
//! reachability to a fixed point.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::error::MergeError;
use crate::model::conflict::{Conflict, ConflictKind, ConflictValue, Side};
use crate::model::document::Document;
use crate::model::ids::ObjectId;
use crate::model::tpl::{Arg, ArgValue, TplKind};

use super::fields::{self, Resolved, three_way};
use super::{MergeCtx, children, clone, component_path, node_path, vsettings};

// ---------------------------------------------------------------------------
// Component set
// ---------------------------------------------------------------------------

/// Reconcile the document's component set and every common component's tree.
///
/// # Errors
/// Fails on invariant violations only; branch disagreements become conflicts.
pub(crate) fn merge_component_sets(ctx: &mut MergeCtx) -> Result<(), MergeError> {
    let ids = |doc: &Document| -> BTreeSet<ObjectId> {
        doc.components.iter().map(|c| c.id).collect()
    };
    let anc_ids = ids(ctx.ancestor);
    let left_ids = ids(ctx.left);
    let right_ids = ids(ctx.right);

    // Deletion by either branch wins.
    let before = ctx.merged.components.len();
    ctx.merged.components.retain(|c| {
        !(anc_ids.contains(&c.id)
            && (!left_ids.contains(&c.id) || !right_ids.contains(&c.id)))
    });
    let deleted = before - ctx.merged.components.len();

    // Additions, left first, each branch in its own document order.
    let left_doc = ctx.left;
    let right_doc = ctx.right;
    let mut added = 0_usize;
    for comp in &left_doc.components {
        if !anc_ids.contains(&comp.id) {
            clone::ensure_component(left_doc, &mut ctx.merged, comp.id)?;
            added += 1;
        }
    }
    for comp in &right_doc.components {
        if !anc_ids.contains(&comp.id) && !ctx.merged.has_component(comp.id) {
            clone::ensure_component(right_doc, &mut ctx.merged, comp.id)?;
            added += 1;
        }
    }
    debug!(deleted, added, "component set reconciled");

    let common: Vec<ObjectId> = ctx
        .merged
        .components
        .iter()
        .map(|c| c.id)
        .filter(|id| anc_ids.contains(id) && left_ids.contains(id) && right_ids.contains(id))
        .collect();
    for comp in common {
        merge_common_component(ctx, comp)?;
    }
    Ok(())
}

fn merged_root(ctx: &MergeCtx, comp: ObjectId) -> Result<ObjectId, MergeError> {
    ctx.merged
        .component(comp)
        .map(|c| c.root)
        .ok_or(MergeError::MissingObject {
            what: "component",
            id: comp,
        })
}

fn merge_common_component(ctx: &mut MergeCtx, comp: ObjectId) -> Result<(), MergeError> {
    trace!(component = %comp, "merging component");
    fields::merge_component_fields(ctx, comp)?;
    merge_root(ctx, comp)?;
    vsettings::merge_component_variants(ctx, comp)?;
    reparent_pass(ctx, comp)?;
    repair_cycles(ctx, comp)?;
    snapshot_single_branch_deletions(ctx, comp)?;

    // Per-node content merges, bottom-up over the current merged tree.
    let root = merged_root(ctx, comp)?;
    let mut order = ctx.merged.flatten_owned(root);
    order.reverse();
    for node in order {
        if ctx.ancestor.contains_node(node)
            && ctx.left.contains_node(node)
            && ctx.right.contains_node(node)
        {
            fields::merge_node_fields(ctx, comp, node)?;
            children::merge_children(ctx, comp, node)?;
            vsettings::merge_variant_settings(ctx, comp, node)?;
        }
    }

    // The root is definitionally parentless; re-point everything else at its
    // actual owner.
    let root = merged_root(ctx, comp)?;
    ctx.merged.fix_parent_pointers(root);
    Ok(())
}

// ---------------------------------------------------------------------------
// Re-rooting
// ---------------------------------------------------------------------------

/// Three-way merge of which node is the component's tree root. Accepting one
/// side wholesale discards the other's subtree, so a genuine disagreement is
/// always a conflict with no default beyond the ancestor's root.
fn merge_root(ctx: &mut MergeCtx, comp: ObjectId) -> Result<(), MergeError> {
    let missing = MergeError::MissingObject {
        what: "component",
        id: comp,
    };
    let ra = ctx.ancestor.component(comp).ok_or_else(|| missing.clone())?.root;
    let rl = ctx.left.component(comp).ok_or_else(|| missing.clone())?.root;
    let rr = ctx.right.component(comp).ok_or(missing)?.root;
    let path = component_path(comp).field("tpl_tree");

    match three_way(&ra, &rl, &rr, ctx.pick(&path)) {
        Resolved::Value(root) => {
            let current = merged_root(ctx, comp)?;
            if root != current {
                let source = if root == rl { ctx.left } else { ctx.right };
                clone::ensure_node(source, &mut ctx.merged, root)?;
                if let Some(c) = ctx.merged.component_mut(comp) {
                    c.root = root;
                }
                if let Some(n) = ctx.merged.node_mut(root) {
                    n.parent = None;
                }
                debug!(component = %comp, root = %root, "tree re-rooted");
            }
        }
        Resolved::Divergent => {
            ctx.record(Conflict {
                kind: ConflictKind::TreeRoot,
                path,
                left: ConflictValue::Object { id: Some(rl) },
                right: ConflictValue::Object { id: Some(rr) },
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reparenting
// ---------------------------------------------------------------------------

fn reparent_pass(ctx: &mut MergeCtx, comp: ObjectId) -> Result<(), MergeError> {
    let root = merged_root(ctx, comp)?;
    let nodes = ctx.merged.flatten_owned(root);
    for node in nodes {
        // Parent changes of a node that is the root in any snapshot are
        // re-rooting artifacts, handled by the root merge.
        let is_root_somewhere = [ctx.ancestor, ctx.left, ctx.right]
            .iter()
            .any(|d| d.component(comp).is_some_and(|c| c.root == node));
        if node == root || is_root_somewhere {
            continue;
        }
        let (Some(pa), Some(pl), Some(pr)) = (
            ctx.ancestor.node(node).map(|n| n.parent),
            ctx.left.node(node).map(|n| n.parent),
            ctx.right.node(node).map(|n| n.parent),
        ) else {
            continue;
        };
        let pm = ctx.merged.node(node).and_then(|n| n.parent);

        let decision = if pl == pr {
            (pl != pm).then_some((pl, Side::Left))
        } else if pl == pa {
            (pr != pm).then_some((pr, Side::Right))
        } else if pr == pa {
            (pl != pm).then_some((pl, Side::Left))
        } else {
            let path = node_path(comp, node).field("parent");
            match ctx.pick(&path) {
                Some(side) => {
                    let target = if side == Side::Left { pl } else { pr };
                    (target != pm).then_some((target, side))
                }
                None => {
                    ctx.record(Conflict {
                        kind: ConflictKind::NodeParent,
                        path,
                        left: ConflictValue::Object { id: pl },
                        right: ConflictValue::Object { id: pr },
                    });
                    None
                }
            }
        };

        if let Some((Some(target), side)) = decision {
            let source = ctx.branch(side);
            trace!(node = %node, target = %target, side = %side, "reparenting");
            move_node(ctx, node, target, source)?;
        }
    }
    Ok(())
}

/// Detach `node` from its current merged parent and attach it under
/// `new_parent`, inserted immediately after the last already-placed sibling
/// that preceded it in `source`'s child order.
fn move_node(
    ctx: &mut MergeCtx,
    node: ObjectId,
    new_parent: ObjectId,
    source: &Document,
) -> Result<(), MergeError> {
    if let Some(current) = ctx.merged.node(node).and_then(|n| n.parent) {
        ctx.merged.detach_child(current, node);
    }
    if !ctx.merged.contains_node(new_parent) {
        clone::ensure_node(source, &mut ctx.merged, new_parent)?;
    }
    let parent_src = source
        .node(new_parent)
        .ok_or(MergeError::MissingObject {
            what: "node",
            id: new_parent,
        })?;

    match &parent_src.kind {
        TplKind::Tag { children, .. } => {
            let list = children.clone();
            insert_positioned(ctx, node, new_parent, &list, ListSlot::Children);
        }
        TplKind::Slot {
            default_contents, ..
        } => {
            let list = default_contents.clone();
            insert_positioned(ctx, node, new_parent, &list, ListSlot::Defaults);
        }
        TplKind::Instance { .. } => {
            let param = parent_src.base_vsetting().and_then(|vs| {
                vs.args
                    .iter()
                    .find(|a| {
                        a.value
                            .content_children()
                            .is_some_and(|ch| ch.contains(&node))
                    })
                    .map(|a| a.param)
            });
            let comp_ref = ctx.merged.node(new_parent).and_then(|n| match n.kind {
                TplKind::Instance { component } => Some(component),
                _ => None,
            });
            let param_alive = param.is_some_and(|p| {
                comp_ref.is_some_and(|c| {
                    ctx.merged
                        .component(c)
                        .is_some_and(|comp| comp.param(p).is_some())
                })
            });
            if let (Some(param), true) = (param, param_alive) {
                let list = parent_src
                    .base_vsetting()
                    .and_then(|vs| vs.arg_for(param))
                    .and_then(|a| a.value.content_children())
                    .map(<[ObjectId]>::to_vec)
                    .unwrap_or_default();
                insert_positioned(ctx, node, new_parent, &list, ListSlot::Arg(param));
            } else {
                // The slot param is gone on the merged side: detach instead.
                if let Some(n) = ctx.merged.node_mut(node) {
                    n.parent = None;
                }
                trace!(node = %node, "move target param deleted, node detached");
            }
        }
    }
    Ok(())
}

enum ListSlot {
    Children,
    Defaults,
    Arg(ObjectId),
}

fn insert_positioned(
    ctx: &mut MergeCtx,
    node: ObjectId,
    parent: ObjectId,
    src_list: &[ObjectId],
    slot: ListSlot,
) {
    let current = current_list(ctx, parent, &slot);
    if !current.contains(&node) {
        let prefix_end = src_list.iter().position(|&x| x == node).unwrap_or(0);
        let prefix = &src_list[..prefix_end];
        let pos = current
            .iter()
            .rposition(|placed| prefix.contains(placed))
            .map_or(0, |p| p + 1);
        let mut list = current;
        list.insert(pos, node);
        write_list(ctx, parent, &slot, list);
    }
    if let Some(n) = ctx.merged.node_mut(node) {
        n.parent = Some(parent);
    }
}

fn current_list(ctx: &MergeCtx, parent: ObjectId, slot: &ListSlot) -> Vec<ObjectId> {
    let Some(n) = ctx.merged.node(parent) else {
        return Vec::new();
    };
    match (slot, &n.kind) {
        (ListSlot::Children, TplKind::Tag { children, .. }) => children.clone(),
        (
            ListSlot::Defaults,
            TplKind::Slot {
                default_contents, ..
            },
        ) => default_contents.clone(),
        (ListSlot::Arg(param), TplKind::Instance { .. }) => n
            .base_vsetting()
            .and_then(|vs| vs.arg_for(*param))
            .and_then(|a| a.value.content_children())
            .map(<[ObjectId]>::to_vec)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn write_list(ctx: &mut MergeCtx, parent: ObjectId, slot: &ListSlot, list: Vec<ObjectId>) {
    let Some(n) = ctx.merged.node_mut(parent) else {
        return;
    };
    match (slot, &mut n.kind) {
        (ListSlot::Children, TplKind::Tag { children, .. }) => *children = list,
        (
            ListSlot::Defaults,
            TplKind::Slot {
                default_contents, ..
            },
        ) => *default_contents = list,
        (ListSlot::Arg(param), TplKind::Instance { .. }) => {
            let vs = n.base_vsetting_mut();
            match vs.arg_for_mut(*param) {
                Some(arg) => arg.value = ArgValue::Content { children: list },
                None => vs.args.push(Arg::content(*param, list)),
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Cycle repair
// ---------------------------------------------------------------------------

fn repair_cycles(ctx: &mut MergeCtx, comp: ObjectId) -> Result<(), MergeError> {
    let anc_root = ctx
        .ancestor
        .component(comp)
        .ok_or(MergeError::MissingObject {
            what: "component",
            id: comp,
        })?
        .root;
    let candidates: Vec<ObjectId> = ctx
        .ancestor
        .flatten_owned(anc_root)
        .into_iter()
        .filter(|&id| ctx.left.contains_node(id) && ctx.right.contains_node(id))
        .collect();

    let mut passes = 0_usize;
    loop {
        let root = merged_root(ctx, comp)?;
        let reachable: BTreeSet<ObjectId> = ctx.merged.flatten_owned(root).into_iter().collect();
        let mut fixed = false;
        for &node in &candidates {
            if reachable.contains(&node) || !ctx.merged.contains_node(node) {
                continue;
            }
            if revert_first_move(ctx, node)? {
                fixed = true;
                break;
            }
        }
        if !fixed {
            break;
        }
        passes += 1;
    }
    if passes > 0 {
        debug!(component = %comp, passes, "cycle repair converged");
    }
    Ok(())
}

/// Walk up `node`'s merged parent chain to the first node whose merged parent
/// differs from its ancestor parent, and undo that one move. Returns whether
/// anything changed.
fn revert_first_move(ctx: &mut MergeCtx, node: ObjectId) -> Result<bool, MergeError> {
    let mut cur = node;
    let mut seen = BTreeSet::new();
    loop {
        if !seen.insert(cur) {
            return Ok(false);
        }
        let pm = ctx.merged.node(cur).and_then(|n| n.parent);
        if ctx.ancestor.contains_node(cur) {
            let pa = ctx.ancestor.node(cur).and_then(|n| n.parent);
            if pm != pa {
                trace!(node = %cur, "undoing move to break cycle");
                match pa {
                    Some(parent) => {
                        let ancestor = ctx.ancestor;
                        move_node(ctx, cur, parent, ancestor)?;
                    }
                    None => {
                        if let Some(p) = pm {
                            ctx.merged.detach_child(p, cur);
                        }
                        if let Some(n) = ctx.merged.node_mut(cur) {
                            n.parent = None;
                        }
                    }
                }
                return Ok(true);
            }
        }
        match pm {
            Some(p) => cur = p,
            None => return Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// One-branch deletions
// ---------------------------------------------------------------------------

/// For nodes deleted on exactly one branch: copy the surviving branch's
/// scalar payload into the merged node (a "delete" can really be a move plus
/// a later edit elsewhere), then excise the node from its merged parent.
fn snapshot_single_branch_deletions(
    ctx: &mut MergeCtx,
    comp: ObjectId,
) -> Result<(), MergeError> {
    let anc_root = ctx
        .ancestor
        .component(comp)
        .ok_or(MergeError::MissingObject {
            what: "component",
            id: comp,
        })?
        .root;
    let root = merged_root(ctx, comp)?;

    for node in ctx.ancestor.flatten_owned(anc_root) {
        let in_left = ctx.left.contains_node(node);
        let in_right = ctx.right.contains_node(node);
        if in_left == in_right || !ctx.merged.contains_node(node) || node == root {
            continue;
        }
        let survivor = if in_left { ctx.left } else { ctx.right };
        let Some(src) = survivor.node(node) else {
            continue;
        };
        if let Some(dst) = ctx.merged.node_mut(node) {
            if let (TplKind::Tag { tag: dst_tag, .. }, TplKind::Tag { tag: src_tag, .. }) =
                (&mut dst.kind, &src.kind)
            {
                src_tag.clone_into(dst_tag);
            }
            for svs in &src.vsettings {
                if let Some(dvs) = dst
                    .vsettings
                    .iter_mut()
                    .find(|v| v.variants == svs.variants)
                {
                    dvs.attrs.clone_from(&svs.attrs);
                    for sarg in &svs.args {
                        if let ArgValue::Scalar { expr } = &sarg.value {
                            match dvs.arg_for_mut(sarg.param) {
                                Some(darg) => {
                                    darg.value = ArgValue::Scalar { expr: expr.clone() };
                                }
                                None => dvs
                                    .args
                                    .push(Arg::scalar(sarg.param, expr.clone())),
                            }
                        }
                    }
                }
            }
        }
        if let Some(p) = ctx.merged.node(node).and_then(|n| n.parent) {
            ctx.merged.detach_child(p, node);
        }
        if let Some(n) = ctx.merged.node_mut(node) {
            n.parent = None;
        }
        trace!(node = %node, "one-branch deletion excised");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::conflict::Picks;
    use crate::model::document::Component;
    use crate::model::tpl::TplNode;

    fn id(n: u128) -> ObjectId {
        ObjectId::new(n)
    }

    fn tag_with(nid: u128, tag: &str, children: &[u128]) -> TplNode {
        let mut node = TplNode::tag(id(nid), tag);
        if let TplKind::Tag { children: list, .. } = &mut node.kind {
            list.extend(children.iter().map(|&n| id(n)));
        }
        node
    }

    /// Build component 1 from (node id, tag, children) triples; the first
    /// entry is the root.
    fn doc_of(nodes: &[(u128, &str, &[u128])]) -> Document {
        let mut doc = Document::new();
        for &(nid, tag, children) in nodes {
            doc.insert_node(tag_with(nid, tag, children));
        }
        let root = id(nodes[0].0);
        doc.components.push(Component::new(id(1), "Card", root));
        doc.fix_parent_pointers(root);
        doc
    }

    fn run<'a>(
        anc: &'a Document,
        left: &'a Document,
        right: &'a Document,
        picks: &'a Picks,
    ) -> MergeCtx<'a> {
        let mut ctx = MergeCtx::new(anc, left, right, picks);
        merge_component_sets(&mut ctx).unwrap();
        ctx.merged.prune_unreachable();
        ctx
    }

    // -- component set --

    #[test]
    fn added_component_is_cloned() {
        let anc = doc_of(&[(10, "div", &[])]);
        let mut left = doc_of(&[(10, "div", &[])]);
        left.insert_node(TplNode::tag(id(20), "div"));
        left.components.push(Component::new(id(2), "New", id(20)));
        let right = doc_of(&[(10, "div", &[])]);
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert!(ctx.conflicts().is_empty());
        assert!(ctx.merged.has_component(id(2)));
        assert!(ctx.merged.contains_node(id(20)));
    }

    #[test]
    fn deleted_component_wins_over_retention() {
        let mut anc = doc_of(&[(10, "div", &[])]);
        anc.insert_node(TplNode::tag(id(20), "div"));
        anc.components.push(Component::new(id(2), "Old", id(20)));
        let left = doc_of(&[(10, "div", &[])]);
        let right = anc.clone();
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert!(ctx.conflicts().is_empty());
        assert!(!ctx.merged.has_component(id(2)));
        assert!(!ctx.merged.contains_node(id(20)));
    }

    // -- reparenting --

    #[test]
    fn single_branch_move_applies() {
        let anc = doc_of(&[(10, "div", &[11, 12]), (11, "a", &[13]), (12, "b", &[]), (13, "x", &[])]);
        let left = doc_of(&[(10, "div", &[11, 12]), (11, "a", &[]), (12, "b", &[13]), (13, "x", &[])]);
        let right = anc.clone();
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert!(ctx.conflicts().is_empty());
        assert_eq!(ctx.merged.node(id(13)).unwrap().parent, Some(id(12)));
        assert_eq!(ctx.merged.tpl_children(id(12)), vec![id(13)]);
        assert!(ctx.merged.validate().is_ok());
    }

    #[test]
    fn concurrent_divergent_move_conflicts() {
        let anc = doc_of(&[
            (10, "div", &[11, 12, 14]),
            (11, "a", &[13]),
            (12, "b", &[]),
            (13, "x", &[]),
            (14, "c", &[]),
        ]);
        let left = doc_of(&[
            (10, "div", &[11, 12, 14]),
            (11, "a", &[]),
            (12, "b", &[13]),
            (13, "x", &[]),
            (14, "c", &[]),
        ]);
        let right = doc_of(&[
            (10, "div", &[11, 12, 14]),
            (11, "a", &[]),
            (12, "b", &[]),
            (13, "x", &[]),
            (14, "c", &[13]),
        ]);
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert_eq!(ctx.conflicts().len(), 1);
        assert_eq!(ctx.conflicts()[0].kind, ConflictKind::NodeParent);
        // Ancestor projection until a pick arrives.
        assert_eq!(ctx.merged.node(id(13)).unwrap().parent, Some(id(11)));
        assert!(ctx.merged.validate().is_ok());

        // Replaying with a pick reparents with no residual damage.
        let mut picks = Picks::new();
        picks.insert(ctx.conflicts()[0].path.clone(), Side::Right);
        let ctx = run(&anc, &left, &right, &picks);
        assert!(ctx.conflicts().is_empty());
        assert_eq!(ctx.merged.node(id(13)).unwrap().parent, Some(id(14)));
        assert!(ctx.merged.validate().is_ok());
    }

    #[test]
    fn move_insertion_respects_branch_sibling_order() {
        // Left moves 13 into 12's children between 15 and 16.
        let anc = doc_of(&[
            (10, "div", &[11, 12]),
            (11, "a", &[13]),
            (12, "b", &[15, 16]),
            (13, "x", &[]),
            (15, "p", &[]),
            (16, "q", &[]),
        ]);
        let left = doc_of(&[
            (10, "div", &[11, 12]),
            (11, "a", &[]),
            (12, "b", &[15, 13, 16]),
            (13, "x", &[]),
            (15, "p", &[]),
            (16, "q", &[]),
        ]);
        let right = anc.clone();
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert_eq!(
            ctx.merged.tpl_children(id(12)),
            vec![id(15), id(13), id(16)]
        );
    }

    // -- cycle repair --

    #[test]
    fn crossed_moves_are_healed_without_cycles() {
        // Left puts X under Y; right puts Y under X.
        let anc = doc_of(&[(10, "div", &[11, 12]), (11, "x", &[]), (12, "y", &[])]);
        let left = doc_of(&[(10, "div", &[12]), (12, "y", &[11]), (11, "x", &[])]);
        let right = doc_of(&[(10, "div", &[11]), (11, "x", &[12]), (12, "y", &[])]);
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert!(ctx.merged.validate().is_ok());
        // Both nodes survive, reachable from the root.
        let reachable = ctx.merged.flatten_owned(id(10));
        assert!(reachable.contains(&id(11)));
        assert!(reachable.contains(&id(12)));
    }

    // -- re-rooting --

    #[test]
    fn divergent_reroot_is_a_conflict() {
        let anc = doc_of(&[(10, "div", &[])]);
        let left = doc_of(&[(20, "main", &[10]), (10, "div", &[])]);
        let right = doc_of(&[(30, "section", &[10]), (10, "div", &[])]);
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert_eq!(ctx.conflicts().len(), 1);
        assert_eq!(ctx.conflicts()[0].kind, ConflictKind::TreeRoot);
        assert_eq!(ctx.merged.component(id(1)).unwrap().root, id(10));

        let mut picks = Picks::new();
        picks.insert(ctx.conflicts()[0].path.clone(), Side::Left);
        let ctx = run(&anc, &left, &right, &picks);
        assert!(ctx.conflicts().is_empty());
        assert_eq!(ctx.merged.component(id(1)).unwrap().root, id(20));
        assert!(ctx.merged.validate().is_ok());
    }

    #[test]
    fn single_branch_reroot_applies() {
        let anc = doc_of(&[(10, "div", &[])]);
        let left = doc_of(&[(20, "main", &[10]), (10, "div", &[])]);
        let right = anc.clone();
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert!(ctx.conflicts().is_empty());
        assert_eq!(ctx.merged.component(id(1)).unwrap().root, id(20));
        assert_eq!(ctx.merged.node(id(10)).unwrap().parent, Some(id(20)));
        assert!(ctx.merged.validate().is_ok());
    }

    // -- deletions --

    #[test]
    fn node_deleted_on_one_branch_is_excised() {
        let anc = doc_of(&[(10, "div", &[11, 12]), (11, "a", &[]), (12, "b", &[])]);
        let left = doc_of(&[(10, "div", &[12]), (12, "b", &[])]);
        let right = anc.clone();
        let picks = Picks::new();
        let ctx = run(&anc, &left, &right, &picks);
        assert!(ctx.conflicts().is_empty());
        assert!(!ctx.merged.contains_node(id(11)));
        assert_eq!(ctx.merged.tpl_children(id(10)), vec![id(12)]);
    }
}
