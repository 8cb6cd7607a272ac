//! Swapped-reference repair.
//!
//! When the same instance node resolves to different components across the
//! ancestor and the two branches (a component swap), the winning reference
//! may leave behind args bound to the losing component's params and implicit
//! states mirroring the losing component's states. This pass strips both.

use std::collections::BTreeSet;

use tracing::trace;

use crate::model::document::Document;
use crate::model::ids::ObjectId;
use crate::model::tpl::TplKind;

/// Strip arguments and implicit states stranded by component swaps.
pub fn repair_swapped_references(
    ancestor: &Document,
    left: &Document,
    right: &Document,
    merged: &mut Document,
) {
    for node in merged.node_ids() {
        let Some(TplKind::Instance { component }) = merged.node(node).map(|n| n.kind.clone())
        else {
            continue;
        };
        let swapped = [ancestor, left, right].iter().any(|doc| {
            doc.node(node).is_some_and(
                |n| matches!(n.kind, TplKind::Instance { component: c } if c != component),
            )
        });
        if !swapped {
            continue;
        }
        let Some(winner) = merged.component(component) else {
            continue;
        };
        let params: BTreeSet<ObjectId> = winner.params.iter().map(|p| p.id).collect();
        let states: BTreeSet<ObjectId> = winner.states.iter().map(|s| s.id).collect();
        trace!(instance = %node, component = %component, "repairing swapped instance");

        if let Some(n) = merged.node_mut(node) {
            for vs in &mut n.vsettings {
                vs.args.retain(|a| params.contains(&a.param));
            }
        }
        for comp in &mut merged.components {
            comp.states.retain(|s| {
                s.node != Some(node)
                    || s.implicit.is_none_or(|mirrored| states.contains(&mirrored))
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
