//! Declarative scalar three-way rules (the direct-field detector).
//!
//! The rule is the classic one: both branches agree → apply; exactly one
//! branch changed relative to the ancestor → apply that branch; both changed
//! to different values → conflict, with the merged document keeping the
//! ancestor's projection until a pick arrives. Left is compared first, so a
//! pick-free outcome never depends on argument order beyond the documented
//! left-before-right preference.

use tracing::trace;

use crate::error::MergeError;
use crate::model::conflict::{Conflict, ConflictKind, ConflictValue, Side};
use crate::model::ids::ObjectId;
use crate::model::path::ModelPath;
use crate::model::tpl::TplKind;

use super::{MergeCtx, component_path, node_in, node_path};

// ---------------------------------------------------------------------------
// three_way
// ---------------------------------------------------------------------------

/// Outcome of one three-way value comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolved<T> {
    /// A single winning value.
    Value(T),
    /// Both branches changed the value incompatibly and no pick was supplied.
    Divergent,
}

/// The core rule. A supplied pick turns a divergence into that side's value.
pub(crate) fn three_way<T: Clone + PartialEq>(
    anc: &T,
    left: &T,
    right: &T,
    pick: Option<Side>,
) -> Resolved<T> {
    if left == right {
        Resolved::Value(left.clone())
    } else if left == anc {
        Resolved::Value(right.clone())
    } else if right == anc {
        Resolved::Value(left.clone())
    } else {
        match pick {
            Some(Side::Left) => Resolved::Value(left.clone()),
            Some(Side::Right) => Resolved::Value(right.clone()),
            None => Resolved::Divergent,
        }
    }
}

/// Three-way merge of one optional text field, recording a [`ConflictKind::Field`]
/// on divergence. Returns the value the merged document should carry.
pub(crate) fn merge_optional_text(
    ctx: &mut MergeCtx,
    path: ModelPath,
    field: &str,
    anc: Option<&String>,
    left: Option<&String>,
    right: Option<&String>,
) -> Option<String> {
    let a = anc.cloned();
    let l = left.cloned();
    let r = right.cloned();
    match three_way(&a, &l, &r, ctx.pick(&path)) {
        Resolved::Value(v) => v,
        Resolved::Divergent => {
            ctx.record(Conflict {
                kind: ConflictKind::Field {
                    field: field.to_owned(),
                },
                path,
                left: ConflictValue::Scalar { text: l },
                right: ConflictValue::Scalar { text: r },
            });
            a
        }
    }
}

// ---------------------------------------------------------------------------
// Component fields
// ---------------------------------------------------------------------------

/// Diff the scalar fields of a component present in all three snapshots.
///
/// # Errors
/// Fails if any snapshot is missing the component.
pub(crate) fn merge_component_fields(
    ctx: &mut MergeCtx,
    comp: ObjectId,
) -> Result<(), MergeError> {
    let missing = MergeError::MissingObject {
        what: "component",
        id: comp,
    };
    let anc = ctx.ancestor.component(comp).ok_or_else(|| missing.clone())?;
    let left = ctx.left.component(comp).ok_or_else(|| missing.clone())?;
    let right = ctx.right.component(comp).ok_or(missing)?;

    let name_path = component_path(comp).field("name");
    let name = match three_way(&anc.name, &left.name, &right.name, ctx.pick(&name_path)) {
        Resolved::Value(v) => v,
        Resolved::Divergent => {
            ctx.record(Conflict {
                kind: ConflictKind::Field {
                    field: "name".into(),
                },
                path: name_path,
                left: ConflictValue::Scalar {
                    text: Some(left.name.clone()),
                },
                right: ConflictValue::Scalar {
                    text: Some(right.name.clone()),
                },
            });
            anc.name.clone()
        }
    };

    let page_path = merge_optional_text(
        ctx,
        component_path(comp).field("page_path"),
        "page_path",
        anc.page_path.as_ref(),
        left.page_path.as_ref(),
        right.page_path.as_ref(),
    );

    if let Some(merged) = ctx.merged.component_mut(comp) {
        trace!(component = %comp, name = %name, "component fields merged");
        merged.name = name;
        merged.page_path = page_path;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Node fields
// ---------------------------------------------------------------------------

/// Diff the kind-level scalar fields of a node common to all three snapshots:
/// a tag's element name, a slot's declared param, an instance's component
/// reference.
///
/// # Errors
/// Fails with [`MergeError::TypeMismatch`] when the three snapshots disagree
/// on the node's kind — same-identity nodes must be comparable.
pub(crate) fn merge_node_fields(
    ctx: &mut MergeCtx,
    comp: ObjectId,
    node: ObjectId,
) -> Result<(), MergeError> {
    let anc = node_in(ctx.ancestor, node)?;
    let left = node_in(ctx.left, node)?;
    let right = node_in(ctx.right, node)?;
    if !anc.kind.same_shape(&left.kind) || !anc.kind.same_shape(&right.kind) {
        return Err(MergeError::TypeMismatch { id: node });
    }

    match (&anc.kind, &left.kind, &right.kind) {
        (
            TplKind::Tag { tag: ta, .. },
            TplKind::Tag { tag: tl, .. },
            TplKind::Tag { tag: tr, .. },
        ) => {
            let path = node_path(comp, node).field("tag");
            let value = match three_way(ta, tl, tr, ctx.pick(&path)) {
                Resolved::Value(v) => v,
                Resolved::Divergent => {
                    ctx.record(Conflict {
                        kind: ConflictKind::Field { field: "tag".into() },
                        path,
                        left: ConflictValue::Scalar {
                            text: Some(tl.clone()),
                        },
                        right: ConflictValue::Scalar {
                            text: Some(tr.clone()),
                        },
                    });
                    ta.clone()
                }
            };
            if let Some(TplKind::Tag { tag, .. }) = ctx.merged.node_mut(node).map(|n| &mut n.kind)
            {
                *tag = value;
            }
        }
        (
            TplKind::Slot { param: pa, .. },
            TplKind::Slot { param: pl, .. },
            TplKind::Slot { param: pr, .. },
        ) => {
            let path = node_path(comp, node).field("param");
            let value = merge_object_ref(ctx, path, "param", *pa, *pl, *pr);
            if let Some(TplKind::Slot { param, .. }) =
                ctx.merged.node_mut(node).map(|n| &mut n.kind)
            {
                *param = value;
            }
        }
        (
            TplKind::Instance { component: ca },
            TplKind::Instance { component: cl },
            TplKind::Instance { component: cr },
        ) => {
            let path = node_path(comp, node).field("component");
            let value = merge_object_ref(ctx, path, "component", *ca, *cl, *cr);
            if let Some(TplKind::Instance { component }) =
                ctx.merged.node_mut(node).map(|n| &mut n.kind)
            {
                *component = value;
            }
        }
        _ => unreachable!("shapes verified above"),
    }
    Ok(())
}

fn merge_object_ref(
    ctx: &mut MergeCtx,
    path: ModelPath,
    field: &str,
    anc: ObjectId,
    left: ObjectId,
    right: ObjectId,
) -> ObjectId {
    match three_way(&anc, &left, &right, ctx.pick(&path)) {
        Resolved::Value(v) => v,
        Resolved::Divergent => {
            ctx.record(Conflict {
                kind: ConflictKind::Field {
                    field: field.to_owned(),
                },
                path,
                left: ConflictValue::Object { id: Some(left) },
                right: ConflictValue::Object { id: Some(right) },
            });
            anc
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
