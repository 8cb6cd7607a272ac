//! Variant and variant-setting reconciliation.
//!
//! Variants have derived identity (the base combination, sorted selector
//! sets scoped to a node, or a grouped variant's own id), so settings are
//! matched across branches by the multiset of their variant keys, never by
//! list position. A setting present in the ancestor but missing from either
//! branch is dropped; a setting both branches introduced independently gets a
//! synthesized empty ancestor so the ordinary field diff can report real
//! conflicts instead of blindly picking one branch.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::error::MergeError;
use crate::model::document::{Component, Variant, VariantKey};
use crate::model::ids::ObjectId;
use crate::model::tpl::{Arg, ArgValue, VariantSetting};

use super::fields::merge_optional_text;
use super::{MergeCtx, clone, node_in, node_path};

// ---------------------------------------------------------------------------
// Component variants
// ---------------------------------------------------------------------------

/// Union a component's declared variants across the three snapshots, keyed by
/// derived identity. Deletion by either branch wins; branch-new variants are
/// appended left-first.
///
/// # Errors
/// Fails if any snapshot is missing the component.
pub(crate) fn merge_component_variants(
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

    let keys = |c: &Component| -> BTreeSet<VariantKey> {
        c.variants.iter().map(Variant::key).collect()
    };
    let anc_keys = keys(anc);
    let left_keys = keys(left);
    let right_keys = keys(right);

    let mut additions: Vec<Variant> = Vec::new();
    let mut added_keys = BTreeSet::new();
    for branch in [left, right] {
        for variant in &branch.variants {
            let key = variant.key();
            if !anc_keys.contains(&key) && !added_keys.contains(&key) {
                added_keys.insert(key);
                additions.push(variant.clone());
            }
        }
    }

    let Some(merged) = ctx.merged.component_mut(comp) else {
        return Ok(());
    };
    merged
        .variants
        .retain(|v| left_keys.contains(&v.key()) && right_keys.contains(&v.key()));
    let surviving: BTreeSet<VariantKey> = merged.variants.iter().map(Variant::key).collect();
    for variant in additions {
        if !surviving.contains(&variant.key()) {
            merged.variants.push(variant);
        }
    }
    trace!(component = %comp, variants = ctx.merged.component(comp).map_or(0, |c| c.variants.len()), "variants unioned");
    Ok(())
}

// ---------------------------------------------------------------------------
// Variant settings
// ---------------------------------------------------------------------------

/// Reconcile the variant settings of one node common to all three snapshots.
/// Must run after [`merge_component_variants`] so branch-new settings can be
/// re-keyed onto the merged component's variants.
///
/// # Errors
/// Fails on a setting referencing an undeclared variant.
pub(crate) fn merge_variant_settings(
    ctx: &mut MergeCtx,
    comp: ObjectId,
    node: ObjectId,
) -> Result<(), MergeError> {
    let missing = MergeError::MissingObject {
        what: "component",
        id: comp,
    };
    let anc_c = ctx.ancestor.component(comp).ok_or_else(|| missing.clone())?;
    let left_c = ctx.left.component(comp).ok_or_else(|| missing.clone())?;
    let right_c = ctx.right.component(comp).ok_or_else(|| missing.clone())?;
    let merged_c = ctx.merged.component(comp).ok_or(missing)?.clone();

    let anc_n = node_in(ctx.ancestor, node)?;
    let left_n = node_in(ctx.left, node)?;
    let right_n = node_in(ctx.right, node)?;
    let Some(current) = ctx.merged.node(node).cloned() else {
        return Ok(());
    };

    let anc_map = keyed(anc_c, &anc_n.vsettings)?;
    let left_map = keyed(left_c, &left_n.vsettings)?;
    let right_map = keyed(right_c, &right_n.vsettings)?;

    let mut out: Vec<VariantSetting> = Vec::new();
    let mut out_keys: BTreeSet<Vec<VariantKey>> = BTreeSet::new();

    for vs in &current.vsettings {
        let key = key_of(&vs.variants, &[&merged_c, anc_c])?;
        match (
            anc_map.get(&key),
            left_map.get(&key),
            right_map.get(&key),
        ) {
            (Some(_), None, _) | (Some(_), _, None) => {
                trace!(node = %node, combo = %combo_label(&key), "setting dropped by a branch");
            }
            (Some(a), Some(l), Some(r)) => {
                let merged_vs = diff_setting(ctx, comp, node, &key, a, l, r, vs.clone());
                out_keys.insert(key);
                out.push(merged_vs);
            }
            (None, _, _) => {
                // Not ancestor-derived (already reconciled earlier); keep.
                out_keys.insert(key);
                out.push(vs.clone());
            }
        }
    }

    // Branch-new settings, left first.
    let left_doc = ctx.left;
    let right_doc = ctx.right;
    for vs in &left_n.vsettings {
        let key = key_of(&vs.variants, &[left_c])?;
        if anc_map.contains_key(&key) || out_keys.contains(&key) {
            continue;
        }
        let variants = remap_variants(left_c, &merged_c, &vs.variants)?;
        let merged_vs = if let Some(r) = right_map.get(&key) {
            // Both branches added it: diff against a synthesized empty base.
            let empty = VariantSetting::for_variants(variants.clone());
            diff_setting(ctx, comp, node, &key, &empty, vs, r, empty.clone())
        } else {
            let mut copy = vs.clone();
            copy.variants = variants;
            adopt_setting_children(ctx, left_doc, node, &copy)?;
            copy
        };
        out_keys.insert(key);
        out.push(merged_vs);
    }
    for vs in &right_n.vsettings {
        let key = key_of(&vs.variants, &[right_c])?;
        if anc_map.contains_key(&key) || out_keys.contains(&key) {
            continue;
        }
        let mut copy = vs.clone();
        copy.variants = remap_variants(right_c, &merged_c, &vs.variants)?;
        adopt_setting_children(ctx, right_doc, node, &copy)?;
        out_keys.insert(key);
        out.push(copy);
    }

    if let Some(n) = ctx.merged.node_mut(node) {
        n.vsettings = out;
    }
    Ok(())
}

/// Field-diff two branch versions of one matched setting. Scalar args and
/// attrs go through the three-way rules; content-bearing args are owned by
/// the children machinery and pass through from `current` untouched.
#[allow(clippy::too_many_arguments)]
fn diff_setting(
    ctx: &mut MergeCtx,
    comp: ObjectId,
    node: ObjectId,
    key: &[VariantKey],
    anc: &VariantSetting,
    left: &VariantSetting,
    right: &VariantSetting,
    current: VariantSetting,
) -> VariantSetting {
    let combo = combo_label(key);
    let base_path = node_path(comp, node).field("vsettings").field(&combo);
    let mut merged = current;

    // Attrs: union of names across the three views.
    let mut names: BTreeSet<&String> = BTreeSet::new();
    names.extend(anc.attrs.keys());
    names.extend(left.attrs.keys());
    names.extend(right.attrs.keys());
    for name in names {
        let value = merge_optional_text(
            ctx,
            base_path.clone().field("attrs").field(name),
            name,
            anc.attrs.get(name),
            left.attrs.get(name),
            right.attrs.get(name),
        );
        match value {
            Some(v) => {
                merged.attrs.insert(name.clone(), v);
            }
            None => {
                merged.attrs.remove(name);
            }
        }
    }

    // Scalar args: union of params bound to a scalar in any view.
    let mut params: Vec<ObjectId> = Vec::new();
    for vs in [anc, left, right] {
        for arg in &vs.args {
            if matches!(arg.value, ArgValue::Scalar { .. }) && !params.contains(&arg.param) {
                params.push(arg.param);
            }
        }
    }
    for param in params {
        let value = merge_optional_text(
            ctx,
            base_path.clone().field("args").id(param).field("expr"),
            "expr",
            scalar_of(anc, param).as_ref(),
            scalar_of(left, param).as_ref(),
            scalar_of(right, param).as_ref(),
        );
        match value {
            Some(expr) => match merged.arg_for_mut(param) {
                Some(arg) => arg.value = ArgValue::Scalar { expr },
                None => merged.args.push(Arg::scalar(param, expr)),
            },
            None => merged.args.retain(|a| {
                a.param != param || !matches!(a.value, ArgValue::Scalar { .. })
            }),
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Keying helpers
// ---------------------------------------------------------------------------

fn keyed<'s>(
    comp: &Component,
    settings: &'s [VariantSetting],
) -> Result<BTreeMap<Vec<VariantKey>, &'s VariantSetting>, MergeError> {
    let mut map = BTreeMap::new();
    for vs in settings {
        let key = comp.vsetting_key(&vs.variants)?;
        map.entry(key).or_insert(vs);
    }
    Ok(map)
}

/// Derive a setting's key, trying each component in turn (the merged node can
/// reference variants declared on either the merged or ancestor component
/// while the union pass is mid-flight).
fn key_of(
    variants: &[ObjectId],
    comps: &[&Component],
) -> Result<Vec<VariantKey>, MergeError> {
    let mut last = MergeError::MissingVariant {
        id: variants.first().copied().unwrap_or(ObjectId::new(0)),
    };
    for comp in comps {
        match comp.vsetting_key(variants) {
            Ok(key) => return Ok(key),
            Err(err) => last = err,
        }
    }
    Err(last)
}

/// Stable display label for a variant combination, usable as a path step.
fn combo_label(key: &[VariantKey]) -> String {
    if key.is_empty() {
        "base".to_owned()
    } else {
        key.iter()
            .map(VariantKey::canonical)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Rewrite a branch setting's variant ids onto the merged component's
/// variants with the same derived keys.
fn remap_variants(
    branch: &Component,
    merged: &Component,
    variants: &[ObjectId],
) -> Result<Vec<ObjectId>, MergeError> {
    let mut out = Vec::with_capacity(variants.len());
    for &id in variants {
        let key = branch
            .variant(id)
            .ok_or(MergeError::MissingVariant { id })?
            .key();
        let target = merged
            .variants
            .iter()
            .find(|v| v.key() == key)
            .ok_or(MergeError::MissingVariant { id })?;
        out.push(target.id);
    }
    Ok(out)
}

/// Clone any content children a newly adopted setting references.
fn adopt_setting_children(
    ctx: &mut MergeCtx,
    branch: &crate::model::document::Document,
    node: ObjectId,
    vs: &VariantSetting,
) -> Result<(), MergeError> {
    for arg in &vs.args {
        if let ArgValue::Content { children } = &arg.value {
            for &child in children {
                clone::ensure_node(branch, &mut ctx.merged, child)?;
                if let Some(n) = ctx.merged.node_mut(child) {
                    n.parent = Some(node);
                }
            }
        }
    }
    Ok(())
}

fn scalar_of(vs: &VariantSetting, param: ObjectId) -> Option<String> {
    vs.arg_for(param).and_then(|arg| match &arg.value {
        ArgValue::Scalar { expr } => Some(expr.clone()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
