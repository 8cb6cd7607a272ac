//! Tree nodes and their per-variant decorations.
//!
//! A [`TplNode`] is one node of a component's owned tree. Ownership of
//! children is expressed as `ObjectId` lists into the document's node arena;
//! the `parent` back-pointer is an identity reference too, never a native
//! pointer, so all graph surgery is explicit list/map updates.
//!
//! Slot arguments only carry children on the base variant setting; non-base
//! settings hold scalar overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::ObjectId;

// ---------------------------------------------------------------------------
// ArgValue
// ---------------------------------------------------------------------------

/// The value bound to a parameter by an [`Arg`].
///
/// The virtual/concrete duality of slot content is a first-class tagged
/// variant: a branch switching a slot between "use the default" and explicit
/// children is a structural change, not an ordinary content diff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "value", rename_all = "snake_case")]
pub enum ArgValue {
    /// An ordinary prop binding (opaque expression text).
    Scalar {
        /// The bound expression.
        expr: String,
    },
    /// Explicit slot children supplied by this instance.
    Content {
        /// Owned child nodes, in render order.
        children: Vec<ObjectId>,
    },
    /// Use the slot's default contents.
    ///
    /// `contents` is a derived cache of fresh-identity copies of the slot's
    /// defaults, filled by the materialization fixup after a merge. The merge
    /// itself treats this variant as an empty marker.
    UseDefault {
        /// Materialized default copies (derived, may be empty pre-fixup).
        #[serde(default)]
        contents: Vec<ObjectId>,
    },
}

impl ArgValue {
    /// Returns `true` for the virtual ("use default") variant.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        matches!(self, Self::UseDefault { .. })
    }

    /// Returns `true` for explicit slot children.
    #[must_use]
    pub const fn is_content(&self) -> bool {
        matches!(self, Self::Content { .. })
    }

    /// Explicit children, if this is a concrete content binding.
    #[must_use]
    pub fn content_children(&self) -> Option<&[ObjectId]> {
        match self {
            Self::Content { children } => Some(children),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Arg
// ---------------------------------------------------------------------------

/// Binds a declared param of the referenced component to a value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    /// The param on the referenced component.
    pub param: ObjectId,
    /// The bound value.
    pub value: ArgValue,
}

impl Arg {
    /// Create a scalar prop binding.
    #[must_use]
    pub fn scalar(param: ObjectId, expr: impl Into<String>) -> Self {
        Self {
            param,
            value: ArgValue::Scalar { expr: expr.into() },
        }
    }

    /// Create a concrete slot-content binding.
    #[must_use]
    pub const fn content(param: ObjectId, children: Vec<ObjectId>) -> Self {
        Self {
            param,
            value: ArgValue::Content { children },
        }
    }

    /// Create a virtual (use-default) slot binding with an empty cache.
    #[must_use]
    pub const fn use_default(param: ObjectId) -> Self {
        Self {
            param,
            value: ArgValue::UseDefault {
                contents: Vec::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// VariantSetting
// ---------------------------------------------------------------------------

/// An override record scoped to one combination of variants.
///
/// An empty `variants` list is the always-present base combination. Identity
/// across branches is derived from the variant combination, never assigned.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSetting {
    /// Variants this setting targets (empty = base).
    pub variants: Vec<ObjectId>,
    /// Parameter bindings active under this combination.
    pub args: Vec<Arg>,
    /// Simple scalar overrides (style attributes and the like), diffed
    /// field-by-field by the direct-field machinery.
    pub attrs: BTreeMap<String, String>,
}

impl VariantSetting {
    /// Create the base setting.
    #[must_use]
    pub fn base() -> Self {
        Self::default()
    }

    /// Create a setting targeting the given variants.
    #[must_use]
    pub fn for_variants(variants: Vec<ObjectId>) -> Self {
        Self {
            variants,
            ..Self::default()
        }
    }

    /// Returns `true` if this is the base setting.
    #[must_use]
    pub fn is_base(&self) -> bool {
        self.variants.is_empty()
    }

    /// Find the arg bound to `param`.
    #[must_use]
    pub fn arg_for(&self, param: ObjectId) -> Option<&Arg> {
        self.args.iter().find(|a| a.param == param)
    }

    /// Find the arg bound to `param`, mutably.
    #[must_use]
    pub fn arg_for_mut(&mut self, param: ObjectId) -> Option<&mut Arg> {
        self.args.iter_mut().find(|a| a.param == param)
    }
}

// ---------------------------------------------------------------------------
// TplKind
// ---------------------------------------------------------------------------

/// The three node shapes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TplKind {
    /// A plain element with an ordered child list.
    Tag {
        /// Element name ("div", "button", ...).
        tag: String,
        /// Owned children, in render order.
        children: Vec<ObjectId>,
    },
    /// A slot declaration with default contents.
    Slot {
        /// The slot param this node declares content for.
        param: ObjectId,
        /// Owned default children, used when no argument is supplied.
        default_contents: Vec<ObjectId>,
    },
    /// An instantiation of another component.
    Instance {
        /// The instantiated component.
        component: ObjectId,
    },
}

impl TplKind {
    /// A short variant name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tag { .. } => "tag",
            Self::Slot { .. } => "slot",
            Self::Instance { .. } => "instance",
        }
    }

    /// Returns `true` if `other` has the same shape.
    #[must_use]
    pub const fn same_shape(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Tag { .. }, Self::Tag { .. })
                | (Self::Slot { .. }, Self::Slot { .. })
                | (Self::Instance { .. }, Self::Instance { .. })
        )
    }
}

// ---------------------------------------------------------------------------
// TplNode
// ---------------------------------------------------------------------------

/// One node of a component tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TplNode {
    /// Stable identity.
    pub id: ObjectId,
    /// Owning parent, `None` only for a component root (or a node detached
    /// mid-merge).
    pub parent: Option<ObjectId>,
    /// Per-variant overrides; every node has at least conceptual base state.
    pub vsettings: Vec<VariantSetting>,
    /// Shape-specific payload.
    pub kind: TplKind,
}

impl TplNode {
    /// Create a tag node with no children.
    #[must_use]
    pub fn tag(id: ObjectId, tag: impl Into<String>) -> Self {
        Self {
            id,
            parent: None,
            vsettings: vec![VariantSetting::base()],
            kind: TplKind::Tag {
                tag: tag.into(),
                children: Vec::new(),
            },
        }
    }

    /// Create a slot node with no default contents.
    #[must_use]
    pub fn slot(id: ObjectId, param: ObjectId) -> Self {
        Self {
            id,
            parent: None,
            vsettings: vec![VariantSetting::base()],
            kind: TplKind::Slot {
                param,
                default_contents: Vec::new(),
            },
        }
    }

    /// Create a component-instance node.
    #[must_use]
    pub fn instance(id: ObjectId, component: ObjectId) -> Self {
        Self {
            id,
            parent: None,
            vsettings: vec![VariantSetting::base()],
            kind: TplKind::Instance { component },
        }
    }

    /// The base variant setting, if present.
    #[must_use]
    pub fn base_vsetting(&self) -> Option<&VariantSetting> {
        self.vsettings.iter().find(|vs| vs.is_base())
    }

    /// The base variant setting, created on demand.
    pub fn base_vsetting_mut(&mut self) -> &mut VariantSetting {
        if let Some(i) = self.vsettings.iter().position(VariantSetting::is_base) {
            &mut self.vsettings[i]
        } else {
            self.vsettings.push(VariantSetting::base());
            let last = self.vsettings.len() - 1;
            &mut self.vsettings[last]
        }
    }

    /// Param ids of base slot args bound to concrete (non-virtual) content,
    /// in arg order. A branch flipping a slot between concrete and virtual
    /// shows up as a change in this list.
    #[must_use]
    pub fn concrete_arg_params(&self) -> Vec<ObjectId> {
        self.base_vsetting()
            .map(|vs| {
                vs.args
                    .iter()
                    .filter(|a| a.value.is_content())
                    .map(|a| a.param)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
