//! Conflict records and resolution picks.
//!
//! A merge never blocks on a conflict: every genuine divergence becomes a
//! [`Conflict`] value keyed by a canonical [`ModelPath`], the merged document
//! keeps the ancestor's projection at that location, and the caller resolves
//! by re-running the merge with a [`Picks`] map. Because the engine is
//! deterministic, the replay reproduces identical paths and applies the chosen
//! side at each picked location.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::ObjectId;
use super::path::ModelPath;

// ---------------------------------------------------------------------------
// Side / Picks
// ---------------------------------------------------------------------------

/// Which branch wins a conflicted location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Take the left branch's version.
    Left,
    /// Take the right branch's version.
    Right,
}

impl Side {
    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// Resolution choices, keyed by conflict path.
///
/// Picks whose paths match no conflict in the replay are ignored; conflicts
/// with no pick are reported again.
pub type Picks = BTreeMap<ModelPath, Side>;

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// The branch value at a conflicted location, in a form an external agent can
/// inspect without holding the documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "value", rename_all = "snake_case")]
pub enum ConflictValue {
    /// A scalar field value (`None` = the field is unset on that branch).
    Scalar {
        /// The branch's value.
        text: Option<String>,
    },
    /// A reference to one object.
    Object {
        /// The referenced id (`None` = no object on that branch).
        id: Option<ObjectId>,
    },
    /// An ordered id sequence (child order, variant combination order).
    Order {
        /// The branch's ordering.
        ids: Vec<ObjectId>,
    },
    /// The branch binds a slot to its default contents instead of an explicit
    /// child list.
    UseDefault,
}

/// What kind of divergence was detected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both branches changed the same scalar field to different values.
    Field {
        /// The field's name.
        field: String,
    },
    /// Both branches replaced a component's root with different trees.
    TreeRoot,
    /// Both branches moved the same node under different parents.
    NodeParent,
    /// Both branches reordered the same siblings incompatibly.
    ChildOrder,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { field } => write!(f, "field {field:?}"),
            Self::TreeRoot => f.write_str("tree root"),
            Self::NodeParent => f.write_str("node parent"),
            Self::ChildOrder => f.write_str("child order"),
        }
    }
}

/// One unresolved divergence between the two branches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// What diverged.
    pub kind: ConflictKind,
    /// Canonical location; use as the key in [`Picks`] to resolve.
    pub path: ModelPath,
    /// The left branch's version.
    pub left: ConflictValue,
    /// The right branch's version.
    pub right: ConflictValue,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflict at {}", self.kind, self.path)
    }
}

// ---------------------------------------------------------------------------
// AutoReconciliation
// ---------------------------------------------------------------------------

/// A silent repair the engine applied instead of reporting a conflict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutoReconciliation {
    /// Two pages collided on the same route; the younger one was renamed.
    DuplicatePagePath {
        /// The renamed component.
        component: ObjectId,
        /// The colliding path.
        original: String,
        /// The path it was moved to.
        renamed: String,
    },
}

impl fmt::Display for AutoReconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicatePagePath {
                component,
                original,
                renamed,
            } => write!(
                f,
                "page {component}: path {original:?} already taken, renamed to {renamed:?}"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
