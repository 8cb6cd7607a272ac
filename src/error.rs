//! Fatal merge errors.
//!
//! Only invariant violations are errors: a missing identity match where one
//! is structurally guaranteed, or two "same identity" objects that are not
//! actually comparable. These mean the caller did not supply three related
//! snapshots of the same document lineage, and the merge aborts.
//!
//! Genuine disagreements between branches are never errors — they come back
//! as [`Conflict`](crate::model::conflict::Conflict) data and the merge still
//! produces a best-effort document.

use std::fmt;

use crate::model::ids::ObjectId;

/// A fatal invariant violation detected during a merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeError {
    /// An object that must exist (by identity) in a given document is absent.
    MissingObject {
        /// What kind of object was being looked up ("component", "node", ...).
        what: &'static str,
        /// The identity that failed to resolve.
        id: ObjectId,
    },
    /// Two objects sharing one identity have different node kinds across
    /// branches, so their fields cannot be compared.
    TypeMismatch {
        /// The shared identity.
        id: ObjectId,
    },
    /// A variant setting references a variant its component does not declare.
    MissingVariant {
        /// The unresolvable variant identity.
        id: ObjectId,
    },
    /// The owned-child relation is not a tree (cycle, shared child, or a
    /// parent/child pointer disagreement).
    CorruptTree {
        /// Human-readable description of the violation.
        detail: String,
    },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingObject { what, id } => {
                write!(f, "missing {what} {id} in a document where it must exist")
            }
            Self::TypeMismatch { id } => {
                write!(f, "node {id} has different kinds across branches")
            }
            Self::MissingVariant { id } => {
                write!(f, "variant {id} is not declared by its component")
            }
            Self::CorruptTree { detail } => write!(f, "corrupt tree: {detail}"),
        }
    }
}

impl std::error::Error for MergeError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_object() {
        let err = MergeError::MissingObject {
            what: "component",
            id: ObjectId::new(7),
        };
        let msg = format!("{err}");
        assert!(msg.contains("missing component"));
        assert!(msg.contains(&ObjectId::new(7).to_hex()));
    }

    #[test]
    fn display_type_mismatch() {
        let err = MergeError::TypeMismatch {
            id: ObjectId::new(1),
        };
        assert!(format!("{err}").contains("different kinds"));
    }

    #[test]
    fn display_corrupt_tree() {
        let err = MergeError::CorruptTree {
            detail: "node aa has two parents".into(),
        };
        assert!(format!("{err}").contains("two parents"));
    }
}
