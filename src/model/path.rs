//! Canonical structural paths.
//!
//! A [`ModelPath`] names one location in a document as an ordered sequence of
//! steps: a field name, an object identity, or a list index. The same logical
//! conflict always produces the same path across repeated merge runs, so a
//! path is usable directly as the key of a picks map.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::ObjectId;

// ---------------------------------------------------------------------------
// PathStep
// ---------------------------------------------------------------------------

/// One step of a [`ModelPath`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PathStep {
    /// A named field on the current object.
    Field {
        /// The field name.
        name: String,
    },
    /// An element of a keyed collection, addressed by identity.
    Id {
        /// The element's identity.
        id: ObjectId,
    },
    /// An element of an ordered collection, addressed by position.
    Index {
        /// Zero-based position.
        index: usize,
    },
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { name } => f.write_str(name),
            Self::Id { id } => write!(f, "{id}"),
            Self::Index { index } => write!(f, "#{index}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ModelPath
// ---------------------------------------------------------------------------

/// A canonical path into a document.
///
/// Paths are comparable, hashable, and serialize as the ordered step list,
/// so they work both as stable map keys and as agent-parseable JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelPath(Vec<PathStep>);

impl ModelPath {
    /// The empty path (the document root).
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Append a field-name step.
    #[must_use]
    pub fn field(mut self, name: &str) -> Self {
        self.0.push(PathStep::Field {
            name: name.to_owned(),
        });
        self
    }

    /// Append an identity step.
    #[must_use]
    pub fn id(mut self, id: ObjectId) -> Self {
        self.0.push(PathStep::Id { id });
        self
    }

    /// Append an index step.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathStep::Index { index });
        self
    }

    /// The steps of this path, outermost first.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Returns `true` if this is the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "/{step}")?;
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

    #[test]
    fn builder_appends_steps_in_order() {
        let path = ModelPath::root()
            .field("components")
            .id(ObjectId::new(9))
            .field("name");
        assert_eq!(path.steps().len(), 3);
        assert_eq!(
            path.steps()[0],
            PathStep::Field {
                name: "components".into()
            }
        );
    }

    #[test]
    fn display_is_slash_separated() {
        let path = ModelPath::root().field("components").index(2);
        assert_eq!(format!("{path}"), "/components/#2");
    }

    #[test]
    fn root_displays_as_slash() {
        assert_eq!(format!("{}", ModelPath::root()), "/");
        assert!(ModelPath::root().is_empty());
    }

    #[test]
    fn equal_paths_compare_equal() {
        let a = ModelPath::root().field("tpl").id(ObjectId::new(1));
        let b = ModelPath::root().field("tpl").id(ObjectId::new(1));
        assert_eq!(a, b);
    }

    #[test]
    fn paths_are_usable_as_map_keys() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        let key = ModelPath::root().field("components").id(ObjectId::new(3));
        map.insert(key.clone(), "left");
        assert_eq!(map.get(&key), Some(&"left"));
    }

    #[test]
    fn serde_roundtrip() {
        let path = ModelPath::root()
            .field("components")
            .id(ObjectId::new(5))
            .field("children_order");
        let json = serde_json::to_string(&path).unwrap();
        assert!(json.contains("\"step\":\"field\""));
        assert!(json.contains("\"step\":\"id\""));
        let decoded: ModelPath = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, path);
    }

    #[test]
    fn same_construction_gives_same_key_across_runs() {
        // Replay stability: a path depends only on the ids and field names.
        let mk = || {
            ModelPath::root()
                .field("components")
                .id(ObjectId::new(77))
                .field("tpl")
                .id(ObjectId::new(78))
                .field("parent")
        };
        assert_eq!(mk(), mk());
    }
}
