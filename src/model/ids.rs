//! Stable object identity.
//!
//! Every model object — component, node, param, variant, state — carries an
//! [`ObjectId`] assigned at creation and preserved verbatim whenever the
//! object is cloned across branch documents during a merge. This identity,
//! not structural position, is what "the same object" means across the three
//! input snapshots.
//!
//! Internally stored as a `u128` and serialized as a 32-character lowercase
//! hex string for canonical JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// A stable, branch-independent identity for one model object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(u128);

impl ObjectId {
    /// Create an `ObjectId` from a raw `u128`.
    #[must_use]
    pub const fn new(id: u128) -> Self {
        Self(id)
    }

    /// Generate a cryptographically-random `ObjectId`.
    ///
    /// Used only for objects created during a merge that have no identity on
    /// any branch (materialized default-slot copies).
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u128>())
    }

    /// Return the inner `u128` value.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Parse an `ObjectId` from a 32-character lowercase hex string.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 32 lowercase hex digits.
    pub fn from_hex(s: &str) -> Result<Self, ObjectIdError> {
        if s.len() != 32 {
            return Err(ObjectIdError {
                value: s.to_owned(),
                reason: format!("expected 32 hex characters, got {}", s.len()),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(ObjectIdError {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        let n = u128::from_str_radix(s, 16).map_err(|e| ObjectIdError {
            value: s.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self(n))
    }

    /// Return a 32-character lowercase hex representation.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:032x}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = ObjectIdError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_hex()
    }
}

/// Error returned when an `ObjectId` string is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectIdError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ObjectIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ObjectId: {:?} — {}", self.value, self.reason)
    }
}

impl std::error::Error for ObjectIdError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
