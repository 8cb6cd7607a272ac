//! weft — a three-snapshot merge engine for tree-structured component
//! documents.
//!
//! A document is an ordered set of components; each component owns a tree of
//! nodes (tags, slots, component instances) decorated with per-variant
//! overrides and slot arguments. Given a common ancestor snapshot and two
//! independently edited branches, weft folds the three into a single merged
//! document, applying every unambiguous change and reporting the rest as
//! structured [`Conflict`](model::conflict::Conflict)s.
//!
//! # Pipeline
//!
//! 1. **Component-set reconciliation** — additions, deletions, re-rooting,
//!    reparenting, and cycle repair ([`merge::components`]).
//! 2. **Per-node reconciliation** — ordered child lists ([`merge::children`])
//!    and variant settings ([`merge::vsettings`]), bottom-up.
//! 3. **Fixups** — duplicate external-component collapse, default slot
//!    materialization, swapped-reference repair, and page-path deduplication
//!    ([`fixup`]).
//!
//! # Determinism guarantee
//!
//! The same ancestor/left/right inputs (plus the same picks) always produce
//! the same merged document and the same conflict list:
//!
//! - Components and nodes are processed in their stored order; the node arena
//!   iterates in identity order.
//! - Left is consulted before right wherever a non-conflicting default exists.
//! - Conflict keys are canonical structural paths, stable across re-runs, so
//!   a collected picks map is valid to replay.
//!
//! # Resolution model
//!
//! Merging never blocks on user input. One run collects conflicts; the caller
//! gathers side picks keyed by conflict path and re-runs the merge with them.
//! Picked conflicts are applied in place; only newly discovered conflicts are
//! returned.

pub mod error;
pub mod fixup;
pub mod merge;
pub mod model;

pub use error::MergeError;
pub use merge::{MergeOutcome, merge_documents};
