//! Post-merge fixup passes.
//!
//! Independent passes run once after the structural merge, each restoring a
//! document-level invariant the merge itself cannot guarantee:
//!
//! - [`code_components`] — collapse externally-registered components that
//!   reappeared under a new identity, and their duplicated params.
//! - [`virtual_slots`] — give every instance a binding for every declared
//!   slot and materialize default contents for virtual bindings.
//! - [`swapped`] — strip arguments and implicit states stranded by a
//!   component swap.
//! - [`page_paths`] — keep page routes unique, recording each rename as an
//!   auto-reconciliation rather than a conflict.

pub mod code_components;
pub mod page_paths;
pub mod swapped;
pub mod virtual_slots;

pub use code_components::collapse_duplicate_external_components;
pub use page_paths::deduplicate_paths;
pub use swapped::repair_swapped_references;
pub use virtual_slots::materialize_default_slots;
