//! Document data model: identities, components, the node arena, canonical
//! paths, and conflict records.

pub mod conflict;
pub mod document;
pub mod ids;
pub mod path;
pub mod tpl;
