//! Page-path deduplication.
//!
//! No two page components may share a route. Collisions the merge introduces
//! (both branches independently claiming a path) are not conflicts — the
//! first occupant in document order keeps the path and later claimants are
//! renamed with a numeric suffix, each rename recorded for audit.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::conflict::AutoReconciliation;
use crate::model::document::Document;

/// Rename colliding page paths; returns one record per rename.
pub fn deduplicate_paths(doc: &mut Document) -> Vec<AutoReconciliation> {
    let mut used: BTreeSet<String> = BTreeSet::new();
    let mut renames = Vec::new();
    for comp in &mut doc.components {
        let Some(path) = comp.page_path.clone() else {
            continue;
        };
        if used.insert(path.clone()) {
            continue;
        }
        let mut n = 2_usize;
        let renamed = loop {
            let candidate = format!("{path}-{n}");
            if !used.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        used.insert(renamed.clone());
        debug!(component = %comp.id, from = %path, to = %renamed, "page path deduplicated");
        renames.push(AutoReconciliation::DuplicatePagePath {
            component: comp.id,
            original: path,
            renamed: renamed.clone(),
        });
        comp.page_path = Some(renamed);
    }
    renames
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::Component;
    use crate::model::ids::ObjectId;
    use crate::model::tpl::TplNode;

    fn id(n: u128) -> ObjectId {
        ObjectId::new(n)
    }

    fn page(cid: u128, root: u128, path: &str) -> Component {
        let mut comp = Component::new(id(cid), format!("Page{cid}"), id(root));
        comp.page_path = Some(path.into());
        comp
    }

    fn doc(paths: &[(u128, &str)]) -> Document {
        let mut doc = Document::new();
        for (i, &(cid, path)) in paths.iter().enumerate() {
            let root = 100 + i as u128;
            doc.insert_node(TplNode::tag(id(root), "div"));
            doc.components.push(page(cid, root, path));
        }
        doc
    }

    #[test]
    fn first_occupant_keeps_the_path() {
        let mut d = doc(&[(1, "/settings"), (2, "/settings")]);
        let recs = deduplicate_paths(&mut d);
        assert_eq!(recs.len(), 1);
        assert_eq!(
            d.component(id(1)).unwrap().page_path.as_deref(),
            Some("/settings")
        );
        assert_eq!(
            d.component(id(2)).unwrap().page_path.as_deref(),
            Some("/settings-2")
        );
        let AutoReconciliation::DuplicatePagePath {
            component,
            original,
            renamed,
        } = &recs[0];
        assert_eq!(*component, id(2));
        assert_eq!(original, "/settings");
        assert_eq!(renamed, "/settings-2");
    }

    #[test]
    fn suffix_skips_taken_candidates() {
        let mut d = doc(&[(1, "/a"), (2, "/a-2"), (3, "/a")]);
        let recs = deduplicate_paths(&mut d);
        assert_eq!(recs.len(), 1);
        assert_eq!(d.component(id(3)).unwrap().page_path.as_deref(), Some("/a-3"));
    }

    #[test]
    fn unique_paths_produce_no_records() {
        let mut d = doc(&[(1, "/a"), (2, "/b")]);
        assert!(deduplicate_paths(&mut d).is_empty());
    }

    #[test]
    fn non_pages_are_ignored() {
        let mut d = Document::new();
        d.insert_node(TplNode::tag(id(100), "div"));
        d.components.push(Component::new(id(1), "Card", id(100)));
        assert!(deduplicate_paths(&mut d).is_empty());
    }
}
