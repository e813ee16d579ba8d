//! Merging harvested records into the catalog and cross-linking the
//! episode-reference entries to them.
//!
//! Both operations take the current snapshot and return the next one, and
//! re-running either on its own output changes nothing.

use crate::catalog::{Catalog, EpisodeRecord, EpisodeReferences};
use tracing::{debug, warn};

/// Last-write-wins merge keyed by identity. A new record fully replaces the
/// old one, media list included; unseen identities are appended.
pub fn merge<I>(existing: Catalog, new_records: I) -> Catalog
where
    I: IntoIterator<Item = EpisodeRecord>,
{
    let mut catalog = existing;
    for record in new_records {
        let identity = record.identity();
        let replaced = catalog.get(&identity).is_some();
        let position = catalog.upsert(record);
        debug!(%identity, position, replaced, "merged record");
    }
    catalog
}

/// Appends each matching catalog position to the entry's `gallery` list.
/// Existing references are never removed and a position is added at most
/// once. Returns the updated entries and how many gained a reference.
pub fn relink(mut references: EpisodeReferences, catalog: &Catalog) -> (EpisodeReferences, usize) {
    let mut touched = 0;

    for entry in &mut references.episodes {
        let Some(identity) = entry.identity() else {
            continue;
        };
        let Some(position) = catalog.position(&identity) else {
            continue;
        };

        let refs = entry.gallery_refs.get_or_insert_with(Vec::new);
        if !refs.contains(&position) {
            refs.push(position);
            touched += 1;
        }
    }

    (references, touched)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingRef {
    pub entry: usize,
    pub reference: usize,
}

/// References that point past the end of the catalog. These are reported,
/// not removed: relinking only ever adds.
pub fn dangling_refs(references: &EpisodeReferences, catalog: &Catalog) -> Vec<DanglingRef> {
    let mut dangling = Vec::new();
    for (entry_index, entry) in references.episodes.iter().enumerate() {
        for &reference in entry.gallery_refs.iter().flatten() {
            if reference >= catalog.len() {
                dangling.push(DanglingRef {
                    entry: entry_index,
                    reference,
                });
            }
        }
    }
    if !dangling.is_empty() {
        warn!(
            count = dangling.len(),
            catalog_len = catalog.len(),
            "episode references point outside the screencaps catalog"
        );
    }
    dangling
}
