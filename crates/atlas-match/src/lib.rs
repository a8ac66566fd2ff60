//! Align brain region ids across ontology resolutions.
//!
//! Datasets come keyed at whatever resolution they were measured at (cortical
//! layers, nuclei, whole divisions). This crate attributes such ids to a
//! reference list of coarser regions and rebuilds tables under a
//! `(coarse, mid, fine)` key. It only needs the [`Hierarchy`] trait, so any
//! tree that can answer ancestry questions plugs in.
//!
//! # How it works
//! 1. For each input id, walk the reference list in order.
//! 2. Exact id, input inside reference, reference inside input, or
//!    ventricular system: the first rule to fire picks the target.
//! 3. Optionally retry unmatched ids through the obsolete-id tables.
//! 4. The [`Reindexer`] runs steps 1–3 against the mid and coarse tiers and
//!    drops rows that fail either.
//!
//! # Example
//! ```no_run
//! use atlas_match::{FlatTable, ObsoleteTables, Reindexer, StructureMatcher};
//! use atlas_ontology::Ontology;
//! use atlas_types::RegionId;
//!
//! # fn main() -> anyhow::Result<()> {
//! let atlas = Ontology::load("structures.json")?;
//! let tables = ObsoleteTables::allen_ccf_2017();
//! let matcher = StructureMatcher::new(&atlas).with_obsolete_fallback(&tables);
//!
//! let out = matcher.match_ids(&[RegionId(593)], &atlas.major_division_ids());
//! println!("{:?} unmatched: {:?}", out.matched, out.unmatched);
//!
//! let reindexer = Reindexer::new(matcher, atlas.major_division_ids(), atlas.mid_ontology_ids());
//! let table: FlatTable<f64> = [(RegionId(593), 0.42)].into_iter().collect();
//! let keyed = reindexer.reindex(table);
//! # Ok(()) }
//! ```

pub mod matcher;
pub mod obsolete;
pub mod reindex;

pub use atlas_types::Hierarchy;
pub use matcher::{MatchOutcome, StructureMatcher, match_structure_id_lists};
pub use obsolete::{ObsoleteTables, Resolver};
pub use reindex::{DroppedRow, FlatTable, HierarchicalTable, HierarchyKey, Reindexed, Reindexer, Tier};

#[cfg(test)]
mod test_support {
    use std::collections::HashMap;

    use atlas_types::{Hierarchy, RegionId};

    /// Minimal tree keyed by parent links; names are `"region <id>"`.
    pub struct TestTree {
        parents: HashMap<RegionId, Option<RegionId>>,
        names: HashMap<RegionId, String>,
    }

    impl TestTree {
        pub fn new(edges: &[(u32, Option<u32>)]) -> Self {
            Self {
                parents: edges
                    .iter()
                    .map(|(id, parent)| (RegionId(*id), parent.map(RegionId)))
                    .collect(),
                names: edges
                    .iter()
                    .map(|(id, _)| (RegionId(*id), format!("region {id}")))
                    .collect(),
            }
        }
    }

    impl Hierarchy for TestTree {
        fn contains(&self, id: RegionId) -> bool {
            self.parents.contains_key(&id)
        }

        fn descends_from(&self, id: RegionId, ancestor: RegionId) -> bool {
            let mut cursor = self.parents.get(&id).map(|_| id);
            while let Some(current) = cursor {
                if current == ancestor {
                    return true;
                }
                cursor = self.parents.get(&current).copied().flatten();
            }
            false
        }

        fn name_of(&self, id: RegionId) -> Option<&str> {
            self.names.get(&id).map(String::as_str)
        }
    }

    pub fn ids(raw: &[u32]) -> Vec<RegionId> {
        raw.iter().copied().map(RegionId).collect()
    }
}
