//! Load the Allen mouse brain structure graph into a queryable tree.
//!
//! The ontology arrives as a flat list of [`StructureRecord`]s, each naming its
//! parent. [`Ontology::build`] validates that list once (unique ids, existing
//! parents, no cycles, a single root) and materializes every region's ancestor
//! path, so ancestry tests afterwards are a scan of a short path.
//!
//! The tree is immutable after construction; share it behind an `Arc` across
//! threads without locking.
//!
//! # Features
//! - Bulk projections: [`Ontology::nodes_by_property`] keeps input order and
//!   duplicates, answering [`Lookup::Missing`] for unknown keys instead of
//!   failing the batch.
//! - Ancestry predicates: [`Ontology::descends_from`] and
//!   [`Ontology::descends_from_any`] (both reflexive).
//! - Ontology tiers: coarse, mid and cortical id lists from structure sets.
//! - Colors in hex, raw, normalized and `rgb(...)` form.
//!
//! # Example
//! ```no_run
//! use atlas_ontology::Ontology;
//! use atlas_types::{ColorFormat, RegionId};
//!
//! # fn main() -> anyhow::Result<()> {
//! let atlas = Ontology::load("structures.json")?;
//! let coarse = atlas.major_division_ids();
//! let names = atlas.names(&coarse);
//! let colors = atlas.colors(&coarse, ColorFormat::Hex);
//! assert!(atlas.descends_from(RegionId(385), RegionId(315)));
//! # Ok(()) }
//! ```

mod layer;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use atlas_types::{
    CORTICAL_AREAS_SET, Color, ColorFormat, Hierarchy, Lookup, MAJOR_DIVISIONS_SET,
    MID_ONTOLOGY_SET, Region, RegionId, Rgb, StructureRecord, StructureSetId,
};
pub use layer::extract_layer;

type BitSet = BitVec<usize, Lsb0>;

/// Structural corruption found while building the tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OntologyError {
    #[error("malformed hierarchy: structure list is empty")]
    Empty,
    #[error("malformed hierarchy: region {0} appears more than once")]
    DuplicateId(RegionId),
    #[error("malformed hierarchy: region {id} names missing parent {parent}")]
    MissingParent { id: RegionId, parent: RegionId },
    #[error("malformed hierarchy: region {id} is its own ancestor")]
    Cycle { id: RegionId },
    #[error("malformed hierarchy: structure_id_path of region {id} disagrees with its parent links")]
    PathMismatch { id: RegionId },
    #[error("malformed hierarchy: no root region")]
    NoRoot,
    #[error("malformed hierarchy: multiple roots ({first} and {second})")]
    MultipleRoots { first: RegionId, second: RegionId },
}

/// Compact per-region record handed to presentation code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegionSummary {
    pub id: RegionId,
    pub acronym: String,
    pub name: String,
    pub color: String,
}

/// Key types accepted by [`Ontology::nodes_by_property`].
pub trait LookupKey {
    fn locate(&self, ontology: &Ontology) -> Option<usize>;
}

impl LookupKey for RegionId {
    fn locate(&self, ontology: &Ontology) -> Option<usize> {
        ontology.by_id.get(self).copied()
    }
}

impl LookupKey for &str {
    fn locate(&self, ontology: &Ontology) -> Option<usize> {
        ontology.by_acronym.get(*self).copied()
    }
}

impl LookupKey for String {
    fn locate(&self, ontology: &Ontology) -> Option<usize> {
        ontology.by_acronym.get(self.as_str()).copied()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StructureList {
    Bare(Vec<StructureRecord>),
    Envelope { msg: Vec<StructureRecord> },
}

impl StructureList {
    fn into_records(self) -> Vec<StructureRecord> {
        match self {
            StructureList::Bare(records) | StructureList::Envelope { msg: records } => records,
        }
    }
}

/// Immutable brain structure tree.
#[derive(Debug, Clone)]
pub struct Ontology {
    regions: Vec<Region>,
    by_id: HashMap<RegionId, usize>,
    by_acronym: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    sets: HashMap<StructureSetId, BitSet>,
    root: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    OnChain,
    Done,
}

impl Ontology {
    /// Load a structure list from a JSON file (bare array or `{"msg": [...]}`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening structure list {}", path.display()))?;
        let list: StructureList = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing structure list {}", path.display()))?;
        let ontology = Self::build(list.into_records())
            .with_context(|| format!("building ontology from {}", path.display()))?;
        Ok(ontology)
    }

    /// Parse a structure list held in memory.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let list: StructureList = serde_json::from_str(raw).context("parsing structure list")?;
        Ok(Self::build(list.into_records())?)
    }

    /// Validate raw records and index them.
    pub fn build(records: Vec<StructureRecord>) -> Result<Self, OntologyError> {
        if records.is_empty() {
            return Err(OntologyError::Empty);
        }
        let n = records.len();

        let mut by_id = HashMap::with_capacity(n);
        for (idx, record) in records.iter().enumerate() {
            if by_id.insert(record.id, idx).is_some() {
                return Err(OntologyError::DuplicateId(record.id));
            }
        }

        let mut parents = Vec::with_capacity(n);
        for record in &records {
            let parent = match declared_parent(record)? {
                None => None,
                Some(pid) if pid == record.id => {
                    return Err(OntologyError::Cycle { id: record.id });
                }
                Some(pid) => Some(by_id.get(&pid).copied().ok_or(
                    OntologyError::MissingParent {
                        id: record.id,
                        parent: pid,
                    },
                )?),
            };
            parents.push(parent);
        }

        let ids: Vec<RegionId> = records.iter().map(|r| r.id).collect();
        let paths = materialize_paths(&ids, &parents)?;

        let mut roots = parents
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(idx, _)| idx);
        let root = roots.next().ok_or(OntologyError::NoRoot)?;
        if let Some(second) = roots.next() {
            return Err(OntologyError::MultipleRoots {
                first: ids[root],
                second: ids[second],
            });
        }

        let mut children = vec![Vec::new(); n];
        for (idx, parent) in parents.iter().enumerate() {
            if let Some(p) = parent {
                children[*p].push(idx);
            }
        }

        let mut by_acronym = HashMap::with_capacity(n);
        let mut sets: HashMap<StructureSetId, BitSet> = HashMap::new();
        let mut regions = Vec::with_capacity(n);
        for (idx, (record, path)) in records.into_iter().zip(paths).enumerate() {
            if let Some(supplied) = &record.structure_id_path
                && *supplied != path
            {
                return Err(OntologyError::PathMismatch { id: record.id });
            }
            match by_acronym.entry(record.acronym.clone()) {
                Entry::Occupied(first) => warn!(
                    "acronym {} shared by regions {} and {}; keeping the first",
                    record.acronym,
                    ids[*first.get()],
                    record.id
                ),
                Entry::Vacant(slot) => {
                    slot.insert(idx);
                }
            }
            for set in &record.structure_set_ids {
                sets.entry(*set)
                    .or_insert_with(|| bitvec![usize, Lsb0; 0; n])
                    .set(idx, true);
            }
            regions.push(Region {
                id: record.id,
                acronym: record.acronym,
                name: record.name,
                parent: parents[idx].map(|p| ids[p]),
                structure_id_path: path,
                structure_set_ids: record.structure_set_ids,
                rgb: record.rgb_triplet,
                graph_order: record.graph_order.unwrap_or(idx as u32),
            });
        }

        info!(
            "ontology built: {} regions, {} structure sets, root {}",
            n,
            sets.len(),
            ids[root]
        );

        Ok(Self {
            regions,
            by_id,
            by_acronym,
            children,
            sets,
            root,
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn root(&self) -> &Region {
        &self.regions[self.root]
    }

    /// Regions in structure-list order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions.iter()
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: RegionId) -> Lookup<&Region> {
        id.locate(self).map(|idx| &self.regions[idx]).into()
    }

    /// Project one field per key, in key order; unknown keys yield `Missing`.
    pub fn nodes_by_property<K, T, F>(&self, keys: &[K], projection: F) -> Vec<Lookup<T>>
    where
        K: LookupKey,
        F: Fn(&Region) -> T,
    {
        keys.iter()
            .map(|key| {
                key.locate(self)
                    .map(|idx| projection(&self.regions[idx]))
                    .into()
            })
            .collect()
    }

    pub fn names(&self, ids: &[RegionId]) -> Vec<Lookup<String>> {
        self.nodes_by_property(ids, |r| r.name.clone())
    }

    pub fn acronyms(&self, ids: &[RegionId]) -> Vec<Lookup<String>> {
        self.nodes_by_property(ids, |r| r.acronym.clone())
    }

    pub fn acronyms_to_ids<S: AsRef<str>>(&self, acronyms: &[S]) -> Vec<Lookup<RegionId>> {
        let keys: Vec<&str> = acronyms.iter().map(AsRef::as_ref).collect();
        self.nodes_by_property(&keys, |r| r.id)
    }

    pub fn graph_orders(&self, ids: &[RegionId]) -> Vec<Lookup<u32>> {
        self.nodes_by_property(ids, |r| r.graph_order)
    }

    pub fn colors(&self, ids: &[RegionId], format: ColorFormat) -> Vec<Lookup<Color>> {
        self.nodes_by_property(ids, |r| r.rgb.to_color(format))
    }

    /// Name, acronym and `rgb(...)` color per id, as rendered next to a metric.
    pub fn summaries(&self, ids: &[RegionId]) -> Vec<Lookup<RegionSummary>> {
        self.nodes_by_property(ids, |r| RegionSummary {
            id: r.id,
            acronym: r.acronym.clone(),
            name: r.name.clone(),
            color: r.rgb.to_css(),
        })
    }

    /// Inclusive: every region descends from itself. Unknown ids never descend.
    pub fn descends_from(&self, id: RegionId, ancestor: RegionId) -> bool {
        match self.get(id) {
            Lookup::Found(region) => region.descends_from(ancestor),
            Lookup::Missing => false,
        }
    }

    pub fn descends_from_any(&self, id: RegionId, candidates: &[RegionId]) -> bool {
        match self.get(id) {
            Lookup::Found(region) => candidates.iter().any(|c| region.descends_from(*c)),
            Lookup::Missing => false,
        }
    }

    pub fn children(&self, id: RegionId) -> Vec<RegionId> {
        id.locate(self)
            .map(|idx| {
                self.children[idx]
                    .iter()
                    .map(|c| self.regions[*c].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The region and everything below it, pre-order.
    pub fn descendants(&self, id: RegionId) -> Vec<RegionId> {
        let Some(start) = id.locate(self) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            out.push(self.regions[idx].id);
            stack.extend(self.children[idx].iter().rev());
        }
        out
    }

    /// Regions tagged with `set`, in structure-list order.
    pub fn filter_by_structure_set(&self, set: StructureSetId) -> Vec<&Region> {
        self.sets
            .get(&set)
            .map(|bits| bits.iter_ones().map(|idx| &self.regions[idx]).collect())
            .unwrap_or_default()
    }

    pub fn structure_set_ids(&self, set: StructureSetId) -> Vec<RegionId> {
        self.filter_by_structure_set(set)
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    /// Coarse tier: the 12 major divisions.
    pub fn major_division_ids(&self) -> Vec<RegionId> {
        self.structure_set_ids(MAJOR_DIVISIONS_SET)
    }

    /// Mid tier: mid-ontology structures.
    pub fn mid_ontology_ids(&self) -> Vec<RegionId> {
        self.structure_set_ids(MID_ONTOLOGY_SET)
    }

    pub fn cortical_ids(&self) -> Vec<RegionId> {
        self.structure_set_ids(CORTICAL_AREAS_SET)
    }

    /// Cortical layer label for each id; `Missing` outside isocortical areas
    /// or when the name carries no layer.
    pub fn layers(&self, ids: &[RegionId]) -> Vec<Lookup<String>> {
        let cortical = self.cortical_ids();
        ids.iter()
            .map(|id| match self.get(*id) {
                Lookup::Found(region)
                    if cortical.iter().any(|c| region.descends_from(*c)) =>
                {
                    extract_layer(&region.name).into()
                }
                _ => Lookup::Missing,
            })
            .collect()
    }
}

impl Hierarchy for Ontology {
    fn contains(&self, id: RegionId) -> bool {
        Ontology::contains(self, id)
    }

    fn descends_from(&self, id: RegionId, ancestor: RegionId) -> bool {
        Ontology::descends_from(self, id, ancestor)
    }

    fn name_of(&self, id: RegionId) -> Option<&str> {
        self.get(id).found().map(|r| r.name.as_str())
    }
}

/// Replace ids found in `map`, keeping the rest.
pub fn remap_ids(ids: &[RegionId], map: &HashMap<RegionId, RegionId>) -> Vec<RegionId> {
    ids.iter().map(|id| *map.get(id).unwrap_or(id)).collect()
}

fn declared_parent(record: &StructureRecord) -> Result<Option<RegionId>, OntologyError> {
    if let Some(parent) = record.parent_structure_id {
        return Ok(Some(parent));
    }
    match record.structure_id_path.as_deref() {
        None => Ok(None),
        Some([.., last]) if *last != record.id => {
            Err(OntologyError::PathMismatch { id: record.id })
        }
        Some([.., parent, _]) => Ok(Some(*parent)),
        Some(_) => Ok(None),
    }
}

/// Follow parent links to build root-to-self paths, rejecting cycles.
fn materialize_paths(
    ids: &[RegionId],
    parents: &[Option<usize>],
) -> Result<Vec<Vec<RegionId>>, OntologyError> {
    let mut state = vec![Visit::Pending; ids.len()];
    let mut paths: Vec<Vec<RegionId>> = vec![Vec::new(); ids.len()];

    for start in 0..ids.len() {
        if state[start] == Visit::Done {
            continue;
        }
        let mut chain = Vec::new();
        let mut base = Vec::new();
        let mut cursor = Some(start);
        while let Some(idx) = cursor {
            match state[idx] {
                Visit::Done => {
                    base = paths[idx].clone();
                    break;
                }
                Visit::OnChain => return Err(OntologyError::Cycle { id: ids[idx] }),
                Visit::Pending => {
                    state[idx] = Visit::OnChain;
                    chain.push(idx);
                    cursor = parents[idx];
                }
            }
        }
        for idx in chain.into_iter().rev() {
            base.push(ids[idx]);
            paths[idx] = base.clone();
            state[idx] = Visit::Done;
        }
    }
    Ok(paths)
}
