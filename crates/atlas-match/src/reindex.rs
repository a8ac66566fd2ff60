use atlas_types::{FIBER_TRACTS, Hierarchy, Lookup, RegionId};
use bitvec::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::matcher::{MatchOutcome, StructureMatcher};

/// Ontology resolution level.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Coarse,
    Mid,
    Fine,
}

/// Composite `(coarse, mid, fine)` row key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub struct HierarchyKey {
    pub coarse: RegionId,
    pub mid: RegionId,
    pub fine: RegionId,
}

impl HierarchyKey {
    pub fn get(&self, tier: Tier) -> RegionId {
        match tier {
            Tier::Coarse => self.coarse,
            Tier::Mid => self.mid,
            Tier::Fine => self.fine,
        }
    }
}

/// Rows keyed by a single (fine) region id, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatTable<R> {
    rows: Vec<(RegionId, R)>,
}

impl<R> FlatTable<R> {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn from_rows(rows: Vec<(RegionId, R)>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, id: RegionId, row: R) {
        self.rows.push((id, row));
    }

    pub fn ids(&self) -> Vec<RegionId> {
        self.rows.iter().map(|(id, _)| *id).collect()
    }

    pub fn rows(&self) -> &[(RegionId, R)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<(RegionId, R)> {
        self.rows
    }
}

impl<R> Default for FlatTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> FromIterator<(RegionId, R)> for FlatTable<R> {
    fn from_iter<I: IntoIterator<Item = (RegionId, R)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Rows keyed by [`HierarchyKey`], for drill-down by tier.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchicalTable<R> {
    rows: Vec<(HierarchyKey, R)>,
}

impl<R> HierarchicalTable<R> {
    pub fn keys(&self) -> Vec<HierarchyKey> {
        self.rows.iter().map(|(key, _)| *key).collect()
    }

    pub fn rows(&self) -> &[(HierarchyKey, R)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<(HierarchyKey, R)> {
        self.rows
    }

    /// Rows whose `tier` component equals `id`.
    pub fn select(
        &self,
        tier: Tier,
        id: RegionId,
    ) -> impl Iterator<Item = &(HierarchyKey, R)> + '_ {
        self.rows.iter().filter(move |(key, _)| key.get(tier) == id)
    }

    /// Keep only the fine level of the key.
    pub fn to_flat(self) -> FlatTable<R> {
        self.rows
            .into_iter()
            .map(|(key, row)| (key.fine, row))
            .collect()
    }
}

/// A row removed because at least one tier failed to resolve.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DroppedRow {
    pub id: RegionId,
    pub name: Lookup<String>,
    pub tiers: Vec<Tier>,
}

/// Re-indexed table plus the diagnostic list of dropped rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Reindexed<R> {
    pub table: HierarchicalTable<R>,
    pub dropped: Vec<DroppedRow>,
}

/// Converts fine-keyed tables into coarse/mid/fine keyed tables.
pub struct Reindexer<'a, H: ?Sized> {
    matcher: StructureMatcher<'a, H>,
    coarse: Vec<RegionId>,
    mid: Vec<RegionId>,
}

impl<'a, H: Hierarchy + ?Sized> Reindexer<'a, H> {
    /// Fiber tracts are appended to the coarse reference when absent.
    pub fn new(
        matcher: StructureMatcher<'a, H>,
        coarse_reference: Vec<RegionId>,
        mid_reference: Vec<RegionId>,
    ) -> Self {
        let mut coarse = coarse_reference;
        if !coarse.contains(&FIBER_TRACTS) {
            coarse.push(FIBER_TRACTS);
        }
        Self {
            matcher,
            coarse,
            mid: mid_reference,
        }
    }

    pub fn coarse_reference(&self) -> &[RegionId] {
        &self.coarse
    }

    pub fn mid_reference(&self) -> &[RegionId] {
        &self.mid
    }

    /// Key every row by `(coarse, mid, fine)`; rows missing any level are
    /// dropped and listed in [`Reindexed::dropped`]. Row values move unchanged.
    pub fn reindex<R>(&self, table: FlatTable<R>) -> Reindexed<R> {
        let fine = table.ids();

        let mid = self.matcher.match_ids(&fine, &self.mid);
        self.report("mid ontology", &mid);
        let coarse = self.matcher.match_ids(&fine, &self.coarse);
        self.report("coarse ontology", &coarse);

        let keep: BitVec = coarse
            .matched
            .iter()
            .zip(&mid.matched)
            .map(|(c, m)| c.is_found() && m.is_found())
            .collect();

        let dropped = keep
            .iter_zeros()
            .map(|idx| {
                let id = fine[idx];
                let mut tiers = Vec::with_capacity(2);
                if coarse.matched[idx].is_missing() {
                    tiers.push(Tier::Coarse);
                }
                if mid.matched[idx].is_missing() {
                    tiers.push(Tier::Mid);
                }
                DroppedRow {
                    id,
                    name: self.matcher.hierarchy().name_of(id).map(str::to_owned).into(),
                    tiers,
                }
            })
            .collect();

        let rows = table
            .into_rows()
            .into_iter()
            .zip(coarse.matched.into_iter().zip(mid.matched))
            .enumerate()
            .filter(|(idx, _)| keep[*idx])
            .filter_map(|(_, ((id, row), (c, m)))| {
                let key = HierarchyKey {
                    coarse: c.found()?,
                    mid: m.found()?,
                    fine: id,
                };
                Some((key, row))
            })
            .collect();

        Reindexed {
            table: HierarchicalTable { rows },
            dropped,
        }
    }

    fn report(&self, label: &str, outcome: &MatchOutcome) {
        if outcome.unmatched.is_empty() {
            return;
        }
        info!(
            "while matching {label} structures, {} structures were dropped",
            outcome.unmatched.len()
        );
        for id in &outcome.unmatched {
            let name = self.matcher.hierarchy().name_of(*id).unwrap_or("<unknown>");
            debug!("dropped region {id}: {name}");
        }
    }
}
