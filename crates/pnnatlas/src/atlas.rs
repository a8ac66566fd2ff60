use std::path::Path;
use std::str::FromStr;

use atlas_match::{
    FlatTable, MatchOutcome, ObsoleteTables, Reindexed, Reindexer, Resolver, StructureMatcher,
};
use atlas_ontology::{Color, ColorFormat, Lookup, Ontology, RegionId, RegionSummary};
use serde::Serialize;
use thiserror::Error;

/// Whether unmatched ids get a second chance through the obsolete tables.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ObsoletePolicy {
    /// Unmatched ids stay unmatched.
    Strict,
    /// Unmatched ids are retried through their current replacement.
    #[default]
    Resolve,
}

impl FromStr for ObsoletePolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ObsoletePolicy::Strict),
            "resolve" => Ok(ObsoletePolicy::Resolve),
            other => Err(ParseError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Target list for a matching request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReferenceSet {
    Coarse,
    Mid,
    Cortical,
    Ids(Vec<RegionId>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid region id in reference list: {0}")]
    InvalidId(String),
    #[error("reference list is empty")]
    Empty,
    #[error("unknown obsolete policy {0:?} (expected strict or resolve)")]
    UnknownPolicy(String),
}

impl FromStr for ReferenceSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coarse" => return Ok(ReferenceSet::Coarse),
            "mid" => return Ok(ReferenceSet::Mid),
            "cortical" => return Ok(ReferenceSet::Cortical),
            _ => {}
        }
        let ids = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<RegionId>()
                    .map_err(|_| ParseError::InvalidId(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(ReferenceSet::Ids(ids))
    }
}

/// Per-id view used by `pnnatlas describe`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionDescription {
    pub id: RegionId,
    pub acronym: Lookup<String>,
    pub name: Lookup<String>,
    pub color: Lookup<Color>,
    pub layer: Lookup<String>,
}

/// Ontology plus obsolete-id corrections, shared read-only by every caller.
#[derive(Debug, Clone)]
pub struct Atlas {
    ontology: Ontology,
    obsolete: ObsoleteTables,
    policy: ObsoletePolicy,
}

impl Atlas {
    pub fn new(ontology: Ontology) -> Self {
        Self {
            ontology,
            obsolete: ObsoleteTables::allen_ccf_2017(),
            policy: ObsoletePolicy::default(),
        }
    }

    pub fn load(structures: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::new(Ontology::load(structures)?))
    }

    pub fn with_obsolete_tables(mut self, tables: ObsoleteTables) -> Self {
        self.obsolete = tables;
        self
    }

    pub fn with_policy(mut self, policy: ObsoletePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn obsolete_tables(&self) -> &ObsoleteTables {
        &self.obsolete
    }

    pub fn policy(&self) -> ObsoletePolicy {
        self.policy
    }

    pub fn coarse_ids(&self) -> Vec<RegionId> {
        self.ontology.major_division_ids()
    }

    pub fn mid_ids(&self) -> Vec<RegionId> {
        self.ontology.mid_ontology_ids()
    }

    pub fn cortical_ids(&self) -> Vec<RegionId> {
        self.ontology.cortical_ids()
    }

    pub fn reference_ids(&self, reference: &ReferenceSet) -> Vec<RegionId> {
        match reference {
            ReferenceSet::Coarse => self.coarse_ids(),
            ReferenceSet::Mid => self.mid_ids(),
            ReferenceSet::Cortical => self.cortical_ids(),
            ReferenceSet::Ids(ids) => ids.clone(),
        }
    }

    /// Matcher configured with this atlas' obsolete policy.
    pub fn matcher(&self) -> StructureMatcher<'_, Ontology> {
        let matcher = StructureMatcher::new(&self.ontology);
        match self.policy {
            ObsoletePolicy::Strict => matcher,
            ObsoletePolicy::Resolve => matcher.with_obsolete_fallback(&self.obsolete),
        }
    }

    pub fn match_structure_id_lists(
        &self,
        list: &[RegionId],
        reference: &[RegionId],
    ) -> MatchOutcome {
        self.matcher().match_ids(list, reference)
    }

    /// Current id per input id; ids unknown to both tree and tables are `Missing`.
    pub fn resolve(&self, ids: &[RegionId]) -> Vec<Lookup<RegionId>> {
        let resolver = Resolver::new(&self.ontology, &self.obsolete);
        ids.iter().map(|id| resolver.resolve(*id).into()).collect()
    }

    pub fn reindexer(&self) -> Reindexer<'_, Ontology> {
        Reindexer::new(self.matcher(), self.coarse_ids(), self.mid_ids())
    }

    pub fn reindex_to_hierarchy<R>(&self, table: FlatTable<R>) -> Reindexed<R> {
        self.reindexer().reindex(table)
    }

    pub fn summaries(&self, ids: &[RegionId]) -> Vec<Lookup<RegionSummary>> {
        self.ontology.summaries(ids)
    }

    /// One description per id, in input order; unknown ids keep their slot.
    pub fn describe(&self, ids: &[RegionId], format: ColorFormat) -> Vec<RegionDescription> {
        let acronyms = self.ontology.acronyms(ids);
        let names = self.ontology.names(ids);
        let colors = self.ontology.colors(ids, format);
        let layers = self.ontology.layers(ids);
        ids.iter()
            .zip(acronyms)
            .zip(names)
            .zip(colors)
            .zip(layers)
            .map(|((((id, acronym), name), color), layer)| RegionDescription {
                id: *id,
                acronym,
                name,
                color,
                layer,
            })
            .collect()
    }
}
