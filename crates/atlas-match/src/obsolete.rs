use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use atlas_types::{Hierarchy, ObsoleteMapping, RegionId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Corrections for region ids retired from the current ontology.
///
/// `parents` redirect a whole subtree; `leaves` redirect a single id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObsoleteTables {
    #[serde(default)]
    parents: Vec<ObsoleteMapping>,
    #[serde(default)]
    leaves: Vec<ObsoleteMapping>,
}

impl ObsoleteTables {
    pub fn new(parents: Vec<ObsoleteMapping>, leaves: Vec<ObsoleteMapping>) -> Self {
        Self { parents, leaves }
    }

    /// Renames and splits between older datasets and the CCF 2017 ontology.
    pub fn allen_ccf_2017() -> Self {
        Self {
            parents: vec![
                mapping(934, "ENTmv", 926, "ENTm", &["ENTm"], 909, "ENT"),
                mapping(22, "PTLp", 22, "VISa-VISrl", &["VISa", "VISrl"], 669, "VIS"),
            ],
            leaves: vec![
                mapping(560, "CNspg", 607, "DCO-VCO", &["DCO", "VCO"], 607, "CN"),
                mapping(112, "CNlam", 607, "DCO-VCO", &["DCO", "VCO"], 607, "CN"),
            ],
        }
    }

    /// Load tables from JSON: `{"parents": [...], "leaves": [...]}`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening obsolete table {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing obsolete table {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing obsolete table")
    }

    pub fn parent(&self, old_id: RegionId) -> Option<&ObsoleteMapping> {
        self.parents.iter().find(|m| m.old_id == old_id)
    }

    pub fn leaf(&self, old_id: RegionId) -> Option<&ObsoleteMapping> {
        self.leaves.iter().find(|m| m.old_id == old_id)
    }

    pub fn parents(&self) -> &[ObsoleteMapping] {
        &self.parents
    }

    pub fn leaves(&self) -> &[ObsoleteMapping] {
        &self.leaves
    }
}

fn mapping(
    old_id: u32,
    old_acronym: &str,
    new_id: u32,
    new_acronym: &str,
    new_acronym_list: &[&str],
    parent_id: u32,
    parent_acronym: &str,
) -> ObsoleteMapping {
    ObsoleteMapping {
        old_id: RegionId(old_id),
        old_acronym: old_acronym.to_string(),
        new_id: RegionId(new_id),
        new_acronym: new_acronym.to_string(),
        new_acronym_list: new_acronym_list.iter().map(|s| s.to_string()).collect(),
        parent_id: RegionId(parent_id),
        parent_acronym: parent_acronym.to_string(),
    }
}

/// Maps ids from older ontology versions onto current ones.
pub struct Resolver<'a, H: ?Sized> {
    hierarchy: &'a H,
    tables: &'a ObsoleteTables,
}

impl<'a, H: Hierarchy + ?Sized> Resolver<'a, H> {
    pub fn new(hierarchy: &'a H, tables: &'a ObsoleteTables) -> Self {
        Self { hierarchy, tables }
    }

    /// Current id for `id`: itself when present in the tree, otherwise the
    /// leaf-table then parent-table replacement, otherwise `None`.
    pub fn resolve(&self, id: RegionId) -> Option<RegionId> {
        if self.hierarchy.contains(id) {
            return Some(id);
        }
        if let Some(m) = self.tables.leaf(id) {
            debug!("obsolete region {} ({}) resolved to {}", id, m.old_acronym, m.new_id);
            return Some(m.new_id);
        }
        if let Some(m) = self.tables.parent(id) {
            debug!(
                "obsolete parent region {} ({}) resolved to {}",
                id, m.old_acronym, m.new_id
            );
            return Some(m.new_id);
        }
        None
    }

    /// Obsolete-parent entry whose subtree contains `id`, for ids still in the tree.
    pub fn redirect_subtree(&self, id: RegionId) -> Option<&'a ObsoleteMapping> {
        if !self.hierarchy.contains(id) {
            return None;
        }
        self.tables
            .parents
            .iter()
            .find(|m| self.hierarchy.descends_from(id, m.old_id))
    }
}
