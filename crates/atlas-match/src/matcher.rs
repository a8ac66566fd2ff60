use atlas_types::{Hierarchy, Lookup, RegionId, VENTRICULAR_SYSTEMS};
use serde::Serialize;
use tracing::debug;

use crate::obsolete::{ObsoleteTables, Resolver};

/// Which rule attributed an input id to its target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum MatchRule {
    /// The input is itself in the reference list.
    Exact,
    /// The input lies inside a reference region.
    WithinReference,
    /// A reference region lies inside the input; the input stands for itself.
    ContainsReference,
    /// The input belongs to the ventricular system.
    VentricularSystem,
}

/// Per-input attribution plus the inputs nothing matched.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub matched: Vec<Lookup<RegionId>>,
    pub unmatched: Vec<RegionId>,
}

/// Aligns region ids to the resolution of a reference list.
///
/// Rules are tried per reference id, in the order the reference list is
/// given; the first reference that fires wins. Callers wanting stable output
/// must pass a stable reference order.
pub struct StructureMatcher<'a, H: ?Sized> {
    hierarchy: &'a H,
    obsolete: Option<&'a ObsoleteTables>,
}

impl<'a, H: Hierarchy + ?Sized> StructureMatcher<'a, H> {
    /// Matcher without any obsolete-id fallback.
    pub fn new(hierarchy: &'a H) -> Self {
        Self {
            hierarchy,
            obsolete: None,
        }
    }

    /// Retry ids that match nothing through their obsolete-table replacement.
    pub fn with_obsolete_fallback(mut self, tables: &'a ObsoleteTables) -> Self {
        self.obsolete = Some(tables);
        self
    }

    pub fn hierarchy(&self) -> &'a H {
        self.hierarchy
    }

    pub fn match_one(&self, id: RegionId, reference: &[RegionId]) -> Lookup<RegionId> {
        if let Some((target, rule)) = self.scan(id, reference) {
            if rule == MatchRule::VentricularSystem {
                debug!("region {id} belongs to the ventricular system");
            }
            return Lookup::Found(target);
        }
        self.fallback(id, reference).into()
    }

    /// Attribute every id in `list` to a reference id, keeping positions.
    pub fn match_ids(&self, list: &[RegionId], reference: &[RegionId]) -> MatchOutcome {
        let mut outcome = MatchOutcome {
            matched: Vec::with_capacity(list.len()),
            unmatched: Vec::new(),
        };
        for &id in list {
            let matched = self.match_one(id, reference);
            if matched.is_missing() {
                outcome.unmatched.push(id);
            }
            outcome.matched.push(matched);
        }
        outcome
    }

    fn scan(&self, id: RegionId, reference: &[RegionId]) -> Option<(RegionId, MatchRule)> {
        for &candidate in reference {
            if id == candidate {
                return Some((candidate, MatchRule::Exact));
            }
            if self.hierarchy.descends_from(id, candidate) {
                return Some((candidate, MatchRule::WithinReference));
            }
            if self.hierarchy.descends_from(candidate, id) {
                return Some((id, MatchRule::ContainsReference));
            }
            if self.hierarchy.descends_from(id, VENTRICULAR_SYSTEMS) {
                return Some((VENTRICULAR_SYSTEMS, MatchRule::VentricularSystem));
            }
        }
        None
    }

    fn fallback(&self, id: RegionId, reference: &[RegionId]) -> Option<RegionId> {
        let resolver = Resolver::new(self.hierarchy, self.obsolete?);
        let replacement = match resolver.redirect_subtree(id) {
            Some(mapping) => mapping.new_id,
            None => resolver.resolve(id)?,
        };
        if replacement == id {
            return None;
        }
        let (target, _) = self.scan(replacement, reference)?;
        debug!("obsolete region {id} matched to {target} through {replacement}");
        Some(target)
    }
}

/// Strict matching of `list` against `reference`.
pub fn match_structure_id_lists<H: Hierarchy + ?Sized>(
    hierarchy: &H,
    list: &[RegionId],
    reference: &[RegionId],
) -> MatchOutcome {
    StructureMatcher::new(hierarchy).match_ids(list, reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestTree, ids};

    // 1 ─┬─ 2 ── 3
    //    ├─ 4
    //    └─ 73 ── 81
    fn tree() -> TestTree {
        TestTree::new(&[
            (1, None),
            (2, Some(1)),
            (3, Some(2)),
            (4, Some(1)),
            (73, Some(1)),
            (81, Some(73)),
        ])
    }

    #[test]
    fn exact_match_returns_reference() {
        let tree = tree();
        let out = match_structure_id_lists(&tree, &ids(&[4]), &ids(&[2, 4]));
        assert_eq!(out.matched, vec![Lookup::Found(RegionId(4))]);
        assert!(out.unmatched.is_empty());
    }

    #[test]
    fn finer_input_maps_to_enclosing_reference() {
        let tree = tree();
        let out = match_structure_id_lists(&tree, &ids(&[3]), &ids(&[2]));
        assert_eq!(out.matched, vec![Lookup::Found(RegionId(2))]);
    }

    #[test]
    fn coarser_input_keeps_itself() {
        let tree = tree();
        let out = match_structure_id_lists(&tree, &ids(&[2]), &ids(&[3]));
        assert_eq!(out.matched, vec![Lookup::Found(RegionId(2))]);
        assert!(out.unmatched.is_empty());
    }

    #[test]
    fn unrelated_ids_are_reported() {
        let tree = tree();
        let out = match_structure_id_lists(&tree, &ids(&[3, 555]), &ids(&[4]));
        assert_eq!(out.matched, vec![Lookup::Missing, Lookup::Missing]);
        assert_eq!(out.unmatched, ids(&[3, 555]));
    }

    #[test]
    fn ventricular_regions_map_to_system_root() {
        let tree = tree();
        let out = match_structure_id_lists(&tree, &ids(&[81]), &ids(&[2, 4]));
        assert_eq!(out.matched, vec![Lookup::Found(VENTRICULAR_SYSTEMS)]);

        let none = match_structure_id_lists(&tree, &ids(&[81]), &[]);
        assert_eq!(none.unmatched, ids(&[81]));
    }

    #[test]
    fn first_reference_in_order_wins() {
        let tree = tree();
        // 3 lies inside both 1 and 2.
        let a = match_structure_id_lists(&tree, &ids(&[3]), &ids(&[1, 2]));
        let b = match_structure_id_lists(&tree, &ids(&[3]), &ids(&[2, 1]));
        assert_eq!(a.matched, vec![Lookup::Found(RegionId(1))]);
        assert_eq!(b.matched, vec![Lookup::Found(RegionId(2))]);
    }

    #[test]
    fn root_input_stands_for_itself() {
        // tree = {1, A=2 (parent 1), B=3 (parent A), C=4 (parent 1)}
        let tree = tree();
        let out = match_structure_id_lists(&tree, &ids(&[3, 4, 1]), &ids(&[2, 4]));
        assert_eq!(
            out.matched,
            vec![
                Lookup::Found(RegionId(2)),
                Lookup::Found(RegionId(4)),
                Lookup::Found(RegionId(1)),
            ]
        );
        assert!(out.unmatched.is_empty());
    }

    #[test]
    fn obsolete_leaf_falls_back_to_replacement() {
        let tree = tree();
        let tables = ObsoleteTables::from_json_str(
            r#"{"leaves": [{"old_id": 900, "old_acronym": "OLD", "new_id": 3,
                "new_acronym": "B", "parent_id": 2, "parent_acronym": "A"}]}"#,
        )
        .unwrap();

        let strict = StructureMatcher::new(&tree).match_ids(&ids(&[900]), &ids(&[2]));
        assert_eq!(strict.unmatched, ids(&[900]));

        let lenient = StructureMatcher::new(&tree)
            .with_obsolete_fallback(&tables)
            .match_ids(&ids(&[900]), &ids(&[2]));
        assert_eq!(lenient.matched, vec![Lookup::Found(RegionId(2))]);
        assert!(lenient.unmatched.is_empty());
    }

    #[test]
    fn obsolete_subtree_redirects_to_replacement() {
        let tree = tree();
        let tables = ObsoleteTables::from_json_str(
            r#"{"parents": [{"old_id": 2, "old_acronym": "A", "new_id": 4,
                "new_acronym": "C", "parent_id": 1, "parent_acronym": "root"}]}"#,
        )
        .unwrap();
        let out = StructureMatcher::new(&tree)
            .with_obsolete_fallback(&tables)
            .match_ids(&ids(&[3, 81]), &ids(&[4]));
        assert_eq!(
            out.matched,
            vec![Lookup::Found(RegionId(4)), Lookup::Found(VENTRICULAR_SYSTEMS)]
        );
    }
}
