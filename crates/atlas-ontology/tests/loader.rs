use std::path::PathBuf;

use atlas_ontology::{Color, ColorFormat, Lookup, Ontology, RegionId, Rgb};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("structures.json")
}

fn ids(raw: &[u32]) -> Vec<RegionId> {
    raw.iter().copied().map(RegionId).collect()
}

#[test]
fn loads_allen_style_snapshot() {
    let atlas = Ontology::load(fixture_path()).expect("load fixture");
    assert_eq!(atlas.len(), 35);
    assert_eq!(atlas.root().id, RegionId(997));

    let visp1 = atlas.get(RegionId(593)).found().expect("VISp1 present");
    assert_eq!(visp1.acronym, "VISp1");
    assert_eq!(visp1.parent, Some(RegionId(385)));
    assert_eq!(visp1.graph_order, 8);

    assert_eq!(
        atlas.graph_orders(&ids(&[997, 593, 4242])),
        vec![Lookup::Found(0), Lookup::Found(8), Lookup::Missing]
    );
}

#[test]
fn every_path_runs_from_root_along_parent_edges() {
    let atlas = Ontology::load(fixture_path()).unwrap();
    for region in atlas.iter() {
        let path = &region.structure_id_path;
        assert_eq!(path.first(), Some(&atlas.root().id));
        assert_eq!(path.last(), Some(&region.id));
        for pair in path.windows(2) {
            let child = atlas.get(pair[1]).found().unwrap();
            assert_eq!(child.parent, Some(pair[0]));
        }
        assert!(atlas.descends_from(region.id, region.id));
    }
}

#[test]
fn structure_sets_materialize_tiers_in_list_order() {
    let atlas = Ontology::load(fixture_path()).unwrap();
    assert_eq!(atlas.major_division_ids(), ids(&[315, 1089, 354, 512]));
    assert_eq!(atlas.mid_ontology_ids(), ids(&[669, 22, 822, 607, 528]));
    assert_eq!(atlas.cortical_ids(), ids(&[385, 312782546, 417]));
    assert!(atlas.structure_set_ids(atlas_ontology::StructureSetId(1)).is_empty());
}

#[test]
fn colors_project_in_every_format() {
    let atlas = Ontology::load(fixture_path()).unwrap();
    let query = ids(&[669, 4242]);

    let hex = atlas.colors(&query, ColorFormat::Hex);
    assert_eq!(hex[0], Lookup::Found(Color::Hex("08858c".into())));
    assert_eq!(hex[1], Lookup::Missing);

    let css = atlas.colors(&query, "rgb_plotly".parse().unwrap());
    assert_eq!(css[0], Lookup::Found(Color::Css("rgb(8,133,140)".into())));

    let norm = atlas.colors(&ids(&[997]), ColorFormat::Normalized);
    assert_eq!(norm[0], Lookup::Found(Color::Normalized([1.0, 1.0, 1.0])));
}

#[test]
fn hex_colors_decode_to_raw_triplets() {
    let atlas = Ontology::load(fixture_path()).unwrap();
    let all: Vec<RegionId> = atlas.iter().map(|r| r.id).collect();
    let hex = atlas.colors(&all, ColorFormat::Hex);
    let raw = atlas.colors(&all, ColorFormat::Rgb);
    for (h, r) in hex.into_iter().zip(raw) {
        let (Lookup::Found(Color::Hex(h)), Lookup::Found(Color::Rgb(r))) = (h, r) else {
            panic!("every fixture id has a color");
        };
        assert_eq!(Rgb::from_hex(&h), Some(Rgb(r)));
    }
}

#[test]
fn layers_only_for_isocortical_regions() {
    let atlas = Ontology::load(fixture_path()).unwrap();
    let layers = atlas.layers(&ids(&[821, 33, 312782550, 385, 526, 9999]));
    assert_eq!(
        layers,
        vec![
            Lookup::Found("2/3".to_string()),
            Lookup::Found("6".to_string()),
            Lookup::Found("1".to_string()),
            Lookup::Missing,
            Lookup::Missing,
            Lookup::Missing,
        ]
    );
}

#[test]
fn summaries_carry_css_colors() {
    let atlas = Ontology::load(fixture_path()).unwrap();
    let summaries = atlas.summaries(&ids(&[354]));
    let summary = summaries[0].as_ref().found().unwrap();
    assert_eq!(summary.acronym, "MY");
    assert_eq!(summary.name, "Medulla");
    assert_eq!(summary.color, "rgb(255,165,210)");
}

#[test]
fn accepts_api_envelope_and_reports_bad_files() {
    let raw = std::fs::read_to_string(fixture_path()).unwrap();
    let wrapped = format!(r#"{{"success": true, "msg": {raw}}}"#);
    let atlas = Ontology::from_json_str(&wrapped).expect("envelope parses");
    assert_eq!(atlas.len(), 35);

    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("structures.json");
    std::fs::write(
        &broken,
        r#"[{"id": 1, "acronym": "a", "name": "a", "parent_structure_id": 2, "rgb_triplet": [0, 0, 0]}]"#,
    )
    .unwrap();
    let err = Ontology::load(&broken).unwrap_err();
    assert!(format!("{err:#}").contains("missing parent"));

    assert!(Ontology::load(dir.path().join("absent.json")).is_err());
}
