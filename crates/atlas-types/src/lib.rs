//! Shared types that mirror the Allen Mouse Brain Atlas structure graph.
//!
//! A structure list arrives as a flat sequence of [`StructureRecord`]s (one per
//! brain region, each naming its own parent). Loaders validate those into
//! [`Region`]s; algorithms only need the [`Hierarchy`] trait, which keeps the
//! matching code ignorant of how a tree is stored.
//!
//! Lookups that may fail per item return [`Lookup`] rather than `Option` so a
//! bulk projection keeps one slot per input, found or not.
//!
//! ```rust
//! use atlas_types::{ColorFormat, Lookup, RegionId, Rgb};
//!
//! let rgb = Rgb([8, 133, 140]);
//! assert_eq!(rgb.to_hex(), "08858c");
//! assert_eq!(Rgb::from_hex("08858c"), Some(rgb));
//! assert_eq!("rgb_plotly".parse::<ColorFormat>(), Ok(ColorFormat::Css));
//! assert_eq!(Lookup::from(Some(RegionId(315))).found(), Some(RegionId(315)));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric identifier of a brain region (`id` in the structure graph).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(RegionId)
    }
}

/// Identifier of a named structure set ("12 major divisions", ...).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureSetId(pub u32);

/// The 12 major divisions of the brain (coarse tier).
pub const MAJOR_DIVISIONS_SET: StructureSetId = StructureSetId(687527670);
/// Mid-ontology structures (mid tier).
pub const MID_ONTOLOGY_SET: StructureSetId = StructureSetId(167587189);
/// The 43 isocortical areas.
pub const CORTICAL_AREAS_SET: StructureSetId = StructureSetId(688152357);

/// Root of the ventricular system subtree, matched specially.
pub const VENTRICULAR_SYSTEMS: RegionId = RegionId(73);
/// Fiber tracts, added as an extra coarse target when re-indexing.
pub const FIBER_TRACTS: RegionId = RegionId(1009);

/// Color channels as stored in the structure graph (`rgb_triplet`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// Six lowercase hex digits, no leading `#`.
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("{r:02x}{g:02x}{b:02x}")
    }

    /// Channels scaled into `0.0..=1.0`.
    pub fn normalized(self) -> [f64; 3] {
        self.0.map(|c| f64::from(c) / 255.0)
    }

    /// `rgb(r,g,b)` string accepted by browser plotting libraries.
    pub fn to_css(self) -> String {
        let [r, g, b] = self.0;
        format!("rgb({r},{g},{b})")
    }

    /// Decode a six-digit hex string (an optional leading `#` is accepted).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }

    /// Project into the requested representation.
    pub fn to_color(self, format: ColorFormat) -> Color {
        match format {
            ColorFormat::Hex => Color::Hex(self.to_hex()),
            ColorFormat::Rgb => Color::Rgb(self.0),
            ColorFormat::Normalized => Color::Normalized(self.normalized()),
            ColorFormat::Css => Color::Css(self.to_css()),
        }
    }
}

/// Output representation for region colors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ColorFormat {
    Hex,
    Rgb,
    Normalized,
    Css,
}

impl FromStr for ColorFormat {
    type Err = UnknownColorFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hex" => Ok(ColorFormat::Hex),
            "rgb" => Ok(ColorFormat::Rgb),
            "rgb_norm" => Ok(ColorFormat::Normalized),
            "rgb_plotly" | "css" => Ok(ColorFormat::Css),
            _ => Err(UnknownColorFormat(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownColorFormat(pub String);

impl fmt::Display for UnknownColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown color format {:?} (expected hex, rgb, rgb_norm or rgb_plotly)",
            self.0
        )
    }
}

impl std::error::Error for UnknownColorFormat {}

/// A region color in one of the [`ColorFormat`] representations.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Color {
    Hex(String),
    Rgb([u8; 3]),
    Normalized([f64; 3]),
    Css(String),
}

/// Result of a single keyed lookup inside a bulk projection.
///
/// Serializes as the found value, or `null` when missing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(untagged)]
pub enum Lookup<T> {
    Found(T),
    Missing,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Lookup::Missing)
    }

    /// Convert into an `Option`, discarding the missing marker.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Missing => None,
        }
    }

    pub fn as_ref(&self) -> Lookup<&T> {
        match self {
            Lookup::Found(v) => Lookup::Found(v),
            Lookup::Missing => Lookup::Missing,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::Missing => Lookup::Missing,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::Missing,
        }
    }
}

/// Raw structure-graph record, as found in cached ontology snapshots.
///
/// Either `parent_structure_id` or `structure_id_path` must locate the parent;
/// the root has neither (or a single-element path).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StructureRecord {
    pub id: RegionId,
    pub acronym: String,
    pub name: String,
    #[serde(default, alias = "parent_id")]
    pub parent_structure_id: Option<RegionId>,
    #[serde(default)]
    pub structure_id_path: Option<Vec<RegionId>>,
    #[serde(default)]
    pub structure_set_ids: Vec<StructureSetId>,
    pub rgb_triplet: Rgb,
    #[serde(default)]
    pub graph_order: Option<u32>,
}

/// Validated region node with its materialized ancestor path.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Region {
    pub id: RegionId,
    pub acronym: String,
    pub name: String,
    pub parent: Option<RegionId>,
    /// Ancestor ids from the root down to (and including) this region.
    pub structure_id_path: Vec<RegionId>,
    pub structure_set_ids: Vec<StructureSetId>,
    pub rgb: Rgb,
    pub graph_order: u32,
}

impl Region {
    pub fn in_structure_set(&self, set: StructureSetId) -> bool {
        self.structure_set_ids.contains(&set)
    }

    /// Inclusive ancestry test over the materialized path.
    pub fn descends_from(&self, ancestor: RegionId) -> bool {
        self.structure_id_path.contains(&ancestor)
    }

    pub fn depth(&self) -> usize {
        self.structure_id_path.len().saturating_sub(1)
    }
}

/// One hand-curated correction for a retired region id.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ObsoleteMapping {
    pub old_id: RegionId,
    pub old_acronym: String,
    pub new_id: RegionId,
    pub new_acronym: String,
    /// Current acronyms the old region was split into.
    #[serde(default)]
    pub new_acronym_list: Vec<String>,
    pub parent_id: RegionId,
    pub parent_acronym: String,
}

/// Read-only ancestry view used by matching and re-indexing.
///
/// Implementations must answer `false`/`None` for ids they do not know,
/// never panic.
pub trait Hierarchy {
    fn contains(&self, id: RegionId) -> bool;

    /// True iff `ancestor` lies on the root-to-`id` path (inclusive).
    fn descends_from(&self, id: RegionId, ancestor: RegionId) -> bool;

    fn name_of(&self, id: RegionId) -> Option<&str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips_channels() {
        let rgb = Rgb([255, 0, 16]);
        assert_eq!(rgb.to_hex(), "ff0010");
        assert_eq!(Rgb::from_hex(&rgb.to_hex()), Some(rgb));
        assert_eq!(Rgb::from_hex("#ff0010"), Some(rgb));
        assert_eq!(Rgb::from_hex("ff001"), None);
        assert_eq!(Rgb::from_hex("gg0010"), None);
    }

    #[test]
    fn color_formats_parse_and_project() {
        let rgb = Rgb([51, 102, 255]);
        assert_eq!(
            rgb.to_color("rgb_plotly".parse().unwrap()),
            Color::Css("rgb(51,102,255)".into())
        );
        assert_eq!(rgb.to_color(ColorFormat::Rgb), Color::Rgb([51, 102, 255]));
        assert_eq!(
            rgb.to_color(ColorFormat::Normalized),
            Color::Normalized([0.2, 0.4, 1.0])
        );
        assert!("viridis".parse::<ColorFormat>().is_err());
    }

    #[test]
    fn lookup_serializes_missing_as_null() {
        let values = vec![Lookup::Found(RegionId(8)), Lookup::Missing];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, "[8,null]");
    }

    #[test]
    fn record_accepts_parent_id_alias() {
        let raw = r#"{"id": 8, "acronym": "grey", "name": "Basic cell groups and regions",
            "parent_id": 997, "rgb_triplet": [191, 218, 227], "extra": true}"#;
        let record: StructureRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.parent_structure_id, Some(RegionId(997)));
        assert!(record.structure_id_path.is_none());
        assert!(record.structure_set_ids.is_empty());
    }
}
