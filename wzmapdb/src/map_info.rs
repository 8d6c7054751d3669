//! Map info documents produced by the map inspection tool.
//!
//! The inspection tool (`maptools package info`) emits one JSON document per
//! map. The document is untrusted: every field may be missing, so the typed
//! view keeps everything optional and validation decides what is acceptable.
//! The raw JSON value is kept alongside the typed view because it is
//! re-published verbatim in `release-map-info.json` and in validation reports.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Typed view over a map info document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapInfo {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub map_type: Option<String>,

    #[serde(default)]
    pub players: Option<i64>,

    #[serde(default)]
    pub tileset: Option<String>,

    #[serde(default)]
    pub license: Option<String>,

    #[serde(default)]
    pub author: Option<Author>,

    #[serde(default)]
    pub additional_authors: Option<Vec<Author>>,

    #[serde(default)]
    pub created: Option<String>,

    #[serde(default)]
    pub mapsize: Option<MapSize>,

    #[serde(default)]
    pub scavenger: Option<ScavengerCounts>,

    #[serde(default)]
    pub oil_wells: Option<i64>,

    /// Per-player minimum/maximum counts.
    #[serde(default)]
    pub player: Option<PlayerCounts>,

    #[serde(default)]
    pub balance: Option<Balance>,

    /// HQ position per player slot. Entries without coordinates are `{}`.
    #[serde(default)]
    pub hq: Option<Vec<Option<HqPosition>>>,

    #[serde(default)]
    pub map_mod: Option<bool>,

    #[serde(default)]
    pub mod_types: Option<Vec<String>>,

    #[serde(default)]
    pub level_format: Option<String>,

    #[serde(default)]
    pub map_format: Option<String>,

    #[serde(default)]
    pub flat_map_package: Option<bool>,

    /// Top-level keys whose values had the wrong type, with the raw value.
    /// They were dropped from the typed view above.
    #[serde(skip)]
    pub invalid_fields: Vec<(String, Value)>,
}

/// An author entry (`author` or an element of `additionalAuthors`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: Option<String>,
}

impl Author {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapSize {
    #[serde(default)]
    pub w: Option<i64>,
    #[serde(default)]
    pub h: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScavengerCounts {
    #[serde(default)]
    pub units: i64,
    #[serde(default)]
    pub structures: i64,
}

/// Minimum and maximum count of one object kind across players.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    #[serde(default)]
    pub min: i64,
    #[serde(default)]
    pub max: i64,
}

impl CountRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerCounts {
    pub units: CountRange,
    pub structures: CountRange,
    pub resource_extractors: CountRange,
    pub power_generators: CountRange,
    pub reg_factories: CountRange,
    pub vtol_factories: CountRange,
    pub cyborg_factories: CountRange,
    pub research_centers: CountRange,
    pub defense_structures: CountRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(default)]
    pub start_equality: StartEquality,
}

/// Whether every player starts with the same count of each object kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartEquality {
    pub units: bool,
    pub structures: bool,
    pub resource_extractors: bool,
    pub power_generators: bool,
    pub reg_factories: bool,
    pub vtol_factories: bool,
    pub cyborg_factories: bool,
    pub research_centers: bool,
    pub defense_structures: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HqPosition {
    #[serde(default)]
    pub x: Option<i64>,
    #[serde(default)]
    pub y: Option<i64>,
}

impl HqPosition {
    /// Both coordinates, if present.
    pub fn coordinates(&self) -> Option<(i64, i64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

impl MapInfo {
    /// Parse a map info document from a JSON value.
    ///
    /// A top-level key with a value of the wrong type does not fail the
    /// parse: it is moved to [`MapInfo::invalid_fields`] so validation can
    /// report it. Only a document that is not an object is an error.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        let error = match MapInfo::deserialize(value) {
            Ok(info) => return Ok(info),
            Err(e) => e,
        };
        let Value::Object(fields) = value else {
            return Err(error);
        };

        let mut kept = Map::new();
        let mut invalid_fields = Vec::new();
        for (key, field) in fields {
            let single = Value::Object(Map::from_iter([(key.clone(), field.clone())]));
            if MapInfo::deserialize(&single).is_ok() {
                kept.insert(key.clone(), field.clone());
            } else {
                invalid_fields.push((key.clone(), field.clone()));
            }
        }

        let mut info = MapInfo::deserialize(&Value::Object(kept))?;
        info.invalid_fields = invalid_fields;
        Ok(info)
    }

    /// Name of the primary author, if any.
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.name.as_deref())
    }

    pub fn is_map_mod(&self) -> bool {
        self.map_mod == Some(true)
    }
}

/// A map info document as reported by the inspector: raw JSON plus typed view.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectedMap {
    pub raw: Value,
    pub info: MapInfo,
}

impl InspectedMap {
    /// Parse inspector output.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: Value) -> Result<Self, serde_json::Error> {
        let info = MapInfo::from_value(&raw)?;
        Ok(Self { raw, info })
    }
}
