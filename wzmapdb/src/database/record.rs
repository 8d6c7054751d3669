//! Map database records.
//!
//! A [`MapDatabaseRecord`] is the public, versioned description of one
//! published map. It is derived from the inspector's map info document and
//! the package's download details. Field order and key names are part of the
//! published format: consumers diff records, so serialization must be stable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map_info::{CountRange, MapInfo};
use crate::publisher::DownloadInfo;
use crate::validation::{to_yyyy_mm_dd, DateFormatError};

/// A map info document that cannot be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("map info is missing '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    Date(#[from] DateFormatError),
}

/// One author, or several when the map credits additional authors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorField {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSize {
    pub w: i64,
    pub h: i64,
}

/// Per-player count of one object kind, and whether all players start equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCounter {
    pub eq: bool,
    pub min: i64,
    pub max: i64,
}

impl BalanceCounter {
    fn new(eq: bool, range: CountRange) -> Self {
        Self {
            eq,
            min: range.min,
            max: range.max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBalance {
    pub units: BalanceCounter,
    pub structs: BalanceCounter,
    pub resource_extr: BalanceCounter,
    pub pwr_gen: BalanceCounter,
    pub reg_fact: BalanceCounter,
    pub vtol_fact: BalanceCounter,
    pub cyborg_fact: BalanceCounter,
    pub research_cent: BalanceCounter,
    pub def_struct: BalanceCounter,
}

/// Package format plus, once published, where to download it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDownload {
    #[serde(rename = "type")]
    pub map_format: String,
    #[serde(flatten)]
    pub location: Option<DownloadInfo>,
}

/// Public map database schema of one map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDatabaseRecord {
    pub name: String,
    pub slots: i64,
    pub tileset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorField>,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub size: RecordSize,
    pub scavs: i64,
    pub oil_wells: i64,
    pub player: PlayerBalance,
    /// HQ position per player slot; empty when the slot has none.
    pub hq: Vec<Vec<i64>>,
    #[serde(rename = "mod", default, skip_serializing_if = "Option::is_none")]
    pub map_mod: Option<bool>,
    pub download: RecordDownload,
}

impl MapDatabaseRecord {
    /// Content hash of the package, once download details are attached.
    pub fn hash(&self) -> Option<&str> {
        self.download.location.as_ref().map(|d| d.hash.as_str())
    }
}

/// Author list: the primary author first, then additional authors in order,
/// without repeats or empty names.
pub fn dedupe_authors(primary: &str, additional: &[&str]) -> Vec<String> {
    let mut authors = vec![primary.to_string()];
    for name in additional {
        if !name.is_empty() && !authors.iter().any(|a| a == name) {
            authors.push(name.to_string());
        }
    }
    authors
}

fn author_field(info: &MapInfo) -> Result<Option<AuthorField>, NormalizeError> {
    let primary = info.author.as_ref().map(|a| a.name.as_deref());
    match (&info.additional_authors, primary) {
        (None, None) => Ok(None),
        (None, Some(name)) => name
            .map(|n| Some(AuthorField::Single(n.to_string())))
            .ok_or(NormalizeError::MissingField("author.name")),
        (Some(_), None) | (Some(_), Some(None)) => Err(NormalizeError::MissingField("author.name")),
        (Some(additional), Some(Some(name))) => {
            let names: Vec<&str> = additional.iter().filter_map(|a| a.name.as_deref()).collect();
            Ok(Some(AuthorField::Multiple(dedupe_authors(name, &names))))
        }
    }
}

/// Convert a map info document into its database record.
///
/// The record has no download location; see [`normalize_with_download`].
pub fn normalize(info: &MapInfo) -> Result<MapDatabaseRecord, NormalizeError> {
    use NormalizeError::MissingField;

    let size = info.mapsize.as_ref().ok_or(MissingField("mapsize"))?;
    let scavenger = info.scavenger.as_ref().ok_or(MissingField("scavenger"))?;
    let counts = info.player.as_ref().ok_or(MissingField("player"))?;
    let equal = &info
        .balance
        .as_ref()
        .ok_or(MissingField("balance"))?
        .start_equality;

    let hq = info
        .hq
        .as_ref()
        .ok_or(MissingField("hq"))?
        .iter()
        .map(|slot| match slot.and_then(|p| p.coordinates()) {
            Some((x, y)) => vec![x, y],
            None => Vec::new(),
        })
        .collect();

    Ok(MapDatabaseRecord {
        name: info.name.clone().ok_or(MissingField("name"))?,
        slots: info.players.ok_or(MissingField("players"))?,
        tileset: info.tileset.clone().ok_or(MissingField("tileset"))?,
        author: author_field(info)?,
        license: info.license.clone().ok_or(MissingField("license"))?,
        created: info.created.as_deref().map(to_yyyy_mm_dd).transpose()?,
        size: RecordSize {
            w: size.w.ok_or(MissingField("mapsize.w"))?,
            h: size.h.ok_or(MissingField("mapsize.h"))?,
        },
        scavs: scavenger.units + scavenger.structures,
        oil_wells: info.oil_wells.ok_or(MissingField("oilWells"))?,
        player: PlayerBalance {
            units: BalanceCounter::new(equal.units, counts.units),
            structs: BalanceCounter::new(equal.structures, counts.structures),
            resource_extr: BalanceCounter::new(
                equal.resource_extractors,
                counts.resource_extractors,
            ),
            pwr_gen: BalanceCounter::new(equal.power_generators, counts.power_generators),
            reg_fact: BalanceCounter::new(equal.reg_factories, counts.reg_factories),
            vtol_fact: BalanceCounter::new(equal.vtol_factories, counts.vtol_factories),
            cyborg_fact: BalanceCounter::new(equal.cyborg_factories, counts.cyborg_factories),
            research_cent: BalanceCounter::new(equal.research_centers, counts.research_centers),
            def_struct: BalanceCounter::new(equal.defense_structures, counts.defense_structures),
        },
        hq,
        map_mod: info.is_map_mod().then_some(true),
        download: RecordDownload {
            map_format: info.map_format.clone().ok_or(MissingField("mapFormat"))?,
            location: None,
        },
    })
}

/// [`normalize`], with the package's download details merged in.
pub fn normalize_with_download(
    info: &MapInfo,
    download: DownloadInfo,
) -> Result<MapDatabaseRecord, NormalizeError> {
    let mut record = normalize(info)?;
    record.download.location = Some(download);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_info::fixtures::{valid_map_info, valid_map_info_json};
    use crate::map_info::Author;
    use proptest::prelude::*;

    fn download() -> DownloadInfo {
        DownloadInfo {
            repo: "4p".to_string(),
            path: "v2/4p-Sk-Rush.wz".to_string(),
            uploaded: Some("2024-02-03".to_string()),
            hash: "ab12".to_string(),
            size: 2048,
        }
    }

    #[test]
    fn test_normalize_fields() {
        let record = normalize(&valid_map_info()).unwrap();
        assert_eq!(record.name, "Sk-Rush");
        assert_eq!(record.slots, 4);
        assert_eq!(record.author, Some(AuthorField::Single("Pumpkin".to_string())));
        assert_eq!(record.created.as_deref(), Some("2021-03-04"));
        assert_eq!(record.scavs, 15);
        assert_eq!(
            record.player.resource_extr,
            BalanceCounter {
                eq: true,
                min: 4,
                max: 4
            }
        );
        assert_eq!(record.hq.len(), 4);
        assert_eq!(record.hq[0], vec![10, 12]);
        assert_eq!(record.map_mod, None);
        assert_eq!(record.hash(), None);
    }

    #[test]
    fn test_key_order() {
        let record = normalize_with_download(&valid_map_info(), download()).unwrap();
        let json = crate::json::to_string_compact(&record).unwrap();
        let keys = [
            "\"name\"",
            "\"slots\"",
            "\"tileset\"",
            "\"author\"",
            "\"license\"",
            "\"created\"",
            "\"size\"",
            "\"scavs\"",
            "\"oilWells\"",
            "\"player\"",
            "\"hq\"",
            "\"download\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);
        assert!(json.contains(
            "\"player\":{\"units\":{\"eq\":true,\"min\":2,\"max\":2},\"structs\":"
        ));
        assert!(json.ends_with(
            "\"download\":{\"type\":\"jsonv2\",\"repo\":\"4p\",\"path\":\"v2/4p-Sk-Rush.wz\",\"uploaded\":\"2024-02-03\",\"hash\":\"ab12\",\"size\":2048}}"
        ));
        assert!(!json.contains("\"mod\""));
    }

    #[test]
    fn test_author_dedup() {
        let mut info = valid_map_info();
        info.author = Some(Author::named("A"));
        info.additional_authors = Some(vec![
            Author::named("A"),
            Author::named("B"),
            Author::named("B"),
            Author::named(""),
        ]);
        let record = normalize(&info).unwrap();
        assert_eq!(
            record.author,
            Some(AuthorField::Multiple(vec!["A".to_string(), "B".to_string()]))
        );
    }

    #[test]
    fn test_additional_authors_without_primary() {
        let mut info = valid_map_info();
        info.author = None;
        info.additional_authors = Some(vec![Author::named("B")]);
        assert_eq!(
            normalize(&info),
            Err(NormalizeError::MissingField("author.name"))
        );
    }

    #[test]
    fn test_no_author_is_omitted() {
        let mut info = valid_map_info();
        info.author = None;
        let record = normalize(&info).unwrap();
        assert!(record.author.is_none());
        let json = crate::json::to_string_compact(&record).unwrap();
        assert!(!json.contains("\"author\""));
    }

    #[test]
    fn test_mod_flag_only_when_true() {
        let mut info = valid_map_info();
        info.map_mod = Some(true);
        let json = crate::json::to_string_compact(&normalize(&info).unwrap()).unwrap();
        assert!(json.contains("\"mod\":true,\"download\""));
    }

    #[test]
    fn test_malformed_date() {
        let mut info = valid_map_info();
        info.created = Some("March 2021".to_string());
        assert!(matches!(normalize(&info), Err(NormalizeError::Date(_))));
    }

    #[test]
    fn test_missing_hq_slot_is_empty_pair() {
        let mut json = valid_map_info_json();
        json["hq"] = serde_json::json!([{ "x": 1, "y": 2 }, {}, null]);
        let info = MapInfo::from_value(&json).unwrap();
        let record = normalize(&info).unwrap();
        assert_eq!(record.hq, vec![vec![1, 2], vec![], vec![]]);
    }

    #[test]
    fn test_missing_required_field() {
        let mut info = valid_map_info();
        info.mapsize = None;
        assert_eq!(normalize(&info), Err(NormalizeError::MissingField("mapsize")));
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = normalize_with_download(&valid_map_info(), download()).unwrap();
        let json = crate::json::to_string_compact(&record).unwrap();
        let parsed: MapDatabaseRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    proptest! {
        #[test]
        fn test_normalize_is_deterministic(
            name in "[A-Za-z0-9_-]{1,30}",
            players in 2i64..=10,
            oil in 0i64..200,
            authors in proptest::collection::vec("[a-c]{0,2}", 0..6),
        ) {
            let mut info = valid_map_info();
            info.name = Some(name);
            info.players = Some(players);
            info.oil_wells = Some(oil);
            info.additional_authors = Some(authors.iter().map(|a| Author::named(a)).collect());

            let first = crate::json::to_string_compact(&normalize(&info).unwrap()).unwrap();
            let second = crate::json::to_string_compact(&normalize(&info).unwrap()).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn test_dedupe_keeps_first_seen_order(
            primary in "[a-d]{1,2}",
            additional in proptest::collection::vec("[a-d]{0,2}", 0..10),
        ) {
            let names: Vec<&str> = additional.iter().map(String::as_str).collect();
            let authors = dedupe_authors(&primary, &names);
            prop_assert_eq!(&authors[0], &primary);
            for (i, a) in authors.iter().enumerate() {
                prop_assert!(!a.is_empty());
                prop_assert!(!authors[i + 1..].contains(a));
            }
            for name in names.iter().filter(|n| !n.is_empty()) {
                prop_assert!(authors.iter().any(|a| a == name));
            }
        }
    }
}
