//! Map info validation.
//!
//! Decides whether a map is acceptable for publication. Every rule is an
//! independent check over [`MapInfo`] returning its own findings; the
//! results are merged in a fixed order so reports are stable.
//!
//! Findings fall into three buckets:
//! - `errors` block publication
//! - `errors_non_fatal` are tolerated but surfaced
//! - `warnings` are advisory, and most can be switched off via [`WarningOptions`]

mod date;
mod details;
mod license;

pub use date::{to_yyyy_mm_dd, DateFormatError, MapDate};
pub use details::{
    validate_map, LocalMapRepos, MapNameUniquenessCheck, MapValidationDetails, NameConflictCheck,
    ValidateMapError, ValidateMapOptions, ValidationStatus, MAP_REPO_CLONE_DIRNAME,
};
pub use license::{check_license, is_equivalent, parse_license, LicenseCheck, APPROVED_LICENSES};

use chrono::{Duration, Local, NaiveDateTime};
use serde::Serialize;
use std::sync::OnceLock;

use regex::Regex;

use crate::map_info::MapInfo;

/// Names below this length get a warning.
pub const MIN_SUGGESTED_MAP_NAME_LENGTH: usize = 6;

/// Names above this length get a warning (they may be truncated in game).
pub const MAX_SUGGESTED_MAP_NAME_LENGTH: usize = 30;

/// Names above this length are rejected.
pub const MAX_ALLOWED_MAP_NAME_LENGTH: usize = 60;

pub const MAX_ALLOWED_AUTHOR_NAME_LENGTH: usize = 60;

pub const ALLOWED_TYPES: [&str; 1] = ["skirmish"];
pub const ALLOWED_TILESETS: [&str; 3] = ["arizona", "urban", "rockies"];
pub const ALLOWED_LEVEL_FORMATS: [&str; 1] = ["json"];
pub const ALLOWED_MAP_FORMATS: [&str; 2] = ["script", "jsonv2"];

pub const MIN_PLAYERS: i64 = 2;
pub const MAX_PLAYERS: i64 = 10;
pub const MAX_MAP_DIMENSION: i64 = 256;

/// Earliest plausible creation year.
pub const EARLIEST_CREATED_YEAR: i32 = 1999;

/// First player slot checked for an HQ. Slots 0 and 1 are not checked.
pub const FIRST_HQ_CHECKED_SLOT: i64 = 2;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9\-_]+$").unwrap())
}

/// Which advisory warnings to emit. All are on by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningOptions {
    pub short_name: bool,
    pub missing_created_date: bool,
    pub zero_oil: bool,
    pub missing_hq: bool,
    pub player_structure_zero: bool,
    pub mods_texture_overrides: bool,
    pub mods_auto_strip: bool,
    pub mods_no_modtypes: bool,
    pub format_warnings: bool,
}

impl Default for WarningOptions {
    fn default() -> Self {
        Self {
            short_name: true,
            missing_created_date: true,
            zero_oil: true,
            missing_hq: true,
            player_structure_zero: true,
            mods_texture_overrides: true,
            mods_auto_strip: true,
            mods_no_modtypes: true,
            format_warnings: true,
        }
    }
}

impl WarningOptions {
    /// Every advisory warning switched off.
    pub fn none() -> Self {
        Self {
            short_name: false,
            missing_created_date: false,
            zero_oil: false,
            missing_hq: false,
            player_structure_zero: false,
            mods_texture_overrides: false,
            mods_auto_strip: false,
            mods_no_modtypes: false,
            format_warnings: false,
        }
    }
}

/// Findings for one map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub errors_non_fatal: Vec<String>,
    pub warnings: Vec<String>,
    pub passed_format_checks: bool,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            errors: Vec::new(),
            errors_non_fatal: Vec::new(),
            warnings: Vec::new(),
            passed_format_checks: true,
        }
    }
}

impl ValidationResult {
    /// A map is publishable iff there are no errors.
    pub fn is_publishable(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn non_fatal(&mut self, message: impl Into<String>) {
        self.errors_non_fatal.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn warn_if(&mut self, enabled: bool, message: impl Into<String>) {
        if enabled {
            self.warn(message);
        }
    }

    /// Append another rule's findings.
    fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.errors_non_fatal.extend(other.errors_non_fatal);
        self.warnings.extend(other.warnings);
        self.passed_format_checks &= other.passed_format_checks;
    }
}

fn shown<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
}

fn list_display(values: &[&str]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| format!("'{}'", v)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Validate a map info document against the publication rules.
///
/// # Arguments
///
/// * `info` - Map info reported by the inspector
/// * `enforce_format_checks` - Route format failures to `errors` instead of `warnings`
/// * `options` - Advisory warnings to emit
pub fn validate_map_info(
    info: &MapInfo,
    enforce_format_checks: bool,
    options: &WarningOptions,
) -> ValidationResult {
    validate_map_info_at(
        info,
        enforce_format_checks,
        options,
        Local::now().naive_local(),
    )
}

/// Same as [`validate_map_info`], with an explicit current time.
pub fn validate_map_info_at(
    info: &MapInfo,
    enforce_format_checks: bool,
    options: &WarningOptions,
    now: NaiveDateTime,
) -> ValidationResult {
    let license = check_license_rule(info);
    let has_valid_license = license.is_publishable() && info.license.is_some();

    let mut result = check_field_types(info);
    result.merge(check_name(info, options));
    result.merge(check_type(info));
    result.merge(check_players(info));
    result.merge(check_tileset(info));
    result.merge(license);
    result.merge(check_author(info, has_valid_license));
    result.merge(check_created(info, options, now));
    result.merge(check_map_size(info));
    result.merge(check_oil(info, options));
    result.merge(check_hq(info, options));
    result.merge(check_structures(info, options));
    result.merge(check_mods(info, options));
    result.merge(check_formats(info, enforce_format_checks, options));
    result
}

/// Keys the document had with values of the wrong type.
pub fn check_field_types(info: &MapInfo) -> ValidationResult {
    let mut r = ValidationResult::default();
    for (key, value) in &info.invalid_fields {
        r.error(format!("'{}' has an invalid value type: ({})", key, value));
    }
    r
}

pub fn check_name(info: &MapInfo, options: &WarningOptions) -> ValidationResult {
    let mut r = ValidationResult::default();
    let name = match info.name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => {
            r.error("Missing required 'name' key");
            return r;
        }
    };

    let length = name.chars().count();
    if length < MIN_SUGGESTED_MAP_NAME_LENGTH {
        r.warn_if(
            options.short_name,
            format!(
                "'name' is less than {} chars - consider using a longer name: ('{}')",
                MIN_SUGGESTED_MAP_NAME_LENGTH, name
            ),
        );
    }
    if length > MAX_ALLOWED_MAP_NAME_LENGTH {
        r.error(format!(
            "'name' is > {} chars - use a shorter name: ('{}')",
            MAX_ALLOWED_MAP_NAME_LENGTH, name
        ));
    } else if length > MAX_SUGGESTED_MAP_NAME_LENGTH {
        r.warn(format!(
            "'name' is > {} chars - consider using a shorter name (longer names may be truncated): ('{}')",
            MAX_SUGGESTED_MAP_NAME_LENGTH, name
        ));
    }
    if !name_pattern().is_match(name) {
        r.error(format!(
            "'name' has unsupported characters - for compatibility, please stick to: A-Z, a-z, 0-9, '-', '_': ('{}')",
            name
        ));
    }
    r
}

pub fn check_type(info: &MapInfo) -> ValidationResult {
    let mut r = ValidationResult::default();
    let map_type = info.map_type.as_deref();
    if !map_type.is_some_and(|t| ALLOWED_TYPES.contains(&t)) {
        r.error(format!(
            "'type' ('{}') is not one of the allowed values: {}",
            shown(map_type),
            list_display(&ALLOWED_TYPES)
        ));
    }
    r
}

pub fn check_players(info: &MapInfo) -> ValidationResult {
    let mut r = ValidationResult::default();
    if !info
        .players
        .is_some_and(|p| (MIN_PLAYERS..=MAX_PLAYERS).contains(&p))
    {
        r.error(format!(
            "'players' ('{}') is not an allowed value",
            shown(info.players)
        ));
    }
    r
}

pub fn check_tileset(info: &MapInfo) -> ValidationResult {
    let mut r = ValidationResult::default();
    let tileset = info.tileset.as_deref();
    if !tileset.is_some_and(|t| ALLOWED_TILESETS.contains(&t)) {
        r.error(format!(
            "'tileset' ('{}') is not one of the allowed values: {}",
            shown(tileset),
            list_display(&ALLOWED_TILESETS)
        ));
    }
    r
}

fn check_license_rule(info: &MapInfo) -> ValidationResult {
    let mut r = ValidationResult::default();
    let Some(text) = info.license.as_deref() else {
        r.error("Missing required 'license' key");
        return r;
    };
    match check_license(text) {
        LicenseCheck::Approved => {}
        LicenseCheck::NotApproved => r.error(format!(
            "'license' value (\"{}\") is not in the list of expected licenses: [{}]",
            text,
            license::approved_list_display()
        )),
        LicenseCheck::Invalid(reason) => r.error(format!(
            "'license' value (\"{}\") failed SPDX license expression parsing: {}",
            text, reason
        )),
    }
    r
}

/// Author rules. A missing author is tolerated when the license is valid.
pub fn check_author(info: &MapInfo, has_valid_license: bool) -> ValidationResult {
    let mut r = ValidationResult::default();
    match &info.author {
        None if info.additional_authors.is_some() => {
            r.error("Missing required 'author' key, but has 'additionalAuthors'")
        }
        None if has_valid_license => r.non_fatal("Missing 'author' key"),
        None => r.error("Missing required 'author' key"),
        Some(author) => match author.name.as_deref() {
            None => r.error("Missing required 'name' key under 'author' key"),
            Some("") => r.warn("Empty 'name' value under 'author' key"),
            Some(name) if name.chars().count() > MAX_ALLOWED_AUTHOR_NAME_LENGTH => {
                r.error(format!(
                    "'author.name' is > {} chars - use a shorter author name",
                    MAX_ALLOWED_AUTHOR_NAME_LENGTH
                ))
            }
            Some(_) => {}
        },
    }
    r
}

pub fn check_created(
    info: &MapInfo,
    options: &WarningOptions,
    now: NaiveDateTime,
) -> ValidationResult {
    let mut r = ValidationResult::default();
    let Some(created) = info.created.as_deref() else {
        r.warn_if(options.missing_created_date, "Missing 'created' date");
        return r;
    };

    let Ok(date) = MapDate::parse(created) else {
        r.error(format!("Invalid 'created' date format: {}", created));
        return r;
    };

    match date.to_naive_date().and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(created_at) => {
            if created_at - now > Duration::days(1) {
                r.error(format!("'created' ('{}') is in the future", created));
            }
        }
        None => r.error(format!("Invalid 'created' date: {}", created)),
    }
    if date
        .year_number()
        .map_or(false, |y| y < EARLIEST_CREATED_YEAR)
    {
        r.error(format!(
            "'created' ('{}') can't be before the creation of the game",
            created
        ));
    }
    r
}

pub fn check_map_size(info: &MapInfo) -> ValidationResult {
    let mut r = ValidationResult::default();
    let size = info.mapsize.clone().unwrap_or_default();
    for (key, value) in [("w", size.w), ("h", size.h)] {
        if !value.is_some_and(|v| (1..=MAX_MAP_DIMENSION).contains(&v)) {
            r.error(format!("Invalid 'mapsize.{}' ('{}')", key, shown(value)));
        }
    }
    r
}

pub fn check_oil(info: &MapInfo, options: &WarningOptions) -> ValidationResult {
    let mut r = ValidationResult::default();
    let oil_wells = info.oil_wells.unwrap_or(0);
    let min_extractors = info
        .player
        .as_ref()
        .map_or(0, |p| p.resource_extractors.min);
    if oil_wells <= 0 && min_extractors <= 0 {
        r.warn_if(
            options.zero_oil,
            "'oilWells' is 0 *AND* at least one player has no starting resourceExtractors - did you forget to add oil resources / derricks?",
        );
    }
    r
}

/// Warn for player slots without HQ coordinates, from [`FIRST_HQ_CHECKED_SLOT`]
/// up to `players - 1`. Slots past [`MAX_PLAYERS`] are not checked.
pub fn check_hq(info: &MapInfo, options: &WarningOptions) -> ValidationResult {
    let mut r = ValidationResult::default();
    let players = info.players.unwrap_or(0).min(MAX_PLAYERS);
    let hq = info.hq.as_deref().unwrap_or_default();
    for slot in FIRST_HQ_CHECKED_SLOT..players {
        let has_hq = hq
            .get(slot as usize)
            .and_then(|entry| entry.as_ref())
            .and_then(|pos| pos.coordinates())
            .is_some();
        if !has_hq {
            r.warn_if(
                options.missing_hq,
                format!(
                    "player {} has no HQ - did you forget to add an HQ / command center?",
                    slot
                ),
            );
        }
    }
    r
}

pub fn check_structures(info: &MapInfo, options: &WarningOptions) -> ValidationResult {
    let mut r = ValidationResult::default();
    let counts = info.player.clone().unwrap_or_default();
    let enabled = options.player_structure_zero;
    if counts.power_generators.min <= 0 {
        r.warn_if(
            enabled,
            "At least one player has no starting 'powerGenerators' on map?",
        );
    }
    if counts.reg_factories.min <= 0
        && counts.vtol_factories.min <= 0
        && counts.cyborg_factories.min <= 0
    {
        r.warn_if(
            enabled,
            "At least one player has no starting '*Factories' on map?",
        );
    }
    if counts.research_centers.min <= 0 {
        r.warn_if(
            enabled,
            "At least one player has no starting 'researchCenters' on map?",
        );
    }
    r
}

pub fn check_mods(info: &MapInfo, options: &WarningOptions) -> ValidationResult {
    let mut r = ValidationResult::default();
    if !info.is_map_mod() {
        return r;
    }
    let Some(mod_types) = info.mod_types.as_deref() else {
        r.warn_if(
            options.mods_no_modtypes,
            "Conversion Warning: mapMod is True, but no modTypes array? (Please review!)",
        );
        return r;
    };

    let has = |kind: &str| mod_types.iter().any(|t| t == kind);
    let can_strip = !(has("gamemodels") && has("datasets"));
    if !can_strip {
        r.error("Conversion Error: Unable to auto-strip mods, as map-mod contains both 'gamemodels' and 'datasets' modifications");
    }
    if has("textures") {
        r.warn_if(
            options.mods_texture_overrides,
            "Conversion Warning: Map-mod contains texture overrides",
        );
    }
    if can_strip {
        r.warn_if(
            options.mods_auto_strip,
            format!(
                "Conversion Warning: Will auto-strip the following mods (please review): {}",
                mod_types.join(",")
            ),
        );
    }
    r
}

pub fn check_formats(
    info: &MapInfo,
    enforce_format_checks: bool,
    options: &WarningOptions,
) -> ValidationResult {
    let mut r = ValidationResult::default();
    let fail = |r: &mut ValidationResult, message: String| {
        r.passed_format_checks = false;
        if enforce_format_checks {
            r.error(message);
        } else {
            r.warn_if(options.format_warnings, message);
        }
    };

    if !info
        .level_format
        .as_deref()
        .is_some_and(|f| ALLOWED_LEVEL_FORMATS.contains(&f))
    {
        fail(
            &mut r,
            format!(
                "Map level file format must be modern ({})",
                ALLOWED_LEVEL_FORMATS.join(", ")
            ),
        );
    }
    if !info
        .map_format
        .as_deref()
        .is_some_and(|f| ALLOWED_MAP_FORMATS.contains(&f))
    {
        fail(
            &mut r,
            format!(
                "Map format must be modern ({})",
                ALLOWED_MAP_FORMATS.join(", ")
            ),
        );
    }
    if info.flat_map_package != Some(true) {
        fail(&mut r, "Map must be a 'flatMapPackage'".to_string());
    }
    r
}
