//! Tests for validate command handlers.
//!
//! A mock validator returns canned results per map path; a mock output
//! captures the report lines.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::{json, Value};
use tempfile::TempDir;
use wzmapdb::publisher::InspectError;
use wzmapdb::validation::{MapValidationDetails, ValidateMapError, ValidationResult};

use super::args::*;
use super::handlers::*;
use super::services::parse_map_list;
use super::traits::*;
use crate::error::CliError;

// ============================================================================
// Mock Output Implementation
// ============================================================================

/// Mock output that captures all lines.
#[derive(Default)]
pub struct MockOutput {
    lines: RwLock<Vec<String>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.read().unwrap().clone()
    }

    pub fn contains(&self, substring: &str) -> bool {
        self.lines
            .read()
            .unwrap()
            .iter()
            .any(|l| l.contains(substring))
    }

    pub fn full_output(&self) -> String {
        self.lines.read().unwrap().join("\n")
    }
}

impl Output for MockOutput {
    fn println(&self, message: &str) {
        self.lines.write().unwrap().push(message.to_string());
    }
}

// ============================================================================
// Mock Validation Service
// ============================================================================

enum Canned {
    Details(MapValidationDetails),
    Unprocessable,
    CloneFailure,
}

/// Returns canned results keyed by map file name.
#[derive(Default)]
struct MockValidationService {
    results: HashMap<String, Canned>,
    map_list: Vec<String>,
}

impl MockValidationService {
    fn with(mut self, file_name: &str, result: Canned) -> Self {
        self.results.insert(file_name.to_string(), result);
        self
    }
}

impl ValidationService for MockValidationService {
    fn validate(&self, map_path: &Path) -> Result<MapValidationDetails, ValidateMapError> {
        let name = map_path.file_name().unwrap().to_string_lossy().into_owned();
        match self.results.get(&name) {
            Some(Canned::Details(details)) => Ok(details.clone()),
            Some(Canned::Unprocessable) => Err(ValidateMapError::Unprocessable(
                InspectError::Failed {
                    code: "1".to_string(),
                    stdout: String::new(),
                    stderr: "bad map".to_string(),
                },
            )),
            Some(Canned::CloneFailure) | None => Err(ValidateMapError::InvalidLocalRepo(name)),
        }
    }

    fn read_map_list(&self, _list_file: &Path) -> Result<Vec<String>, CliError> {
        Ok(self.map_list.clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn info(name: &str) -> Value {
    json!({"name": name, "players": 4, "author": {"name": "Jane"}})
}

fn passing(name: &str) -> MapValidationDetails {
    MapValidationDetails {
        info: info(name),
        validation: ValidationResult::default(),
        name_conflict: false,
        folder_name_mismatch: false,
        players_count_mismatch: false,
        enforce_format_checks: true,
    }
}

fn failing(name: &str) -> MapValidationDetails {
    MapValidationDetails {
        validation: ValidationResult {
            errors: vec!["Missing required 'license' key".to_string()],
            ..ValidationResult::default()
        },
        name_conflict: true,
        ..passing(name)
    }
}

fn map_files(temp: &TempDir, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let path = temp.path().join(name);
            fs::write(&path, "wz").unwrap();
            path.display().to_string()
        })
        .collect()
}

fn run_map(service: &MockValidationService, path: &str) -> (Result<bool, CliError>, MockOutput) {
    let output = MockOutput::new();
    let ctx = CommandContext::new(&output, service);
    let result = MapHandler::execute(
        MapArgs {
            map_path: PathBuf::from(path),
        },
        &ctx,
    );
    (result, output)
}

fn run_list(service: &MockValidationService) -> (Result<bool, CliError>, MockOutput) {
    let output = MockOutput::new();
    let ctx = CommandContext::new(&output, service);
    let result = MapListHandler::execute(
        MapListArgs {
            map_list_file: PathBuf::from("maps.txt"),
        },
        &ctx,
    );
    (result, output)
}

// ============================================================================
// Map Handler Tests
// ============================================================================

#[test]
fn test_single_map_pass_report() {
    let service = MockValidationService::default().with("Rush.wz", Canned::Details(passing("Rush")));
    let (result, output) = run_map(&service, "Rush.wz");

    assert!(result.unwrap());
    let lines = output.lines();
    assert_eq!(lines[0], "## \u{2705} Map: Rush");
    assert_eq!(lines[1], "- `Rush.wz`");
    assert_eq!(lines[2], "- Author: `Jane`");
    assert!(output.contains("### Status: `Pass`"));
    assert!(!output.contains("### Errors:"));
    assert!(!output.contains("### Recommendations:"));
    assert!(output.contains("<summary>Map Info JSON:</summary>"));
    assert!(output.contains("  \"name\": \"Rush\","));
    assert_eq!(lines.last().unwrap(), "</details>");
}

#[test]
fn test_single_map_failure_report() {
    let service = MockValidationService::default().with("Rush.wz", Canned::Details(failing("Rush")));
    let (result, output) = run_map(&service, "Rush.wz");

    assert!(!result.unwrap());
    assert!(output.contains("## \u{274C} Map: Rush"));
    assert!(output.contains("### Status: `NameConflict`, `ValidationErrors`"));
    assert!(output.contains("\u{274C} Missing required 'license' key"));
    assert!(output.contains("- Resolve validation errors listed above"));
    assert!(output.contains("conflicts with a map that already has the name \"Rush\""));
    assert!(output.contains("(ex. \"Rush-v2\")"));
}

#[test]
fn test_format_conversion_recommendation() {
    let mut details = passing("Rush");
    details.validation.passed_format_checks = false;
    let service = MockValidationService::default().with("Rush.wz", Canned::Details(details));
    let (result, output) = run_map(&service, "Rush.wz");

    assert!(!result.unwrap());
    assert!(output.contains("### Status: `NeedsFormatConversion`"));
    assert!(output.contains(
        "  maptools package convert --format=latest <path to original map .wz or extracted map folder> Rush_converted.wz"
    ));
}

#[test]
fn test_non_fatal_notice_on_pass() {
    let mut details = passing("Rush");
    details.validation.errors_non_fatal = vec!["odd license".to_string()];
    details.validation.warnings = vec!["short name".to_string()];
    let service = MockValidationService::default().with("Rush.wz", Canned::Details(details));
    let (result, output) = run_map(&service, "Rush.wz");

    assert!(result.unwrap());
    assert!(output.contains("Non-Fatal Errors detected - please resolve if possible!"));
    assert!(output.contains("### Non-Fatal Errors:"));
    assert!(output.contains("\u{26A0}\u{FE0F} odd license"));
    let text = output.full_output();
    assert!(text.contains("### Warnings:\n```\nshort name\n```"));
}

#[test]
fn test_missing_name_and_author() {
    let mut details = passing("Rush");
    details.info = json!({"players": 4});
    let service = MockValidationService::default().with("Rush.wz", Canned::Details(details));
    let (_, output) = run_map(&service, "Rush.wz");

    assert!(output.contains("Map: Rush.wz (missing `name` property)"));
    assert!(output.contains("- Author: (missing `author` property)"));
}

#[test]
fn test_single_map_unprocessable_is_error() {
    let service = MockValidationService::default().with("Broken.wz", Canned::Unprocessable);
    let (result, output) = run_map(&service, "Broken.wz");

    assert!(matches!(result, Err(CliError::Validation(_))));
    assert!(output.lines().is_empty());
}

// ============================================================================
// Map List Handler Tests
// ============================================================================

#[test]
fn test_map_list_all_pass() {
    let temp = TempDir::new().unwrap();
    let service = MockValidationService {
        map_list: map_files(&temp, &["Rush", "Fort"]),
        ..Default::default()
    }
    .with("Rush", Canned::Details(passing("Rush")))
    .with("Fort", Canned::Details(passing("Fort")));

    let (result, output) = run_list(&service);

    assert!(result.unwrap());
    let lines = output.lines();
    assert_eq!(lines[0], "# \u{2705} Overall Validation: PASS");
    assert!(output.contains("## Passing Maps:"));
    assert!(!output.contains("## Failing Maps:"));
    assert_eq!(lines.iter().filter(|l| *l == "---").count(), 2);
}

#[test]
fn test_map_list_failing_first() {
    let temp = TempDir::new().unwrap();
    let service = MockValidationService {
        map_list: map_files(&temp, &["Rush", "Fort"]),
        ..Default::default()
    }
    .with("Rush", Canned::Details(passing("Rush")))
    .with("Fort", Canned::Details(failing("Fort")));

    let (result, output) = run_list(&service);

    assert!(!result.unwrap());
    let text = output.full_output();
    assert!(text.starts_with("# \u{274C} Overall Validation: FAILED"));
    assert!(text.contains("## Passing Maps:\n- `Rush`"));
    assert!(text.contains("## Failing Maps:\n- `Fort`"));
    let fort = text.find("Map: Fort").unwrap();
    let rush = text.find("Map: Rush").unwrap();
    assert!(fort < rush);
}

#[test]
fn test_map_list_unprocessable_fails_overall() {
    let temp = TempDir::new().unwrap();
    let service = MockValidationService {
        map_list: map_files(&temp, &["Rush", "Broken"]),
        ..Default::default()
    }
    .with("Rush", Canned::Details(passing("Rush")))
    .with("Broken", Canned::Unprocessable);

    let (result, output) = run_list(&service);

    assert!(!result.unwrap());
    let text = output.full_output();
    assert!(text.contains("## Unprocessable / Invalid Maps:\n- `Broken`"));
    assert!(text.contains("## Passing Maps:\n- `Rush`"));
}

#[test]
fn test_map_list_skips_missing_paths() {
    let temp = TempDir::new().unwrap();
    let mut map_list = map_files(&temp, &["Rush"]);
    map_list.push(temp.path().join("Gone").display().to_string());
    let service = MockValidationService {
        map_list,
        ..Default::default()
    }
    .with("Rush", Canned::Details(passing("Rush")));

    let (result, output) = run_list(&service);

    assert!(result.unwrap());
    assert!(!output.contains("Gone"));
}

#[test]
fn test_empty_map_list_fails() {
    let service = MockValidationService::default();
    let (result, output) = run_list(&service);

    assert!(!result.unwrap());
    assert_eq!(output.lines(), vec!["# \u{274C} Overall Validation: FAILED"]);
}

#[test]
fn test_map_list_check_failure_aborts() {
    let temp = TempDir::new().unwrap();
    let service = MockValidationService {
        map_list: map_files(&temp, &["Rush"]),
        ..Default::default()
    }
    .with("Rush", Canned::CloneFailure);

    let (result, _) = run_list(&service);
    assert!(matches!(result, Err(CliError::Validation(_))));
}

#[test]
fn test_parse_map_list_ignores_blank_lines() {
    let list = parse_map_list("maps/Rush\n\n  \nmaps/Fort  \n");
    assert_eq!(list, vec!["maps/Rush", "maps/Fort"]);
}
