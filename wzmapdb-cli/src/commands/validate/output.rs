//! Markdown validation reports.
//!
//! The reports are posted as PR comments, so the layout is Markdown:
//! headings per map, fenced code blocks for findings, and the map info JSON
//! folded into a `<details>` block.

use std::path::{Path, PathBuf};

use serde_json::Value;
use wzmapdb::validation::MapValidationDetails;

use super::traits::Output;

const PASS_SYMBOL: &str = "\u{2705}";
const FAIL_SYMBOL: &str = "\u{274C}";
const WARNING_SYMBOL: &str = "\u{26A0}\u{FE0F}";

fn status_symbol(passed: bool) -> &'static str {
    if passed {
        PASS_SYMBOL
    } else {
        FAIL_SYMBOL
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A top-level map info value as it should read in prose.
fn info_text(details: &MapValidationDetails, key: &str) -> String {
    match details.info.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}

fn print_code_block(out: &dyn Output, title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    out.println(&format!("### {}:", title));
    out.println("```");
    for line in lines {
        out.println(line);
    }
    out.println("```");
    out.newline();
}

fn conversion_command(map_path: &Path) -> String {
    if map_path.is_dir() {
        format!(
            "  maptools package convert --format=latest --output-uncompressed <path to original map .wz or extracted map folder> maps/{}",
            file_name(map_path)
        )
    } else {
        let stem = map_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = map_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        format!(
            "  maptools package convert --format=latest <path to original map .wz or extracted map folder> {}_converted{}",
            stem, suffix
        )
    }
}

fn recommendations(map_path: &Path, details: &MapValidationDetails) -> Vec<String> {
    let validation = &details.validation;
    let name = info_text(details, "name");
    let mut lines = Vec::new();

    if !validation.errors.is_empty() {
        lines.push("- Resolve validation errors listed above".to_string());
    }
    if !validation.errors_non_fatal.is_empty() {
        lines.push(
            "- Resolve non-fatal validation errors listed above, if at all possible".to_string(),
        );
    }
    if details.players_count_mismatch {
        lines.push(format!(
            "- Map players ({}) does not match expected number",
            info_text(details, "players")
        ));
        lines.push("  - Are you uploading this map to the wrong map repo?".to_string());
    }
    if details.needs_format_conversion() {
        lines.push("- Convert the map to the latest format using [maptools-cli](https://github.com/Warzone2100/maptools-cli/releases/latest):".to_string());
        lines.push("  ```".to_string());
        lines.push(conversion_command(map_path));
        lines.push("  ```".to_string());
    }
    if details.name_conflict {
        lines.push(format!(
            "- Rename the map (conflicts with a map that already has the name \"{}\")",
            name
        ));
        lines.push(format!(
            "  - If this is a new version, you can append a version (ex. \"{}-v2\")",
            name
        ));
        lines.push(format!(
            "  - If this is a map made (or modified) by a different creator, you can prepend/append the additional author's name: (ex. \"Author-{}\")",
            name
        ));
    }
    if details.folder_name_mismatch {
        lines.push("- Ensure the map folder matches the map name".to_string());
        lines.push(format!(
            "  - i.e. A map named \"{0}\" should be in the repo at a path of `maps/{0}`",
            name
        ));
    }
    lines
}

/// Print the report for one map.
pub fn print_map_validation_details(
    out: &dyn Output,
    map_path: &Path,
    details: &MapValidationDetails,
) {
    let passed = details.passed_validation();
    let validation = &details.validation;
    let symbol = status_symbol(passed);

    match details.map_name() {
        Some(name) => out.println(&format!("## {} Map: {}", symbol, name)),
        None => out.println(&format!(
            "## {} Map: {} (missing `name` property)",
            symbol,
            file_name(map_path)
        )),
    }
    out.println(&format!("- `{}`", file_name(map_path)));
    match details.author_name() {
        Some(author) => out.println(&format!("- Author: `{}`", author)),
        None => out.println("- Author: (missing `author` property)"),
    }
    out.newline();

    let statuses: Vec<String> = details
        .status_list()
        .iter()
        .map(|s| format!("`{}`", s))
        .collect();
    out.println(&format!("### Status: {}", statuses.join(", ")));
    if passed && !validation.errors_non_fatal.is_empty() {
        out.println(&format!(
            "{} Non-Fatal Errors detected - please resolve if possible!",
            WARNING_SYMBOL
        ));
    }
    out.newline();

    let errors: Vec<String> = validation
        .errors
        .iter()
        .map(|e| format!("{} {}", FAIL_SYMBOL, e))
        .collect();
    print_code_block(out, "Errors", &errors);

    let non_fatal: Vec<String> = validation
        .errors_non_fatal
        .iter()
        .map(|e| format!("{} {}", WARNING_SYMBOL, e))
        .collect();
    print_code_block(out, "Non-Fatal Errors", &non_fatal);

    print_code_block(out, "Warnings", &validation.warnings);

    let recommendations = recommendations(map_path, details);
    if !recommendations.is_empty() {
        out.println("### Recommendations:");
        for line in &recommendations {
            out.println(line);
        }
        out.newline();
    }

    out.println("<details>");
    out.newline();
    out.println("<summary>Map Info JSON:</summary>");
    out.newline();
    out.println("```json");
    let json = wzmapdb::json::to_string_indent2(&details.info)
        .unwrap_or_else(|_| details.info.to_string());
    out.println(&json);
    out.println("```");
    out.newline();
    out.println("</details>");
}

/// Results of validating a list of maps, in list order.
#[derive(Debug, Default)]
pub struct MapListResults {
    pub validated: Vec<(PathBuf, MapValidationDetails)>,
    /// Maps the inspector could not process, with the reason.
    pub unprocessable: Vec<(PathBuf, String)>,
}

impl MapListResults {
    /// Every map validated, none failed and none was unprocessable.
    pub fn overall_pass(&self) -> bool {
        !self.validated.is_empty()
            && self.unprocessable.is_empty()
            && self.validated.iter().all(|(_, d)| d.passed_validation())
    }
}

/// Print the summary and the per-map reports, failing maps first.
pub fn print_multi_map_validation_details(out: &dyn Output, results: &MapListResults) {
    let passed = results.overall_pass();
    out.println(&format!(
        "# {} Overall Validation: {}",
        status_symbol(passed),
        if passed { "PASS" } else { "FAILED" }
    ));

    let (passing, failing): (Vec<_>, Vec<_>) = results
        .validated
        .iter()
        .partition(|(_, d)| d.passed_validation());

    if !results.unprocessable.is_empty() {
        out.newline();
        out.println("## Unprocessable / Invalid Maps:");
        for (path, _) in &results.unprocessable {
            out.println(&format!("- `{}`", file_name(path)));
        }
    }

    if !passing.is_empty() {
        out.newline();
        out.println("## Passing Maps:");
        for (path, _) in &passing {
            out.println(&format!("- `{}`", file_name(path)));
        }
    }

    if !failing.is_empty() {
        out.newline();
        out.println("## Failing Maps:");
        for (path, _) in &failing {
            out.println(&format!("- `{}`", file_name(path)));
        }
    }

    for (path, details) in failing.iter().chain(passing.iter()) {
        out.newline();
        out.println("---");
        out.newline();
        print_map_validation_details(out, path, details);
    }
}
