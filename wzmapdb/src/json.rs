//! JSON output formats used by the published files.
//!
//! Release and state files are indented with four spaces, the map info
//! shown in reports with two, and database files are written compact.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Serialize with four-space indentation.
pub fn to_string_indent4<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    to_string_with_indent(value, b"    ")
}

/// Serialize with two-space indentation.
pub fn to_string_indent2<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    to_string_with_indent(value, b"  ")
}

/// Serialize without any whitespace.
pub fn to_string_compact<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

fn to_string_with_indent<T: Serialize + ?Sized>(
    value: &T,
    indent: &[u8],
) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent));
    value.serialize(&mut ser)?;
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
