//! SPDX license expression checks.
//!
//! A map license must parse as an SPDX expression and be logically
//! equivalent to one of the approved expressions. Equivalence is decided by
//! evaluating both expressions over every assignment of the license
//! requirements they mention, so `GPL-2.0-or-later OR CC-BY-3.0` matches
//! `CC-BY-3.0 OR GPL-2.0-or-later`.
//!
//! License ids and operators are matched without regard to case, and the
//! deprecated GNU forms are accepted: `GPL-2.0+` is `GPL-2.0-or-later`, and
//! `GPL-2.0` is `GPL-2.0-only`.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use spdx::identifiers::{EXCEPTIONS, LICENSES};
use spdx::{Expression, LicenseItem, LicenseReq, ParseMode};

/// License expressions a map may be published under.
pub const APPROVED_LICENSES: [&str; 6] = [
    "CC0-1.0",
    "GPL-2.0-or-later",
    "CC-BY-3.0 OR GPL-2.0-or-later",
    "CC-BY-SA-3.0 OR GPL-2.0-or-later",
    "CC-BY-4.0 OR GPL-2.0-or-later",
    "CC-BY-SA-4.0 OR GPL-2.0-or-later",
];

/// Above this many distinct requirements the truth table is not enumerated.
const MAX_EQUIVALENCE_TERMS: usize = 16;

/// Outcome of checking a license expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseCheck {
    /// Equivalent to an approved expression.
    Approved,
    /// Valid SPDX, but not equivalent to any approved expression.
    NotApproved,
    /// Not a valid SPDX expression.
    Invalid(String),
}

/// Standard SPDX syntax, plus `+` after GNU license ids.
const PARSE_MODE: ParseMode = ParseMode {
    allow_lower_case_operators: false,
    allow_slash_as_or_operator: false,
    allow_imprecise_license_names: false,
    allow_postfix_plus_on_gpl: true,
};

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z0-9.:\-]+").unwrap())
}

/// The listed spelling of an operator, license id or exception id.
fn canonical_term(term: &str) -> &str {
    if let Some(op) = ["AND", "OR", "WITH"]
        .into_iter()
        .find(|op| op.eq_ignore_ascii_case(term))
    {
        return op;
    }
    LICENSES
        .iter()
        .map(|(name, _, _)| *name)
        .chain(EXCEPTIONS.iter().map(|(name, _)| *name))
        .find(|name| name.eq_ignore_ascii_case(term))
        .unwrap_or(term)
}

fn canonical_case(text: &str) -> String {
    term_pattern()
        .replace_all(text, |caps: &Captures| canonical_term(&caps[0]).to_string())
        .into_owned()
}

/// Parse `text` as an SPDX expression.
pub fn parse_license(text: &str) -> Result<Expression, String> {
    Expression::parse_mode(&canonical_case(text), PARSE_MODE).map_err(|e| e.to_string())
}

/// Comparison key of one requirement, folding the GNU spellings together.
fn requirement_key(req: &LicenseReq) -> String {
    let license = match &req.license {
        LicenseItem::Spdx { id, or_later } => {
            let name = id.name;
            let (base, later) = if let Some(base) = name.strip_suffix("-or-later") {
                (base, true)
            } else if let Some(base) = name.strip_suffix("-only") {
                (base, *or_later)
            } else {
                (name, *or_later)
            };
            if later {
                format!("{}-or-later", base)
            } else {
                base.to_string()
            }
        }
        other => other.to_string(),
    };
    match &req.exception {
        Some(exception) => format!("{} WITH {}", license, exception.name),
        None => license,
    }
}

fn requirement_keys(expr: &Expression) -> BTreeSet<String> {
    expr.requirements().map(|r| requirement_key(&r.req)).collect()
}

/// Whether two expressions accept exactly the same sets of licenses.
pub fn is_equivalent(a: &Expression, b: &Expression) -> bool {
    let terms: Vec<String> = requirement_keys(a)
        .union(&requirement_keys(b))
        .cloned()
        .collect();
    if terms.len() > MAX_EQUIVALENCE_TERMS {
        return false;
    }

    (0u32..(1u32 << terms.len())).all(|mask| {
        let allowed = |req: &LicenseReq| {
            let key = requirement_key(req);
            terms
                .iter()
                .position(|t| *t == key)
                .map(|i| mask & (1 << i) != 0)
                .unwrap_or(false)
        };
        a.evaluate(allowed) == b.evaluate(allowed)
    })
}

/// Check a license expression against the approved list.
pub fn check_license(text: &str) -> LicenseCheck {
    let parsed = match parse_license(text) {
        Ok(expr) => expr,
        Err(e) => return LicenseCheck::Invalid(e),
    };

    let approved = APPROVED_LICENSES
        .iter()
        .filter_map(|l| parse_license(l).ok())
        .any(|expected| is_equivalent(&parsed, &expected));

    if approved {
        LicenseCheck::Approved
    } else {
        LicenseCheck::NotApproved
    }
}

/// The approved list formatted for messages: `"a", "b", ...`.
pub fn approved_list_display() -> String {
    APPROVED_LICENSES
        .iter()
        .map(|l| format!("\"{}\"", l))
        .collect::<Vec<_>>()
        .join(", ")
}
