//! Input validation for transactions typed at the command line.
//!
//! Kinds resolve in three tiers: exact match → synonym lookup → error with
//! a suggestion. Amounts are parsed as decimal text straight into minor
//! units; no floating point is involved at any step.

use chrono::{Duration, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::model::RecordKind;

/// Longest description the remote store accepts, in bytes.
pub const MAX_DESCRIPTION_BYTES: usize = 500;

// ── Valid value sets ─────────────────────────────────────────

pub static VALID_KINDS: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["income", "expense"].into_iter().collect());

pub static KIND_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("in", "income"),
        ("revenue", "income"),
        ("credit", "income"),
        ("sale", "income"),
        ("deposit", "income"),
        ("out", "expense"),
        ("cost", "expense"),
        ("debit", "expense"),
        ("spend", "expense"),
        ("payment", "expense"),
        ("withdrawal", "expense"),
    ]
    .into_iter()
    .collect()
});

/// Normalize a kind via exact match or synonym lookup.
///
/// On failure returns the original input and an optional suggestion.
pub fn normalize_kind(input: &str) -> std::result::Result<RecordKind, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    let canonical = if VALID_KINDS.contains(lower.as_str()) {
        Some(lower.as_str())
    } else {
        KIND_SYNONYMS.get(lower.as_str()).copied()
    };

    if let Some(kind) = canonical.and_then(|k| k.parse::<RecordKind>().ok()) {
        return Ok(kind);
    }

    let suggestion = find_closest_match(&lower, &VALID_KINDS, &KIND_SYNONYMS);
    Err((input.to_string(), suggestion))
}

/// [`normalize_kind`] as a crate error.
///
/// # Errors
///
/// `InvalidArgument` naming the kind and any suggestion.
pub fn parse_kind(input: &str) -> Result<RecordKind> {
    normalize_kind(input).map_err(|(raw, suggestion)| {
        let mut msg = format!("invalid kind '{raw}'");
        if let Some(s) = suggestion {
            msg.push_str(&format!(" (did you mean '{s}'?)"));
        }
        Error::InvalidArgument(msg)
    })
}

/// Parse a decimal amount into minor units (cents).
///
/// Accepts `15`, `15.5`, `15.50` and thousands separators (`1,234.56`).
/// Negative values and more than two decimals are refused; the sign of a
/// transaction is carried by its kind.
///
/// # Errors
///
/// `InvalidArgument` mentioning the amount.
pub fn parse_amount(input: &str) -> Result<i64> {
    let invalid = |why: &str| Error::InvalidArgument(format!("invalid amount '{input}': {why}"));

    let cleaned: String = input.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() {
        return Err(invalid("empty"));
    }
    if cleaned.starts_with('-') {
        return Err(invalid("must not be negative"));
    }
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a number"));
    }
    if fraction.len() > 2 {
        return Err(invalid("at most two decimals"));
    }

    let units: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("too large"))?
    };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid("not a number"))? * 10,
        _ => fraction.parse().map_err(|_| invalid("not a number"))?,
    };

    units
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(|| invalid("too large"))
}

/// Render minor units as a decimal string (`1500` → `15.00`).
#[must_use]
pub fn format_amount(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parse a calendar date: `YYYY-MM-DD`, `today` or `yesterday`.
///
/// # Errors
///
/// `InvalidArgument` for anything else.
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    match input.trim().to_lowercase().as_str() {
        "" | "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| {
            Error::InvalidArgument(format!("invalid date '{input}', expected YYYY-MM-DD"))
        }),
    }
}

/// Trim a description and check it fits the remote's limit.
///
/// # Errors
///
/// `InvalidArgument` when it is too long.
pub fn validate_description(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.len() > MAX_DESCRIPTION_BYTES {
        return Err(Error::InvalidArgument(format!(
            "description is {} bytes, the limit is {MAX_DESCRIPTION_BYTES}",
            trimmed.len()
        )));
    }
    Ok(trimmed.to_string())
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            // For synonyms, show what it maps to
            let shown = synonyms.get(v).copied().unwrap_or(v);
            best = Some((shown, dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Existing ids close to a mistyped one, nearest first.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, id)| id.to_string())
        .collect()
}
