//! Normalization utilities shared by all dialect parsers.
//!
//! Pure functions only: default-value parsing, enum value extraction,
//! length/precision/scale extraction, unsigned detection, referential-action
//! mapping and composite-constraint regrouping. Each parser composes its
//! `Table` through these so the normalization layer is testable without a
//! live catalog.

use std::collections::BTreeMap;

use crate::drivers::DriverTag;
use crate::schema::{DefaultValue, FkAction};

/// Parse a textual catalog default into a typed value.
///
/// Returns `None` for an absent default or a literal `NULL`. Catalog casts
/// (`::text` on PostgreSQL, wrapping parentheses on SQL Server, `b'…'` bit
/// prefixes) are stripped before classification; anything that is neither a
/// quoted string, a number nor a boolean is preserved verbatim as an
/// expression.
pub(crate) fn parse_default(raw: &str, driver: DriverTag) -> Option<DefaultValue> {
    let mut text = raw.trim().to_string();
    if text.is_empty() {
        return None;
    }

    if driver == DriverTag::Sqlsrv {
        while text.starts_with('(') && text.ends_with(')') && text.len() >= 2 {
            text = text[1..text.len() - 1].trim().to_string();
        }
    }

    if driver == DriverTag::Pgsql {
        if let Some(pos) = find_cast(&text) {
            text = text[..pos].trim().to_string();
        }
    }

    // Bit literals: b'101' (MySQL/SQLite)
    if let Some(inner) = text
        .strip_prefix("b'")
        .and_then(|rest| rest.strip_suffix('\''))
    {
        if let Ok(value) = i64::from_str_radix(inner, 2) {
            return Some(DefaultValue::Int(value));
        }
    }

    if text.eq_ignore_ascii_case("null") {
        return None;
    }

    if let Some(inner) = text
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Some(DefaultValue::Str(inner.replace("''", "'")));
    }

    match text.to_ascii_lowercase().as_str() {
        "true" => return Some(DefaultValue::Bool(true)),
        "false" => return Some(DefaultValue::Bool(false)),
        _ => {}
    }

    if let Ok(int) = text.parse::<i64>() {
        return Some(DefaultValue::Int(int));
    }
    if text.contains('.') {
        if let Ok(float) = text.parse::<f64>() {
            return Some(DefaultValue::Float(float));
        }
    }

    Some(DefaultValue::Expression(text))
}

/// Position of a trailing `::cast` outside any quoted section.
fn find_cast(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quotes = !in_quotes,
            b':' if !in_quotes && i + 1 < bytes.len() && bytes[i + 1] == b':' => {
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Extract the quoted value list from an enum/set native token:
/// `enum('draft','published')` yields `["draft", "published"]`.
pub(crate) fn enum_values(native: &str) -> Vec<String> {
    let Some(open) = native.find('(') else {
        return Vec::new();
    };
    let Some(close) = native.rfind(')') else {
        return Vec::new();
    };
    let body = &native[open + 1..close];

    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' if in_quotes => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push('\'');
                } else {
                    in_quotes = false;
                    values.push(std::mem::take(&mut current));
                }
            }
            '\'' => in_quotes = true,
            _ if in_quotes => current.push(ch),
            _ => {}
        }
    }
    values
}

/// Extract the declared length from a native token: `varchar(255)` -> 255.
pub(crate) fn length_of(native: &str) -> Option<u32> {
    parenthesized_numbers(native).first().copied()
}

/// Extract precision and scale: `decimal(8,2)` -> (Some(8), Some(2)).
pub(crate) fn precision_scale(native: &str) -> (Option<u32>, Option<u32>) {
    let numbers = parenthesized_numbers(native);
    (numbers.first().copied(), numbers.get(1).copied())
}

fn parenthesized_numbers(native: &str) -> Vec<u32> {
    let Some(open) = native.find('(') else {
        return Vec::new();
    };
    let Some(close) = native[open..].find(')') else {
        return Vec::new();
    };
    native[open + 1..open + close]
        .split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .collect()
}

/// Whether a native token carries the `unsigned` attribute (MySQL).
pub(crate) fn is_unsigned(native: &str) -> bool {
    native.to_ascii_lowercase().contains("unsigned")
}

/// Map a dialect referential-action code to the canonical vocabulary.
///
/// Accepts PostgreSQL single letters, SQL Server descriptive tokens and the
/// textual forms MySQL and SQLite already report. Unknown values degrade to
/// NoAction.
pub(crate) fn fk_action(raw: &str) -> FkAction {
    match raw.trim().to_ascii_lowercase().replace('_', " ").as_str() {
        "cascade" | "c" => FkAction::Cascade,
        "set null" | "n" => FkAction::SetNull,
        "set default" | "d" => FkAction::SetDefault,
        "restrict" | "r" => FkAction::Restrict,
        _ => FkAction::NoAction,
    }
}

/// Regroup one-row-per-column constraint results by constraint name,
/// reordering members by ordinal position. Group order follows first
/// appearance in the input.
pub(crate) fn group_by_constraint<T>(rows: Vec<(String, i32, T)>) -> Vec<(String, Vec<T>)> {
    let mut order: Vec<String> = Vec::new();
    let mut map: BTreeMap<String, Vec<(i32, T)>> = BTreeMap::new();
    for (key, ordinal, value) in rows {
        if !map.contains_key(&key) {
            order.push(key.clone());
        }
        map.entry(key).or_default().push((ordinal, value));
    }
    order
        .into_iter()
        .map(|key| {
            let mut members = map.remove(&key).unwrap_or_default();
            members.sort_by_key(|(ordinal, _)| *ordinal);
            (key, members.into_iter().map(|(_, value)| value).collect())
        })
        .collect()
}
