//! Text normalization for comparing declared SQL with what Postgres reports.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::types::{is_boolean_type, is_numeric_type, is_temporal_type};

/// Walk `text` and call `visit` for each char with a flag telling whether
/// the char sits inside a single- or double-quoted run (quotes included).
fn scan_quoted(text: &str, mut visit: impl FnMut(char, bool)) {
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_single_quote {
            visit(ch, true);
            if ch == '\'' {
                // SQL escapes single quotes by doubling them: ''
                if let Some(next) = chars.next_if_eq(&'\'') {
                    visit(next, true);
                } else {
                    in_single_quote = false;
                }
            }
            continue;
        }

        if in_double_quote {
            visit(ch, true);
            if ch == '"' {
                if let Some(next) = chars.next_if_eq(&'"') {
                    visit(next, true);
                } else {
                    in_double_quote = false;
                }
            }
            continue;
        }

        match ch {
            '\'' => {
                in_single_quote = true;
                visit(ch, true);
            }
            '"' => {
                in_double_quote = true;
                visit(ch, true);
            }
            c => visit(c, false),
        }
    }
}

/// Collapse runs of whitespace outside quotes to a single space and trim.
///
/// Used for trigger and function bodies, which Postgres stores verbatim but
/// which authors reformat freely.
///
/// ```
/// use pgcompose_sql::normalize_whitespace;
/// assert_eq!(normalize_whitespace("  begin\n\t  return  new;\nend "), "begin return new; end");
/// assert_eq!(normalize_whitespace("select 'a  b'"), "select 'a  b'");
/// ```
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    scan_quoted(text, |ch, quoted| {
        if !quoted && ch.is_whitespace() {
            pending_space = true;
            return;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    });

    out
}

/// Words that continue a multi-word type name after its first word, as in
/// `double precision` or `timestamp without time zone`.
const TYPE_NAME_CONTINUATIONS: &[&str] =
    &["precision", "varying", "with", "without", "time", "zone"];

/// Normalize a SQL expression for comparison, such as a trigger `WHEN`
/// condition or a function default.
///
/// `pg_get_triggerdef` and `pg_get_expr` add parentheses, reflow the text and
/// annotate literals with casts, so everything outside quotes is lowercased
/// and stripped of parentheses, whitespace and `::type` casts.
///
/// ```
/// use pgcompose_sql::normalize_expression;
/// assert_eq!(
///     normalize_expression("((NEW.status = 'Active'::text))"),
///     normalize_expression("new.status='Active'"),
/// );
/// assert_eq!(
///     normalize_expression("(new.amount > 1.5::double precision)"),
///     normalize_expression("new.amount > 1.5"),
/// );
/// ```
pub fn normalize_expression(text: &str) -> String {
    let mut chars: Vec<(char, bool)> = Vec::with_capacity(text.len());
    scan_quoted(text, |ch, quoted| chars.push((ch, quoted)));

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let (ch, quoted) = chars[i];
        if quoted {
            out.push(ch);
            i += 1;
        } else if ch == ':' && chars.get(i + 1) == Some(&(':', false)) {
            i = skip_cast_type(&chars, i + 2);
        } else {
            if !(ch.is_whitespace() || ch == '(' || ch == ')') {
                out.extend(ch.to_lowercase());
            }
            i += 1;
        }
    }
    out
}

/// Return the index just past the type name of a cast starting at `at`: a
/// possibly qualified or quoted name, multi-word names included, with any
/// `(modifiers)` and `[]` suffixes, wherever Postgres allows them.
fn skip_cast_type(chars: &[(char, bool)], at: usize) -> usize {
    let skip_whitespace = |mut i: usize| {
        while chars.get(i).is_some_and(|&(c, q)| !q && c.is_whitespace()) {
            i += 1;
        }
        i
    };
    let word_end = |mut i: usize| {
        while chars.get(i).is_some_and(|&(c, q)| {
            q || c.is_ascii_alphanumeric() || matches!(c, '_' | '.')
        }) {
            i += 1;
        }
        i
    };

    let mut end = skip_type_suffixes(chars, word_end(skip_whitespace(at)));
    loop {
        let start = skip_whitespace(end);
        let next = word_end(start);
        let word: String = chars[start..next]
            .iter()
            .map(|&(c, _)| c.to_ascii_lowercase())
            .collect();
        if next == start || !TYPE_NAME_CONTINUATIONS.contains(&word.as_str()) {
            return end;
        }
        end = skip_type_suffixes(chars, next);
    }
}

/// Skip `(modifiers)` and `[]` directly following a type name word.
fn skip_type_suffixes(chars: &[(char, bool)], mut end: usize) -> usize {
    while let Some(('(' | '[', false)) = chars.get(end) {
        let mut depth = 0usize;
        while let Some(&(c, q)) = chars.get(end) {
            end += 1;
            if q {
                continue;
            }
            if c == '(' || c == '[' {
                depth += 1;
            } else if c == ')' || c == ']' {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
        }
    }
    end
}

/// Remove a trailing top-level `::type` coercion.
///
/// Postgres stores `'active'::text` for a declared `'active'`. Only a cast
/// outside quotes and parentheses is removed, together with anything after
/// it (so chained casts go too).
///
/// ```
/// use pgcompose_sql::strip_type_coercion;
/// assert_eq!(strip_type_coercion("'a'::character varying::text"), "'a'");
/// assert_eq!(strip_type_coercion("(x::int + 1)"), "(x::int + 1)");
/// ```
pub fn strip_type_coercion(text: &str) -> &str {
    let mut depth = 0i32;
    let mut prev_colon_at: Option<usize> = None;
    let mut cut: Option<usize> = None;
    let mut offset = 0usize;

    scan_quoted(text, |ch, quoted| {
        let at = offset;
        offset += ch.len_utf8();
        if cut.is_some() || quoted {
            prev_colon_at = None;
            return;
        }
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ':' if depth == 0 => {
                if let Some(prev) = prev_colon_at {
                    if prev + 1 == at {
                        cut = Some(prev);
                        return;
                    }
                }
                prev_colon_at = Some(at);
                return;
            }
            _ => {}
        }
        prev_colon_at = None;
    });

    match cut {
        Some(at) => text[..at].trim_end(),
        None => text,
    }
}

/// Remove one pair of surrounding single quotes and unescape `''`.
///
/// Text that is not a complete quoted literal is returned unchanged.
pub fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        let inner = &trimmed[1..trimmed.len() - 1];
        // A lone quote inside means this was two literals, e.g. 'a' || 'b'.
        if !inner.replace("''", "").contains('\'') {
            return inner.replace("''", "'");
        }
    }
    trimmed.to_string()
}

/// Normalize a default expression as reported by `pg_get_expr` or declared
/// as a function default: drop the top-level cast, then the quotes.
pub fn normalize_default_expr(expr: &str) -> String {
    unquote(strip_type_coercion(expr.trim()))
}

/// Classify an introspected default expression.
///
/// Returns the literal value when the expression is a quoted string, a
/// number, or a boolean; `None` means the expression is a function call or
/// some other computed default.
///
/// ```
/// use pgcompose_sql::literal_default_value;
/// assert_eq!(literal_default_value("'draft'::text"), Some("draft".to_string()));
/// assert_eq!(literal_default_value("(-1)"), Some("-1".to_string()));
/// assert_eq!(literal_default_value("now()"), None);
/// ```
pub fn literal_default_value(expr: &str) -> Option<String> {
    let stripped = strip_type_coercion(expr.trim());
    if stripped.starts_with('\'') {
        let value = unquote(stripped);
        if !value.starts_with('\'') {
            return Some(value);
        }
        return None;
    }
    let bare = trim_outer_parens(stripped);
    if parse_decimal(bare).is_some() {
        return Some(bare.to_string());
    }
    if bare.eq_ignore_ascii_case("true") || bare.eq_ignore_ascii_case("false") {
        return Some(bare.to_lowercase());
    }
    None
}

fn trim_outer_parens(text: &str) -> &str {
    let mut text = text.trim();
    while let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        text = inner.trim();
    }
    text
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = trim_outer_parens(text);
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
        .map(|d| d.normalize())
}

#[derive(Debug, PartialEq, Eq)]
enum Temporal {
    DateTime(jiff::civil::DateTime),
    Time(jiff::civil::Time),
}

fn parse_temporal(text: &str) -> Option<Temporal> {
    let text = text.trim();
    if let Ok(ts) = text.parse::<jiff::Timestamp>() {
        return Some(Temporal::DateTime(
            ts.to_zoned(jiff::tz::TimeZone::UTC).datetime(),
        ));
    }
    if let Ok(dt) = text.parse::<jiff::civil::DateTime>() {
        return Some(Temporal::DateTime(dt));
    }
    if let Ok(date) = text.parse::<jiff::civil::Date>() {
        return Some(Temporal::DateTime(
            date.to_datetime(jiff::civil::Time::midnight()),
        ));
    }
    if let Ok(time) = text.parse::<jiff::civil::Time>() {
        return Some(Temporal::Time(time));
    }
    None
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Check that a literal default can be read as a value of `data_type`.
///
/// Only the numeric, temporal and boolean families are checked; anything
/// else is accepted as-is.
pub fn check_literal_default(value: &str, data_type: &str) -> Result<(), String> {
    if is_numeric_type(data_type) && parse_decimal(value).is_none() {
        return Err(format!("default {value:?} is not a number"));
    }
    if is_temporal_type(data_type) && parse_temporal(value).is_none() {
        return Err(format!("default {value:?} is not a valid {data_type}"));
    }
    if is_boolean_type(data_type) && parse_bool(value).is_none() {
        return Err(format!("default {value:?} is not a boolean"));
    }
    Ok(())
}

/// Compare two literal default values for a column of `data_type`.
///
/// Numbers compare by value (`1.0` equals `1`), dates and times compare as
/// instants, booleans by truth value, and everything else compares as text.
/// When either side fails to parse the comparison falls back to text.
pub fn literal_defaults_equal(a: &str, b: &str, data_type: &str) -> bool {
    if is_numeric_type(data_type) {
        if let (Some(a), Some(b)) = (parse_decimal(a), parse_decimal(b)) {
            return a == b;
        }
    } else if is_temporal_type(data_type) {
        if let (Some(a), Some(b)) = (parse_temporal(a), parse_temporal(b)) {
            return a == b;
        }
    } else if is_boolean_type(data_type) {
        if let (Some(a), Some(b)) = (parse_bool(a), parse_bool(b)) {
            return a == b;
        }
    }
    a == b
}

/// Compare two function default expressions.
///
/// Postgres uppercases SQL-standard functions (`CURRENT_TIMESTAMP`) and
/// appends casts, so both sides are stripped and compared case-insensitively
/// outside quotes.
pub fn expression_defaults_equal(a: &str, b: &str) -> bool {
    let a = normalize_expression(&normalize_default_expr(a));
    let b = normalize_expression(&normalize_default_expr(b));
    a == b
}
