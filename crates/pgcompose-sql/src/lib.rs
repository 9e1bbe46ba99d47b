//! SQL text helpers for pgcompose.
//!
//! Quoting, the naming conventions that generated objects must follow
//! bit-exactly (introspection parses them back), the type-alias table, and
//! the normalization rules used to compare desired and introspected text.
//! [`sexp`] compiles typed s-expressions to SQL expressions.

mod normalize;
pub use normalize::*;

pub mod sexp;

mod types;
pub use types::*;

/// A PostgreSQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use pgcompose_sql::Lit;
/// assert_eq!(format!("{}", Lit("foo")), "'foo'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "'")
    }
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use pgcompose_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// A schema-qualified identifier, rendered as `"schema"."name"`.
pub struct Qualified<'a>(pub &'a str, pub &'a str);

impl std::fmt::Display for Qualified<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", Ident(self.0), Ident(self.1))
    }
}

/// A routine body wrapped in dollar quotes.
///
/// Uses `$$` unless the body contains it, then `$body$`, `$body1$`, ...
///
/// ```
/// use pgcompose_sql::DollarQuoted;
/// assert_eq!(DollarQuoted("select 1").to_string(), "$$ select 1 $$");
/// assert_eq!(DollarQuoted("select '$$'").to_string(), "$body$ select '$$' $body$");
/// ```
pub struct DollarQuoted<'a>(pub &'a str);

impl std::fmt::Display for DollarQuoted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self.0.trim();
        let mut tag = String::new();
        let mut n = 0;
        while body.contains(&format!("${tag}$")) {
            tag = if n == 0 { "body".to_string() } else { format!("body{n}") };
            n += 1;
        }
        write!(f, "${tag}$ {body} ${tag}$")
    }
}

/// Escape a string literal for SQL.
pub fn escape_string(s: &str) -> String {
    format!("{}", Lit(s))
}

/// Quote a PostgreSQL identifier.
///
/// Always quotes identifiers to avoid issues with reserved keywords like
/// `user`, `order`, `table`, `group`, etc. Doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// Name of the trigger object created for a declared trigger.
///
/// Postgres fires same-timing triggers in lexical name order, so the declared
/// order is zero-padded to three digits and placed first.
///
/// ```
/// assert_eq!(pgcompose_sql::trigger_object_name("people", 1, "set_name"), "_001_people_set_name");
/// ```
pub fn trigger_object_name(table: &str, order: u32, name: &str) -> String {
    format!("_{:03}_{}_{}", order, table, name)
}

/// Name of the plpgsql function backing a declared trigger.
///
/// ```
/// assert_eq!(pgcompose_sql::trigger_function_name("people", "set_name"), "tg__people__set_name");
/// ```
pub fn trigger_function_name(table: &str, name: &str) -> String {
    format!("tg__{}__{}", table, name)
}

/// Parse a trigger object name produced by [`trigger_object_name`].
///
/// Returns the order and the declared trigger name. Names that do not carry
/// the table prefix keep everything after the order.
pub fn parse_trigger_object_name(object_name: &str, table: &str) -> Option<(u32, String)> {
    let rest = object_name.strip_prefix('_')?;
    let (digits, rest) = rest.split_once('_')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let order = digits.parse().ok()?;
    let name = rest
        .strip_prefix(table)
        .and_then(|r| r.strip_prefix('_'))
        .unwrap_or(rest);
    Some((order, name.to_string()))
}

/// Name of the function backing a table getter.
pub fn getter_function_name(table: &str, getter: &str) -> String {
    format!("{}_{}", table, getter)
}

/// Name given to an unnamed foreign key, matching Postgres' own choice.
///
/// ```
/// assert_eq!(pgcompose_sql::foreign_key_name("pet", &["owner_id"]), "pet_owner_id_fkey");
/// ```
pub fn foreign_key_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    let columns: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    format!("{}_{}_fkey", table, columns.join("_"))
}

/// Temporary name an index is moved to while it is being rebuilt.
pub fn cordoned_index_name(name: &str) -> String {
    format!("{}_cordoned", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(format!("{}", Qualified("public", "people")), "\"public\".\"people\"");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("plain"), "'plain'");
        assert_eq!(escape_string("it's"), "'it''s'");
    }

    #[test]
    fn test_trigger_names() {
        assert_eq!(trigger_object_name("people", 12, "audit"), "_012_people_audit");
        assert_eq!(trigger_function_name("people", "audit"), "tg__people__audit");
    }

    #[test]
    fn test_parse_trigger_object_name() {
        assert_eq!(
            parse_trigger_object_name("_002_people_make_full_name", "people"),
            Some((2, "make_full_name".to_string()))
        );
        // Object still carrying the name of a table that was since renamed.
        assert_eq!(
            parse_trigger_object_name("_001_persons_audit", "people"),
            Some((1, "persons_audit".to_string()))
        );
        assert_eq!(parse_trigger_object_name("audit", "people"), None);
        assert_eq!(parse_trigger_object_name("_x1_people_audit", "people"), None);
    }

    #[test]
    fn test_cordoned_index_name() {
        assert_eq!(cordoned_index_name("people_email_idx"), "people_email_idx_cordoned");
    }

    proptest! {
        #[test]
        fn trigger_names_sort_by_order(a in 0u32..1000, b in 0u32..1000, name_a in "[a-z_]{1,12}", name_b in "[a-z_]{1,12}") {
            prop_assume!(a < b);
            let first = trigger_object_name("people", a, &name_a);
            let second = trigger_object_name("people", b, &name_b);
            prop_assert!(first < second);
        }

        #[test]
        fn trigger_names_parse_back(order in 0u32..1000, name in "[a-z][a-z0-9_]{0,20}") {
            let object = trigger_object_name("people", order, &name);
            prop_assert_eq!(parse_trigger_object_name(&object, "people"), Some((order, name)));
        }
    }
}
