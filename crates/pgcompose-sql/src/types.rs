//! Canonical Postgres type names.
//!
//! Declarations use whatever spelling the author prefers (`integer`,
//! `timestamp with time zone`, `text[]`), while `pg_catalog` reports the
//! internal name (`int4`, `timestamptz`, `_text`). Everything that compares
//! types goes through [`canonical_type`].

/// Map a declared or introspected type name to its internal `pg_type` name.
///
/// Matching is case-insensitive and ignores surrounding whitespace. Array
/// types are written `T[]` or `_T`; both map to `_<canonical T>`. Unknown
/// names are returned lowercased.
///
/// ```
/// use pgcompose_sql::canonical_type;
/// assert_eq!(canonical_type("INTEGER"), "int4");
/// assert_eq!(canonical_type("text[]"), "_text");
/// assert_eq!(canonical_type("citext"), "citext");
/// ```
pub fn canonical_type(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(element) = collapsed.strip_suffix("[]") {
        return format!("_{}", canonical_type(element));
    }

    // Type modifiers: `varchar(255)`, `numeric(10, 2)`, and the precision
    // Postgres accepts mid-name, `timestamp(3) with time zone`.
    if let Some(open) = collapsed.find('(') {
        if let Some(close) = collapsed.rfind(')') {
            if open < close {
                let modifiers: String = collapsed[open + 1..close]
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let base = format!("{} {}", collapsed[..open].trim(), collapsed[close + 1..].trim());
                return format!("{}({})", canonical_type(&base), modifiers);
            }
        }
    }

    match collapsed.as_str() {
        "integer" | "int" => "int4".to_string(),
        "bigint" => "int8".to_string(),
        "smallint" => "int2".to_string(),
        "boolean" => "bool".to_string(),
        "real" => "float4".to_string(),
        "double precision" => "float8".to_string(),
        "decimal" => "numeric".to_string(),
        "character varying" => "varchar".to_string(),
        "character" => "bpchar".to_string(),
        "timestamp with time zone" => "timestamptz".to_string(),
        "timestamp without time zone" => "timestamp".to_string(),
        "time with time zone" => "timetz".to_string(),
        "time without time zone" => "time".to_string(),
        "smallserial" => "int2".to_string(),
        "serial" => "int4".to_string(),
        "bigserial" => "int8".to_string(),
        _ => collapsed,
    }
}

/// Whether two type names denote the same type.
pub fn types_equal(a: &str, b: &str) -> bool {
    canonical_type(a) == canonical_type(b)
}

/// Serial pseudo-types, whose default is an implicit `nextval(...)`.
pub fn is_serial_type(name: &str) -> bool {
    matches!(
        name.trim().to_lowercase().as_str(),
        "smallserial" | "serial" | "bigserial"
    )
}

/// The canonical name without type modifiers.
///
/// Function arguments and return types are stored without modifiers, so
/// signatures are compared this way.
///
/// ```
/// use pgcompose_sql::routine_type;
/// assert_eq!(routine_type("numeric(10, 2)"), "numeric");
/// assert_eq!(routine_type("varchar(20)[]"), "_varchar");
/// ```
pub fn routine_type(name: &str) -> String {
    let canonical = canonical_type(name);
    match canonical.split_once('(') {
        Some((base, _)) => base.to_string(),
        None => canonical,
    }
}

/// Whether two argument or return types denote the same type once
/// modifiers are dropped.
pub fn routine_types_equal(a: &str, b: &str) -> bool {
    routine_type(a) == routine_type(b)
}

/// Types whose default values are compared numerically.
pub fn is_numeric_type(name: &str) -> bool {
    matches!(
        routine_type(name).as_str(),
        "numeric" | "float4" | "float8" | "int2" | "int4" | "int8"
    )
}

/// Types whose default values are compared as points in time.
pub fn is_temporal_type(name: &str) -> bool {
    matches!(
        routine_type(name).as_str(),
        "timestamp" | "timestamptz" | "date" | "time" | "timetz"
    )
}

/// Types whose default values are compared as truth values.
pub fn is_boolean_type(name: &str) -> bool {
    routine_type(name) == "bool"
}
