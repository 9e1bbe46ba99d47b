//! Catalog introspection.
//!
//! Reads the current state of a schema back into the same entity types the
//! module documents decode into. Only objects pgcompose knows how to manage
//! are reported: triggers whose names do not follow the generated naming
//! pattern and functions owned by extensions are left out.

use futures_util::future::try_join_all;
use pgcompose_schema::{
    CheckConstraint, Column, ColumnDefault, ForeignKey, Function, FunctionArgument, Getter,
    IncludeColumn, Index, IndexColumn, Language, Module, NullsOrder, References, Security,
    SortOrder, Table, Trigger, TriggerTiming, UniqueConstraint, Volatility,
};
use pgcompose_sql::{literal_default_value, parse_trigger_object_name};
use tokio_postgres::Row;
use tracing::{Instrument, debug, warn};

use crate::Result;
use crate::traced::{Connection, ConnectionExt};

const TABLES: &str = r#"
    SELECT tab.relname::text AS name, tab.relrowsecurity AS rls_enabled
    FROM pg_class AS tab
    JOIN pg_namespace AS ns ON ns.oid = tab.relnamespace
    WHERE ns.nspname = $1
      AND tab.relkind = 'r'
    ORDER BY tab.relname
"#;

const COLUMNS: &str = r#"
    SELECT
        col.attname::text AS name,
        format_type(col.atttypid, col.atttypmod) AS data_type,
        col.attnotnull AS not_null,
        pg_get_expr(def.adbin, def.adrelid, true) AS default_expr
    FROM pg_attribute AS col
    JOIN pg_class AS tab ON tab.oid = col.attrelid
    JOIN pg_namespace AS ns ON ns.oid = tab.relnamespace
    LEFT JOIN pg_attrdef AS def
        ON def.adrelid = col.attrelid AND def.adnum = col.attnum
    WHERE ns.nspname = $1
      AND tab.relname = $2
      AND col.attnum > 0
      AND NOT col.attisdropped
    ORDER BY col.attnum
"#;

// Indexes backing unique and exclusion constraints are reported through
// their constraints.
const INDEXES: &str = r#"
    SELECT
        idx_rel.relname::text AS name,
        idx.indisunique AS is_unique,
        idx.indisprimary AS is_primary,
        am.amname::text AS method,
        pk.conname::text AS primary_key_constraint_name,
        pg_get_expr(idx.indpred, idx.indrelid, true) AS where_clause,
        idx.indnkeyatts::int4 AS key_count,
        array_agg(a.attname::text ORDER BY k.ordinality) AS columns,
        array_agg(coalesce(o.option, 0)::int4 ORDER BY k.ordinality) AS options
    FROM pg_index AS idx
    JOIN pg_class AS tab ON tab.oid = idx.indrelid
    JOIN pg_namespace AS ns ON ns.oid = tab.relnamespace
    JOIN pg_class AS idx_rel ON idx_rel.oid = idx.indexrelid
    JOIN pg_am AS am ON am.oid = idx_rel.relam
    CROSS JOIN LATERAL unnest(idx.indkey::int2[]) WITH ORDINALITY AS k (attnum, ordinality)
    LEFT JOIN LATERAL unnest(idx.indoption::int2[]) WITH ORDINALITY AS o (option, ordinality)
        ON o.ordinality = k.ordinality
    JOIN pg_attribute AS a ON a.attrelid = tab.oid AND a.attnum = k.attnum
    LEFT JOIN pg_constraint AS pk
        ON pk.conindid = idx.indexrelid AND pk.contype = 'p'
    WHERE ns.nspname = $1
      AND tab.relname = $2
      AND NOT EXISTS (
          SELECT 1 FROM pg_constraint AS con
          WHERE con.conindid = idx.indexrelid AND con.contype IN ('u', 'x')
      )
    GROUP BY 1, 2, 3, 4, 5, 6, 7
    ORDER BY 1
"#;

const TRIGGERS: &str = r#"
    SELECT
        trig.tgname::text AS name,
        func.proname::text AS function,
        func.prosrc AS body,
        CASE
            WHEN trig.tgtype::int4 & 2 = 2 THEN 'BEFORE'
            WHEN trig.tgtype::int4 & 64 = 64 THEN 'INSTEAD OF'
            ELSE 'AFTER'
        END AS moment,
        CASE
            WHEN trig.tgtype::int4 & 4 = 4 THEN 'INSERT'
            WHEN trig.tgtype::int4 & 8 = 8 THEN 'DELETE'
            WHEN trig.tgtype::int4 & 16 = 16 THEN 'UPDATE'
            ELSE ''
        END AS event,
        trig.tgtype::int4 & 1 = 1 AS for_each_row,
        (regexp_match(
            pg_get_triggerdef(trig.oid),
            ' WHEN \((.+)\) EXECUTE (?:FUNCTION|PROCEDURE)'
        ))[1] AS when_clause
    FROM pg_trigger AS trig
    JOIN pg_class AS tab ON tab.oid = trig.tgrelid
    JOIN pg_namespace AS ns ON ns.oid = tab.relnamespace
    JOIN pg_proc AS func ON func.oid = trig.tgfoid
    JOIN pg_language AS lang ON lang.oid = func.prolang
    WHERE ns.nspname = $1
      AND tab.relname = $2
      AND NOT trig.tgisinternal
      AND lang.lanname = 'plpgsql'
    ORDER BY trig.tgname
"#;

const FOREIGN_KEYS: &str = r#"
    SELECT
        fk.conname::text AS name,
        ref.relname::text AS referenced_table,
        array_agg(src_col.attname::text ORDER BY k.ordinality) AS columns,
        array_agg(ref_col.attname::text ORDER BY k.ordinality) AS referenced_columns
    FROM pg_constraint AS fk
    JOIN pg_class AS tab ON tab.oid = fk.conrelid
    JOIN pg_namespace AS ns ON ns.oid = tab.relnamespace
    JOIN pg_class AS ref ON ref.oid = fk.confrelid
    CROSS JOIN LATERAL unnest(fk.conkey, fk.confkey) WITH ORDINALITY AS k (src, dst, ordinality)
    JOIN pg_attribute AS src_col ON src_col.attrelid = fk.conrelid AND src_col.attnum = k.src
    JOIN pg_attribute AS ref_col ON ref_col.attrelid = fk.confrelid AND ref_col.attnum = k.dst
    WHERE ns.nspname = $1
      AND tab.relname = $2
      AND fk.contype = 'f'
    GROUP BY 1, 2
    ORDER BY 1
"#;

const CHECKS: &str = r#"
    SELECT con.conname::text AS name, pg_get_expr(con.conbin, con.conrelid, true) AS expr
    FROM pg_constraint AS con
    JOIN pg_class AS tab ON tab.oid = con.conrelid
    JOIN pg_namespace AS ns ON ns.oid = tab.relnamespace
    WHERE ns.nspname = $1
      AND tab.relname = $2
      AND con.contype = 'c'
    ORDER BY 1
"#;

const UNIQUES: &str = r#"
    SELECT
        con.conname::text AS name,
        array_agg(col.attname::text ORDER BY k.ordinality) AS columns
    FROM pg_constraint AS con
    JOIN pg_class AS tab ON tab.oid = con.conrelid
    JOIN pg_namespace AS ns ON ns.oid = tab.relnamespace
    CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k (attnum, ordinality)
    JOIN pg_attribute AS col ON col.attrelid = con.conrelid AND col.attnum = k.attnum
    WHERE ns.nspname = $1
      AND tab.relname = $2
      AND con.contype = 'u'
    GROUP BY 1
    ORDER BY 1
"#;

// A getter is a one-argument stable or immutable function over the table's
// row type, named `<table>_<getter>`. FUNCTIONS excludes exactly these.
const GETTERS: &str = r#"
    SELECT
        substr(func.proname, length(tab.relname) + 2)::text AS name,
        func.prosrc AS body,
        func.provolatile::text AS volatility,
        lang.lanname::text AS language,
        format_type(func.prorettype, NULL) AS returns
    FROM pg_proc AS func
    JOIN pg_class AS tab ON tab.reltype = func.proargtypes[0]
    JOIN pg_namespace AS ns ON ns.oid = tab.relnamespace
    JOIN pg_language AS lang ON lang.oid = func.prolang
    WHERE ns.nspname = $1
      AND tab.relname = $2
      AND func.pronamespace = ns.oid
      AND func.prokind = 'f'
      AND func.pronargs = 1
      AND func.provolatile IN ('i', 's')
      AND starts_with(func.proname, tab.relname || '_')
    ORDER BY 1
"#;

const FUNCTIONS: &str = r#"
    SELECT
        func.proname::text AS name,
        func.prosrc AS body,
        func.provolatile::text AS volatility,
        func.prosecdef AS security_definer,
        lang.lanname::text AS language,
        CASE WHEN func.proretset THEN 'setof ' ELSE '' END
            || format_type(func.prorettype, NULL) AS returns,
        coalesce(
            (SELECT array_agg(coalesce(func.proargnames[a.ordinality], '') ORDER BY a.ordinality)
             FROM unnest(func.proargtypes::oid[]) WITH ORDINALITY AS a (oid, ordinality)),
            '{}'
        )::text[] AS argument_names,
        coalesce(
            (SELECT array_agg(format_type(a.oid, NULL) ORDER BY a.ordinality)
             FROM unnest(func.proargtypes::oid[]) WITH ORDINALITY AS a (oid, ordinality)),
            '{}'
        )::text[] AS argument_types
    FROM pg_proc AS func
    JOIN pg_namespace AS ns ON ns.oid = func.pronamespace
    JOIN pg_language AS lang ON lang.oid = func.prolang
    WHERE ns.nspname = $1
      AND func.prokind = 'f'
      AND func.prorettype <> 'trigger'::regtype
      AND lang.lanname IN ('sql', 'plpgsql')
      AND NOT EXISTS (
          SELECT 1 FROM pg_depend AS dep
          WHERE dep.classid = 'pg_proc'::regclass
            AND dep.objid = func.oid
            AND dep.deptype = 'e'
      )
      AND NOT EXISTS (
          SELECT 1 FROM pg_class AS tab
          WHERE tab.relnamespace = ns.oid
            AND tab.reltype = func.proargtypes[0]
            AND func.pronargs = 1
            AND func.provolatile IN ('i', 's')
            AND starts_with(func.proname, tab.relname || '_')
      )
    ORDER BY 1
"#;

fn volatility(code: &str) -> Volatility {
    match code {
        "i" => Volatility::Immutable,
        "s" => Volatility::Stable,
        _ => Volatility::Volatile,
    }
}

fn language(name: &str) -> Language {
    match name {
        "plpgsql" => Language::Plpgsql,
        _ => Language::Sql,
    }
}

/// Read every managed object in `schema`.
pub async fn introspect_module<C: Connection>(conn: &C, schema: &str) -> Result<Module> {
    let span = tracing::debug_span!("introspect", schema = %schema);
    async {
        let rows = conn.traced().query(TABLES, &[&schema]).await?;
        let tables =
            try_join_all(rows.iter().map(|row| introspect_table(conn, schema, row))).await?;
        let functions = introspect_functions(conn, schema).await?;

        debug!(
            tables = tables.len(),
            functions = functions.len(),
            "introspected"
        );
        Ok(Module {
            tables,
            functions,
            ..Default::default()
        })
    }
    .instrument(span)
    .await
}

async fn introspect_table<C: Connection>(conn: &C, schema: &str, row: &Row) -> Result<Table> {
    let name: String = row.try_get("name")?;
    let rls_enabled: bool = row.try_get("rls_enabled")?;

    let (columns, indexes, triggers, foreign_keys, checks, uniques, getters) = tokio::try_join!(
        introspect_columns(conn, schema, &name),
        introspect_indexes(conn, schema, &name),
        introspect_triggers(conn, schema, &name),
        introspect_foreign_keys(conn, schema, &name),
        introspect_checks(conn, schema, &name),
        introspect_uniques(conn, schema, &name),
        introspect_getters(conn, schema, &name),
    )?;

    Ok(Table {
        name,
        columns,
        indexes,
        triggers,
        foreign_keys,
        checks,
        uniques,
        getters,
        rls_enabled: Some(rls_enabled),
        ..Default::default()
    })
}

async fn introspect_columns<C: Connection>(
    conn: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<Column>> {
    let rows = conn.traced().query(COLUMNS, &[&schema, &table]).await?;
    rows.iter()
        .map(|row| {
            let not_null: bool = row.try_get("not_null")?;
            let default: Option<String> = row.try_get("default_expr")?;
            Ok(Column {
                name: row.try_get("name")?,
                data_type: row.try_get("data_type")?,
                previous_name: None,
                default: default.map(parse_default),
                nullable: Some(!not_null),
            })
        })
        .collect()
}

/// Quoted strings, numbers and booleans (with any cast stripped) are
/// literals; anything else is an expression.
fn parse_default(expr: String) -> ColumnDefault {
    match literal_default_value(&expr) {
        Some(value) => ColumnDefault::Literal(value),
        None => ColumnDefault::Function(expr),
    }
}

/// `indoption` bit 0 is DESC, bit 1 is NULLS FIRST. Only non-default
/// orderings are reported.
fn index_column(column: String, option: i32) -> IndexColumn {
    let desc = option & 1 == 1;
    let nulls_first = option & 2 == 2;
    IndexColumn {
        column,
        order: desc.then_some(SortOrder::Desc),
        nulls: match (desc, nulls_first) {
            (false, true) => Some(NullsOrder::First),
            (true, false) => Some(NullsOrder::Last),
            _ => None,
        },
    }
}

async fn introspect_indexes<C: Connection>(
    conn: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<Index>> {
    let rows = conn.traced().query(INDEXES, &[&schema, &table]).await?;
    rows.iter()
        .map(|row| {
            let method: String = row.try_get("method")?;
            let key_count: i32 = row.try_get("key_count")?;
            let columns: Vec<String> = row.try_get("columns")?;
            let options: Vec<i32> = row.try_get("options")?;

            let mut on = Vec::new();
            let mut include = Vec::new();
            for (position, (column, option)) in columns.into_iter().zip(options).enumerate() {
                if (position as i32) < key_count {
                    on.push(index_column(column, option));
                } else {
                    include.push(IncludeColumn { column });
                }
            }

            Ok(Index {
                name: row.try_get("name")?,
                on,
                method: (method != "btree").then_some(method),
                previous_name: None,
                where_clause: row.try_get("where_clause")?,
                unique: row.try_get("is_unique")?,
                include,
                primary_key: row.try_get("is_primary")?,
                primary_key_constraint_name: row.try_get("primary_key_constraint_name")?,
            })
        })
        .collect()
}

async fn introspect_triggers<C: Connection>(
    conn: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<Trigger>> {
    let rows = conn.traced().query(TRIGGERS, &[&schema, &table]).await?;
    let mut triggers = Vec::new();
    for row in &rows {
        let object_name: String = row.try_get("name")?;
        let Some((order, name)) = parse_trigger_object_name(&object_name, table) else {
            debug!(table, trigger = %object_name, "skipping unmanaged trigger");
            continue;
        };
        let moment: String = row.try_get("moment")?;
        let event: String = row.try_get("event")?;
        let for_each_row: bool = row.try_get("for_each_row")?;
        let Some(timing) = TriggerTiming::from_parts(&moment, &event).filter(|_| for_each_row)
        else {
            warn!(table, trigger = %object_name, %moment, %event, "unsupported trigger timing");
            continue;
        };
        triggers.push(Trigger {
            name,
            order,
            body: row.try_get("body")?,
            timing,
            function: row.try_get("function")?,
            when: row.try_get("when_clause")?,
            ..Default::default()
        });
    }
    Ok(triggers)
}

async fn introspect_foreign_keys<C: Connection>(
    conn: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<ForeignKey>> {
    let rows = conn.traced().query(FOREIGN_KEYS, &[&schema, &table]).await?;
    rows.iter()
        .map(|row| {
            Ok(ForeignKey {
                on: row.try_get("columns")?,
                references: References {
                    table: row.try_get("referenced_table")?,
                    columns: row.try_get("referenced_columns")?,
                },
                name: Some(row.try_get("name")?),
            })
        })
        .collect()
}

async fn introspect_checks<C: Connection>(
    conn: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<CheckConstraint>> {
    let rows = conn.traced().query(CHECKS, &[&schema, &table]).await?;
    rows.iter()
        .map(|row| {
            Ok(CheckConstraint {
                name: row.try_get("name")?,
                expr: row.try_get("expr")?,
                previous_name: None,
            })
        })
        .collect()
}

async fn introspect_uniques<C: Connection>(
    conn: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<UniqueConstraint>> {
    let rows = conn.traced().query(UNIQUES, &[&schema, &table]).await?;
    rows.iter()
        .map(|row| {
            Ok(UniqueConstraint {
                name: row.try_get("name")?,
                on: row.try_get("columns")?,
                previous_name: None,
            })
        })
        .collect()
}

async fn introspect_getters<C: Connection>(
    conn: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<Getter>> {
    let rows = conn.traced().query(GETTERS, &[&schema, &table]).await?;
    rows.iter()
        .map(|row| {
            let code: String = row.try_get("volatility")?;
            let lang: String = row.try_get("language")?;
            Ok(Getter {
                name: row.try_get("name")?,
                returns: row.try_get("returns")?,
                body: row.try_get("body")?,
                language: language(&lang),
                volatility: volatility(&code),
            })
        })
        .collect()
}

async fn introspect_functions<C: Connection>(conn: &C, schema: &str) -> Result<Vec<Function>> {
    let rows = conn.traced().query(FUNCTIONS, &[&schema]).await?;
    rows.iter()
        .map(|row| {
            let code: String = row.try_get("volatility")?;
            let lang: String = row.try_get("language")?;
            let security_definer: bool = row.try_get("security_definer")?;
            let body: String = row.try_get("body")?;
            let names: Vec<String> = row.try_get("argument_names")?;
            let types: Vec<String> = row.try_get("argument_types")?;

            Ok(Function {
                name: row.try_get("name")?,
                arguments: names
                    .into_iter()
                    .zip(types)
                    .map(|(name, data_type)| FunctionArgument::new(name, data_type))
                    .collect(),
                returns: row.try_get("returns")?,
                language: language(&lang),
                security: if security_definer {
                    Security::Definer
                } else {
                    Security::Invoker
                },
                volatility: volatility(&code),
                body: body.trim().to_string(),
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_column_options() {
        assert_eq!(index_column("a".into(), 0), IndexColumn::new("a"));
        assert_eq!(
            index_column("a".into(), 3),
            IndexColumn {
                column: "a".into(),
                order: Some(SortOrder::Desc),
                nulls: None,
            }
        );
        assert_eq!(
            index_column("a".into(), 2).nulls,
            Some(NullsOrder::First)
        );
        assert_eq!(index_column("a".into(), 1).nulls, Some(NullsOrder::Last));
    }

    #[test]
    fn test_parse_default() {
        assert_eq!(
            parse_default("'draft'::text".into()),
            ColumnDefault::Literal("draft".into())
        );
        assert_eq!(parse_default("0".into()), ColumnDefault::Literal("0".into()));
        assert_eq!(
            parse_default("nextval('people_id_seq'::regclass)".into()),
            ColumnDefault::Function("nextval('people_id_seq'::regclass)".into())
        );
        assert_eq!(
            parse_default("now()".into()),
            ColumnDefault::Function("now()".into())
        );
    }

    #[test]
    fn test_catalog_codes() {
        assert_eq!(volatility("i"), Volatility::Immutable);
        assert_eq!(volatility("s"), Volatility::Stable);
        assert_eq!(volatility("v"), Volatility::Volatile);
        assert_eq!(language("plpgsql"), Language::Plpgsql);
        assert_eq!(language("sql"), Language::Sql);
    }
}
