//! Operation to SQL text.
//!
//! Every identifier is quoted and qualified with the run context's schema.
//! Operations that touch two catalog objects (a trigger and its function)
//! compile to two statements separated by a newline.

use pgcompose_schema::{Column, ColumnDefault, Function, Getter, Index, Trigger};
use pgcompose_sql::{
    DollarQuoted, Ident, Lit, Qualified, canonical_type, foreign_key_name, is_serial_type,
    quote_ident, trigger_function_name, trigger_object_name,
};

use crate::{Operation, RunContext};

fn column_list<S: AsRef<str>>(columns: impl IntoIterator<Item = S>) -> String {
    columns
        .into_iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_sql(default: &ColumnDefault) -> String {
    match default {
        ColumnDefault::Literal(value) => Lit(value).to_string(),
        ColumnDefault::Function(expr) => expr.clone(),
    }
}

/// Serial pseudo-types only exist in `CREATE`/`ADD COLUMN`.
fn altered_type(data_type: &str) -> String {
    if is_serial_type(data_type) {
        canonical_type(data_type)
    } else {
        data_type.to_string()
    }
}

fn column_definition(column: &Column) -> String {
    let mut sql = format!("{} {}", Ident(&column.name), column.data_type);
    if !column.is_nullable() {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default_sql(default));
    }
    sql
}

fn create_index(schema: &str, table: &str, index: &Index) -> String {
    let mut sql = String::from("CREATE ");
    if index.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str(&format!(
        "INDEX {} ON {}",
        Ident(&index.name),
        Qualified(schema, table)
    ));
    if let Some(method) = &index.method {
        sql.push_str(&format!(" USING {method}"));
    }
    let keys: Vec<String> = index.on.iter().map(|c| c.to_sql(quote_ident)).collect();
    sql.push_str(&format!(" ({})", keys.join(", ")));
    if !index.include.is_empty() {
        sql.push_str(&format!(
            " INCLUDE ({})",
            column_list(index.include.iter().map(|c| &c.column))
        ));
    }
    if let Some(where_clause) = &index.where_clause {
        sql.push_str(&format!(" WHERE {where_clause}"));
    }
    sql.push(';');
    sql
}

fn create_trigger(schema: &str, table: &str, trigger: &Trigger) -> String {
    let function = Qualified(schema, &trigger.function_name(table)).to_string();
    let when = match &trigger.when {
        Some(condition) => format!(" WHEN ({condition})"),
        None => String::new(),
    };
    format!(
        "CREATE OR REPLACE FUNCTION {function}() RETURNS trigger LANGUAGE plpgsql AS {};\n\
         CREATE TRIGGER {} {} {} ON {} FOR EACH ROW{when} EXECUTE FUNCTION {function}();",
        DollarQuoted(&trigger.body),
        Ident(trigger.object_name(table)),
        trigger.timing.moment(),
        trigger.timing.event(),
        Qualified(schema, table),
    )
}

fn drop_trigger(schema: &str, table: &str, from_table: &str, trigger: &Trigger) -> String {
    format!(
        "DROP TRIGGER {} ON {};\nDROP FUNCTION {}();",
        Ident(trigger.object_name(from_table)),
        Qualified(schema, table),
        Qualified(schema, &trigger.function_name(from_table)),
    )
}

fn getter_definition(schema: &str, table: &str, getter: &Getter) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {}({} {}) RETURNS {} LANGUAGE {} {} AS {};",
        Qualified(schema, &getter.function_name(table)),
        Ident(table),
        Qualified(schema, table),
        getter.returns,
        getter.language.as_str(),
        getter.volatility.as_sql(),
        DollarQuoted(&getter.body),
    )
}

/// `"schema"."name"(type, type)`, the form that identifies an overload.
fn function_signature(schema: &str, name: &str, function: &Function) -> String {
    let types: Vec<&str> = function
        .arguments
        .iter()
        .map(|a| a.data_type.as_str())
        .collect();
    format!("{}({})", Qualified(schema, name), types.join(", "))
}

fn function_definition(schema: &str, function: &Function, replace: bool) -> String {
    let arguments: Vec<String> = function
        .arguments
        .iter()
        .map(|argument| match &argument.default {
            Some(default) => format!(
                "{} {} DEFAULT {default}",
                Ident(&argument.name),
                argument.data_type
            ),
            None => format!("{} {}", Ident(&argument.name), argument.data_type),
        })
        .collect();
    format!(
        "CREATE {}FUNCTION {}({}) RETURNS {} LANGUAGE {} {} {} SET search_path = {} AS {};",
        if replace { "OR REPLACE " } else { "" },
        Qualified(schema, &function.name),
        arguments.join(", "),
        function.returns,
        function.language.as_str(),
        function.volatility.as_sql(),
        function.security.as_sql(),
        Ident(schema),
        DollarQuoted(&function.body),
    )
}

/// Compile one operation into SQL text.
pub fn to_statement(op: &Operation, context: &RunContext) -> String {
    let schema = context.schema.as_str();
    let alter_table = |table: &str| format!("ALTER TABLE {}", Qualified(schema, table));

    match op {
        Operation::CreateTable { table } => {
            format!("CREATE TABLE {} ();", Qualified(schema, table))
        }
        Operation::RenameTable { from, table } => {
            format!("{} RENAME TO {};", alter_table(from), Ident(table))
        }
        Operation::DropTable { table } => format!("DROP TABLE {};", Qualified(schema, table)),
        Operation::SetRowLevelSecurity { table, enabled } => format!(
            "{} {} ROW LEVEL SECURITY;",
            alter_table(table),
            if *enabled { "ENABLE" } else { "DISABLE" }
        ),

        Operation::CreateColumn { table, column } => format!(
            "{} ADD COLUMN {};",
            alter_table(table),
            column_definition(column)
        ),
        Operation::RenameColumn {
            table,
            from,
            column,
        } => format!(
            "{} RENAME COLUMN {} TO {};",
            alter_table(table),
            Ident(from),
            Ident(&column.name)
        ),
        Operation::SetColumnDefault { table, column } => match &column.default {
            Some(default) => format!(
                "{} ALTER COLUMN {} SET DEFAULT {};",
                alter_table(table),
                Ident(&column.name),
                default_sql(default)
            ),
            None => format!(
                "{} ALTER COLUMN {} DROP DEFAULT;",
                alter_table(table),
                Ident(&column.name)
            ),
        },
        Operation::SetColumnNullable { table, column } => format!(
            "{} ALTER COLUMN {} {} NOT NULL;",
            alter_table(table),
            Ident(&column.name),
            if column.is_nullable() { "DROP" } else { "SET" }
        ),
        Operation::SetColumnDataType { table, column } => {
            let data_type = altered_type(&column.data_type);
            format!(
                "{} ALTER COLUMN {name} TYPE {data_type} USING {name}::{data_type};",
                alter_table(table),
                name = Ident(&column.name),
            )
        }
        Operation::DropColumn { table, column } => format!(
            "{} DROP COLUMN {};",
            alter_table(table),
            Ident(&column.name)
        ),

        Operation::CreateIndex { table, index } => create_index(schema, table, index),
        Operation::RenameIndex { from, index, .. } => format!(
            "ALTER INDEX {} RENAME TO {};",
            Qualified(schema, from),
            Ident(&index.name)
        ),
        Operation::DropIndex { index, .. } => {
            format!("DROP INDEX {};", Qualified(schema, &index.name))
        }
        Operation::MakeIndexPrimaryKey { table, index } => format!(
            "{} ADD PRIMARY KEY USING INDEX {};",
            alter_table(table),
            Ident(&index.name)
        ),
        Operation::DropPrimaryKey { table, index } => format!(
            "{} DROP CONSTRAINT {};",
            alter_table(table),
            Ident(
                index
                    .primary_key_constraint_name
                    .as_deref()
                    .unwrap_or(&index.name)
            )
        ),

        Operation::CreateTrigger { table, trigger } => create_trigger(schema, table, trigger),
        Operation::RenameTrigger {
            from_table,
            from,
            table,
            trigger,
        } => format!(
            "ALTER TRIGGER {} ON {} RENAME TO {};\nALTER FUNCTION {}() RENAME TO {};",
            Ident(trigger_object_name(from_table, from.order, &from.name)),
            Qualified(schema, table),
            Ident(trigger_object_name(table, from.order, &trigger.name)),
            Qualified(schema, &trigger_function_name(from_table, &from.name)),
            Ident(trigger_function_name(table, &trigger.name)),
        ),
        Operation::ReorderTrigger { table, trigger } => format!(
            "ALTER TRIGGER {} ON {} RENAME TO {};",
            Ident(trigger_object_name(
                table,
                trigger.previous_order.unwrap_or(trigger.order),
                &trigger.name
            )),
            Qualified(schema, table),
            Ident(trigger.object_name(table)),
        ),
        Operation::DropTrigger {
            table,
            from_table,
            trigger,
        } => drop_trigger(schema, table, from_table, trigger),

        Operation::CreateForeignKey { table, foreign_key } => {
            let name = foreign_key
                .name
                .clone()
                .unwrap_or_else(|| foreign_key_name(table, foreign_key.on.as_slice()));
            format!(
                "{} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
                alter_table(table),
                Ident(name),
                column_list(&foreign_key.on),
                Qualified(schema, &foreign_key.references.table),
                column_list(&foreign_key.references.columns),
            )
        }
        Operation::DropForeignKey { table, foreign_key } => {
            let name = foreign_key
                .name
                .clone()
                .unwrap_or_else(|| foreign_key_name(table, foreign_key.on.as_slice()));
            format!("{} DROP CONSTRAINT {};", alter_table(table), Ident(name))
        }

        Operation::CreateCheck { table, check } => format!(
            "{} ADD CONSTRAINT {} CHECK ({});",
            alter_table(table),
            Ident(&check.name),
            check.expr
        ),
        Operation::RenameCheck { table, from, check } => format!(
            "{} RENAME CONSTRAINT {} TO {};",
            alter_table(table),
            Ident(from),
            Ident(&check.name)
        ),
        Operation::DropCheck { table, check } => format!(
            "{} DROP CONSTRAINT {};",
            alter_table(table),
            Ident(&check.name)
        ),

        Operation::CreateUnique { table, unique } => format!(
            "{} ADD CONSTRAINT {} UNIQUE ({});",
            alter_table(table),
            Ident(&unique.name),
            column_list(&unique.on)
        ),
        Operation::RenameUnique {
            table,
            from,
            unique,
        } => format!(
            "{} RENAME CONSTRAINT {} TO {};",
            alter_table(table),
            Ident(from),
            Ident(&unique.name)
        ),
        Operation::DropUnique { table, unique } => format!(
            "{} DROP CONSTRAINT {};",
            alter_table(table),
            Ident(&unique.name)
        ),

        Operation::CreateGetter { table, getter } | Operation::ReplaceGetter { table, getter } => {
            getter_definition(schema, table, getter)
        }
        Operation::DropGetter {
            table,
            from_table,
            getter,
        } => format!(
            "DROP FUNCTION {}({});",
            Qualified(schema, &getter.function_name(from_table)),
            // A renamed table keeps its row type, under the new name.
            Qualified(schema, table),
        ),

        Operation::CreateFunction { function } => function_definition(schema, function, false),
        Operation::ReplaceFunction { function } => function_definition(schema, function, true),
        Operation::DropFunction { function } => format!(
            "DROP FUNCTION {};",
            function_signature(schema, &function.name, function)
        ),
        Operation::RenameFunction { from, function } => format!(
            "ALTER FUNCTION {} RENAME TO {};",
            function_signature(schema, from, function),
            Ident(&function.name)
        ),
        Operation::AlterFunctionVolatility { function } => format!(
            "ALTER FUNCTION {} {};",
            function_signature(schema, &function.name, function),
            function.volatility.as_sql()
        ),
        Operation::AlterFunctionSecurity { function } => format!(
            "ALTER FUNCTION {} {};",
            function_signature(schema, &function.name, function),
            function.security.as_sql()
        ),
    }
}

/// Compile every operation, in order.
pub fn to_statements(ops: &[Operation], context: &RunContext) -> Vec<String> {
    ops.iter().map(|op| to_statement(op, context)).collect()
}
