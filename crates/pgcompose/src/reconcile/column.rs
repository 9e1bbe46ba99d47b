use pgcompose_schema::{Column, ColumnDefault};
use pgcompose_sql::{
    expression_defaults_equal, is_serial_type, literal_default_value, literal_defaults_equal,
    types_equal,
};

use crate::Operation;
use crate::identity::{Pair, is_rename};

pub(super) fn reconcile_column(table: &str, pair: Pair<'_, Column>) -> Vec<Operation> {
    let (desired, current) = match pair {
        Pair::Create(desired) => {
            return vec![Operation::CreateColumn {
                table: table.to_string(),
                column: desired.clone(),
            }];
        }
        Pair::Drop(current) => {
            return vec![Operation::DropColumn {
                table: table.to_string(),
                column: current.clone(),
            }];
        }
        Pair::Alter(desired, current) => (desired, current),
    };

    let mut ops = Vec::new();

    if is_rename(desired, current) {
        ops.push(Operation::RenameColumn {
            table: table.to_string(),
            from: current.name.clone(),
            column: desired.clone(),
        });
    }

    if !defaults_match(desired, current) {
        ops.push(Operation::SetColumnDefault {
            table: table.to_string(),
            column: desired.clone(),
        });
    }

    if desired.is_nullable() != current.is_nullable() {
        ops.push(Operation::SetColumnNullable {
            table: table.to_string(),
            column: desired.clone(),
        });
    }

    if !types_equal(&desired.data_type, &current.data_type) {
        ops.push(Operation::SetColumnDataType {
            table: table.to_string(),
            column: desired.clone(),
        });
    }

    ops
}

fn defaults_match(desired: &Column, current: &Column) -> bool {
    let data_type = desired.data_type.as_str();
    match (&desired.default, &current.default) {
        (None, None) => true,
        // serial columns own an implicit sequence default
        (None, Some(ColumnDefault::Function(expr))) => {
            is_serial_type(data_type) && expr.trim_start().starts_with("nextval(")
        }
        (Some(ColumnDefault::Literal(a)), Some(ColumnDefault::Literal(b))) => {
            literal_defaults_equal(a, b, data_type)
        }
        (Some(ColumnDefault::Function(a)), Some(ColumnDefault::Function(b))) => {
            expression_defaults_equal(a, b)
        }
        (Some(ColumnDefault::Literal(literal)), Some(ColumnDefault::Function(expr)))
        | (Some(ColumnDefault::Function(expr)), Some(ColumnDefault::Literal(literal))) => {
            literal_default_value(expr).is_some_and(|v| literal_defaults_equal(literal, &v, data_type))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alter(desired: &Column, current: &Column) -> Vec<String> {
        reconcile_column("people", Pair::Alter(desired, current))
            .iter()
            .map(|op| op.code().to_string())
            .collect()
    }

    #[test]
    fn test_unchanged_column() {
        let column = Column {
            default: Some(ColumnDefault::Literal("0".to_string())),
            ..Column::new("age", "integer")
        };
        let introspected = Column {
            nullable: Some(true),
            default: Some(ColumnDefault::Literal("0".to_string())),
            ..Column::new("age", "int4")
        };
        assert!(alter(&column, &introspected).is_empty());
    }

    #[test]
    fn test_serial_column_is_unchanged() {
        let introspected = Column {
            nullable: Some(false),
            default: Some(ColumnDefault::Function(
                "nextval('things_id_seq'::regclass)".to_string(),
            )),
            ..Column::new("id", "bigint")
        };
        assert!(alter(&Column::new("id", "bigserial"), &introspected).is_empty());
    }

    #[test]
    fn test_rename_then_alterations() {
        let desired = Column {
            previous_name: Some("name".to_string()),
            nullable: Some(false),
            ..Column::new("full_name", "varchar(200)")
        };
        let current = Column::new("name", "text");
        assert_eq!(
            alter(&desired, &current),
            ["rename_column", "set_column_nullable", "set_column_data_type"]
        );
    }

    #[test]
    fn test_default_changes() {
        let current = Column {
            default: Some(ColumnDefault::Literal("draft".to_string())),
            ..Column::new("status", "text")
        };
        let desired = Column {
            default: Some(ColumnDefault::Literal("published".to_string())),
            ..Column::new("status", "text")
        };
        assert_eq!(alter(&desired, &current), ["set_column_default"]);

        let dropped = Column::new("status", "text");
        assert_eq!(alter(&dropped, &current), ["set_column_default"]);
    }

    #[test]
    fn test_equivalent_defaults() {
        let numeric = |value: &str| Column {
            default: Some(ColumnDefault::Literal(value.to_string())),
            ..Column::new("price", "numeric")
        };
        assert!(alter(&numeric("1.50"), &numeric("1.5")).is_empty());

        let created = Column {
            default: Some(ColumnDefault::Function("now()".to_string())),
            ..Column::new("created_at", "timestamptz")
        };
        let introspected = Column {
            default: Some(ColumnDefault::Function("NOW()".to_string())),
            ..Column::new("created_at", "timestamp with time zone")
        };
        assert!(alter(&created, &introspected).is_empty());
    }

    #[test]
    fn test_serial_sequence_default_is_ignored() {
        let desired = Column {
            nullable: Some(false),
            ..Column::new("id", "serial")
        };
        let current = Column {
            nullable: Some(false),
            default: Some(ColumnDefault::Function(
                "nextval('people_id_seq'::regclass)".to_string(),
            )),
            ..Column::new("id", "int4")
        };
        assert!(alter(&desired, &current).is_empty());
    }

    #[test]
    fn test_create_and_drop() {
        let column = Column::new("age", "integer");
        let ops = reconcile_column("people", Pair::Create(&column));
        assert_eq!(ops[0].code(), "create_column");
        let ops = reconcile_column("people", Pair::Drop(&column));
        assert_eq!(ops[0].code(), "drop_column");
    }
}
