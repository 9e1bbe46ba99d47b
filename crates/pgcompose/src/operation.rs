//! The instructions a reconciliation pass produces.

use std::fmt;

use pgcompose_schema::{
    CheckConstraint, Column, ForeignKey, Function, Getter, Index, Trigger, UniqueConstraint,
};

/// A single schema change.
///
/// `table` always names the table as it is called once the table-level
/// operation of the same pass has run. Operations that refer to objects whose
/// generated names embed the old table name carry `from_table` as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateTable {
        table: String,
    },
    RenameTable {
        from: String,
        table: String,
    },
    DropTable {
        table: String,
    },
    SetRowLevelSecurity {
        table: String,
        enabled: bool,
    },

    CreateColumn {
        table: String,
        column: Column,
    },
    RenameColumn {
        table: String,
        from: String,
        column: Column,
    },
    SetColumnDefault {
        table: String,
        column: Column,
    },
    SetColumnNullable {
        table: String,
        column: Column,
    },
    SetColumnDataType {
        table: String,
        column: Column,
    },
    DropColumn {
        table: String,
        column: Column,
    },

    CreateIndex {
        table: String,
        index: Index,
    },
    RenameIndex {
        table: String,
        from: String,
        index: Index,
    },
    DropIndex {
        table: String,
        index: Index,
    },
    MakeIndexPrimaryKey {
        table: String,
        index: Index,
    },
    DropPrimaryKey {
        table: String,
        index: Index,
    },

    CreateTrigger {
        table: String,
        trigger: Trigger,
    },
    /// Rename the trigger object and its function. `from` is the trigger as
    /// it currently exists under `from_table`.
    RenameTrigger {
        from_table: String,
        from: Trigger,
        table: String,
        trigger: Trigger,
    },
    /// Move a trigger to `trigger.order`; `trigger.previous_order` holds the
    /// order it currently has.
    ReorderTrigger {
        table: String,
        trigger: Trigger,
    },
    DropTrigger {
        table: String,
        from_table: String,
        trigger: Trigger,
    },

    CreateForeignKey {
        table: String,
        foreign_key: ForeignKey,
    },
    DropForeignKey {
        table: String,
        foreign_key: ForeignKey,
    },

    CreateCheck {
        table: String,
        check: CheckConstraint,
    },
    RenameCheck {
        table: String,
        from: String,
        check: CheckConstraint,
    },
    DropCheck {
        table: String,
        check: CheckConstraint,
    },

    CreateUnique {
        table: String,
        unique: UniqueConstraint,
    },
    RenameUnique {
        table: String,
        from: String,
        unique: UniqueConstraint,
    },
    DropUnique {
        table: String,
        unique: UniqueConstraint,
    },

    CreateGetter {
        table: String,
        getter: Getter,
    },
    ReplaceGetter {
        table: String,
        getter: Getter,
    },
    DropGetter {
        table: String,
        from_table: String,
        getter: Getter,
    },

    CreateFunction {
        function: Function,
    },
    ReplaceFunction {
        function: Function,
    },
    DropFunction {
        function: Function,
    },
    RenameFunction {
        from: String,
        function: Function,
    },
    AlterFunctionVolatility {
        function: Function,
    },
    AlterFunctionSecurity {
        function: Function,
    },
}

impl Operation {
    /// Stable snake_case discriminator, used in logs and runner output.
    pub fn code(&self) -> &'static str {
        match self {
            Operation::CreateTable { .. } => "create_table",
            Operation::RenameTable { .. } => "rename_table",
            Operation::DropTable { .. } => "drop_table",
            Operation::SetRowLevelSecurity { .. } => "set_row_level_security",
            Operation::CreateColumn { .. } => "create_column",
            Operation::RenameColumn { .. } => "rename_column",
            Operation::SetColumnDefault { .. } => "set_column_default",
            Operation::SetColumnNullable { .. } => "set_column_nullable",
            Operation::SetColumnDataType { .. } => "set_column_data_type",
            Operation::DropColumn { .. } => "drop_column",
            Operation::CreateIndex { .. } => "create_index",
            Operation::RenameIndex { .. } => "rename_index",
            Operation::DropIndex { .. } => "drop_index",
            Operation::MakeIndexPrimaryKey { .. } => "make_index_primary_key",
            Operation::DropPrimaryKey { .. } => "drop_primary_key",
            Operation::CreateTrigger { .. } => "create_trigger",
            Operation::RenameTrigger { .. } => "rename_trigger",
            Operation::ReorderTrigger { .. } => "reorder_trigger",
            Operation::DropTrigger { .. } => "drop_trigger",
            Operation::CreateForeignKey { .. } => "create_foreign_key",
            Operation::DropForeignKey { .. } => "drop_foreign_key",
            Operation::CreateCheck { .. } => "create_check",
            Operation::RenameCheck { .. } => "rename_check",
            Operation::DropCheck { .. } => "drop_check",
            Operation::CreateUnique { .. } => "create_unique",
            Operation::RenameUnique { .. } => "rename_unique",
            Operation::DropUnique { .. } => "drop_unique",
            Operation::CreateGetter { .. } => "create_getter",
            Operation::ReplaceGetter { .. } => "replace_getter",
            Operation::DropGetter { .. } => "drop_getter",
            Operation::CreateFunction { .. } => "create_function",
            Operation::ReplaceFunction { .. } => "replace_function",
            Operation::DropFunction { .. } => "drop_function",
            Operation::RenameFunction { .. } => "rename_function",
            Operation::AlterFunctionVolatility { .. } => "alter_function_volatility",
            Operation::AlterFunctionSecurity { .. } => "alter_function_security",
        }
    }

    /// Whether this operation removes something from the database.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Operation::DropTable { .. }
                | Operation::DropColumn { .. }
                | Operation::DropIndex { .. }
                | Operation::DropPrimaryKey { .. }
                | Operation::DropTrigger { .. }
                | Operation::DropForeignKey { .. }
                | Operation::DropCheck { .. }
                | Operation::DropUnique { .. }
                | Operation::DropGetter { .. }
                | Operation::DropFunction { .. }
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.code())?;
        match self {
            Operation::CreateTable { table } | Operation::DropTable { table } => {
                write!(f, "{table}")
            }
            Operation::RenameTable { from, table } => write!(f, "{from} -> {table}"),
            Operation::SetRowLevelSecurity { table, enabled } => {
                write!(f, "{table} = {enabled}")
            }
            Operation::CreateColumn { table, column }
            | Operation::SetColumnDefault { table, column }
            | Operation::SetColumnNullable { table, column }
            | Operation::SetColumnDataType { table, column }
            | Operation::DropColumn { table, column } => write!(f, "{table}.{}", column.name),
            Operation::RenameColumn {
                table,
                from,
                column,
            } => write!(f, "{table}.{from} -> {}", column.name),
            Operation::CreateIndex { table, index }
            | Operation::DropIndex { table, index }
            | Operation::MakeIndexPrimaryKey { table, index }
            | Operation::DropPrimaryKey { table, index } => write!(f, "{table}.{}", index.name),
            Operation::RenameIndex { table, from, index } => {
                write!(f, "{table}.{from} -> {}", index.name)
            }
            Operation::CreateTrigger { table, trigger }
            | Operation::DropTrigger { table, trigger, .. } => {
                write!(f, "{table}.{}", trigger.name)
            }
            Operation::RenameTrigger {
                from_table,
                from,
                table,
                trigger,
            } => write!(f, "{from_table}.{} -> {table}.{}", from.name, trigger.name),
            Operation::ReorderTrigger { table, trigger } => write!(
                f,
                "{table}.{} {} -> {}",
                trigger.name,
                trigger.previous_order.unwrap_or(trigger.order),
                trigger.order
            ),
            Operation::CreateForeignKey { table, foreign_key }
            | Operation::DropForeignKey { table, foreign_key } => write!(
                f,
                "{table}({}) -> {}({})",
                foreign_key.on.join(", "),
                foreign_key.references.table,
                foreign_key.references.columns.join(", ")
            ),
            Operation::CreateCheck { table, check } | Operation::DropCheck { table, check } => {
                write!(f, "{table}.{}", check.name)
            }
            Operation::RenameCheck { table, from, check } => {
                write!(f, "{table}.{from} -> {}", check.name)
            }
            Operation::CreateUnique { table, unique } | Operation::DropUnique { table, unique } => {
                write!(f, "{table}.{}", unique.name)
            }
            Operation::RenameUnique {
                table,
                from,
                unique,
            } => write!(f, "{table}.{from} -> {}", unique.name),
            Operation::CreateGetter { table, getter }
            | Operation::ReplaceGetter { table, getter } => write!(f, "{table}.{}", getter.name),
            Operation::DropGetter {
                from_table, getter, ..
            } => write!(f, "{from_table}.{}", getter.name),
            Operation::CreateFunction { function }
            | Operation::ReplaceFunction { function }
            | Operation::DropFunction { function }
            | Operation::AlterFunctionVolatility { function }
            | Operation::AlterFunctionSecurity { function } => write!(f, "{}", function.name),
            Operation::RenameFunction { from, function } => {
                write!(f, "{from} -> {}", function.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let op = Operation::RenameColumn {
            table: "people".to_string(),
            from: "name".to_string(),
            column: Column::new("full_name", "text"),
        };
        assert_eq!(op.code(), "rename_column");
        assert_eq!(op.to_string(), "rename_column people.name -> full_name");
        assert!(!op.is_destructive());

        let op = Operation::DropTable {
            table: "people".to_string(),
        };
        assert_eq!(op.to_string(), "drop_table people");
        assert!(op.is_destructive());
    }
}
