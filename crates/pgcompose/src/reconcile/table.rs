use pgcompose_schema::Table;

use super::check::reconcile_check;
use super::column::reconcile_column;
use super::foreign_key::{reconcile_foreign_key, same_foreign_key};
use super::getter::reconcile_getter;
use super::index::reconcile_index;
use super::trigger::reconcile_trigger;
use super::unique::reconcile_unique;
use crate::Operation;
use crate::identity::{Drops, Pair, by_name, reconcile_by};

/// Reconcile one table and everything it owns.
///
/// The table-level operation comes first, then columns, indexes, triggers,
/// foreign keys, checks, uniques, getters and row level security.
pub(super) fn reconcile_table(pair: Pair<'_, Table>) -> Vec<Operation> {
    let (desired, current) = match pair {
        Pair::Create(desired) => {
            let mut ops = vec![Operation::CreateTable {
                table: desired.name.clone(),
            }];
            ops.extend(reconcile_children(desired, &Table::default(), &desired.name));
            return ops;
        }
        Pair::Drop(current) => return drop_table(current),
        Pair::Alter(desired, current) => (desired, current),
    };

    let mut ops = Vec::new();
    if desired.name != current.name {
        ops.push(Operation::RenameTable {
            from: current.name.clone(),
            table: desired.name.clone(),
        });
    }
    ops.extend(reconcile_children(desired, current, &current.name));
    ops
}

fn reconcile_children(desired: &Table, current: &Table, from_table: &str) -> Vec<Operation> {
    let table = desired.name.as_str();
    let mut ops = Vec::new();

    ops.extend(reconcile_by(
        &desired.columns,
        &current.columns,
        by_name,
        |pair| reconcile_column(table, pair),
        Drops::Emit,
    ));
    ops.extend(reconcile_by(
        &desired.indexes,
        &current.indexes,
        by_name,
        |pair| reconcile_index(table, pair),
        Drops::Emit,
    ));
    ops.extend(reconcile_by(
        &desired.triggers,
        &current.triggers,
        by_name,
        |pair| reconcile_trigger(table, from_table, pair),
        Drops::Emit,
    ));
    ops.extend(reconcile_by(
        &desired.foreign_keys,
        &current.foreign_keys,
        same_foreign_key,
        |pair| reconcile_foreign_key(table, pair),
        Drops::Emit,
    ));
    ops.extend(reconcile_by(
        &desired.checks,
        &current.checks,
        by_name,
        |pair| reconcile_check(table, pair),
        Drops::Emit,
    ));
    ops.extend(reconcile_by(
        &desired.uniques,
        &current.uniques,
        by_name,
        |pair| reconcile_unique(table, pair),
        Drops::Emit,
    ));
    ops.extend(reconcile_by(
        &desired.getters,
        &current.getters,
        by_name,
        |pair| reconcile_getter(table, from_table, pair),
        Drops::Emit,
    ));

    if desired.rls_enabled() != current.rls_enabled() {
        ops.push(Operation::SetRowLevelSecurity {
            table: table.to_string(),
            enabled: desired.rls_enabled(),
        });
    }

    ops
}

/// Getters and trigger functions are not owned by the table in the catalog,
/// so they go first.
fn drop_table(current: &Table) -> Vec<Operation> {
    let table = current.name.as_str();
    let mut ops = Vec::new();
    for getter in &current.getters {
        ops.push(Operation::DropGetter {
            table: table.to_string(),
            from_table: table.to_string(),
            getter: getter.clone(),
        });
    }
    for trigger in &current.triggers {
        ops.push(Operation::DropTrigger {
            table: table.to_string(),
            from_table: table.to_string(),
            trigger: trigger.clone(),
        });
    }
    ops.push(Operation::DropTable {
        table: table.to_string(),
    });
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcompose_schema::{Column, Getter, Index, IndexColumn, Trigger};

    fn people() -> Table {
        Table {
            columns: vec![
                Column {
                    nullable: Some(false),
                    ..Column::new("id", "integer")
                },
                Column::new("name", "text"),
            ],
            indexes: vec![Index {
                name: "people_pkey".to_string(),
                on: vec![IndexColumn::new("id")],
                unique: true,
                primary_key: true,
                ..Default::default()
            }],
            triggers: vec![Trigger {
                name: "touch".to_string(),
                order: 1,
                body: "begin return new; end;".to_string(),
                ..Default::default()
            }],
            getters: vec![Getter {
                name: "label".to_string(),
                returns: "text".to_string(),
                body: "select $1.name".to_string(),
                ..Default::default()
            }],
            ..Table::new("people")
        }
    }

    fn describe(ops: &[Operation]) -> Vec<String> {
        ops.iter().map(|op| op.to_string()).collect()
    }

    #[test]
    fn test_create_table_orders_children() {
        let ops = reconcile_table(Pair::Create(&people()));
        assert_eq!(
            describe(&ops),
            [
                "create_table people",
                "create_column people.id",
                "create_column people.name",
                "create_index people.people_pkey",
                "make_index_primary_key people.people_pkey",
                "create_trigger people.touch",
                "create_getter people.label",
            ]
        );
    }

    #[test]
    fn test_unchanged_table() {
        let table = people();
        assert!(reconcile_table(Pair::Alter(&table, &table.clone())).is_empty());
    }

    #[test]
    fn test_rename_table_moves_generated_objects() {
        let current = Table {
            name: "persons".to_string(),
            ..people()
        };
        let desired = Table {
            previous_name: Some("persons".to_string()),
            ..people()
        };
        let ops = reconcile_table(Pair::Alter(&desired, &current));
        assert_eq!(
            describe(&ops),
            [
                "rename_table persons -> people",
                "rename_trigger persons.touch -> people.touch",
                "drop_getter persons.label",
                "create_getter people.label",
            ]
        );
    }

    #[test]
    fn test_drop_table_drops_functions_first() {
        let ops = reconcile_table(Pair::Drop(&people()));
        assert_eq!(
            describe(&ops),
            [
                "drop_getter people.label",
                "drop_trigger people.touch",
                "drop_table people",
            ]
        );
    }

    #[test]
    fn test_row_level_security() {
        let desired = Table {
            rls_enabled: Some(true),
            ..people()
        };
        let ops = reconcile_table(Pair::Alter(&desired, &people()));
        assert_eq!(describe(&ops), ["set_row_level_security people = true"]);

        let created = reconcile_table(Pair::Create(&desired));
        assert_eq!(
            created.last().map(|op| op.to_string()).as_deref(),
            Some("set_row_level_security people = true")
        );
    }
}
