use pgcompose_schema::Index;
use pgcompose_sql::cordoned_index_name;

use crate::Operation;
use crate::identity::{Pair, is_rename};

/// Indexes are never altered in place. A change in uniqueness, or losing the
/// primary key, moves the current index aside under its cordoned name, builds
/// the desired one, then drops the cordoned one.
pub(super) fn reconcile_index(table: &str, pair: Pair<'_, Index>) -> Vec<Operation> {
    let op = |build: fn(String, Index) -> Operation, index: &Index| {
        build(table.to_string(), index.clone())
    };

    let (desired, current) = match pair {
        Pair::Create(desired) => {
            let mut ops = vec![op(create_index, desired)];
            if desired.primary_key {
                ops.push(op(make_primary_key, desired));
            }
            return ops;
        }
        Pair::Drop(current) => {
            return vec![if current.primary_key {
                op(drop_primary_key, current)
            } else {
                op(drop_index, current)
            }];
        }
        Pair::Alter(desired, current) => (desired, current),
    };

    let mut ops = Vec::new();

    if is_rename(desired, current) {
        ops.push(Operation::RenameIndex {
            table: table.to_string(),
            from: current.name.clone(),
            index: desired.clone(),
        });
    }

    let loses_primary_key = current.primary_key && !desired.primary_key;
    let toggles_unique = desired.unique != current.unique;

    if loses_primary_key || toggles_unique {
        let cordoned = Index {
            name: cordoned_index_name(&desired.name),
            ..current.clone()
        };
        ops.push(Operation::RenameIndex {
            table: table.to_string(),
            from: desired.name.clone(),
            index: cordoned.clone(),
        });
        ops.push(op(create_index, desired));
        if loses_primary_key {
            // Renaming the index renamed its constraint too.
            let constraint = Index {
                primary_key_constraint_name: Some(cordoned.name.clone()),
                ..cordoned
            };
            ops.push(op(drop_primary_key, &constraint));
        } else {
            ops.push(op(drop_index, &cordoned));
        }
        if desired.primary_key {
            ops.push(op(make_primary_key, desired));
        }
    } else if desired.primary_key && !current.primary_key {
        ops.push(op(make_primary_key, desired));
    }

    ops
}

fn create_index(table: String, index: Index) -> Operation {
    Operation::CreateIndex { table, index }
}

fn drop_index(table: String, index: Index) -> Operation {
    Operation::DropIndex { table, index }
}

fn make_primary_key(table: String, index: Index) -> Operation {
    Operation::MakeIndexPrimaryKey { table, index }
}

fn drop_primary_key(table: String, index: Index) -> Operation {
    Operation::DropPrimaryKey { table, index }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcompose_schema::IndexColumn;

    fn index(name: &str, unique: bool, primary_key: bool) -> Index {
        Index {
            name: name.to_string(),
            on: vec![IndexColumn::new("email")],
            unique,
            primary_key,
            ..Default::default()
        }
    }

    fn describe(ops: &[Operation]) -> Vec<String> {
        ops.iter().map(|op| op.to_string()).collect()
    }

    #[test]
    fn test_unchanged_index() {
        let desired = index("people_email_idx", true, false);
        let ops = reconcile_index("people", Pair::Alter(&desired, &desired.clone()));
        assert!(ops.is_empty());
    }

    #[test]
    fn test_uniqueness_toggle_cordons() {
        let desired = index("people_email_idx", true, false);
        let current = index("people_email_idx", false, false);
        let ops = reconcile_index("people", Pair::Alter(&desired, &current));
        assert_eq!(
            describe(&ops),
            [
                "rename_index people.people_email_idx -> people_email_idx_cordoned",
                "create_index people.people_email_idx",
                "drop_index people.people_email_idx_cordoned",
            ]
        );
    }

    #[test]
    fn test_rename_uses_previous_name() {
        let desired = Index {
            previous_name: Some("email_idx".to_string()),
            ..index("people_email_idx", false, false)
        };
        let current = index("email_idx", false, false);
        let ops = reconcile_index("people", Pair::Alter(&desired, &current));
        assert_eq!(
            describe(&ops),
            ["rename_index people.email_idx -> people_email_idx"]
        );
    }

    #[test]
    fn test_gaining_primary_key() {
        let desired = index("people_pkey", true, true);
        let current = index("people_pkey", true, false);
        let ops = reconcile_index("people", Pair::Alter(&desired, &current));
        assert_eq!(describe(&ops), ["make_index_primary_key people.people_pkey"]);
    }

    #[test]
    fn test_losing_primary_key() {
        let desired = index("people_pkey", true, false);
        let current = index("people_pkey", true, true);
        let ops = reconcile_index("people", Pair::Alter(&desired, &current));
        assert_eq!(
            describe(&ops),
            [
                "rename_index people.people_pkey -> people_pkey_cordoned",
                "create_index people.people_pkey",
                "drop_primary_key people.people_pkey_cordoned",
            ]
        );
        let Operation::DropPrimaryKey { index, .. } = &ops[2] else {
            panic!("expected drop_primary_key");
        };
        assert_eq!(
            index.primary_key_constraint_name.as_deref(),
            Some("people_pkey_cordoned")
        );
    }

    #[test]
    fn test_create_and_drop_primary_key() {
        let pkey = index("people_pkey", true, true);
        assert_eq!(
            describe(&reconcile_index("people", Pair::Create(&pkey))),
            [
                "create_index people.people_pkey",
                "make_index_primary_key people.people_pkey"
            ]
        );
        assert_eq!(
            describe(&reconcile_index("people", Pair::Drop(&pkey))),
            ["drop_primary_key people.people_pkey"]
        );
    }
}
