use pgcompose_schema::UniqueConstraint;

use crate::Operation;
use crate::identity::{Pair, is_rename};

pub(super) fn reconcile_unique(table: &str, pair: Pair<'_, UniqueConstraint>) -> Vec<Operation> {
    let create = |unique: &UniqueConstraint| Operation::CreateUnique {
        table: table.to_string(),
        unique: unique.clone(),
    };
    let drop = |unique: &UniqueConstraint| Operation::DropUnique {
        table: table.to_string(),
        unique: unique.clone(),
    };

    match pair {
        Pair::Create(desired) => vec![create(desired)],
        Pair::Drop(current) => vec![drop(current)],
        Pair::Alter(desired, current) if desired.on != current.on => {
            vec![drop(current), create(desired)]
        }
        Pair::Alter(desired, current) if is_rename(desired, current) => {
            vec![Operation::RenameUnique {
                table: table.to_string(),
                from: current.name.clone(),
                unique: desired.clone(),
            }]
        }
        Pair::Alter(..) => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(name: &str, on: &[&str]) -> UniqueConstraint {
        UniqueConstraint {
            name: name.to_string(),
            on: on.iter().map(|c| c.to_string()).collect(),
            previous_name: None,
        }
    }

    #[test]
    fn test_column_change_rebuilds() {
        let desired = unique("people_email_key", &["email", "org_id"]);
        let current = unique("people_email_key", &["email"]);
        let ops = reconcile_unique("people", Pair::Alter(&desired, &current));
        let codes: Vec<_> = ops.iter().map(Operation::code).collect();
        assert_eq!(codes, ["drop_unique", "create_unique"]);
    }

    #[test]
    fn test_rename() {
        let desired = UniqueConstraint {
            previous_name: Some("email_key".to_string()),
            ..unique("people_email_key", &["email"])
        };
        let current = unique("email_key", &["email"]);
        let ops = reconcile_unique("people", Pair::Alter(&desired, &current));
        assert_eq!(
            ops.iter().map(|op| op.to_string()).collect::<Vec<_>>(),
            ["rename_unique people.email_key -> people_email_key"]
        );
    }
}
