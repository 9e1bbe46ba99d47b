use pgcompose_schema::CheckConstraint;

use crate::Operation;
use crate::identity::{Pair, is_rename};

/// Check expressions are re-rendered by Postgres, so they are not compared.
pub(super) fn reconcile_check(table: &str, pair: Pair<'_, CheckConstraint>) -> Vec<Operation> {
    match pair {
        Pair::Create(desired) => vec![Operation::CreateCheck {
            table: table.to_string(),
            check: desired.clone(),
        }],
        Pair::Alter(desired, current) if is_rename(desired, current) => {
            vec![Operation::RenameCheck {
                table: table.to_string(),
                from: current.name.clone(),
                check: desired.clone(),
            }]
        }
        Pair::Alter(..) => vec![],
        Pair::Drop(current) => vec![Operation::DropCheck {
            table: table.to_string(),
            check: current.clone(),
        }],
    }
}
