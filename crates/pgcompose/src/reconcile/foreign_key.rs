use pgcompose_schema::ForeignKey;

use crate::Operation;
use crate::identity::Pair;

/// Foreign keys are identified by what they connect, so a matched pair never
/// needs altering.
pub(super) fn same_foreign_key(desired: &ForeignKey, current: &ForeignKey) -> bool {
    fn sorted(columns: &[String]) -> Vec<&str> {
        let mut columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        columns.sort_unstable();
        columns
    }

    desired.references.table == current.references.table
        && sorted(&desired.on) == sorted(&current.on)
        && sorted(&desired.references.columns) == sorted(&current.references.columns)
}

pub(super) fn reconcile_foreign_key(table: &str, pair: Pair<'_, ForeignKey>) -> Vec<Operation> {
    match pair {
        Pair::Create(desired) => vec![Operation::CreateForeignKey {
            table: table.to_string(),
            foreign_key: desired.clone(),
        }],
        Pair::Alter(..) => vec![],
        Pair::Drop(current) => vec![Operation::DropForeignKey {
            table: table.to_string(),
            foreign_key: current.clone(),
        }],
    }
}
