use pgcompose_schema::Getter;
use pgcompose_sql::{normalize_whitespace, routine_types_equal};

use crate::Operation;
use crate::identity::Pair;

/// Getter functions are named after their table, so a table rename rebuilds
/// them under the new name.
pub(super) fn reconcile_getter(
    table: &str,
    from_table: &str,
    pair: Pair<'_, Getter>,
) -> Vec<Operation> {
    let create = |getter: &Getter| Operation::CreateGetter {
        table: table.to_string(),
        getter: getter.clone(),
    };
    let drop = |getter: &Getter| Operation::DropGetter {
        table: table.to_string(),
        from_table: from_table.to_string(),
        getter: getter.clone(),
    };

    let (desired, current) = match pair {
        Pair::Create(desired) => return vec![create(desired)],
        Pair::Drop(current) => return vec![drop(current)],
        Pair::Alter(desired, current) => (desired, current),
    };

    if table != from_table || !routine_types_equal(&desired.returns, &current.returns) {
        return vec![drop(current), create(desired)];
    }

    if normalize_whitespace(&desired.body) != normalize_whitespace(&current.body)
        || desired.language != current.language
        || desired.volatility != current.volatility
    {
        return vec![Operation::ReplaceGetter {
            table: table.to_string(),
            getter: desired.clone(),
        }];
    }

    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcompose_schema::Volatility;

    fn label() -> Getter {
        Getter {
            name: "label".to_string(),
            returns: "text".to_string(),
            body: "select $1.first_name".to_string(),
            volatility: Volatility::Stable,
            ..Default::default()
        }
    }

    fn codes(ops: Vec<Operation>) -> Vec<&'static str> {
        ops.iter().map(Operation::code).collect()
    }

    #[test]
    fn test_unchanged_getter() {
        let introspected = Getter {
            body: "\n  select $1.first_name\n".to_string(),
            ..label()
        };
        assert!(reconcile_getter("people", "people", Pair::Alter(&label(), &introspected)).is_empty());
    }

    #[test]
    fn test_return_modifier_is_ignored() {
        let desired = Getter {
            returns: "varchar(80)".to_string(),
            ..label()
        };
        let introspected = Getter {
            returns: "character varying".to_string(),
            ..label()
        };
        assert!(reconcile_getter("people", "people", Pair::Alter(&desired, &introspected)).is_empty());
    }

    #[test]
    fn test_body_change_replaces() {
        let desired = Getter {
            body: "select $1.last_name".to_string(),
            ..label()
        };
        let ops = reconcile_getter("people", "people", Pair::Alter(&desired, &label()));
        assert_eq!(codes(ops), ["replace_getter"]);
    }

    #[test]
    fn test_return_type_change_rebuilds() {
        let desired = Getter {
            returns: "varchar".to_string(),
            ..label()
        };
        let ops = reconcile_getter("people", "people", Pair::Alter(&desired, &label()));
        assert_eq!(codes(ops), ["drop_getter", "create_getter"]);
    }

    #[test]
    fn test_table_rename_rebuilds() {
        let ops = reconcile_getter("people", "persons", Pair::Alter(&label(), &label()));
        assert_eq!(
            ops.iter().map(|op| op.to_string()).collect::<Vec<_>>(),
            ["drop_getter persons.label", "create_getter people.label"]
        );
    }
}
