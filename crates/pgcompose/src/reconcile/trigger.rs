use pgcompose_schema::Trigger;
use pgcompose_sql::{normalize_expression, normalize_whitespace};

use crate::Operation;
use crate::identity::{Pair, is_rename};

/// Reconcile one trigger of a table that is called `table` after this pass
/// and `from_table` before it.
pub(super) fn reconcile_trigger(
    table: &str,
    from_table: &str,
    pair: Pair<'_, Trigger>,
) -> Vec<Operation> {
    let create = |trigger: &Trigger| Operation::CreateTrigger {
        table: table.to_string(),
        trigger: trigger.clone(),
    };
    let drop = |trigger: &Trigger| Operation::DropTrigger {
        table: table.to_string(),
        from_table: from_table.to_string(),
        trigger: trigger.clone(),
    };

    let (desired, current) = match pair {
        Pair::Create(desired) => return vec![create(desired)],
        Pair::Drop(current) => return vec![drop(current)],
        Pair::Alter(desired, current) => (desired, current),
    };

    if definition_changed(desired, current) {
        return vec![drop(current), create(desired)];
    }

    let mut ops = Vec::new();

    if is_rename(desired, current) || table != from_table {
        ops.push(Operation::RenameTrigger {
            from_table: from_table.to_string(),
            from: current.clone(),
            table: table.to_string(),
            trigger: desired.clone(),
        });
    }

    if desired.order != current.order {
        ops.push(Operation::ReorderTrigger {
            table: table.to_string(),
            trigger: Trigger {
                previous_order: Some(current.order),
                ..desired.clone()
            },
        });
    }

    ops
}

fn definition_changed(desired: &Trigger, current: &Trigger) -> bool {
    normalize_whitespace(&desired.body) != normalize_whitespace(&current.body)
        || desired.language != current.language
        || desired.for_each != current.for_each
        || desired.timing != current.timing
        || desired.when.as_deref().map(normalize_expression)
            != current.when.as_deref().map(normalize_expression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcompose_schema::TriggerTiming;

    fn trigger(name: &str, order: u32) -> Trigger {
        Trigger {
            name: name.to_string(),
            order,
            body: "begin\n  new.full_name := new.first_name || ' ' || new.last_name;\n  return new;\nend;"
                .to_string(),
            timing: TriggerTiming::BeforeInsert,
            ..Default::default()
        }
    }

    fn describe(ops: &[Operation]) -> Vec<String> {
        ops.iter().map(|op| op.to_string()).collect()
    }

    #[test]
    fn test_whitespace_only_body_change_is_ignored() {
        let desired = trigger("make_full_name", 1);
        let current = Trigger {
            body: " begin new.full_name := new.first_name || ' ' || new.last_name; return new; end; "
                .to_string(),
            ..desired.clone()
        };
        assert!(reconcile_trigger("people", "people", Pair::Alter(&desired, &current)).is_empty());
    }

    #[test]
    fn test_reorder_only() {
        let desired = trigger("make_full_name", 2);
        let current = trigger("make_full_name", 1);
        let ops = reconcile_trigger("people", "people", Pair::Alter(&desired, &current));
        assert_eq!(describe(&ops), ["reorder_trigger people.make_full_name 1 -> 2"]);
    }

    #[test]
    fn test_body_change_recreates() {
        let desired = Trigger {
            body: "begin return new; end;".to_string(),
            ..trigger("make_full_name", 2)
        };
        let current = trigger("make_full_name", 1);
        let ops = reconcile_trigger("people", "people", Pair::Alter(&desired, &current));
        assert_eq!(
            describe(&ops),
            [
                "drop_trigger people.make_full_name",
                "create_trigger people.make_full_name"
            ]
        );
    }

    #[test]
    fn test_timing_and_when_changes_recreate() {
        let current = trigger("make_full_name", 1);
        let desired = Trigger {
            timing: TriggerTiming::BeforeUpdate,
            ..current.clone()
        };
        let ops = reconcile_trigger("people", "people", Pair::Alter(&desired, &current));
        assert_eq!(ops.len(), 2);

        let desired = Trigger {
            when: Some("NEW.first_name IS NOT NULL".to_string()),
            ..current.clone()
        };
        let introspected = Trigger {
            when: Some("(new.first_name IS NOT NULL)".to_string()),
            ..current.clone()
        };
        assert_eq!(
            reconcile_trigger("people", "people", Pair::Alter(&desired, &current)).len(),
            2
        );
        assert!(
            reconcile_trigger("people", "people", Pair::Alter(&desired, &introspected)).is_empty()
        );
    }

    #[test]
    fn test_when_with_multi_word_casts_is_unchanged() {
        let current = trigger("make_full_name", 1);
        let desired = Trigger {
            when: Some("NEW.amount > 1.5 AND NEW.at < '2024-01-01'".to_string()),
            ..current.clone()
        };
        let introspected = Trigger {
            when: Some(
                "((new.amount > 1.5::double precision) AND (new.at < '2024-01-01'::timestamp with time zone))"
                    .to_string(),
            ),
            ..current.clone()
        };
        assert!(
            reconcile_trigger("people", "people", Pair::Alter(&desired, &introspected)).is_empty()
        );
    }

    #[test]
    fn test_rename_and_table_rename() {
        let desired = Trigger {
            previous_name: Some("set_name".to_string()),
            ..trigger("make_full_name", 1)
        };
        let current = trigger("set_name", 1);
        let ops = reconcile_trigger("people", "people", Pair::Alter(&desired, &current));
        assert_eq!(
            describe(&ops),
            ["rename_trigger people.set_name -> people.make_full_name"]
        );

        let same = trigger("make_full_name", 1);
        let ops = reconcile_trigger("people", "persons", Pair::Alter(&same, &same));
        assert_eq!(
            describe(&ops),
            ["rename_trigger persons.make_full_name -> people.make_full_name"]
        );
    }

    #[test]
    fn test_drop_remembers_old_table() {
        let current = trigger("make_full_name", 1);
        let ops = reconcile_trigger("people", "persons", Pair::Drop(&current));
        let Operation::DropTrigger { from_table, .. } = &ops[0] else {
            panic!("expected drop_trigger");
        };
        assert_eq!(from_table, "persons");
    }
}
