use pgcompose_schema::Function;
use pgcompose_sql::routine_types_equal;

use crate::Operation;
use crate::contract::check_contracts_match;
use crate::identity::{Pair, by_name, is_rename};

/// A current function is the same function when the name matches and the
/// desired one would still satisfy the current signature.
pub(super) fn same_function(desired: &Function, current: &Function) -> bool {
    by_name(desired, current) && check_contracts_match(desired, current).is_ok()
}

pub(super) fn reconcile_function(pair: Pair<'_, Function>) -> Vec<Operation> {
    let (desired, current) = match pair {
        Pair::Create(desired) => {
            return vec![Operation::CreateFunction {
                function: desired.clone(),
            }];
        }
        Pair::Drop(current) => {
            return vec![Operation::DropFunction {
                function: current.clone(),
            }];
        }
        Pair::Alter(desired, current) => (desired, current),
    };

    if !routine_types_equal(&desired.returns, &current.returns) {
        return vec![
            Operation::DropFunction {
                function: current.clone(),
            },
            Operation::CreateFunction {
                function: desired.clone(),
            },
        ];
    }

    let mut ops = Vec::new();

    if is_rename(desired, current) {
        ops.push(Operation::RenameFunction {
            from: current.name.clone(),
            function: desired.clone(),
        });
    }

    if desired.volatility != current.volatility {
        ops.push(Operation::AlterFunctionVolatility {
            function: desired.clone(),
        });
    }

    if desired.security != current.security {
        ops.push(Operation::AlterFunctionSecurity {
            function: desired.clone(),
        });
    }

    if desired.body.trim() != current.body.trim() || desired.language != current.language {
        ops.push(Operation::ReplaceFunction {
            function: desired.clone(),
        });
    }

    ops
}
