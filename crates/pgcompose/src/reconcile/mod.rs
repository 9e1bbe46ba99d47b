//! Desired-vs-current diffing.
//!
//! [`reconcile_module`] takes the module as declared and the module as
//! introspected and returns the operations that turn the latter into the
//! former. Running it again after the operations were applied yields nothing.

mod check;
mod column;
mod foreign_key;
mod function;
mod getter;
mod index;
mod table;
mod trigger;
mod unique;

use pgcompose_schema::Module;
use tracing::debug;

use crate::identity::{Drops, by_name, reconcile_by};
use crate::{Operation, Result, contract, expand, fallback};

/// Which unmatched current objects are dropped. Columns, indexes and other
/// table children are always dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub drop_tables: bool,
    pub drop_functions: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            drop_tables: false,
            drop_functions: true,
        }
    }
}

fn drops(enabled: bool) -> Drops {
    if enabled { Drops::Emit } else { Drops::Suppress }
}

/// Prepare the desired module for diffing: drop replaced fallbacks, check
/// contract claims, then expand traits, extensions and required traits.
pub fn prepare_module(desired: &Module) -> Result<Module> {
    let resolved = fallback::resolve_fallbacks(desired);
    contract::check_implementations(&resolved)?;
    expand::expand_module(&resolved)
}

/// Compute the operations that turn `current` into `desired`.
///
/// Tables (with everything they own) come first, then functions.
pub fn reconcile_module(
    desired: &Module,
    current: &Module,
    options: &ReconcileOptions,
) -> Result<Vec<Operation>> {
    let span = tracing::debug_span!("reconcile");
    let _guard = span.enter();

    let desired = prepare_module(desired)?;
    let ops = diff_prepared(&desired, current, options);

    debug!(
        operations = ops.len(),
        destructive = ops.iter().filter(|op| op.is_destructive()).count(),
        "reconciled"
    );
    Ok(ops)
}

/// Diff an already prepared module against the current one.
pub fn diff_prepared(desired: &Module, current: &Module, options: &ReconcileOptions) -> Vec<Operation> {
    let mut ops = reconcile_by(
        &desired.tables,
        &current.tables,
        by_name,
        table::reconcile_table,
        drops(options.drop_tables),
    );
    ops.extend(reconcile_by(
        &desired.functions,
        &current.functions,
        function::same_function,
        function::reconcile_function,
        drops(options.drop_functions),
    ));
    ops
}
