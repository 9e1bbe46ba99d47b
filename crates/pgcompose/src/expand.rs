//! Trait and extension expansion.
//!
//! Traits add structure to every table that implements them, after checking
//! that the table has what the trait requires. Extensions add structure to a
//! single named table unconditionally. Functions that require a trait have
//! their body written against the implementing table.

use indexmap::IndexMap;
use pgcompose_schema::{
    Column, ColumnAlias, Function, Module, Table, TableExtensionSpec, Trait, TraitImplementation,
};
use pgcompose_sql::canonical_type;
use tracing::warn;

use crate::{Error, Result};

/// Check that `table` satisfies everything `trait_def` requires.
///
/// The table must declare the implementation. Every violation is reported.
pub fn enforce_trait(trait_def: &Trait, table: &Table) -> Result<()> {
    let Some(implementation) = table.implementation(&trait_def.name) else {
        return Err(Error::TraitNotDeclared {
            table: table.name.clone(),
            trait_name: trait_def.name.clone(),
        });
    };

    let prefix = format!(
        "Table {} does not satisfy trait {}",
        table.name, trait_def.name
    );
    let mut violations = Vec::new();

    for required in &trait_def.requires.columns {
        let alias = implementation.column_alias(&required.name);
        let expected_type = canonical_type(&required.data_type);

        match alias {
            Some(ColumnAlias::Getter { name, .. }) => {
                let Some(getter) = table.getter(name) else {
                    violations.push(format!(
                        "{prefix}: {} requires column {}, but the table has no getter {name}",
                        trait_def.name, required.name
                    ));
                    continue;
                };
                let returns = canonical_type(&getter.returns);
                if returns != expected_type {
                    violations.push(format!(
                        "{prefix}: {name} is of type {returns} and should be of type {expected_type}"
                    ));
                }
            }
            Some(ColumnAlias::Column(name)) => {
                check_column(&mut violations, &prefix, trait_def, table, required, name)
            }
            None => check_column(
                &mut violations,
                &prefix,
                trait_def,
                table,
                required,
                &required.name,
            ),
        }
    }

    for required in &trait_def.requires.getters {
        let name = implementation
            .getter_alias(&required.name)
            .unwrap_or(&required.name);
        let Some(getter) = table.getter(name) else {
            violations.push(format!(
                "{prefix}: {} requires getter {} but the table has no getter {name}",
                trait_def.name, required.name
            ));
            continue;
        };
        let returns = canonical_type(&getter.returns);
        let expected_type = canonical_type(&required.returns);
        if returns != expected_type {
            violations.push(format!(
                "{prefix}: {} should return a {expected_type} but {name} returns a {returns}",
                required.name
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::TraitViolations(violations))
    }
}

fn check_column(
    violations: &mut Vec<String>,
    prefix: &str,
    trait_def: &Trait,
    table: &Table,
    required: &Column,
    name: &str,
) {
    let Some(column) = table.column(name) else {
        violations.push(format!(
            "{prefix}: {} requires column {}, but the table has no column {name}",
            trait_def.name, required.name
        ));
        return;
    };

    let data_type = canonical_type(&column.data_type);
    let expected_type = canonical_type(&required.data_type);
    if data_type != expected_type {
        violations.push(format!(
            "{prefix}: {name} is of type {data_type} and should be of type {expected_type}"
        ));
    }
    if !required.is_nullable() && column.is_nullable() {
        violations.push(format!("{prefix}: {name} is nullable and should not be"));
    }
}

/// Replace `{{ key }}` placeholders with their values.
///
/// Whitespace inside the braces is optional. Unknown keys are left as they
/// are.
///
/// ```
/// use indexmap::IndexMap;
/// let vars: IndexMap<String, String> = [("name".to_string(), "first_name".to_string())].into();
/// assert_eq!(
///     pgcompose::expand::substitute_placeholders("new.{{ name }} := {{other}}", &vars),
///     "new.first_name := {{other}}"
/// );
/// ```
pub fn substitute_placeholders(text: &str, vars: &IndexMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + len + 2;
        let key = rest[start + 2..end - 2].trim();
        out.push_str(&rest[..start]);
        match vars.get(key) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..end]),
        }
        rest = &rest[end..];
    }

    out.push_str(rest);
    out
}

/// Placeholder values for a table implementing a trait: every required
/// column maps to the implementing name, and the trait name maps to the
/// table name.
fn trait_vars(
    trait_def: &Trait,
    table: &Table,
    implementation: &TraitImplementation,
) -> IndexMap<String, String> {
    let mut vars: IndexMap<String, String> = trait_def
        .requires
        .columns
        .iter()
        .map(|required| {
            let name = implementation
                .column_alias(&required.name)
                .map(ColumnAlias::name)
                .unwrap_or(&required.name);
            (required.name.clone(), name.to_string())
        })
        .collect();
    vars.insert(trait_def.name.clone(), table.name.clone());
    vars
}

/// Append `spec` onto `table`, substituting placeholders in trigger bodies.
pub fn extend_table(
    mut table: Table,
    spec: &TableExtensionSpec,
    vars: &IndexMap<String, String>,
) -> Table {
    table.columns.extend(spec.columns.iter().cloned());
    table.indexes.extend(spec.indexes.iter().cloned());
    table.checks.extend(spec.checks.iter().cloned());
    table.uniques.extend(spec.uniques.iter().cloned());
    table.foreign_keys.extend(spec.foreign_keys.iter().cloned());
    table.triggers.extend(spec.triggers.iter().map(|trigger| {
        let mut trigger = trigger.clone();
        trigger.body = substitute_placeholders(&trigger.body, vars);
        trigger
    }));
    table
}

/// Apply the module's extensions for this table, then every trait it
/// implements.
pub fn expand_table(module: &Module, table: &Table) -> Result<Table> {
    let mut expanded = table.clone();

    for extension in module.extensions.iter().filter(|e| e.table == table.name) {
        expanded = extend_table(expanded, &extension.spec, &IndexMap::new());
    }

    for implementation in &table.implements {
        let trait_def =
            module
                .trait_def(&implementation.trait_name)
                .ok_or_else(|| Error::UnknownTrait {
                    table: table.name.clone(),
                    trait_name: implementation.trait_name.clone(),
                })?;
        enforce_trait(trait_def, &expanded)?;
        let vars = trait_vars(trait_def, &expanded, implementation);
        expanded = extend_table(expanded, &trait_def.provides, &vars);
    }

    Ok(expanded)
}

/// Write a function's body against the table implementing the trait it
/// requires.
pub fn expand_function(module: &Module, function: &Function) -> Result<Function> {
    let Some((trait_name, ignored)) = function.requires.split_first() else {
        return Ok(function.clone());
    };
    if !ignored.is_empty() {
        warn!(
            function = %function.name,
            ignored = ?ignored,
            "only the first required trait is used"
        );
    }

    let trait_def = module
        .trait_def(trait_name)
        .ok_or_else(|| Error::UnknownRequiredTrait {
            function: function.name.clone(),
            trait_name: trait_name.clone(),
        })?;
    let (table, implementation) = module
        .tables
        .iter()
        .find_map(|t| t.implementation(trait_name).map(|i| (t, i)))
        .ok_or_else(|| Error::MissingImplementer {
            function: function.name.clone(),
            trait_name: trait_name.clone(),
        })?;

    let vars = trait_vars(trait_def, table, implementation);
    Ok(Function {
        body: substitute_placeholders(&function.body, &vars),
        ..function.clone()
    })
}

/// Expand every table and function of the module.
pub fn expand_module(module: &Module) -> Result<Module> {
    let tables = module
        .tables
        .iter()
        .map(|table| expand_table(module, table))
        .collect::<Result<Vec<_>>>()?;
    let functions = module
        .functions
        .iter()
        .map(|function| expand_function(module, function))
        .collect::<Result<Vec<_>>>()?;

    Ok(Module {
        tables,
        functions,
        ..module.clone()
    })
}
