//! Default implementations that step aside for real ones.
//!
//! A table marked `fallback_for` a trait, or a function marked
//! `fallback_for` a contract, only exists while nothing else implements it.

use pgcompose_schema::Module;
use tracing::debug;

/// Remove fallbacks that have a non-fallback implementer in the module.
pub fn resolve_fallbacks(module: &Module) -> Module {
    let tables = module
        .tables
        .iter()
        .filter(|table| {
            let Some(trait_name) = &table.fallback_for else {
                return true;
            };
            let replaced = module
                .tables
                .iter()
                .any(|other| other.fallback_for.is_none() && other.implementation(trait_name).is_some());
            if replaced {
                debug!(table = %table.name, %trait_name, "fallback table elided");
            }
            !replaced
        })
        .cloned()
        .collect();

    let functions = module
        .functions
        .iter()
        .filter(|function| {
            let Some(contract) = &function.fallback_for else {
                return true;
            };
            let replaced = module
                .functions
                .iter()
                .any(|other| other.fallback_for.is_none() && other.implements.contains(contract));
            if replaced {
                debug!(function = %function.name, %contract, "fallback function elided");
            }
            !replaced
        })
        .cloned()
        .collect();

    Module {
        tables,
        functions,
        ..module.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcompose_schema::{Function, Table, TraitImplementation};

    fn implementer(name: &str, fallback: bool) -> Table {
        Table {
            implements: vec![TraitImplementation::new("owner")],
            fallback_for: fallback.then(|| "owner".to_string()),
            ..Table::new(name)
        }
    }

    fn names(module: &Module) -> Vec<&str> {
        module.tables.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_fallback_table_kept_alone() {
        let module = Module {
            tables: vec![implementer("default_owner", true), Table::new("pets")],
            ..Default::default()
        };
        assert_eq!(names(&resolve_fallbacks(&module)), ["default_owner", "pets"]);
    }

    #[test]
    fn test_fallback_table_elided() {
        let module = Module {
            tables: vec![implementer("default_owner", true), implementer("people", false)],
            ..Default::default()
        };
        assert_eq!(names(&resolve_fallbacks(&module)), ["people"]);
    }

    #[test]
    fn test_two_fallbacks_do_not_elide_each_other() {
        let module = Module {
            tables: vec![implementer("a", true), implementer("b", true)],
            ..Default::default()
        };
        assert_eq!(names(&resolve_fallbacks(&module)), ["a", "b"]);
    }

    #[test]
    fn test_fallback_function_elided() {
        let fallback = Function {
            name: "default_greeting".to_string(),
            fallback_for: Some("greeting".to_string()),
            implements: vec!["greeting".to_string()],
            ..Default::default()
        };
        let real = Function {
            name: "greeting".to_string(),
            implements: vec!["greeting".to_string()],
            ..Default::default()
        };
        let module = Module {
            functions: vec![fallback.clone()],
            ..Default::default()
        };
        assert_eq!(resolve_fallbacks(&module).functions, vec![fallback.clone()]);

        let module = Module {
            functions: vec![fallback, real.clone()],
            ..Default::default()
        };
        assert_eq!(resolve_fallbacks(&module).functions, vec![real]);
    }
}
