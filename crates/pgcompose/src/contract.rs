//! Structural function signatures.
//!
//! A function satisfies a contract when its argument types and its return
//! type match the contract's, after type aliases are resolved. Argument names
//! and type modifiers do not matter.

use pgcompose_schema::{Contract, Function, FunctionArgument, Module};
use pgcompose_sql::routine_type;

use crate::{Error, Result};

/// Anything with a name, typed arguments and a return type.
pub trait Signature {
    fn name(&self) -> &str;
    fn arguments(&self) -> &[FunctionArgument];
    fn returns(&self) -> &str;
}

impl Signature for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn arguments(&self) -> &[FunctionArgument] {
        &self.arguments
    }

    fn returns(&self) -> &str {
        &self.returns
    }
}

impl Signature for Contract {
    fn name(&self) -> &str {
        &self.name
    }

    fn arguments(&self) -> &[FunctionArgument] {
        &self.arguments
    }

    fn returns(&self) -> &str {
        &self.returns
    }
}

/// Check that `function` structurally satisfies `contract`.
///
/// Returns every mismatch: the return type, the argument count, and (when
/// the counts agree) each argument whose type differs.
pub fn check_contracts_match(
    function: &impl Signature,
    contract: &impl Signature,
) -> std::result::Result<(), Vec<String>> {
    let prefix = format!(
        "{} incorrectly implements {}",
        function.name(),
        contract.name()
    );
    let mut violations = Vec::new();

    let returns = routine_type(function.returns());
    let expected_returns = routine_type(contract.returns());
    if returns != expected_returns {
        violations.push(format!(
            "{prefix}: {returns} does not match return type {expected_returns}"
        ));
    }

    let arguments = function.arguments();
    let expected_arguments = contract.arguments();
    if arguments.len() != expected_arguments.len() {
        violations.push(format!(
            "{prefix}: has {} arguments but should have {}",
            arguments.len(),
            expected_arguments.len()
        ));
    } else {
        for (argument, expected) in arguments.iter().zip(expected_arguments) {
            let data_type = routine_type(&argument.data_type);
            let expected_type = routine_type(&expected.data_type);
            if data_type != expected_type {
                violations.push(format!(
                    "{prefix}: {} is of type {data_type} but should be of type {expected_type}",
                    argument.name
                ));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Check every `implements` claim of the module's functions.
pub fn check_implementations(module: &Module) -> Result<()> {
    let mut violations = Vec::new();

    for function in &module.functions {
        for contract_name in &function.implements {
            let contract = module
                .contract(contract_name)
                .ok_or_else(|| Error::UnknownContract {
                    function: function.name.clone(),
                    contract: contract_name.clone(),
                })?;
            if let Err(errors) = check_contracts_match(function, contract) {
                violations.extend(errors);
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::ContractViolations(violations))
    }
}
