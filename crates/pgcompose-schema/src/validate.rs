//! Structural validation of declared modules.
//!
//! Runs before reconciliation and collects every violation instead of
//! stopping at the first one.

use pgcompose_sql::{check_literal_default, is_serial_type};

use crate::{
    CheckConstraint, Column, ColumnDefault, ForeignKey, Index, Module, Table, TableExtensionSpec,
    Trigger, UniqueConstraint, Volatility,
};

/// Highest trigger order that fits the three-digit object name prefix.
pub const MAX_TRIGGER_ORDER: u32 = 999;

/// A single structural problem in a module document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// Location in the document, e.g. `tables[0].columns[2].name`.
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Whether `name` is a lowercase Postgres identifier: non-empty, only
/// `[a-z0-9_]`, not starting with a digit.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => false,
        Some(first) if first.is_ascii_digit() => false,
        Some(first) => std::iter::once(first)
            .chain(chars)
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
    }
}

#[derive(Default)]
struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::new(path, message));
    }

    fn ident(&mut self, path: impl Into<String>, name: &str) {
        if !is_identifier(name) {
            self.fail(
                path,
                format!("{name:?} must be lowercase alphanumeric or underscore and not start with a digit"),
            );
        }
    }

    fn opt_ident(&mut self, path: impl Into<String>, name: Option<&str>) {
        if let Some(name) = name {
            self.ident(path, name);
        }
    }

    fn spec(&mut self, path: &str, spec: &TableExtensionSpec) {
        self.columns(path, &spec.columns);
        self.indexes(path, &spec.indexes);
        self.triggers(path, &spec.triggers);
        self.checks(path, &spec.checks);
        self.uniques(path, &spec.uniques);
        self.foreign_keys(path, &spec.foreign_keys);
    }

    fn checks(&mut self, path: &str, checks: &[CheckConstraint]) {
        for (i, check) in checks.iter().enumerate() {
            self.ident(format!("{path}.checks[{i}].name"), &check.name);
            self.opt_ident(
                format!("{path}.checks[{i}].previous_name"),
                check.previous_name.as_deref(),
            );
        }
    }

    fn uniques(&mut self, path: &str, uniques: &[UniqueConstraint]) {
        for (i, unique) in uniques.iter().enumerate() {
            let at = format!("{path}.uniques[{i}]");
            self.ident(format!("{at}.name"), &unique.name);
            self.opt_ident(format!("{at}.previous_name"), unique.previous_name.as_deref());
            if unique.on.is_empty() {
                self.fail(format!("{at}.on"), "a unique constraint needs at least one column");
            }
            for (j, col) in unique.on.iter().enumerate() {
                self.ident(format!("{at}.on[{j}]"), col);
            }
        }
    }

    fn foreign_keys(&mut self, path: &str, foreign_keys: &[ForeignKey]) {
        for (i, fk) in foreign_keys.iter().enumerate() {
            let at = format!("{path}.foreign_keys[{i}]");
            for (j, col) in fk.on.iter().enumerate() {
                self.ident(format!("{at}.on[{j}]"), col);
            }
            self.ident(format!("{at}.references.table"), &fk.references.table);
            for (j, col) in fk.references.columns.iter().enumerate() {
                self.ident(format!("{at}.references.columns[{j}]"), col);
            }
            if fk.on.len() != fk.references.columns.len() {
                self.fail(
                    at.clone(),
                    "a foreign key must reference as many columns as it is on",
                );
            }
            self.opt_ident(format!("{at}.name"), fk.name.as_deref());
        }
    }

    fn columns(&mut self, path: &str, columns: &[Column]) {
        for (i, column) in columns.iter().enumerate() {
            let at = format!("{path}.columns[{i}]");
            self.ident(format!("{at}.name"), &column.name);
            self.opt_ident(format!("{at}.previous_name"), column.previous_name.as_deref());
            if column.nullable == Some(true) && is_serial_type(&column.data_type) {
                self.fail(format!("{at}.nullable"), "serial columns cannot be nullable");
            }
            if let Some(ColumnDefault::Literal(value)) = &column.default {
                if let Err(message) = check_literal_default(value, &column.data_type) {
                    self.fail(format!("{at}.default"), message);
                }
            }
        }
    }

    fn indexes(&mut self, path: &str, indexes: &[Index]) {
        for (i, index) in indexes.iter().enumerate() {
            let at = format!("{path}.indexes[{i}]");
            self.ident(format!("{at}.name"), &index.name);
            self.opt_ident(format!("{at}.previous_name"), index.previous_name.as_deref());
            if index.on.is_empty() {
                self.fail(format!("{at}.on"), "an index needs at least one column");
            }
            for (j, part) in index.on.iter().enumerate() {
                self.ident(format!("{at}.on[{j}].column"), &part.column);
            }
            if index.primary_key && !index.unique {
                self.fail(at, "primary keys must be unique");
            }
        }
    }

    fn triggers(&mut self, path: &str, triggers: &[Trigger]) {
        for (i, trigger) in triggers.iter().enumerate() {
            let at = format!("{path}.triggers[{i}]");
            self.ident(format!("{at}.name"), &trigger.name);
            self.opt_ident(format!("{at}.previous_name"), trigger.previous_name.as_deref());
            if trigger.order > MAX_TRIGGER_ORDER {
                self.fail(
                    format!("{at}.order"),
                    format!("trigger order must be at most {MAX_TRIGGER_ORDER}"),
                );
            }
        }
    }

    fn table(&mut self, path: &str, table: &Table) {
        self.ident(format!("{path}.name"), &table.name);
        self.opt_ident(format!("{path}.previous_name"), table.previous_name.as_deref());

        self.columns(path, &table.columns);
        self.indexes(path, &table.indexes);
        self.triggers(path, &table.triggers);
        self.checks(path, &table.checks);
        self.uniques(path, &table.uniques);
        self.foreign_keys(path, &table.foreign_keys);

        for (i, getter) in table.getters.iter().enumerate() {
            let at = format!("{path}.getters[{i}]");
            self.ident(format!("{at}.name"), &getter.name);
            if getter.volatility == Volatility::Volatile {
                self.fail(format!("{at}.volatility"), "getters must be stable or immutable");
            }
        }

        let primary_keys: Vec<&Index> = table.indexes.iter().filter(|i| i.primary_key).collect();
        if primary_keys.len() > 1 {
            self.fail(format!("{path}.indexes"), "only one primary key per table");
        }
        if let Some(pk) = primary_keys.first() {
            for part in &pk.on {
                match table.column(&part.column) {
                    Some(col) if !col.is_nullable() => {}
                    Some(_) => self.fail(
                        format!("{path}.indexes"),
                        format!("primary key column {:?} must not be nullable", part.column),
                    ),
                    None => self.fail(
                        format!("{path}.indexes"),
                        format!("primary key column {:?} does not exist", part.column),
                    ),
                }
            }
        }
    }
}

impl Module {
    /// Decode and validate a module document.
    pub fn parse(value: serde_json::Value) -> Result<Module, Vec<ValidationError>> {
        let module: Module = serde_json::from_value(value)
            .map_err(|e| vec![ValidationError::new("$", e.to_string())])?;
        module.validate()?;
        Ok(module)
    }

    /// Check every structural rule, returning all violations found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut v = Validator::default();

        for (i, table) in self.tables.iter().enumerate() {
            v.table(&format!("tables[{i}]"), table);
        }

        for (i, ext) in self.extensions.iter().enumerate() {
            let at = format!("extensions[{i}]");
            v.ident(format!("{at}.table"), &ext.table);
            v.spec(&at, &ext.spec);
        }

        for (i, t) in self.traits.iter().enumerate() {
            let at = format!("traits[{i}]");
            v.columns(&format!("{at}.requires"), &t.requires.columns);
            for (j, getter) in t.requires.getters.iter().enumerate() {
                v.ident(format!("{at}.requires.getters[{j}].name"), &getter.name);
            }
            v.spec(&format!("{at}.provides"), &t.provides);
        }

        for (i, function) in self.functions.iter().enumerate() {
            let at = format!("functions[{i}]");
            v.ident(format!("{at}.name"), &function.name);
            v.opt_ident(format!("{at}.previous_name"), function.previous_name.as_deref());
            for (j, arg) in function.arguments.iter().enumerate() {
                v.ident(format!("{at}.arguments[{j}].name"), &arg.name);
            }
        }

        for (i, contract) in self.contracts.iter().enumerate() {
            for (j, arg) in contract.arguments.iter().enumerate() {
                v.ident(format!("contracts[{i}].arguments[{j}].name"), &arg.name);
            }
        }

        if !self.tasks.is_empty() {
            for (i, job) in self.cron_jobs.iter().enumerate() {
                if !self.tasks.contains(&job.task_name) {
                    v.fail(
                        format!("cron_jobs[{i}].task_name"),
                        format!("unknown task {:?}", job.task_name),
                    );
                }
            }
        }

        if v.errors.is_empty() {
            Ok(())
        } else {
            Err(v.errors)
        }
    }
}
