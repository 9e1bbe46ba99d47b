//! Declarative schema entities for pgcompose.
//!
//! These types describe both the desired state (decoded from module
//! documents) and the current state (produced by catalog introspection), so
//! the reconcilers can compare them field by field.

use indexmap::{IndexMap, IndexSet};
use pgcompose_sql::{
    getter_function_name, is_serial_type, trigger_function_name, trigger_object_name,
};
use serde::{Deserialize, Serialize};

mod validate;
pub use validate::*;

/// Marker for the `type` tag of tagged object shapes in module documents.
macro_rules! type_tag {
    ($name:ident, $tag:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            #[serde(rename = $tag)]
            Tag,
        }
    };
}

type_tag!(FunctionTag, "function");
type_tag!(GetterTag, "getter");

// ============================================================================
// Columns
// ============================================================================

/// A column default.
///
/// Written either as a plain string (a literal value, quoted when rendered)
/// or as `{ type: function, fn: "now()" }` for an expression rendered raw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColumnDefaultRepr", into = "ColumnDefaultRepr")]
pub enum ColumnDefault {
    /// A literal value such as `draft` or `0`.
    Literal(String),
    /// A SQL expression such as `now()`.
    Function(String),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ColumnDefaultRepr {
    Literal(String),
    Function {
        #[serde(rename = "type")]
        tag: FunctionTag,
        #[serde(rename = "fn")]
        expr: String,
    },
}

impl From<ColumnDefaultRepr> for ColumnDefault {
    fn from(repr: ColumnDefaultRepr) -> Self {
        match repr {
            ColumnDefaultRepr::Literal(value) => ColumnDefault::Literal(value),
            ColumnDefaultRepr::Function { expr, .. } => ColumnDefault::Function(expr),
        }
    }
}

impl From<ColumnDefault> for ColumnDefaultRepr {
    fn from(default: ColumnDefault) -> Self {
        match default {
            ColumnDefault::Literal(value) => ColumnDefaultRepr::Literal(value),
            ColumnDefault::Function(expr) => ColumnDefaultRepr::Function {
                tag: FunctionTag::Tag,
                expr,
            },
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Type as written, e.g. `integer` or `timestamptz`.
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,
    /// Absent means nullable, except for serial types, which are always
    /// `NOT NULL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ..Default::default()
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(!is_serial_type(&self.data_type))
    }
}

// ============================================================================
// Indexes
// ============================================================================

/// Sort order for index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "",
            SortOrder::Desc => " DESC",
        }
    }
}

/// Nulls ordering for index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    #[serde(rename = "FIRST", alias = "first")]
    First,
    #[serde(rename = "LAST", alias = "last")]
    Last,
}

impl NullsOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            NullsOrder::First => " NULLS FIRST",
            NullsOrder::Last => " NULLS LAST",
        }
    }
}

/// One key part of an index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexColumn {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
    /// Absent means the engine default for the sort order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls: Option<NullsOrder>,
}

impl IndexColumn {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Default::default()
        }
    }

    /// Returns the SQL fragment for this key part (name + order + nulls).
    pub fn to_sql(&self, quote_ident: impl Fn(&str) -> String) -> String {
        format!(
            "{}{}{}",
            quote_ident(&self.column),
            self.order.unwrap_or_default().to_sql(),
            self.nulls.map(|n| n.to_sql()).unwrap_or("")
        )
    }
}

/// A non-key column carried by an index (`INCLUDE (...)`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IncludeColumn {
    pub column: String,
}

/// A table index, possibly the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub on: Vec<IndexColumn>,
    /// Access method, e.g. `gin`. Absent means btree.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<IncludeColumn>,
    #[serde(default)]
    pub primary_key: bool,
    /// Name of the constraint backing a primary key, when it differs from
    /// the index name. Filled by introspection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key_constraint_name: Option<String>,
}

// ============================================================================
// Foreign keys, checks, uniques
// ============================================================================

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct References {
    pub table: String,
    pub columns: Vec<String>,
}

/// A foreign key constraint. Identified by its shape, not its name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForeignKey {
    pub on: Vec<String>,
    pub references: References,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A table CHECK constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
}

/// A table UNIQUE constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
}

// ============================================================================
// Triggers
// ============================================================================

/// When a trigger fires, relative to which event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerTiming {
    #[default]
    BeforeInsert,
    InsteadOfInsert,
    AfterInsert,
    BeforeUpdate,
    InsteadOfUpdate,
    AfterUpdate,
    BeforeDelete,
    InsteadOfDelete,
    AfterDelete,
}

impl TriggerTiming {
    /// `BEFORE`, `AFTER` or `INSTEAD OF`.
    pub fn moment(&self) -> &'static str {
        use TriggerTiming::*;
        match self {
            BeforeInsert | BeforeUpdate | BeforeDelete => "BEFORE",
            AfterInsert | AfterUpdate | AfterDelete => "AFTER",
            InsteadOfInsert | InsteadOfUpdate | InsteadOfDelete => "INSTEAD OF",
        }
    }

    /// `INSERT`, `UPDATE` or `DELETE`.
    pub fn event(&self) -> &'static str {
        use TriggerTiming::*;
        match self {
            BeforeInsert | InsteadOfInsert | AfterInsert => "INSERT",
            BeforeUpdate | InsteadOfUpdate | AfterUpdate => "UPDATE",
            BeforeDelete | InsteadOfDelete | AfterDelete => "DELETE",
        }
    }

    pub fn from_parts(moment: &str, event: &str) -> Option<Self> {
        use TriggerTiming::*;
        Some(match (moment, event) {
            ("BEFORE", "INSERT") => BeforeInsert,
            ("BEFORE", "UPDATE") => BeforeUpdate,
            ("BEFORE", "DELETE") => BeforeDelete,
            ("AFTER", "INSERT") => AfterInsert,
            ("AFTER", "UPDATE") => AfterUpdate,
            ("AFTER", "DELETE") => AfterDelete,
            ("INSTEAD OF", "INSERT") => InsteadOfInsert,
            ("INSTEAD OF", "UPDATE") => InsteadOfUpdate,
            ("INSTEAD OF", "DELETE") => InsteadOfDelete,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForEach {
    #[default]
    Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerLanguage {
    #[default]
    Plpgsql,
}

/// A row trigger backed by a generated plpgsql function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    #[serde(default)]
    pub for_each: ForEach,
    /// Position among the table's triggers; baked into the object name.
    pub order: u32,
    #[serde(default)]
    pub language: TriggerLanguage,
    pub body: String,
    pub timing: TriggerTiming,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_order: Option<u32>,
}

impl Trigger {
    pub fn object_name(&self, table: &str) -> String {
        trigger_object_name(table, self.order, &self.name)
    }

    pub fn function_name(&self, table: &str) -> String {
        trigger_function_name(table, &self.name)
    }
}

// ============================================================================
// Routines
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Sql,
    Plpgsql,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Sql => "sql",
            Language::Plpgsql => "plpgsql",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    #[default]
    Volatile,
    Stable,
    Immutable,
}

impl Volatility {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Volatility::Volatile => "VOLATILE",
            Volatility::Stable => "STABLE",
            Volatility::Immutable => "IMMUTABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Security {
    #[default]
    Invoker,
    Definer,
}

impl Security {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Security::Invoker => "SECURITY INVOKER",
            Security::Definer => "SECURITY DEFINER",
        }
    }
}

/// A computed attribute of a table: a function taking the row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Getter {
    pub name: String,
    pub returns: String,
    pub body: String,
    pub language: Language,
    pub volatility: Volatility,
}

impl Getter {
    pub fn function_name(&self, table: &str) -> String {
        getter_function_name(table, &self.name)
    }
}

/// The signature part of a getter, as required by traits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GetterContract {
    pub name: String,
    pub returns: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl FunctionArgument {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            default: None,
        }
    }
}

/// A standalone function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<FunctionArgument>,
    pub returns: String,
    pub language: Language,
    pub security: Security,
    pub volatility: Volatility,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
    /// Contracts this function claims to satisfy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    /// Traits whose implementing table the body is written against.
    /// Only the first entry is used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Contract this function is a default implementation of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_for: Option<String>,
}

/// A structural function signature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<FunctionArgument>,
    pub returns: String,
}

// ============================================================================
// Traits and extensions
// ============================================================================

/// How a trait's required column is satisfied by an implementing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnAlias {
    /// A column of the table under another name.
    Column(String),
    /// A getter of the table.
    Getter {
        #[serde(rename = "type")]
        tag: GetterTag,
        name: String,
    },
}

impl ColumnAlias {
    pub fn name(&self) -> &str {
        match self {
            ColumnAlias::Column(name) => name,
            ColumnAlias::Getter { name, .. } => name,
        }
    }
}

/// Renames applied when a table implements a trait.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TraitVia {
    #[serde(default)]
    pub columns: IndexMap<String, ColumnAlias>,
    #[serde(default)]
    pub getters: IndexMap<String, String>,
}

/// A table's claim to implement a trait.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TraitImplementation {
    #[serde(rename = "trait")]
    pub trait_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<TraitVia>,
}

impl TraitImplementation {
    pub fn new(trait_name: impl Into<String>) -> Self {
        Self {
            trait_name: trait_name.into(),
            via: None,
        }
    }

    pub fn column_alias(&self, required: &str) -> Option<&ColumnAlias> {
        self.via.as_ref()?.columns.get(required)
    }

    pub fn getter_alias(&self, required: &str) -> Option<&str> {
        self.via.as_ref()?.getters.get(required).map(String::as_str)
    }
}

/// Structure added onto a table by a trait or an extension.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableExtensionSpec {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
    #[serde(default)]
    pub uniques: Vec<UniqueConstraint>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

/// Unconditional structure added to a named table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableExtension {
    pub table: String,
    #[serde(flatten)]
    pub spec: TableExtensionSpec,
}

/// What an implementing table must already have.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TraitRequirement {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub getters: Vec<GetterContract>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Trait {
    pub name: String,
    #[serde(default)]
    pub requires: TraitRequirement,
    #[serde(default)]
    pub provides: TableExtensionSpec,
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
    #[serde(default)]
    pub uniques: Vec<UniqueConstraint>,
    #[serde(default)]
    pub implements: Vec<TraitImplementation>,
    #[serde(default)]
    pub getters: Vec<Getter>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rls_enabled: Option<bool>,
    /// Trait this table is a default implementation of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_for: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn getter(&self, name: &str) -> Option<&Getter> {
        self.getters.iter().find(|g| g.name == name)
    }

    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.primary_key)
    }

    pub fn implementation(&self, trait_name: &str) -> Option<&TraitImplementation> {
        self.implements.iter().find(|i| i.trait_name == trait_name)
    }

    pub fn rls_enabled(&self) -> bool {
        self.rls_enabled.unwrap_or(false)
    }
}

// ============================================================================
// Module
// ============================================================================

/// Schedule metadata handed to the job scheduler. Not diffed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CronJob {
    pub name: String,
    pub time_zone: String,
    pub pattern: String,
    pub task_name: String,
}

/// Another module whose contents are merged into this one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dependency {
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Assertion {
    pub name: String,
    /// Expression evaluated after the setup ran.
    #[serde(rename = "return")]
    pub returns: String,
    /// Expected text rendering of the expression.
    pub expect: String,
}

/// A test executed inside the database against the installed module.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleTest {
    pub name: String,
    pub setup: String,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

/// The root aggregate: everything a module declares.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub traits: Vec<Trait>,
    #[serde(default)]
    pub tests: Vec<ModuleTest>,
    #[serde(default)]
    pub extensions: Vec<TableExtension>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default, alias = "cronJobs")]
    pub cron_jobs: Vec<CronJob>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Task names registered by the module's worker.
    #[serde(default)]
    pub tasks: IndexSet<String>,
}

impl Module {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn trait_def(&self, name: &str) -> Option<&Trait> {
        self.traits.iter().find(|t| t.name == name)
    }

    pub fn contract(&self, name: &str) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.name == name)
    }

    /// Append everything `other` declares, except its dependencies.
    pub fn merge(&mut self, other: Module) {
        self.tables.extend(other.tables);
        self.traits.extend(other.traits);
        self.tests.extend(other.tests);
        self.extensions.extend(other.extensions);
        self.functions.extend(other.functions);
        self.contracts.extend(other.contracts);
        self.cron_jobs.extend(other.cron_jobs);
        self.tasks.extend(other.tasks);
    }
}
