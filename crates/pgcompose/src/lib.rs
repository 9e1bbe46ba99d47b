//! Declarative Postgres schema reconciliation.
//!
//! A module declares tables (with their columns, indexes, triggers, foreign
//! keys, constraints and getters) and functions. pgcompose compares that
//! declaration with what the catalog currently holds and produces the
//! ordered list of operations that makes the database match it.
//!
//! # Identity
//!
//! Every object is matched to its current counterpart by name, or by its
//! `previous_name`, which is how renames are declared. Nothing is renamed by
//! guessing. Foreign keys are matched by what they connect, and functions by
//! name plus a compatible signature.
//!
//! # Idempotency
//!
//! Reconciling a module against a database the same module was just
//! installed into yields no operations. The comparison rules (type aliases,
//! default values, whitespace in bodies, casts Postgres adds to expressions)
//! exist to keep that true.
//!
//! # Composition
//!
//! Modules can depend on other modules, tables can implement traits that
//! contribute columns and triggers, and functions can implement contracts or
//! stand in as fallbacks until a real implementation is present. All of it
//! is resolved before diffing, see [`reconcile::prepare_module`].
//!
//! # Usage
//!
//! ```ignore
//! let (context, _) = pgcompose::config::load()?;
//! let pool = TracedPool::from_url(&pgcompose::config::database_url()?)?;
//! let conn = pool.get().await?;
//!
//! let module = Module::parse(serde_json::from_str(&source)?)?;
//! let runner = DirectRunner::new(&conn);
//! let operations = install_module(&module, &LoaderRegistry::new(), &conn, &runner, &context).await?;
//! ```

pub mod config;
pub mod contract;
mod error;
pub mod expand;
pub mod fallback;
pub mod identity;
pub mod introspect;
mod operation;
pub mod reconcile;
pub mod rollup;
pub mod runner;
pub mod statement;
pub mod testing;
mod traced;

pub use config::RunContext;
pub use error::Error;
pub use introspect::introspect_module;
pub use operation::Operation;
pub use reconcile::{ReconcileOptions, reconcile_module};
pub use rollup::{JsonFileLoader, LoaderRegistry, ModuleLoader, rollup};
pub use runner::{DirectRunner, DisplayRunner, FileRunner, Runner, install_module};
pub use statement::{to_statement, to_statements};
pub use testing::{TestReport, run_module_tests};
pub use traced::{Connection, ConnectionExt, TracedConn, TracedPool};

pub use pgcompose_schema as schema;
pub use pgcompose_sql::sexp;

pub type Result<T> = std::result::Result<T, Error>;
