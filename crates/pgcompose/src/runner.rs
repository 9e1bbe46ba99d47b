//! Applying operations.
//!
//! A [`Runner`] takes the operations of a reconciliation pass, in the order
//! they were emitted, and does something with their SQL: executes it, writes
//! it to a file, or prints it for review.

use std::io::Write;
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use pgcompose_schema::Module;
use tracing::{error, info};

use crate::introspect::introspect_module;
use crate::reconcile::reconcile_module;
use crate::rollup::{LoaderRegistry, rollup};
use crate::statement::{to_statement, to_statements};
use crate::traced::{Connection, ConnectionExt};
use crate::{Error, Operation, Result, RunContext};

pub trait Runner: Send + Sync {
    fn run<'a>(
        &'a self,
        operations: &'a [Operation],
        context: &'a RunContext,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Executes each statement against a connection.
///
/// By default a failing statement is logged and the remaining operations
/// still run. [`DirectRunner::strict`] stops at the first failure instead.
pub struct DirectRunner<'c, C: Connection> {
    conn: &'c C,
    strict: bool,
}

impl<'c, C: Connection> DirectRunner<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self {
            conn,
            strict: false,
        }
    }

    pub fn strict(conn: &'c C) -> Self {
        Self { conn, strict: true }
    }
}

impl<C: Connection> Runner for DirectRunner<'_, C> {
    fn run<'a>(
        &'a self,
        operations: &'a [Operation],
        context: &'a RunContext,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for op in operations {
                let statement = to_statement(op, context);
                // Trigger operations compile to two statements.
                if let Err(source) = self.conn.traced().batch_execute(&statement).await {
                    if self.strict {
                        return Err(Error::Statement {
                            code: op.code(),
                            source,
                        });
                    }
                    error!(code = op.code(), %statement, error = %source, "operation failed");
                }
            }
            Ok(())
        })
    }
}

/// Writes every statement, newline separated, to `context.out_file`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileRunner;

impl Runner for FileRunner {
    fn run<'a>(
        &'a self,
        operations: &'a [Operation],
        context: &'a RunContext,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = context
                .out_file
                .as_ref()
                .ok_or_else(|| Error::Config("out_file is required to write statements".into()))?;
            let contents = to_statements(operations, context).join("\n");
            tokio::fs::write(path, contents).await?;
            info!(%path, operations = operations.len(), "wrote statements");
            Ok(())
        })
    }
}

/// Prints each operation followed by its SQL, for review before applying.
pub struct DisplayRunner<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> DisplayRunner<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> Runner for DisplayRunner<W> {
    fn run<'a>(
        &'a self,
        operations: &'a [Operation],
        context: &'a RunContext,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
            if operations.is_empty() {
                writeln!(out, "-- nothing to do")?;
            }
            for op in operations {
                writeln!(out, "-- {op}")?;
                writeln!(out, "{}", to_statement(op, context))?;
            }
            out.flush()?;
            Ok(())
        })
    }
}

/// One full pass: roll up dependencies, introspect the current schema,
/// reconcile, and hand the operations to `runner`.
///
/// Returns the operations that were run.
pub async fn install_module<C: Connection>(
    desired: &Module,
    registry: &LoaderRegistry,
    conn: &C,
    runner: &dyn Runner,
    context: &RunContext,
) -> Result<Vec<Operation>> {
    let desired = rollup(desired.clone(), registry).await?;
    let current = introspect_module(conn, &context.schema).await?;
    let operations = reconcile_module(&desired, &current, &context.reconcile_options())?;

    info!(
        schema = %context.schema,
        operations = operations.len(),
        "installing module"
    );
    runner.run(&operations, context).await?;
    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn operations() -> Vec<Operation> {
        vec![
            Operation::CreateTable {
                table: "people".to_string(),
            },
            Operation::SetRowLevelSecurity {
                table: "people".to_string(),
                enabled: true,
            },
        ]
    }

    #[tokio::test]
    async fn test_display_runner() {
        let runner = DisplayRunner::new(Vec::new());
        runner
            .run(&operations(), &RunContext::default())
            .await
            .unwrap();
        let output = String::from_utf8(runner.into_inner()).unwrap();
        insta::assert_snapshot!(output, @r#"
        -- create_table people
        CREATE TABLE "public"."people" ();
        -- set_row_level_security people = true
        ALTER TABLE "public"."people" ENABLE ROW LEVEL SECURITY;
        "#);
    }

    #[tokio::test]
    async fn test_file_runner_writes_statements() {
        let path = std::env::temp_dir().join(format!("pgcompose-runner-{}.sql", std::process::id()));
        let path = Utf8PathBuf::try_from(path).unwrap();
        let context = RunContext {
            schema: "app".to_string(),
            out_file: Some(path.clone()),
            ..Default::default()
        };

        FileRunner.run(&operations(), &context).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "CREATE TABLE \"app\".\"people\" ();\nALTER TABLE \"app\".\"people\" ENABLE ROW LEVEL SECURITY;"
        );
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_file_runner_requires_out_file() {
        let result = FileRunner.run(&operations(), &RunContext::default()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
