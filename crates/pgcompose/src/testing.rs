//! In-database module tests.
//!
//! A module can declare tests: a setup script and assertions whose text
//! result must match an expected value. They run against the module
//! installed inside a transaction that is always rolled back.

use pgcompose_schema::{Assertion, Module};
use tracing::{debug, info, warn};

use crate::introspect::introspect_module;
use crate::reconcile::reconcile_module;
use crate::runner::{DirectRunner, Runner};
use crate::traced::{Connection, ConnectionExt};
use crate::{Result, RunContext};

const INSTALLED: &str = "pgcompose_installed";
const ASSERTION: &str = "pgcompose_assertion";

/// Result of one assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    pub test: String,
    pub assertion: String,
    pub expected: String,
    /// Text rendering of the result; `None` for SQL NULL or when the
    /// assertion could not be evaluated.
    pub actual: Option<String>,
    /// Set when the setup or the assertion query failed.
    pub error: Option<String>,
}

impl AssertionOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.actual.as_deref() == Some(self.expected.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
    pub outcomes: Vec<AssertionOutcome>,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(AssertionOutcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssertionOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }
}

/// Install `module` in a transaction and run its tests.
///
/// `module` is installed as given, so dependencies should already be rolled
/// up. Each test starts from the freshly installed state. Nothing is
/// committed.
pub async fn run_module_tests<C: Connection>(
    conn: &C,
    module: &Module,
    context: &RunContext,
) -> Result<TestReport> {
    let db = conn.traced();
    db.batch_execute("BEGIN").await?;
    let result = install_and_run(conn, module, context).await;
    db.batch_execute("ROLLBACK").await?;

    if let Ok(report) = &result {
        info!(
            assertions = report.outcomes.len(),
            failed = report.failures().count(),
            "module tests finished"
        );
    }
    result
}

async fn install_and_run<C: Connection>(
    conn: &C,
    module: &Module,
    context: &RunContext,
) -> Result<TestReport> {
    let db = conn.traced();

    let current = introspect_module(conn, &context.schema).await?;
    let operations = reconcile_module(module, &current, &context.reconcile_options())?;
    DirectRunner::strict(conn).run(&operations, context).await?;
    db.batch_execute(&format!("SAVEPOINT {INSTALLED}")).await?;

    let mut report = TestReport::default();
    for test in &module.tests {
        debug!(test = %test.name, "running module test");
        let setup = db.batch_execute(&test.setup).await;
        for assertion in &test.assertions {
            let outcome = match &setup {
                Ok(()) => evaluate(conn, &test.name, assertion).await?,
                Err(e) => AssertionOutcome {
                    test: test.name.clone(),
                    assertion: assertion.name.clone(),
                    expected: assertion.expect.clone(),
                    actual: None,
                    error: Some(format!("setup failed: {e}")),
                },
            };
            if !outcome.passed() {
                warn!(
                    test = %outcome.test,
                    assertion = %outcome.assertion,
                    expected = %outcome.expected,
                    actual = ?outcome.actual,
                    error = ?outcome.error,
                    "assertion failed"
                );
            }
            report.outcomes.push(outcome);
        }
        db.batch_execute(&format!("ROLLBACK TO SAVEPOINT {INSTALLED}"))
            .await?;
    }
    Ok(report)
}

/// `return` may be an expression or a whole query; both work as a scalar
/// subquery. A failing assertion rolls back only itself.
async fn evaluate<C: Connection>(
    conn: &C,
    test: &str,
    assertion: &Assertion,
) -> Result<AssertionOutcome> {
    let db = conn.traced();
    db.batch_execute(&format!("SAVEPOINT {ASSERTION}")).await?;

    let sql = assertion_query(&assertion.returns);
    let (actual, error) = match db.query(&sql, &[]).await {
        Ok(rows) => match rows.first() {
            Some(row) => (row.try_get::<_, Option<String>>(0)?, None),
            None => (None, Some("query returned no rows".to_string())),
        },
        Err(e) => {
            db.batch_execute(&format!("ROLLBACK TO SAVEPOINT {ASSERTION}"))
                .await?;
            (None, Some(e.to_string()))
        }
    };

    Ok(AssertionOutcome {
        test: test.to_string(),
        assertion: assertion.name.clone(),
        expected: assertion.expect.clone(),
        actual,
        error,
    })
}

fn assertion_query(returns: &str) -> String {
    let returns = returns.trim().trim_end_matches(';');
    format!("SELECT ({returns})::text")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(actual: Option<&str>, error: Option<&str>) -> AssertionOutcome {
        AssertionOutcome {
            test: "t".to_string(),
            assertion: "a".to_string(),
            expected: "3".to_string(),
            actual: actual.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_assertion_query() {
        assert_eq!(assertion_query("1 + 2"), "SELECT (1 + 2)::text");
        assert_eq!(
            assertion_query(" select count(*) from people; "),
            "SELECT (select count(*) from people)::text"
        );
    }

    #[test]
    fn test_outcomes() {
        assert!(outcome(Some("3"), None).passed());
        assert!(!outcome(Some("4"), None).passed());
        assert!(!outcome(None, None).passed());
        assert!(!outcome(None, Some("boom")).passed());

        let report = TestReport {
            outcomes: vec![outcome(Some("3"), None), outcome(Some("4"), None)],
        };
        assert!(!report.passed());
        assert_eq!(report.failures().count(), 1);
    }
}
