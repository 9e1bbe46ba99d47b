//! End-to-end checks against a real PostgreSQL.
//!
//! Installing a module and reconciling it again must produce nothing, and
//! module tests must run against the installed schema.
//!
//! Run with: cargo test -p pgcompose --test idempotency -- --ignored
//!
//! Note: Requires Docker to be running.

use pgcompose::schema::Module;
use pgcompose::{
    DirectRunner, LoaderRegistry, RunContext, install_module, introspect_module,
    reconcile_module, run_module_tests,
};
use serde_json::json;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::ContainerAsync;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use tokio_postgres::{Client, NoTls};

async fn start_postgres() -> (ContainerAsync<Postgres>, Client) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pgcompose=debug")
        .with_test_writer()
        .try_init();

    let container = Postgres::default().start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

    let (client, connection) = tokio_postgres::connect(&url, NoTls).await.unwrap();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {e}");
        }
    });
    (container, client)
}

fn module(people: &str, previous_name: Option<&str>) -> Module {
    Module::parse(json!({
        "tables": [
            {
                "name": people,
                "previous_name": previous_name,
                "rls_enabled": true,
                "columns": [
                    { "name": "id", "type": "serial" },
                    { "name": "first_name", "type": "text" },
                    { "name": "email", "type": "character varying(255)" },
                    { "name": "status", "type": "text", "default": "active" },
                    { "name": "score", "type": "numeric(10, 2)", "default": "1.50" },
                    { "name": "verified", "type": "boolean", "default": "false" },
                    {
                        "name": "created_at",
                        "type": "timestamp with time zone",
                        "default": { "type": "function", "fn": "now()" }
                    }
                ],
                "indexes": [
                    {
                        "name": "people_pk",
                        "on": [{ "column": "id" }],
                        "unique": true,
                        "primary_key": true
                    },
                    {
                        "name": "people_created_at_idx",
                        "on": [{ "column": "created_at", "order": "DESC" }],
                        "where": "status = 'active'"
                    }
                ],
                "checks": [
                    { "name": "score_positive", "expr": "score >= 0" }
                ],
                "uniques": [
                    { "name": "people_email_key", "on": ["email"] }
                ],
                "triggers": [
                    {
                        "name": "fill_first_name",
                        "order": 1,
                        "timing": "before_insert",
                        "when": "NEW.first_name IS NULL",
                        "body": "begin new.first_name := 'anonymous'; return new; end;"
                    }
                ],
                "getters": [
                    {
                        "name": "label",
                        "returns": "text",
                        "language": "sql",
                        "volatility": "stable",
                        "body": "select ($1).first_name || ' <' || coalesce(($1).email, '?') || '>'"
                    }
                ]
            },
            {
                "name": "pet",
                "columns": [
                    { "name": "id", "type": "serial", "nullable": false },
                    { "name": "owner_id", "type": "integer" }
                ],
                "indexes": [
                    {
                        "name": "pet_pkey",
                        "on": [{ "column": "id" }],
                        "unique": true,
                        "primary_key": true
                    }
                ],
                "foreign_keys": [
                    { "on": ["owner_id"], "references": { "table": people, "columns": ["id"] } }
                ]
            }
        ],
        "functions": [
            {
                "name": "add_points",
                "arguments": [
                    { "name": "a", "type": "integer" },
                    { "name": "b", "type": "integer" }
                ],
                "returns": "integer",
                "language": "sql",
                "security": "invoker",
                "volatility": "immutable",
                "body": "select a + b"
            },
            {
                "name": "label_weight",
                "arguments": [{ "name": "label", "type": "varchar(20)" }],
                "returns": "numeric(10, 2)",
                "language": "sql",
                "security": "invoker",
                "volatility": "immutable",
                "body": "select length(label) / 2.0"
            }
        ],
        "tests": [
            {
                "name": "trigger fills names",
                "setup": format!("insert into {people} (email) values ('a@example.com');"),
                "assertions": [
                    {
                        "name": "one row",
                        "return": format!("select count(*) from {people}"),
                        "expect": "1"
                    },
                    {
                        "name": "getter",
                        "return": format!("select {people}_label(p) from {people} p"),
                        "expect": "anonymous <a@example.com>"
                    },
                    {
                        "name": "function",
                        "return": "add_points(2, 3)",
                        "expect": "5"
                    }
                ]
            }
        ]
    }))
    .unwrap()
}

async fn remaining_operations(client: &Client, desired: &Module, context: &RunContext) -> Vec<String> {
    let current = introspect_module(client, &context.schema).await.unwrap();
    reconcile_module(desired, &current, &context.reconcile_options())
        .unwrap()
        .iter()
        .map(|op| op.to_string())
        .collect()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn reconcile_after_install_is_empty() {
    let (_container, client) = start_postgres().await;
    let context = RunContext::default();
    let desired = module("people", None);

    let runner = DirectRunner::strict(&client);
    let applied = install_module(&desired, &LoaderRegistry::new(), &client, &runner, &context)
        .await
        .unwrap();
    assert!(!applied.is_empty());

    let remaining = remaining_operations(&client, &desired, &context).await;
    assert!(remaining.is_empty(), "expected no operations, got {remaining:#?}");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn table_rename_converges() {
    let (_container, client) = start_postgres().await;
    let context = RunContext::default();
    let runner = DirectRunner::strict(&client);

    let original = module("people", None);
    install_module(&original, &LoaderRegistry::new(), &client, &runner, &context)
        .await
        .unwrap();

    let renamed = module("person", Some("people"));
    let applied = install_module(&renamed, &LoaderRegistry::new(), &client, &runner, &context)
        .await
        .unwrap();
    assert!(applied.iter().any(|op| op.code() == "rename_table"));
    assert!(!applied.iter().any(|op| op.code() == "drop_table"));

    let remaining = remaining_operations(&client, &renamed, &context).await;
    assert!(remaining.is_empty(), "expected no operations, got {remaining:#?}");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn module_tests_run_in_a_rolled_back_transaction() {
    let (_container, client) = start_postgres().await;
    let context = RunContext::default();
    let desired = module("people", None);

    let report = run_module_tests(&client, &desired, &context).await.unwrap();
    let failures: Vec<_> = report.failures().collect();
    assert!(failures.is_empty(), "failed assertions: {failures:#?}");
    assert_eq!(report.outcomes.len(), 3);

    // Nothing was committed.
    let current = introspect_module(&client, &context.schema).await.unwrap();
    assert!(current.tables.is_empty());
}
