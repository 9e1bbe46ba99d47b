use pgcompose_schema::ValidationError;
use thiserror::Error;

fn lines(items: &[impl std::fmt::Display]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("invalid module:\n{}", lines(.0))]
    Validation(Vec<ValidationError>),

    #[error("table {table} implements trait {trait_name}, but that trait does not exist")]
    UnknownTrait { table: String, trait_name: String },

    #[error("function {function} requires trait {trait_name}, but that trait does not exist")]
    UnknownRequiredTrait { function: String, trait_name: String },

    #[error("table {table} is not declared as implementing trait {trait_name}")]
    TraitNotDeclared { table: String, trait_name: String },

    #[error("{}", lines(.0))]
    TraitViolations(Vec<String>),

    #[error("function {function} implements contract {contract}, but that contract does not exist")]
    UnknownContract { function: String, contract: String },

    #[error("{}", lines(.0))]
    ContractViolations(Vec<String>),

    #[error("function {function} requires trait {trait_name}, but no table implements it")]
    MissingImplementer { function: String, trait_name: String },

    #[error("unknown dependency module {0}")]
    UnknownDependency(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation {code} failed: {source}")]
    Statement {
        code: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },
}

impl From<Vec<ValidationError>> for Error {
    fn from(errors: Vec<ValidationError>) -> Self {
        Error::Validation(errors)
    }
}
