//! Run configuration.
//!
//! Looks for `.config/pgcompose.json` in the current directory or any parent
//! directory, then applies overrides from the environment. Variables set in
//! the process win over those in the nearest `.env` file.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::reconcile::ReconcileOptions;
use crate::{Error, Result};

const CONFIG_FILE: &str = ".config/pgcompose.json";

/// Settings shared by the reconciler, the statement compiler and the runners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunContext {
    /// Schema every statement is qualified with.
    pub schema: String,
    /// Drop current tables the module no longer declares.
    pub drop_tables: bool,
    /// Drop current functions the module no longer declares.
    pub drop_functions: bool,
    /// Where [`FileRunner`](crate::FileRunner) writes statements.
    pub out_file: Option<Utf8PathBuf>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            drop_tables: false,
            drop_functions: true,
            out_file: None,
        }
    }
}

impl RunContext {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            drop_tables: self.drop_tables,
            drop_functions: self.drop_functions,
        }
    }

    /// Apply `PGCOMPOSE_SCHEMA` and `PGCOMPOSE_OUT_FILE` overrides.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(schema) = var("PGCOMPOSE_SCHEMA") {
            self.schema = schema;
        }
        if let Some(out_file) = var("PGCOMPOSE_OUT_FILE") {
            self.out_file = Some(out_file.into());
        }
    }
}

/// Load configuration, searching up the directory tree from the current
/// directory.
///
/// Returns the path of the file that was read, if any. Without a file the
/// defaults apply.
pub fn load() -> Result<(RunContext, Option<Utf8PathBuf>)> {
    let cwd = std::env::current_dir()?;
    let cwd = Utf8PathBuf::try_from(cwd)
        .map_err(|e| Error::Config(format!("current directory is not UTF-8: {e}")))?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Utf8Path) -> Result<(RunContext, Option<Utf8PathBuf>)> {
    let path = find_config_file(start);
    let mut context = match &path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse {path}: {e}")))?
        }
        None => RunContext::default(),
    };

    let dotenv = read_dotenv(start)?;
    context.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()));

    Ok((context, path))
}

/// The connection string from `DATABASE_URL`.
pub fn database_url() -> Result<String> {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").map_err(|_| Error::Config("DATABASE_URL is not set".to_string()))
}

fn find_config_file(start: &Utf8Path) -> Option<Utf8PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|path| path.exists())
}

/// Entries of the nearest `.env` file, without touching the process
/// environment.
fn read_dotenv(start: &Utf8Path) -> Result<HashMap<String, String>> {
    let Some(path) = start
        .ancestors()
        .map(|dir| dir.join(".env"))
        .find(|path| path.exists())
    else {
        return Ok(HashMap::new());
    };
    let invalid = |e: dotenvy::Error| Error::Config(format!("failed to parse {path}: {e}"));
    dotenvy::from_path_iter(&path)
        .map_err(invalid)?
        .map(|item| item.map_err(invalid))
        .collect()
}
