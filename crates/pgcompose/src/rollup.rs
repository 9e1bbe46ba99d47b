//! Dependency rollup.
//!
//! A module names the modules it depends on; their contents are merged into
//! it, transitively, before anything is diffed. Each dependency is loaded
//! once, and every level of the dependency graph loads concurrently.

use std::collections::HashSet;
use std::sync::Arc;

use camino::Utf8PathBuf;
use futures_util::future::{BoxFuture, try_join_all};
use indexmap::IndexMap;
use pgcompose_schema::Module;
use tracing::debug;

use crate::{Error, Result};

/// Something that can produce a module on demand.
pub trait ModuleLoader: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<Module>>;
}

impl ModuleLoader for Module {
    fn load(&self) -> BoxFuture<'_, Result<Module>> {
        Box::pin(async move { Ok(self.clone()) })
    }
}

/// Loads a module document from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileLoader {
    path: Utf8PathBuf,
}

impl JsonFileLoader {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModuleLoader for JsonFileLoader {
    fn load(&self) -> BoxFuture<'_, Result<Module>> {
        Box::pin(async move {
            let content = tokio::fs::read_to_string(&self.path).await?;
            let value: serde_json::Value = serde_json::from_str(&content)?;
            Ok(Module::parse(value)?)
        })
    }
}

/// Dependency name to loader.
pub type LoaderRegistry = IndexMap<String, Arc<dyn ModuleLoader>>;

/// Merge every dependency of `module` into it, transitively.
///
/// Dependencies are merged level by level, in declaration order within a
/// level. A name seen before is skipped, so cycles terminate.
pub async fn rollup(mut module: Module, registry: &LoaderRegistry) -> Result<Module> {
    let mut seen = HashSet::new();
    let mut pending: Vec<String> = module
        .dependencies
        .iter()
        .map(|d| d.module.clone())
        .collect();

    while !pending.is_empty() {
        let level: Vec<String> = pending
            .drain(..)
            .filter(|name| seen.insert(name.clone()))
            .collect();

        let loaders = level
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownDependency(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let loaded = try_join_all(loaders.iter().map(|loader| loader.load())).await?;

        for (name, dependency) in level.iter().zip(loaded) {
            debug!(dependency = %name, tables = dependency.tables.len(), "merging dependency");
            pending.extend(dependency.dependencies.iter().map(|d| d.module.clone()));
            module.merge(dependency);
        }
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgcompose_schema::{Dependency, Table};

    fn module(tables: &[&str], dependencies: &[&str]) -> Module {
        Module {
            tables: tables.iter().map(|t| Table::new(*t)).collect(),
            dependencies: dependencies
                .iter()
                .map(|d| Dependency {
                    module: d.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn registry(entries: Vec<(&str, Module)>) -> LoaderRegistry {
        entries
            .into_iter()
            .map(|(name, m)| (name.to_string(), Arc::new(m) as Arc<dyn ModuleLoader>))
            .collect()
    }

    fn table_names(module: &Module) -> Vec<&str> {
        module.tables.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_transitive_dependencies_are_merged_once() {
        let registry = registry(vec![
            ("auth", module(&["users"], &["base"])),
            ("billing", module(&["invoices"], &["base", "auth"])),
            ("base", module(&["settings"], &[])),
        ]);
        let root = module(&["app"], &["auth", "billing"]);

        let merged = rollup(root, &registry).await.unwrap();
        assert_eq!(
            table_names(&merged),
            ["app", "users", "invoices", "settings"]
        );
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        let registry = registry(vec![
            ("a", module(&["a_table"], &["b"])),
            ("b", module(&["b_table"], &["a"])),
        ]);
        let merged = rollup(module(&[], &["a"]), &registry).await.unwrap();
        assert_eq!(table_names(&merged), ["a_table", "b_table"]);
    }

    #[tokio::test]
    async fn test_unknown_dependency() {
        let result = rollup(module(&[], &["missing"]), &LoaderRegistry::new()).await;
        assert!(matches!(result, Err(Error::UnknownDependency(name)) if name == "missing"));
    }

    #[tokio::test]
    async fn test_json_file_loader() {
        let path = std::env::temp_dir().join(format!("pgcompose-rollup-{}.json", std::process::id()));
        let path = Utf8PathBuf::try_from(path).unwrap();
        std::fs::write(&path, r#"{ "tables": [{ "name": "from_file" }] }"#).unwrap();

        let mut registry = registry(vec![]);
        registry.insert("file".to_string(), Arc::new(JsonFileLoader::new(path.clone())));

        let merged = rollup(module(&[], &["file"]), &registry).await.unwrap();
        assert_eq!(table_names(&merged), ["from_file"]);
        std::fs::remove_file(&path).unwrap();
    }
}
