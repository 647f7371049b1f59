//! Named crawler definitions served over HTTP.
//!
//! A crawler is a YAML file `<name>.yaml` inside the crawler directory:
//!
//! ```yaml
//! url: http://localhost:12000/shop.html
//! scripts:
//!   - https://ajax.googleapis.com/ajax/libs/jquery/1.9.1/jquery.min.js
//! extract: |
//!   function () { return document.title; }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use politecrawl_core_types::ScriptSource;
use politecrawl_scheduler::CrawlRequest;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

#[derive(Clone, Debug, Deserialize)]
pub struct CrawlerDefinition {
    pub url: String,
    #[serde(default)]
    pub scripts: Vec<String>,
    pub extract: String,
}

impl CrawlerDefinition {
    /// Build a request; relative local scripts resolve against `base`.
    pub fn to_request(&self, base: &Path) -> Result<CrawlRequest> {
        let request = CrawlRequest::extract(&self.url, self.extract.clone())
            .with_context(|| format!("crawler url {} is invalid", self.url))?;
        Ok(self.scripts.iter().fold(request, |request, script| {
            match ScriptSource::classify(script) {
                ScriptSource::Local(path) if path.is_relative() => {
                    request.with_script(ScriptSource::Local(base.join(path)))
                }
                source => request.with_script(source),
            }
        }))
    }
}

#[derive(Clone, Debug)]
pub struct CrawlerCatalog {
    dir: PathBuf,
}

impl CrawlerCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up `name`; `Ok(None)` when no such crawler exists.
    pub async fn load(&self, name: &str) -> Result<Option<CrawlerDefinition>> {
        if !is_valid_name(name) {
            debug!(name, "rejecting crawler name");
            return Ok(None);
        }
        let path = self.dir.join(format!("{name}.yaml"));
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Ok(None),
        }
        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let definition = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(definition))
    }

    /// Load `name` and turn it into a request.
    pub async fn request(&self, name: &str) -> Result<Option<CrawlRequest>> {
        match self.load(name).await? {
            Some(definition) => definition.to_request(&self.dir).map(Some),
            None => Ok(None),
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use politecrawl_scheduler::TaskWork;

    const SHOP: &str = "url: http://localhost:12000/shop.html\nscripts:\n  - https://ajax.googleapis.com/ajax/libs/jquery/1.9.1/jquery.min.js\n  - helpers/shop.js\nextract: |\n  function () { return document.title; }\n";

    #[tokio::test]
    async fn loads_definition_and_resolves_local_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shop.yaml"), SHOP).unwrap();
        let catalog = CrawlerCatalog::new(dir.path());

        let request = catalog.request("shop").await.unwrap().unwrap();

        assert_eq!(request.host.as_str(), "localhost:12000");
        match request.work {
            TaskWork::Extract { scripts, extract } => {
                assert!(scripts[0].is_remote());
                assert_eq!(
                    scripts[1],
                    ScriptSource::Local(dir.path().join("helpers/shop.js"))
                );
                assert!(extract.contains("document.title"));
            }
            TaskWork::Program(_) => panic!("expected extract work"),
        }
    }

    #[tokio::test]
    async fn unknown_and_traversing_names_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shop.yaml"), SHOP).unwrap();
        let catalog = CrawlerCatalog::new(dir.path().join("nested"));
        std::fs::create_dir(catalog.dir()).unwrap();

        assert!(catalog.load("missing").await.unwrap().is_none());
        assert!(catalog.load("../shop").await.unwrap().is_none());
        assert!(catalog.load("..").await.unwrap().is_none());
        assert!(catalog.load("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_definition_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "url: [").unwrap();
        let catalog = CrawlerCatalog::new(dir.path());

        assert!(catalog.load("broken").await.is_err());
    }
}
