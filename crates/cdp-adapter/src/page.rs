//! Page controller capability consumed by the scheduler and page steps.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::AdapterError;

/// Source of fresh pages.
#[async_trait]
pub trait PageProvider: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageController>, AdapterError>;
}

/// One browser page.
///
/// `close` must be idempotent; [`PageHandle`] additionally guarantees it is
/// only called once per handle.
#[async_trait]
pub trait PageController: Send {
    /// Load `url`; a failed load is reported as [`AdapterError::Navigation`].
    async fn open(&mut self, url: &str) -> Result<(), AdapterError>;

    /// Inject a script from local storage. `Ok(false)` means the page
    /// refused or the file could not be read.
    async fn inject_local(&mut self, path: &Path) -> Result<bool, AdapterError>;

    /// Let the page fetch and run a remote script.
    async fn include_remote(&mut self, url: &str) -> Result<(), AdapterError>;

    /// Call the JavaScript function `function` inside the page with `args`
    /// and return its structured result.
    async fn evaluate(&mut self, function: &str, args: &[Value]) -> Result<Value, AdapterError>;

    /// Call `function`, which makes the page navigate, and resolve once the
    /// new document has loaded. The load listener must be attached before
    /// `function` runs so a fast load is never missed.
    async fn navigate(&mut self, function: &str, args: &[Value]) -> Result<(), AdapterError>;

    async fn close(&mut self) -> Result<(), AdapterError>;
}

/// Exclusive owner of one page for the duration of a task or machine run.
pub struct PageHandle {
    page: Box<dyn PageController>,
    closed: bool,
}

impl PageHandle {
    pub fn new(page: Box<dyn PageController>) -> Self {
        Self {
            page,
            closed: false,
        }
    }

    pub async fn acquire(provider: &dyn PageProvider) -> Result<Self, AdapterError> {
        provider.new_page().await.map(Self::new)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn open(&mut self, url: &str) -> Result<(), AdapterError> {
        self.live()?;
        self.page.open(url).await
    }

    pub async fn inject_local(&mut self, path: &Path) -> Result<bool, AdapterError> {
        self.live()?;
        self.page.inject_local(path).await
    }

    pub async fn include_remote(&mut self, url: &str) -> Result<(), AdapterError> {
        self.live()?;
        self.page.include_remote(url).await
    }

    pub async fn evaluate(&mut self, function: &str, args: &[Value]) -> Result<Value, AdapterError> {
        self.live()?;
        self.page.evaluate(function, args).await
    }

    pub async fn navigate(&mut self, function: &str, args: &[Value]) -> Result<(), AdapterError> {
        self.live()?;
        self.page.navigate(function, args).await
    }

    /// Release the page. Later calls are no-ops.
    pub async fn close(&mut self) -> Result<(), AdapterError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("closing page");
        self.page.close().await
    }

    fn live(&self) -> Result<(), AdapterError> {
        if self.closed {
            Err(AdapterError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Read a local script for injection; empty files count as unreadable.
pub async fn read_local_script(path: &Path) -> Result<String, AdapterError> {
    let source = fs::read_to_string(path)
        .await
        .map_err(|err| AdapterError::Io(format!("{}: {err}", path.display())))?;
    if source.trim().is_empty() {
        return Err(AdapterError::Io(format!("{} is empty", path.display())));
    }
    Ok(source)
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        if !self.closed {
            warn!("page handle dropped without being closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingPage {
        closes: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl PageController for CountingPage {
        async fn open(&mut self, _url: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn inject_local(&mut self, _path: &Path) -> Result<bool, AdapterError> {
            Ok(true)
        }

        async fn include_remote(&mut self, _url: &str) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn evaluate(&mut self, _function: &str, _args: &[Value]) -> Result<Value, AdapterError> {
            Ok(Value::Null)
        }

        async fn navigate(&mut self, _function: &str, _args: &[Value]) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), AdapterError> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn close_reaches_page_once() {
        let closes = Arc::new(Mutex::new(0));
        let mut handle = PageHandle::new(Box::new(CountingPage {
            closes: Arc::clone(&closes),
        }));

        handle.close().await.unwrap();
        handle.close().await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(*closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn local_scripts_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("jquery.js");
        std::fs::write(&script, "window.$ = {};").unwrap();
        let empty = dir.path().join("empty.js");
        std::fs::write(&empty, "  \n").unwrap();

        assert_eq!(read_local_script(&script).await.unwrap(), "window.$ = {};");
        assert!(matches!(read_local_script(&empty).await, Err(AdapterError::Io(_))));
        assert!(matches!(
            read_local_script(&dir.path().join("missing.js")).await,
            Err(AdapterError::Io(_))
        ));
    }

    #[tokio::test]
    async fn closed_handle_rejects_page_calls() {
        let mut handle = PageHandle::new(Box::new(CountingPage::default()));
        handle.close().await.unwrap();

        assert!(matches!(
            handle.open("https://example.com").await,
            Err(AdapterError::Closed)
        ));
        assert!(matches!(
            handle.evaluate("function () { return 1; }", &[]).await,
            Err(AdapterError::Closed)
        ));
    }
}
