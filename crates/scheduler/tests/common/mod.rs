use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cdp_adapter::{AdapterError, PageController, PageProvider};
use serde_json::{json, Value};

/// Page provider whose pages log every call into one shared journal.
#[derive(Clone, Default)]
pub struct RecordingPages {
    pub journal: Arc<Mutex<Vec<String>>>,
    pub failing_url: Option<String>,
    pub failing_script: Option<String>,
    pub extracted: Value,
}

impl RecordingPages {
    pub fn new() -> Self {
        Self {
            extracted: json!({ "title": "Now Showing" }),
            ..Self::default()
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.journal().iter().filter(|line| *line == entry).count()
    }

    fn log(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl PageProvider for RecordingPages {
    async fn new_page(&self) -> Result<Box<dyn PageController>, AdapterError> {
        self.log("new_page".into());
        Ok(Box::new(RecordingPage {
            pages: self.clone(),
        }))
    }
}

struct RecordingPage {
    pages: RecordingPages,
}

#[async_trait]
impl PageController for RecordingPage {
    async fn open(&mut self, url: &str) -> Result<(), AdapterError> {
        self.pages.log(format!("open {url}"));
        if self.pages.failing_url.as_deref() == Some(url) {
            return Err(AdapterError::Navigation {
                url: url.to_string(),
                status: "fail".into(),
            });
        }
        Ok(())
    }

    async fn inject_local(&mut self, path: &Path) -> Result<bool, AdapterError> {
        let name = path.display().to_string();
        self.pages.log(format!("inject {name}"));
        Ok(self.pages.failing_script.as_deref() != Some(name.as_str()))
    }

    async fn include_remote(&mut self, url: &str) -> Result<(), AdapterError> {
        self.pages.log(format!("include {url}"));
        if self.pages.failing_script.as_deref() == Some(url) {
            return Err(AdapterError::Io("connection refused".into()));
        }
        Ok(())
    }

    async fn evaluate(&mut self, function: &str, _args: &[Value]) -> Result<Value, AdapterError> {
        self.pages.log(format!("evaluate {function}"));
        if function.contains("throw") {
            return Err(AdapterError::Evaluation("Error: nope".into()));
        }
        Ok(self.pages.extracted.clone())
    }

    async fn navigate(&mut self, function: &str, _args: &[Value]) -> Result<(), AdapterError> {
        self.pages.log(format!("navigate {function}"));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.pages.log("close".into());
        Ok(())
    }
}
