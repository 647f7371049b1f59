use std::fmt;
use std::path::PathBuf;

use url::Url;
use uuid::Uuid;

mod error;

pub use error::CrawlError;

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authority of a task URL (`host[:port]`); the unit of rate limiting.
///
/// Two hosts are equal only when their strings match exactly, so
/// `example.com` and `example.com:8080` are scheduled independently.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Host(String);

impl Host {
    pub fn from_url(url: &Url) -> Result<Self, CrawlError> {
        let host = url.host_str().ok_or_else(|| CrawlError::InvalidUrl {
            url: url.to_string(),
            reason: "url has no host".to_string(),
        })?;
        Ok(match url.port() {
            Some(port) => Self(format!("{host}:{port}")),
            None => Self(host.to_string()),
        })
    }

    /// Parses `raw` and derives its host in one step.
    pub fn parse(raw: &str) -> Result<(Url, Self), CrawlError> {
        let url = Url::parse(raw).map_err(|err| CrawlError::InvalidUrl {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;
        let host = Self::from_url(&url)?;
        Ok((url, host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of a script to load into a page before extraction.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptSource {
    /// Fetched over the network by the page itself.
    Remote(String),
    /// Read from local storage and injected.
    Local(PathBuf),
}

impl ScriptSource {
    /// `http://` and `https://` locations are remote, anything else is a local path.
    pub fn classify(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Remote(location.to_string())
        } else {
            Self::Local(PathBuf::from(location))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<&str> for ScriptSource {
    fn from(value: &str) -> Self {
        Self::classify(value)
    }
}

impl From<String> for ScriptSource {
    fn from(value: String) -> Self {
        Self::classify(&value)
    }
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}
