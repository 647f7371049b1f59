//! Page controller capability for politecrawl.
//!
//! Crawls only see the [`PageProvider`]/[`PageController`] traits; the
//! Chromium implementation sits behind the `chromium` feature.

pub mod config;
pub mod error;
pub mod page;
pub mod steps;

#[cfg(feature = "chromium")]
pub mod chromium;

pub use config::CdpConfig;
pub use error::AdapterError;
pub use page::{read_local_script, PageController, PageHandle, PageProvider};
pub use steps::{PageSource, DATA_KEY, URL_KEY};

#[cfg(feature = "chromium")]
pub use chromium::ChromiumProvider;
