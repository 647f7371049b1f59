//! politecrawl library
//!
//! Exposes the configuration, crawler catalog and HTTP surface for
//! integration testing.

pub mod cli;
pub mod config;
pub mod crawlers;
pub mod server;

pub use config::AppConfig;
pub use crawlers::{CrawlerCatalog, CrawlerDefinition};
