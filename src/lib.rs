//! # scrapeflow
//!
//! Interprets declarative scraping flows. A flow is a YAML tree of actions
//! (`path`, `table2csv`, `buildConnectionTree`, `treeBranch2csv`, variable
//! operations, `saveToFile`, ...) evaluated against a parsed markup document.
//!
//! ## Usage
//!
//! ```bash
//! scrapeflow run --flow prices.yaml --document page.html [--service-name EC2]
//! scrapeflow batch jobs.yaml
//! scrapeflow validate --flow prices.yaml
//! ```
//!
//! ## Modules
//!
//! - `app` - Configuration, logging and fatal error reporting for the binary
//! - `document` - Arena-backed document model and the lenient markup loader
//! - `error` - `FlowError` and the error code registry
//! - `executor` - The flow interpreter and its composition modes
//! - `flow` - Flow definitions parsed into typed action trees
//! - `hierarchy` - Level-based hierarchy building and DFS branch extraction
//! - `job` - Scrape jobs and the parallel batch runner
//! - `persist` - CSV/JSON output sinks
//! - `table` - Projection of markup tables and branches into rows
//! - `vars` - Runtime values, `$` references and the variable store
pub mod app;
pub mod document;
pub mod error;
pub mod executor;
pub mod flow;
pub mod hierarchy;
pub mod job;
pub mod persist;
pub mod table;
pub mod vars;

pub use error::{FlowError, Result};
