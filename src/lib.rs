//! stackviz-export - JSON datasets from subunit test results
//!
//! Converts subunit v2 result streams into the data files read by the
//! StackViz front end: a flattened result list, a tree grouped by dotted
//! test name, per-test attachments and run statistics for every stream,
//! plus a `config.json` manifest listing everything that was written.
//!
//! # Architecture
//!
//! - [`provider`]: named sources of re-playable streams (stream files,
//!   testrepository directories, standard input)
//! - [`repository`]: read access to `.testrepository/` run files
//! - [`subunit_stream`]: subunit v2 conversion into [`test_result::TestResult`]s
//! - [`tree`]: grouping of results by dotted name
//! - [`stats`]: run statistics and failure message extraction
//! - [`artifact`]: JSON/gzip artifact files and their descriptors
//! - [`manifest`]: the `config.json` document
//! - [`export`]: orchestration of all of the above
//! - [`ui`]: user interface abstraction for output
//! - [`error`]: Error types and Result alias
//!
//! # Example
//!
//! ```no_run
//! use stackviz_export::export::{export, ExportOptions};
//! use stackviz_export::provider::get_providers;
//! use stackviz_export::ui::CliUI;
//! use std::path::PathBuf;
//!
//! # fn main() -> stackviz_export::error::Result<()> {
//! let providers = get_providers::<PathBuf, _>(&[], &["tempest.subunit"], false)?;
//! let options = ExportOptions {
//!     output_dir: PathBuf::from("data"),
//!     compress: true,
//!     ..Default::default()
//! };
//! let manifest = export(&options, &providers, &mut CliUI::new())?;
//! println!("{} artifacts", manifest.datasets[0].artifacts.len());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod error;
pub mod export;
pub mod manifest;
pub mod provider;
pub mod repository;
pub mod stats;
pub mod subunit_stream;
pub mod test_result;
pub mod tree;
pub mod ui;

pub use error::{Error, Result};
