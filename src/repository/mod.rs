//! Read access to recorded test repositories
//!
//! A repository holds any number of independently stored runs, each a
//! complete subunit stream. The on-disk layout is the one written by
//! testrepository (`.testrepository/`).

use crate::error::Result;
use std::io::Read;
use std::path::Path;

pub mod file;

/// Abstract repository trait for recorded test runs
///
/// # Examples
///
/// ```no_run
/// use stackviz_export::repository::{RepositoryFactory, file::FileRepositoryFactory};
/// use std::io::Read;
/// use std::path::Path;
///
/// # fn main() -> stackviz_export::error::Result<()> {
/// let repo = FileRepositoryFactory.open(Path::new("."))?;
/// for run_id in repo.list_run_ids()? {
///     let mut stream = repo.open_run(&run_id)?;
///     let mut bytes = Vec::new();
///     stream.read_to_end(&mut bytes)?;
///     println!("run {} is {} bytes", run_id, bytes.len());
/// }
/// # Ok(())
/// # }
/// ```
pub trait Repository {
    /// Directory holding the run files
    fn path(&self) -> &Path;

    /// List all run IDs in the repository, oldest first
    fn list_run_ids(&self) -> Result<Vec<String>>;

    /// Open the raw subunit stream of a run. Every call returns a fresh reader.
    fn open_run(&self, run_id: &str) -> Result<Box<dyn Read>>;
}

/// Factory trait for opening repositories
pub trait RepositoryFactory {
    /// Open an existing repository at the given base path
    fn open(&self, base: &Path) -> Result<Box<dyn Repository>>;
}
