//! Error types for stackviz-export

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage in which an export failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading and converting the subunit stream.
    Convert,
    /// Writing the flattened result list.
    Raw,
    /// Writing the dotted-name hierarchy.
    Tree,
    /// Writing the per-test attachments.
    Details,
    /// Writing the aggregate run statistics.
    Stats,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Convert => write!(f, "convert"),
            Stage::Raw => write!(f, "raw"),
            Stage::Tree => write!(f, "tree"),
            Stage::Details => write!(f, "details"),
            Stage::Stats => write!(f, "stats"),
        }
    }
}

/// Main error type for stackviz-export
#[derive(Error, Debug)]
pub enum Error {
    /// A declared stream file or companion log does not exist.
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    /// No `.testrepository` directory below the declared path.
    #[error("Repository not found at {0}")]
    RepositoryNotFound(PathBuf),

    /// Repository has an invalid format or version.
    #[error("Invalid repository format: {0}")]
    InvalidFormat(String),

    /// The repository contains no test runs.
    #[error("No test runs in repository {0}")]
    NoTestRuns(PathBuf),

    /// A provider stream could not be (re)opened or read.
    #[error("Failed to read stream {index} of {source_name}: {source}")]
    StreamRead {
        source_name: String,
        index: usize,
        #[source]
        source: io::Error,
    },

    /// The subunit stream could not be converted into results.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// An output file or directory could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A failure while exporting one provider stream.
    #[error("Export of {provider} stream {index} failed during {stage}: {source}")]
    Export {
        provider: String,
        index: usize,
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns true for failures raised while resolving sources, before any
    /// output has been written.
    pub fn is_source_resolution(&self) -> bool {
        matches!(
            self,
            Error::SourceNotFound(_)
                | Error::RepositoryNotFound(_)
                | Error::InvalidFormat(_)
                | Error::NoTestRuns(_)
        )
    }

    /// Attach provider, stream index and stage context to an error.
    pub fn in_stage(self, provider: &str, index: usize, stage: Stage) -> Self {
        Error::Export {
            provider: provider.to_string(),
            index,
            stage,
            source: Box::new(self),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Write {
            path: path.into(),
            source,
        }
    }
}
