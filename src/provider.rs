//! Named sources of re-playable subunit streams
//!
//! A [`Provider`] holds one or more independent streams. Asking for the same
//! stream index twice must yield two readers over the same content, each of
//! which can be consumed to the end without affecting the other:
//!
//! - [`FileProvider`] reopens its file on every call;
//! - [`RepositoryProvider`] reopens the run file on every call;
//! - [`StdinProvider`] buffers its whole input when created and hands out
//!   readers over that buffer.

use crate::error::{Error, Result};
use crate::repository::file::FileRepositoryFactory;
use crate::repository::{Repository, RepositoryFactory};
use log::debug;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// A named source of one or more subunit streams.
pub trait Provider {
    /// Identifier used for artifact names and file prefixes
    fn name(&self) -> &str;

    /// Human readable label
    fn description(&self) -> String;

    /// Number of independent streams held
    fn count(&self) -> usize;

    /// Open stream `index` from the beginning
    fn get_stream(&self, index: usize) -> Result<Box<dyn Read + '_>>;
}

fn stream_error(source_name: &str, index: usize, source: io::Error) -> Error {
    Error::StreamRead {
        source_name: source_name.to_string(),
        index,
        source,
    }
}

fn check_index(provider: &dyn Provider, index: usize) -> Result<()> {
    if index < provider.count() {
        Ok(())
    } else {
        Err(stream_error(
            provider.name(),
            index,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("index out of range (count {})", provider.count()),
            ),
        ))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A single subunit stream stored in a file.
pub struct FileProvider {
    path: PathBuf,
    name: String,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::SourceNotFound(path));
        }
        let name = file_name(&path);
        Ok(FileProvider { path, name })
    }
}

impl Provider for FileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Subunit File: {}", self.path.display())
    }

    fn count(&self) -> usize {
        1
    }

    fn get_stream(&self, index: usize) -> Result<Box<dyn Read + '_>> {
        check_index(self, index)?;
        let file = File::open(&self.path).map_err(|e| stream_error(&self.name, index, e))?;
        Ok(Box::new(file))
    }
}

/// All runs recorded in a test repository.
pub struct RepositoryProvider {
    base: PathBuf,
    name: String,
    repository: Box<dyn Repository>,
    run_ids: Vec<String>,
}

impl RepositoryProvider {
    /// Open the repository below `base`; it must hold at least one run.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        if !base.is_dir() {
            return Err(Error::SourceNotFound(base));
        }

        let repository = FileRepositoryFactory.open(&base)?;
        let run_ids = repository.list_run_ids()?;
        if run_ids.is_empty() {
            return Err(Error::NoTestRuns(base));
        }

        let canonical = base.canonicalize().unwrap_or_else(|_| base.clone());
        let name = format!("repo_{}", file_name(&canonical));
        debug!(
            "repository {} holds {} run(s)",
            repository.path().display(),
            run_ids.len()
        );

        Ok(RepositoryProvider {
            base,
            name,
            repository,
            run_ids,
        })
    }
}

impl Provider for RepositoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Repository: {}", self.base.display())
    }

    fn count(&self) -> usize {
        self.run_ids.len()
    }

    fn get_stream(&self, index: usize) -> Result<Box<dyn Read + '_>> {
        check_index(self, index)?;
        let reader = self
            .repository
            .open_run(&self.run_ids[index])
            .map_err(|e| match e {
                Error::Io(io) => stream_error(&self.name, index, io),
                other => other,
            })?;
        Ok(reader)
    }
}

/// A single stream read from standard input (or any reader) up front.
pub struct StdinProvider {
    data: Vec<u8>,
}

impl StdinProvider {
    pub const NAME: &'static str = "stdin";

    /// Buffer standard input completely.
    pub fn new() -> Result<Self> {
        Self::from_reader(io::stdin().lock())
    }

    /// Buffer `reader` completely.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| stream_error(Self::NAME, 0, e))?;
        debug!("buffered {} byte(s) from standard input", data.len());
        Ok(StdinProvider { data })
    }
}

impl Provider for StdinProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        "Subunit Stdin".to_string()
    }

    fn count(&self) -> usize {
        1
    }

    fn get_stream(&self, index: usize) -> Result<Box<dyn Read + '_>> {
        check_index(self, index)?;
        Ok(Box::new(Cursor::new(&self.data[..])))
    }
}

/// Providers keyed by their (unique) name.
pub type Providers = BTreeMap<String, Box<dyn Provider>>;

fn insert_unique(providers: &mut Providers, provider: Box<dyn Provider>) {
    let base = provider.name().to_string();
    let mut key = base.clone();
    let mut n = 1;
    while providers.contains_key(&key) {
        n += 1;
        key = format!("{}_{}", base, n);
    }
    providers.insert(key, provider);
}

/// Resolve repository directories, stream files and (optionally) standard
/// input into named providers.
///
/// Any missing path or empty repository fails the whole resolution. Name
/// collisions are resolved by suffixing `_2`, `_3`, ... to later providers.
pub fn get_providers<P, Q>(
    repository_paths: &[P],
    stream_file_paths: &[Q],
    read_stdin: bool,
) -> Result<Providers>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let stdin = if read_stdin {
        Some(StdinProvider::new()?)
    } else {
        None
    };
    resolve(repository_paths, stream_file_paths, stdin)
}

/// Like [`get_providers`], with an already buffered standard input.
pub fn resolve<P, Q>(
    repository_paths: &[P],
    stream_file_paths: &[Q],
    stdin: Option<StdinProvider>,
) -> Result<Providers>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut providers = Providers::new();

    for path in repository_paths {
        insert_unique(
            &mut providers,
            Box::new(RepositoryProvider::new(path.as_ref())?),
        );
    }

    for path in stream_file_paths {
        insert_unique(&mut providers, Box::new(FileProvider::new(path.as_ref())?));
    }

    if let Some(stdin) = stdin {
        insert_unique(&mut providers, Box::new(stdin));
    }

    Ok(providers)
}
