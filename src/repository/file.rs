//! File-based repository implementation
//!
//! Reads the `.testrepository/` format:
//! - format: version file (contains "1")
//! - next-stream: counter for run IDs
//! - 0, 1, 2, ...: individual test run files (subunit format)

use crate::error::{Error, Result};
use crate::repository::{Repository, RepositoryFactory};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

pub const REPOSITORY_FORMAT: &str = "1";
pub const REPO_DIR: &str = ".testrepository";

pub struct FileRepositoryFactory;

impl RepositoryFactory for FileRepositoryFactory {
    fn open(&self, base: &Path) -> Result<Box<dyn Repository>> {
        let repo_path = base.join(REPO_DIR);

        if !repo_path.is_dir() {
            return Err(Error::RepositoryNotFound(repo_path));
        }

        // Verify format
        let format_path = repo_path.join("format");
        if !format_path.exists() {
            return Err(Error::InvalidFormat(format!(
                "Missing format file in {}",
                repo_path.display()
            )));
        }

        let format = fs::read_to_string(&format_path)?.trim().to_string();
        if format != REPOSITORY_FORMAT {
            return Err(Error::InvalidFormat(format!(
                "Unsupported format version: {}",
                format
            )));
        }

        Ok(Box::new(FileRepository { path: repo_path }))
    }
}

pub struct FileRepository {
    path: PathBuf,
}

impl FileRepository {
    fn read_next_stream(&self) -> Result<u64> {
        let content = fs::read_to_string(self.path.join("next-stream"))?;
        content
            .trim()
            .parse()
            .map_err(|e| Error::InvalidFormat(format!("Invalid next-stream: {}", e)))
    }

    fn get_run_path(&self, run_id: &str) -> PathBuf {
        self.path.join(run_id)
    }
}

impl Repository for FileRepository {
    fn path(&self) -> &Path {
        &self.path
    }

    fn list_run_ids(&self) -> Result<Vec<String>> {
        let next_stream = self.read_next_stream()?;
        let mut ids = Vec::new();

        for i in 0..next_stream {
            let id = i.to_string();
            if self.get_run_path(&id).is_file() {
                ids.push(id);
            }
        }

        Ok(ids)
    }

    fn open_run(&self, run_id: &str) -> Result<Box<dyn Read>> {
        let file = File::open(self.get_run_path(run_id))?;
        Ok(Box::new(file))
    }
}
