//! Fixtures shared by the integration tests

#![allow(dead_code)]

use stackviz_export::error::Result;
use stackviz_export::ui::UI;
use std::fs;
use std::path::{Path, PathBuf};

/// A UI that captures output instead of printing it
pub struct TestUI {
    pub output: Vec<String>,
    pub errors: Vec<String>,
}

impl TestUI {
    pub fn new() -> Self {
        TestUI {
            output: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl UI for TestUI {
    fn output(&mut self, message: &str) -> Result<()> {
        self.output.push(message.to_string());
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        self.errors.push(message.to_string());
        Ok(())
    }

    fn warning(&mut self, message: &str) -> Result<()> {
        self.errors.push(format!("Warning: {}", message));
        Ok(())
    }
}

/// Create a `.testrepository` below `base` holding `runs` copies of
/// `stream`, returning the repository directory.
pub fn init_repository(base: &Path, runs: usize, stream: &[u8]) -> PathBuf {
    let repo = base.join(".testrepository");
    fs::create_dir_all(&repo).unwrap();
    fs::write(repo.join("format"), "1\n").unwrap();
    fs::write(repo.join("next-stream"), format!("{}\n", runs)).unwrap();
    for i in 0..runs {
        fs::write(repo.join(i.to_string()), stream).unwrap();
    }
    repo
}
