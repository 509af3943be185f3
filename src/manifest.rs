//! The manifest (`config.json`) describing an export
//!
//! The front end loads this document first and discovers every other file
//! through it, so it is only written once all artifacts exist.

use crate::artifact::Artifact;
use serde::Serialize;
use std::env;

/// File name of the manifest in the output directory.
pub const MANIFEST_FILE: &str = "config.json";

/// Index entry for one exported provider stream, as looked up by id in the
/// front end's dataset service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamEntry {
    /// Position of this stream within the export, starting at 0.
    pub id: usize,
    /// Description of the provider the stream belongs to.
    pub name: String,
    /// Relative path of the raw result list.
    pub raw: String,
    /// Relative path of the name hierarchy.
    pub tree: String,
    /// Relative path of the per-test details.
    pub details: String,
    /// Relative path of the run statistics.
    pub stats: String,
    /// Relative path of the DStat log, when one was exported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dstat: Option<String>,
}

/// Metadata and artifacts of one export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub name: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub ci_username: Option<String>,
    pub pipeline: Option<String>,
    pub change_id: Option<String>,
    pub revision: Option<String>,
    pub change_project: Option<String>,
    pub change_subject: Option<String>,
    pub artifacts: Vec<Artifact>,
}

impl Dataset {
    /// Fill metadata fields from `lookup`, which maps an environment variable
    /// name to its value. Variables without a value leave the field untouched.
    pub fn apply_environment<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields = [
            ("ZUUL_PROJECT", &mut self.change_project),
            ("ZUUL_CHANGE", &mut self.change_id),
            ("ZUUL_PATCHSET", &mut self.revision),
            ("ZUUL_PIPELINE", &mut self.pipeline),
            ("JOB_NAME", &mut self.name),
        ];
        for (variable, slot) in fields {
            if let Some(value) = lookup(variable) {
                *slot = Some(value);
            }
        }
    }

    /// Fill metadata fields from the process environment.
    pub fn apply_process_environment(&mut self) {
        self.apply_environment(|name| env::var(name).ok());
    }
}

/// The complete manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub deployer: bool,
    pub datasets: Vec<Dataset>,
    /// Per-stream index, read at the top level by the front end.
    pub tempest: Vec<StreamEntry>,
}

impl Manifest {
    pub fn new(dataset: Dataset, tempest: Vec<StreamEntry>) -> Self {
        Manifest {
            deployer: false,
            datasets: vec![dataset],
            tempest,
        }
    }
}
