//! Export orchestration
//!
//! For every provider and every stream it holds, the stream is converted
//! once and four datasets are derived from the results:
//!
//! 1. `<name>-<i>-raw.json`: the flattened results without attachments
//!    (primary, `subunit`)
//! 2. `<name>-<i>-tree.json`: the results grouped by dotted name
//!    (`subunit-tree`)
//! 3. `<name>-<i>-details.json`: test name to attachments (`subunit-details`)
//! 4. `<name>-<i>-stats.json`: run statistics (`subunit-stats`)
//!
//! An optional DStat CSV log is copied alongside. The manifest is written
//! last, and not at all if anything before it failed.

use crate::artifact::{Artifact, ArtifactType, ArtifactWriter};
use crate::error::{Error, Result, Stage};
use crate::manifest::{Dataset, Manifest, StreamEntry, MANIFEST_FILE};
use crate::provider::{Provider, Providers};
use crate::stats::compute_stats;
use crate::subunit_stream::convert_stream;
use crate::test_result::{Details, TestResult};
use crate::tree::reorganize;
use crate::ui::UI;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the copied DStat log.
pub const DSTAT_FILE: &str = "dstat.csv";

/// Settings for one export invocation.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Directory receiving all output, created if missing.
    pub output_dir: PathBuf,
    /// Gzip every artifact (the manifest itself stays uncompressed).
    pub compress: bool,
    /// DStat CSV log to copy into the output.
    pub dstat: Option<PathBuf>,
    /// Fill dataset metadata from CI environment variables.
    pub environment: bool,
}

/// Accumulates artifacts for one export invocation.
pub struct Exporter {
    writer: ArtifactWriter,
    dataset: Dataset,
    tempest: Vec<StreamEntry>,
    next_id: usize,
}

impl Exporter {
    /// Start an export into an existing directory.
    pub fn new(output_dir: impl Into<PathBuf>, compress: bool) -> Self {
        Exporter {
            writer: ArtifactWriter::new(output_dir, compress),
            dataset: Dataset::default(),
            tempest: Vec::new(),
            next_id: 0,
        }
    }

    /// Dataset metadata, for filling in fields such as the job name.
    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    /// Descriptors of everything written so far, in order.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.dataset.artifacts
    }

    /// Export every stream of `provider` under `name`.
    pub fn export_provider(
        &mut self,
        name: &str,
        provider: &dyn Provider,
        ui: &mut dyn UI,
    ) -> Result<()> {
        let description = provider.description();
        ui.output(&format!(
            "Exporting provider: {} ({})",
            description,
            provider.count()
        ))?;

        for index in 0..provider.count() {
            let results = provider
                .get_stream(index)
                .and_then(|stream| convert_stream(stream, false))
                .map_err(|e| e.in_stage(name, index, Stage::Convert))?;

            if results.is_empty() {
                ui.warning(&format!("{} stream {} contains no test results", name, index))?;
            }

            self.export_results(name, &description, index, &results)?;
        }

        Ok(())
    }

    /// Write the four datasets for one converted stream.
    ///
    /// Files and artifacts are named after `name`; the stream index entry
    /// is labelled with `description`.
    pub fn export_results(
        &mut self,
        name: &str,
        description: &str,
        index: usize,
        results: &[TestResult],
    ) -> Result<()> {
        let prefix = format!("{}-{}", name, index);
        let in_stage = move |stage: Stage| move |e: Error| e.in_stage(name, index, stage);

        let raw: Vec<TestResult> = results.iter().map(TestResult::stripped).collect();
        let raw_path = self
            .writer
            .write_json(&format!("{}-raw.json", prefix), &raw)
            .map_err(in_stage(Stage::Raw))?;

        let tree_path = self
            .writer
            .write_json(&format!("{}-tree.json", prefix), &reorganize(&raw))
            .map_err(in_stage(Stage::Tree))?;

        let details: BTreeMap<&str, &Details> = results
            .iter()
            .map(|r| (r.name.as_str(), &r.details))
            .collect();
        let details_path = self
            .writer
            .write_json(&format!("{}-details.json", prefix), &details)
            .map_err(in_stage(Stage::Details))?;

        let stats_path = self
            .writer
            .write_json(&format!("{}-stats.json", prefix), &compute_stats(results))
            .map_err(in_stage(Stage::Stats))?;

        debug!(
            "exported {} results ({} failed) for {}",
            results.len(),
            results.iter().filter(|r| r.status.is_failure()).count(),
            prefix
        );

        let artifacts = [
            (raw_path.clone(), ArtifactType::Subunit, true),
            (tree_path.clone(), ArtifactType::SubunitTree, false),
            (details_path.clone(), ArtifactType::SubunitDetails, false),
            (stats_path.clone(), ArtifactType::SubunitStats, false),
        ];
        for (path, artifact_type, primary) in artifacts {
            let artifact = self.writer.build_artifact(path, name, artifact_type, primary);
            self.dataset.artifacts.push(artifact);
        }

        self.tempest.push(StreamEntry {
            id: self.next_id,
            name: description.to_string(),
            raw: raw_path,
            tree: tree_path,
            details: details_path,
            stats: stats_path,
            dstat: None,
        });
        self.next_id += 1;

        Ok(())
    }

    /// Copy a DStat CSV log into the output and reference it from every
    /// stream exported so far.
    pub fn export_dstat(&mut self, path: &Path, ui: &mut dyn UI) -> Result<()> {
        ui.output("Exporting DStat log")?;
        let out_path = self.writer.copy_file(path, DSTAT_FILE)?;
        let artifact_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DSTAT_FILE.to_string());
        let artifact = self
            .writer
            .build_artifact(out_path.clone(), &artifact_name, ArtifactType::Dstat, false);
        self.dataset.artifacts.push(artifact);
        for entry in &mut self.tempest {
            entry.dstat = Some(out_path.clone());
        }
        Ok(())
    }

    /// Write the manifest referencing every exported artifact.
    pub fn finish(self) -> Result<Manifest> {
        let manifest = Manifest::new(self.dataset, self.tempest);
        ArtifactWriter::new(self.writer.output_dir(), false).write_json(MANIFEST_FILE, &manifest)?;
        info!(
            "wrote manifest with {} artifact(s) to {}",
            manifest.datasets[0].artifacts.len(),
            self.writer.output_dir().display()
        );
        Ok(manifest)
    }
}

/// Run a complete export of `providers` as configured by `options`.
///
/// The DStat log is checked before anything is written; the output directory
/// is created if needed.
pub fn export(options: &ExportOptions, providers: &Providers, ui: &mut dyn UI) -> Result<Manifest> {
    if let Some(dstat) = &options.dstat {
        if !dstat.is_file() {
            return Err(Error::SourceNotFound(dstat.clone()));
        }
    }

    fs::create_dir_all(&options.output_dir).map_err(|e| Error::write(&options.output_dir, e))?;

    let mut exporter = Exporter::new(&options.output_dir, options.compress);
    if options.environment {
        exporter.dataset_mut().apply_process_environment();
    }

    for (name, provider) in providers {
        exporter.export_provider(name, provider.as_ref(), ui)?;
    }

    if let Some(dstat) = &options.dstat {
        exporter.export_dstat(dstat, ui)?;
    }

    exporter.finish()
}
