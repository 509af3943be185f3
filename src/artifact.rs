//! Artifact files and their descriptors
//!
//! Every dataset is written as one JSON document below the output directory.
//! When compression is enabled for the invocation, each file is gzip
//! compressed, its relative path gains a `.gz` suffix and its descriptor
//! carries `content_encoding: "gzip"`. Without compression the key is absent
//! from the descriptor altogether.

use crate::error::{Error, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Canonical timestamp text for every exported document.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Serialize, Serializer};

    /// Render a timestamp as ISO-8601 with an explicit `+00:00` offset.
    ///
    /// Sub-second precision is printed in microseconds, and omitted
    /// entirely for whole seconds.
    pub fn format(dt: &DateTime<Utc>) -> String {
        if dt.timestamp_subsec_micros() == 0 {
            dt.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
        } else {
            dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
        }
    }

    /// A timestamp that serializes as ISO-8601 text, or `null` when absent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Timestamp(pub Option<DateTime<Utc>>);

    impl Serialize for Timestamp {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serialize(&self.0, serializer)
        }
    }

    /// For use with `#[serde(serialize_with = "iso8601::serialize")]`.
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&format(dt)),
            None => serializer.serialize_none(),
        }
    }
}

/// Kind of exported artifact, as understood by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArtifactType {
    #[serde(rename = "subunit")]
    Subunit,
    #[serde(rename = "subunit-tree")]
    SubunitTree,
    #[serde(rename = "subunit-details")]
    SubunitDetails,
    #[serde(rename = "subunit-stats")]
    SubunitStats,
    #[serde(rename = "dstat")]
    Dstat,
}

impl ArtifactType {
    /// MIME type of the artifact's (uncompressed) content.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactType::Dstat => "text/csv",
            _ => "application/json",
        }
    }
}

/// Encoding applied on top of the artifact's content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Gzip,
}

/// Manifest entry describing one written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Path relative to the output directory.
    pub path: String,
    /// Logical name, usually the provider name.
    pub artifact_name: String,
    pub artifact_type: ArtifactType,
    pub content_type: String,
    /// Whether the front end should treat this as the main dataset.
    pub primary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<ContentEncoding>,
}

/// An open output file, optionally gzip compressed.
enum OutputFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputFile {
    /// Flush all buffered data and, for gzip, write the trailer.
    fn finish(self) -> io::Result<()> {
        match self {
            OutputFile::Plain(mut w) => w.flush(),
            OutputFile::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputFile::Plain(w) => w.write(buf),
            OutputFile::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputFile::Plain(w) => w.flush(),
            OutputFile::Gzip(w) => w.flush(),
        }
    }
}

/// Writes artifacts into an output directory using one compression setting.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    compress: bool,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, compress: bool) -> Self {
        ArtifactWriter {
            output_dir: output_dir.into(),
            compress,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Relative path under which `file_name` is written.
    pub fn relative_path(&self, file_name: &str) -> String {
        if self.compress {
            format!("{}.gz", file_name)
        } else {
            file_name.to_string()
        }
    }

    fn write_with<F>(&self, file_name: &str, fill: F) -> Result<String>
    where
        F: FnOnce(&mut OutputFile) -> io::Result<()>,
    {
        let path = self.relative_path(file_name);
        let full_path = self.output_dir.join(&path);

        let file = File::create(&full_path).map_err(|e| Error::write(&full_path, e))?;
        let mut out = if self.compress {
            OutputFile::Gzip(GzEncoder::new(BufWriter::new(file), Compression::default()))
        } else {
            OutputFile::Plain(BufWriter::new(file))
        };

        fill(&mut out)
            .and_then(|()| out.finish())
            .map_err(|e| Error::write(&full_path, e))?;

        debug!("wrote {}", full_path.display());
        Ok(path)
    }

    /// Serialize `value` as JSON into `file_name`, returning the relative path.
    pub fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<String> {
        let bytes = serde_json::to_vec(value)?;
        self.write_with(file_name, |out| out.write_all(&bytes))
    }

    /// Copy `source` byte for byte into `file_name`, returning the relative path.
    pub fn copy_file(&self, source: &Path, file_name: &str) -> Result<String> {
        let mut input = File::open(source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::SourceNotFound(source.to_path_buf()),
            _ => Error::Io(e),
        })?;
        self.write_with(file_name, |out| io::copy(&mut input, out).map(|_| ()))
    }

    /// Build the manifest descriptor for an artifact written by this writer.
    pub fn build_artifact(
        &self,
        path: String,
        artifact_name: &str,
        artifact_type: ArtifactType,
        primary: bool,
    ) -> Artifact {
        Artifact {
            path,
            artifact_name: artifact_name.to_string(),
            artifact_type,
            content_type: artifact_type.content_type().to_string(),
            primary,
            content_encoding: self.compress.then_some(ContentEncoding::Gzip),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use flate2::read::GzDecoder;
    use serde_json::{json, Value};
    use std::io::Read;
    use tempfile::TempDir;

    fn read_gzip(path: &Path) -> Vec<u8> {
        let mut decoder = GzDecoder::new(File::open(path).unwrap());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_iso8601_whole_seconds() {
        let dt: DateTime<Utc> = DateTime::from_timestamp(1_000_000_000, 0).unwrap();
        assert_eq!(iso8601::format(&dt), "2001-09-09T01:46:40+00:00");
    }

    #[test]
    fn test_iso8601_microseconds() {
        let dt: DateTime<Utc> = DateTime::from_timestamp(1_000_000_000, 123_456_789).unwrap();
        assert_eq!(iso8601::format(&dt), "2001-09-09T01:46:40.123456+00:00");
    }

    #[test]
    fn test_unset_timestamp_serializes_as_null() {
        let value = serde_json::to_value(iso8601::Timestamp(None)).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_uncompressed_descriptor_omits_encoding() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path(), false);
        let path = writer.write_json("x-0-raw.json", &json!([1, 2])).unwrap();
        assert_eq!(path, "x-0-raw.json");
        assert_eq!(
            std::fs::read_to_string(temp.path().join(&path)).unwrap(),
            "[1,2]"
        );

        let artifact = writer.build_artifact(path, "x", ArtifactType::Subunit, true);
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(
            value,
            json!({
                "path": "x-0-raw.json",
                "artifact_name": "x",
                "artifact_type": "subunit",
                "content_type": "application/json",
                "primary": true
            })
        );
        assert!(value.get("content_encoding").is_none());
    }

    #[test]
    fn test_compressed_descriptor_and_content() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path(), true);
        let doc = json!({"count": 2, "failures": []});
        let path = writer.write_json("x-0-stats.json", &doc).unwrap();
        assert_eq!(path, "x-0-stats.json.gz");

        let decoded: Value = serde_json::from_slice(&read_gzip(&temp.path().join(&path))).unwrap();
        assert_eq!(decoded, doc);

        let artifact = writer.build_artifact(path, "x", ArtifactType::SubunitStats, false);
        assert_eq!(artifact.content_encoding, Some(ContentEncoding::Gzip));
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["content_encoding"], json!("gzip"));
        assert_eq!(value["artifact_type"], json!("subunit-stats"));
    }

    #[test]
    fn test_copy_file_is_byte_for_byte() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("dstat-log.csv");
        let content = b"\"time\",\"usr\"\r\n\"08-10 22:01:49\",1.5\r\n";
        std::fs::write(&source, content).unwrap();

        let out_dir = temp.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let plain = ArtifactWriter::new(&out_dir, false);
        let path = plain.copy_file(&source, "dstat.csv").unwrap();
        assert_eq!(std::fs::read(out_dir.join(path)).unwrap(), content);

        let gzip = ArtifactWriter::new(&out_dir, true);
        let path = gzip.copy_file(&source, "dstat.csv").unwrap();
        assert_eq!(path, "dstat.csv.gz");
        assert_eq!(read_gzip(&out_dir.join(path)), content);
    }

    #[test]
    fn test_copy_missing_source() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path(), false);
        let result = writer.copy_file(&temp.path().join("missing.csv"), "dstat.csv");
        assert!(matches!(result, Err(Error::SourceNotFound(_))));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path().join("nope"), false);
        let result = writer.write_json("a.json", &json!({}));
        assert!(matches!(result, Err(Error::Write { .. })));
    }

    #[test]
    fn test_dstat_content_type() {
        assert_eq!(ArtifactType::Dstat.content_type(), "text/csv");
        assert_eq!(ArtifactType::SubunitTree.content_type(), "application/json");
    }
}
