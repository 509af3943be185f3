//! Converted test result data structures

use crate::artifact::iso8601;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Attachment name carrying the failure traceback.
pub const TRACEBACK: &str = "traceback";

/// Attachment name carrying the skip reason.
pub const REASON: &str = "reason";

/// Named attachments of a single test. A `None` value is an attachment whose
/// content could not be read as text.
pub type Details = BTreeMap<String, Option<String>>;

/// Outcome of a test as presented to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Test passed (including expected failures).
    Success,
    /// Test failed (including unexpected successes).
    Fail,
    /// Test was skipped.
    Skip,
    /// Test started but never reported a final status.
    Unknown,
}

impl TestStatus {
    /// Returns true if this status represents a failure condition.
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Fail)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Success => write!(f, "success"),
            TestStatus::Fail => write!(f, "fail"),
            TestStatus::Skip => write!(f, "skip"),
            TestStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of a single test, as produced by the stream converter.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// Dotted hierarchical test name.
    pub name: String,
    /// Final status.
    pub status: TestStatus,
    /// When the test started, if known.
    pub start: Option<DateTime<Utc>>,
    /// When the test finished, if known.
    pub end: Option<DateTime<Utc>>,
    /// Time between start and end, never negative.
    pub duration: Duration,
    /// Tags attached to the test (e.g. `worker-0`).
    pub tags: Vec<String>,
    /// Named attachments such as `traceback` or `reason`.
    pub details: Details,
}

impl TestResult {
    fn new(name: impl Into<String>, status: TestStatus) -> Self {
        TestResult {
            name: name.into(),
            status,
            start: None,
            end: None,
            duration: Duration::ZERO,
            tags: vec![],
            details: Details::new(),
        }
    }

    /// Create a successful test result
    pub fn success(name: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Success)
    }

    /// Create a failed test result
    pub fn failure(name: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Fail)
    }

    /// Create a skipped test result
    pub fn skip(name: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Skip)
    }

    /// Create a result for a test that never finished
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Unknown)
    }

    /// Set start and end timestamps, deriving the duration.
    pub fn with_timestamps(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self.duration = (end - start).to_std().unwrap_or(Duration::ZERO);
        self
    }

    /// Add a text attachment
    pub fn with_detail(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.details.insert(name.into(), Some(content.into()));
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Text of the named attachment, if present and readable.
    pub fn detail(&self, name: &str) -> Option<&str> {
        self.details.get(name).and_then(|d| d.as_deref())
    }

    /// Duration in fractional seconds, as written to every dataset.
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// A copy of this result without attachments.
    pub fn stripped(&self) -> Self {
        TestResult {
            details: Details::new(),
            ..self.clone()
        }
    }
}

impl Serialize for TestResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TestResult", 6)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("tags", &self.tags)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field(
            "timestamps",
            &[iso8601::Timestamp(self.start), iso8601::Timestamp(self.end)],
        )?;
        state.serialize_field("duration", &self.duration_secs())?;
        state.serialize_field("details", &self.details)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(secs: i64, millis: u32) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, millis * 1_000_000).unwrap()
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TestStatus::Success.to_string(), "success");
        assert_eq!(TestStatus::Fail.to_string(), "fail");
        assert_eq!(TestStatus::Skip.to_string(), "skip");
        assert_eq!(TestStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_status_is_failure() {
        assert!(TestStatus::Fail.is_failure());
        assert!(!TestStatus::Success.is_failure());
        assert!(!TestStatus::Skip.is_failure());
        assert!(!TestStatus::Unknown.is_failure());
    }

    #[test]
    fn test_with_timestamps_derives_duration() {
        let result = TestResult::success("a.b").with_timestamps(at(100, 0), at(101, 500));
        assert_eq!(result.duration, Duration::from_millis(1500));
        assert_eq!(result.duration_secs(), 1.5);
    }

    #[test]
    fn test_negative_span_clamps_to_zero() {
        let result = TestResult::success("a.b").with_timestamps(at(101, 0), at(100, 0));
        assert_eq!(result.duration, Duration::ZERO);
    }

    #[test]
    fn test_stripped_drops_details_only() {
        let result = TestResult::failure("a.b")
            .with_tag("worker-0")
            .with_detail(TRACEBACK, "boom");
        let stripped = result.stripped();
        assert!(stripped.details.is_empty());
        assert_eq!(stripped.tags, vec!["worker-0"]);
        assert_eq!(stripped.status, TestStatus::Fail);
        assert_eq!(result.detail(TRACEBACK), Some("boom"));
    }

    #[test]
    fn test_serialize_raw_entry() {
        let result = TestResult::skip("pkg.mod.Case.test_y")
            .with_timestamps(at(1_000_000_000, 0), at(1_000_000_000, 250))
            .with_tag("worker-1")
            .with_detail(REASON, "not supported");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "pkg.mod.Case.test_y",
                "tags": ["worker-1"],
                "status": "skip",
                "timestamps": ["2001-09-09T01:46:40+00:00", "2001-09-09T01:46:40.250000+00:00"],
                "duration": 0.25,
                "details": {"reason": "not supported"}
            })
        );
    }

    #[test]
    fn test_serialize_missing_timestamps_as_null() {
        let value = serde_json::to_value(TestResult::unknown("a")).unwrap();
        assert_eq!(value["timestamps"], json!([null, null]));
        assert_eq!(value["duration"], json!(0.0));
    }
}
