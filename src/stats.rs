//! Run-level statistics
//!
//! A single pass over a run's results produces the stats document consumed
//! by the front end's summary and failure views.

use crate::artifact::iso8601;
use crate::test_result::{TestResult, TestStatus, REASON, TRACEBACK};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Marker that makes the line before the final traceback line worth keeping.
const DETAILS_MARKER: &str = "Details";

/// A failed test and the short message extracted from its traceback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureSummary {
    pub name: String,
    pub duration: f64,
    /// One or two lines from the end of the traceback, if there was one.
    pub details: Option<Vec<String>>,
}

/// A skipped test and its skip reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipSummary {
    pub name: String,
    pub duration: f64,
    pub details: Option<String>,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub count: usize,
    /// Earliest start over all results.
    #[serde(serialize_with = "iso8601::serialize")]
    pub start: Option<DateTime<Utc>>,
    /// Latest end over all results.
    #[serde(serialize_with = "iso8601::serialize")]
    pub end: Option<DateTime<Utc>>,
    /// Sum of the individual durations, in seconds.
    #[serde(serialize_with = "serialize_secs")]
    pub total_duration: Duration,
    pub failures: Vec<FailureSummary>,
    pub skips: Vec<SkipSummary>,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Extract a short failure message from a traceback.
///
/// Takes the last two non-empty lines. The earlier one is only kept when it
/// contains `Details`; otherwise just the final line is returned. Returns
/// `None` when the traceback has no non-empty lines.
pub fn failure_message(traceback: &str) -> Option<Vec<String>> {
    let lines: Vec<&str> = traceback
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    match lines.as_slice() {
        [] => None,
        [last] => Some(vec![last.to_string()]),
        [.., penultimate, last] if penultimate.contains(DETAILS_MARKER) => {
            Some(vec![penultimate.to_string(), last.to_string()])
        }
        [.., last] => Some(vec![last.to_string()]),
    }
}

/// Reduce a run's results to its statistics.
pub fn compute_stats(results: &[TestResult]) -> RunStats {
    let mut start: Option<DateTime<Utc>> = None;
    let mut end: Option<DateTime<Utc>> = None;
    let mut total_duration = Duration::ZERO;
    let mut failures = Vec::new();
    let mut skips = Vec::new();

    for result in results {
        if let Some(entry_start) = result.start {
            if start.map_or(true, |s| entry_start < s) {
                start = Some(entry_start);
            }
        }
        if let Some(entry_end) = result.end {
            if end.map_or(true, |e| entry_end > e) {
                end = Some(entry_end);
            }
        }

        total_duration += result.duration;

        match result.status {
            TestStatus::Fail => failures.push(FailureSummary {
                name: result.name.clone(),
                duration: result.duration_secs(),
                details: result.detail(TRACEBACK).and_then(failure_message),
            }),
            TestStatus::Skip => skips.push(SkipSummary {
                name: result.name.clone(),
                duration: result.duration_secs(),
                details: result.detail(REASON).map(str::to_string),
            }),
            TestStatus::Success | TestStatus::Unknown => {}
        }
    }

    RunStats {
        count: results.len(),
        start,
        end,
        total_duration,
        failures,
        skips,
    }
}
