//! Subunit stream conversion
//!
//! Turns a subunit v2 byte stream into the ordered list of [`TestResult`]s
//! that every exported dataset is derived from, and writes such a list back
//! out as a subunit stream.
//!
//! A test is opened by its `inprogress` event and closed by the first
//! terminal status for the same test id. File attachments sent for the test
//! in between are concatenated per attachment name. Tests still open when
//! the stream ends are reported with [`TestStatus::Unknown`].

use crate::error::{Error, Result};
use crate::test_result::{Details, TestResult, TestStatus};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::sync::OnceLock;
use std::time::Duration;
use subunit::io::sync::iter_stream;
use subunit::serialize::Serializable;
use subunit::types::event::Event;
use subunit::types::stream::ScannedItem;
use subunit::types::teststatus::TestStatus as SubunitTestStatus;
use subunit::types::timestamp::Timestamp;

/// Maximum number of consecutive parse errors before giving up on the stream
const MAX_CONSECUTIVE_ERRORS: usize = 100;

/// Convert a subunit timestamp to a chrono DateTime with error context
fn convert_timestamp(timestamp: Timestamp, context: &str) -> Result<DateTime<Utc>> {
    timestamp
        .try_into()
        .map_err(|e| Error::Conversion(format!("Invalid timestamp in {}: {}", context, e)))
}

/// Convert a terminal subunit status to ours (None for non-terminal states)
fn convert_subunit_status(status: SubunitTestStatus) -> Option<TestStatus> {
    match status {
        SubunitTestStatus::Success | SubunitTestStatus::ExpectedFailure => {
            Some(TestStatus::Success)
        }
        SubunitTestStatus::Failed | SubunitTestStatus::UnexpectedSuccess => Some(TestStatus::Fail),
        SubunitTestStatus::Skipped => Some(TestStatus::Skip),
        SubunitTestStatus::Undefined
        | SubunitTestStatus::Enumeration
        | SubunitTestStatus::InProgress => None,
    }
}

/// Strip a trailing attribute list such as `[id-1234,smoke]` from a test id.
pub fn clean_name(test_id: &str) -> &str {
    static ATTRIBUTES: OnceLock<Regex> = OnceLock::new();
    let re = ATTRIBUTES.get_or_init(|| Regex::new(r"\[[^\[\]]*\]$").expect("valid regex"));
    match re.find(test_id) {
        Some(m) => &test_id[..m.start()],
        None => test_id,
    }
}

/// A test seen in the stream that has not reached a terminal status yet.
#[derive(Default)]
struct PendingTest {
    seq: usize,
    started: bool,
    start: Option<DateTime<Utc>>,
    tags: Vec<String>,
    attachments: BTreeMap<String, Vec<u8>>,
}

impl PendingTest {
    fn finish(self, test_id: &str, status: TestStatus, end: Option<DateTime<Utc>>) -> TestResult {
        let start = self.start.or(end);
        let duration = match (start, end) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        };

        // Attachments that are not valid UTF-8 are kept as null entries.
        let details: Details = self
            .attachments
            .into_iter()
            .map(|(name, content)| (name, String::from_utf8(content).ok()))
            .collect();

        TestResult {
            name: clean_name(test_id).to_string(),
            status,
            start,
            end,
            duration,
            tags: self.tags,
            details,
        }
    }
}

/// Convert a subunit stream into test results, in order of completion.
///
/// With `strip_details` set, file attachments are not collected and every
/// result carries an empty details mapping.
///
/// Interleaved non-subunit bytes and isolated corrupt packets are skipped;
/// a long run of unparseable data is reported as [`Error::Conversion`].
pub fn convert_stream<R: Read>(reader: R, strip_details: bool) -> Result<Vec<TestResult>> {
    let mut results = Vec::new();
    let mut pending: HashMap<String, PendingTest> = HashMap::new();
    let mut seq = 0;
    let mut consecutive_errors = 0;

    for item in iter_stream(reader) {
        let event = match item {
            Ok(ScannedItem::Event(event)) => {
                consecutive_errors = 0;
                event
            }
            Ok(ScannedItem::Bytes(_)) => {
                // Non-event data (e.g. print statements from tests)
                consecutive_errors = 0;
                continue;
            }
            Ok(ScannedItem::Unknown(_, _)) | Err(_) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(Error::Conversion(format!(
                        "too many consecutive unparseable items (after {} results)",
                        results.len()
                    )));
                }
                continue;
            }
        };

        let Some(test_id) = event.test_id else {
            continue;
        };
        if event.status == SubunitTestStatus::Enumeration {
            continue;
        }

        let test = pending.entry(test_id.clone()).or_insert_with(|| {
            seq += 1;
            PendingTest {
                seq,
                ..Default::default()
            }
        });

        for tag in event.tags.unwrap_or_default() {
            if !test.tags.contains(&tag) {
                test.tags.push(tag);
            }
        }

        if !strip_details {
            if let Some((name, content)) = event.file.file {
                test.attachments
                    .entry(name)
                    .or_default()
                    .extend_from_slice(&content);
            }
        }

        if event.status == SubunitTestStatus::InProgress {
            test.started = true;
            if let Some(timestamp) = event.timestamp {
                test.start = Some(convert_timestamp(timestamp, "start event")?);
            }
            continue;
        }

        let Some(status) = convert_subunit_status(event.status) else {
            continue;
        };

        let end = match event.timestamp {
            Some(timestamp) => Some(convert_timestamp(timestamp, "end event")?),
            None => None,
        };

        if let Some(test) = pending.remove(&test_id) {
            results.push(test.finish(&test_id, status, end));
        }
    }

    let mut unfinished: Vec<(String, PendingTest)> =
        pending.into_iter().filter(|(_, t)| t.started).collect();
    unfinished.sort_by_key(|(_, t)| t.seq);
    if !unfinished.is_empty() {
        warn!("{} test(s) never reported a final status", unfinished.len());
    }
    for (test_id, test) in unfinished {
        results.push(test.finish(&test_id, TestStatus::Unknown, None));
    }

    debug!("converted {} test result(s)", results.len());
    Ok(results)
}

fn subunit_error(context: &str, name: &str, e: impl std::fmt::Display) -> Error {
    Error::Conversion(format!("Failed to {} for {}: {}", context, name, e))
}

/// Write test results as a subunit stream
///
/// Each result becomes an `inprogress` event at its start time, one event per
/// text attachment, and a terminal event at its end time. Results with
/// [`TestStatus::Unknown`] get no terminal event.
pub fn write_stream<W: Write>(results: &[TestResult], mut writer: W) -> Result<()> {
    for result in results {
        let name = result.name.as_str();

        if let Some(start) = result.start {
            let mut event = Event::new(SubunitTestStatus::InProgress)
                .test_id(name)
                .datetime(start)
                .map_err(|e| subunit_error("set datetime", name, e))?;
            for tag in &result.tags {
                event = event.tag(tag);
            }
            event
                .build()
                .serialize(&mut writer)
                .map_err(|e| subunit_error("write start event", name, e))?;
        }

        for (attachment, content) in &result.details {
            let Some(content) = content else {
                continue;
            };
            Event::new(SubunitTestStatus::Undefined)
                .test_id(name)
                .mime_type("text/plain")
                .file_content(attachment, content.as_bytes())
                .build()
                .serialize(&mut writer)
                .map_err(|e| subunit_error("write attachment", name, e))?;
        }

        let status = match result.status {
            TestStatus::Success => SubunitTestStatus::Success,
            TestStatus::Fail => SubunitTestStatus::Failed,
            TestStatus::Skip => SubunitTestStatus::Skipped,
            TestStatus::Unknown => continue,
        };

        let mut event = Event::new(status).test_id(name);
        if let Some(end) = result.end {
            event = event
                .datetime(end)
                .map_err(|e| subunit_error("set datetime", name, e))?;
        }
        for tag in &result.tags {
            event = event.tag(tag);
        }
        event
            .build()
            .serialize(&mut writer)
            .map_err(|e| subunit_error("write status event", name, e))?;
    }

    writer.flush()?;
    Ok(())
}
