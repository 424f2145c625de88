//! Report emission.
//!
//! The aggregation state is flattened into one [`ReportRecord`] per
//! `(branch, suite, case)`, rendered fully in memory and written with a
//! single store call. Records are grouped by branch; consumers must not rely
//! on any other ordering.

pub mod json;
pub mod xml;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::aggregate::AggregationState;
use crate::store::{ArtifactStore, StoreError};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report to {bucket}/{key}: {source}")]
    Write {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRecord {
    pub branch: String,
    #[serde(rename = "path")]
    pub suite: String,
    pub class: String,
    pub method: String,
    pub failures: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Xml,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Xml => "xml",
            ReportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Xml => "text/xml",
            ReportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(ReportFormat::Xml),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{other}' (expected xml or json)")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The flattened result of one window run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlakeReport {
    pub window_days: u32,
    pub date: NaiveDate,
    pub records: Vec<ReportRecord>,
}

impl FlakeReport {
    pub fn from_state(state: &AggregationState, window_days: u32, date: NaiveDate) -> Self {
        let records = state
            .iter()
            .flat_map(|(branch, suite, entry)| {
                entry.cases.iter().map(move |(key, counter)| ReportRecord {
                    branch: branch.to_string(),
                    suite: suite.to_string(),
                    class: key.class.clone(),
                    method: key.method.clone(),
                    failures: counter.failures(),
                    total: counter.total(),
                })
            })
            .collect();

        Self {
            window_days,
            date,
            records,
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
        match format {
            ReportFormat::Xml => Ok(xml::render(self).into_bytes()),
            ReportFormat::Json => Ok(json::render(self)?),
        }
    }

    pub fn file_name(&self, format: ReportFormat) -> String {
        report_file_name(self.date, self.window_days, format)
    }
}

/// `DD_MM_YYYY_<days>.<ext>`
pub fn report_file_name(date: NaiveDate, days: u32, format: ReportFormat) -> String {
    format!(
        "{}_{}.{}",
        date.format("%d_%m_%Y"),
        days,
        format.extension()
    )
}

/// Where reports are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDestination {
    pub bucket: String,
    pub prefix: Option<String>,
}

impl ReportDestination {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        self.prefix = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn key(&self, file_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{file_name}"),
            None => file_name.to_string(),
        }
    }
}

/// Render and write a report. Returns the object key written.
pub async fn emit(
    store: &dyn ArtifactStore,
    destination: &ReportDestination,
    report: &FlakeReport,
    format: ReportFormat,
) -> Result<String, ReportError> {
    let body = report.render(format)?;
    let key = destination.key(&report.file_name(format));
    let size = body.len();

    store
        .put(
            &destination.bucket,
            &key,
            Bytes::from(body),
            format.content_type(),
        )
        .await
        .map_err(|source| ReportError::Write {
            bucket: destination.bucket.clone(),
            key: key.clone(),
            source,
        })?;

    info!(
        bucket = %destination.bucket,
        key = %key,
        records = report.records.len(),
        bytes = size,
        "report written"
    );
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junit::{OutcomeRecord, SuiteOutcome};
    use crate::store::{ListEntry, ListScope, ObjectStoreArtifactStore, StoreResult};
    use async_trait::async_trait;

    pub(crate) fn sample_state() -> AggregationState {
        let outcome = |failed_a: bool| SuiteOutcome {
            name: "pilot".into(),
            failed: failed_a,
            records: vec![
                OutcomeRecord {
                    suite: "pilot".into(),
                    class: "pilot.Discovery".into(),
                    method: "TestPush".into(),
                    failed: failed_a,
                },
                OutcomeRecord {
                    suite: "pilot".into(),
                    class: "pilot.Discovery".into(),
                    method: "TestWatch".into(),
                    failed: false,
                },
            ],
        };
        let mut state = AggregationState::new();
        state.fold("master", &[outcome(true)]);
        state.fold("master", &[outcome(false)]);
        state.fold("release-1.1", &[outcome(false)]);
        state
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 2, 5).unwrap()
    }

    #[test]
    fn test_one_record_per_branch_suite_case() {
        let report = FlakeReport::from_state(&sample_state(), 30, date());
        assert_eq!(report.records.len(), 4);

        let push = report
            .records
            .iter()
            .find(|r| r.branch == "master" && r.method == "TestPush")
            .unwrap();
        assert_eq!((push.failures, push.total), (1, 2));
        assert_eq!(push.suite, "pilot");
        assert_eq!(push.class, "pilot.Discovery");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            report_file_name(date(), 30, ReportFormat::Xml),
            "05_02_2019_30.xml"
        );
        assert_eq!(
            report_file_name(date(), 7, ReportFormat::Json),
            "05_02_2019_7.json"
        );
    }

    #[test]
    fn test_destination_prefix_is_normalized() {
        let dest = ReportDestination::new("out").with_prefix("/reports/flaky/");
        assert_eq!(dest.key("a.xml"), "reports/flaky/a.xml");
        assert_eq!(ReportDestination::new("out").with_prefix("/").key("a.xml"), "a.xml");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("XML".parse::<ReportFormat>().unwrap(), ReportFormat::Xml);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Json.content_type(), "application/json");
    }

    #[tokio::test]
    async fn test_emit_writes_single_document() {
        let store = ObjectStoreArtifactStore::memory();
        let report = FlakeReport::from_state(&sample_state(), 7, date());
        let dest = ReportDestination::new("istio-flakey-test").with_prefix("reports");

        let key = emit(&store, &dest, &report, ReportFormat::Xml).await.unwrap();
        assert_eq!(key, "reports/05_02_2019_7.xml");

        let body = store.get("istio-flakey-test", &key).await.unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.starts_with("<?xml"));
        assert_eq!(text.matches("<testcase ").count(), 4);
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl ArtifactStore for ReadOnlyStore {
        async fn list(&self, _: &str, _: &str, _: ListScope) -> StoreResult<Vec<ListEntry>> {
            Ok(Vec::new())
        }

        async fn get(&self, _: &str, key: &str) -> StoreResult<Bytes> {
            Err(StoreError::NotFound { key: key.into() })
        }

        async fn put(&self, _: &str, _: &str, _: Bytes, _: &str) -> StoreResult<()> {
            Err(StoreError::AccessDenied {
                message: "bucket is read-only".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let report = FlakeReport::from_state(&sample_state(), 7, date());
        let err = emit(
            &ReadOnlyStore,
            &ReportDestination::new("out"),
            &report,
            ReportFormat::Json,
        )
        .await
        .unwrap_err();

        match err {
            ReportError::Write { bucket, key, source } => {
                assert_eq!(bucket, "out");
                assert_eq!(key, "05_02_2019_7.json");
                assert!(matches!(source, StoreError::AccessDenied { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
