//! One aggregation run per window.
//!
//! ```text
//! patterns -> resolve -> window filter -> fetch + parse (bounded, unordered)
//!          -> fold (single collector) -> report -> put
//! ```
//!
//! Workers only fetch and parse; the aggregation state is owned by the loop
//! draining their results, so it has exactly one writer. Folding is order
//! independent, which makes the unordered completion harmless.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{AggregationState, AggregationStats};
use crate::branch::BranchPolicy;
use crate::config::{ConfigError, FlakeConfig};
use crate::error::RunError;
use crate::junit::{self, JunitError, SuiteOutcome};
use crate::pattern::PathPattern;
use crate::report::{self, FlakeReport, ReportDestination, ReportFormat};
use crate::resolver::{ObjectRef, PatternResolver};
use crate::store::{ArtifactStore, ObjectStoreArtifactStore};
use crate::window::WindowFilter;

/// What one window run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub window_days: u32,
    pub report_key: String,
    /// Artifacts matched by the patterns.
    pub resolved: usize,
    /// Of those, created inside the window.
    pub in_window: usize,
    pub parsed: usize,
    /// Artifacts dropped because they failed to parse.
    pub skipped: usize,
    pub records: usize,
    pub stats: AggregationStats,
}

pub struct Pipeline {
    store: Arc<dyn ArtifactStore>,
    branches: Arc<dyn BranchPolicy>,
    patterns: Vec<PathPattern>,
    windows: Vec<u32>,
    destination: ReportDestination,
    format: ReportFormat,
    parallel: usize,
    offset: FixedOffset,
}

impl Pipeline {
    pub fn new(config: &FlakeConfig, store: Arc<dyn ArtifactStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            branches: Arc::new(config.branches.clone()),
            patterns: config.patterns.clone(),
            windows: config.windows.clone(),
            destination: config.destination(),
            format: config.format,
            parallel: config.parallel,
            offset: config.utc_offset()?,
        })
    }

    /// Validate `config`, then open its store with one client per bucket
    /// the run touches.
    pub fn from_config(config: &FlakeConfig) -> Result<Self, RunError> {
        config.validate()?;
        let store = ObjectStoreArtifactStore::from_url(
            &config.store,
            &config.buckets(),
            config.retry.clone(),
        )?;
        Ok(Self::new(config, Arc::new(store))?)
    }

    pub fn with_branch_policy(mut self, policy: impl BranchPolicy + 'static) -> Self {
        self.branches = Arc::new(policy);
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// Replace the configured windows. An empty list keeps them.
    pub fn with_windows(mut self, windows: Vec<u32>) -> Self {
        if !windows.is_empty() {
            self.windows = windows;
        }
        self
    }

    /// Calendar date of `now` in the configured offset.
    pub fn report_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Artifacts a run of `days` would fold, without fetching them.
    pub async fn resolve_window(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<ObjectRef>, RunError> {
        Ok(self.discover(days, now).await?.1)
    }

    async fn discover(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<(usize, Vec<ObjectRef>), RunError> {
        let resolver = PatternResolver::new(self.store.as_ref(), self.branches.as_ref())
            .with_concurrency(self.parallel);
        let refs = resolver.resolve(&self.patterns).await?;
        let resolved = refs.len();

        let filter = WindowFilter::with_offset(days, self.offset);
        let in_window: Vec<ObjectRef> = refs
            .into_iter()
            .filter(|r| filter.includes_ref(r, now))
            .collect();

        info!(
            days,
            resolved,
            in_window = in_window.len(),
            cutoff = %filter.cutoff(now),
            "artifacts discovered"
        );
        Ok((resolved, in_window))
    }

    /// Resolve, fold and emit one window. Nothing is written unless every
    /// artifact could be fetched.
    pub async fn run_window(&self, days: u32, now: DateTime<Utc>) -> Result<RunSummary, RunError> {
        let (resolved, refs) = self.discover(days, now).await?;
        let in_window = refs.len();

        let mut state = AggregationState::new();
        let mut parsed = 0;
        let mut skipped = 0;
        let mut records = 0;

        let mut results = stream::iter(refs.iter().map(|object| self.fetch_and_parse(object)))
            .buffer_unordered(self.parallel);

        while let Some(result) = results.next().await {
            let (object, outcome) = result?;
            match outcome {
                Ok(suites) => {
                    parsed += 1;
                    records += suites.iter().map(|s| s.records.len()).sum::<usize>();
                    state.fold(&object.branch, &suites);
                }
                Err(err) => {
                    skipped += 1;
                    warn!(
                        bucket = %object.bucket,
                        key = %object.key,
                        error = %err,
                        "skipping unparsable artifact"
                    );
                }
            }
        }

        let stats = state.stats();
        let document = FlakeReport::from_state(&state, days, self.report_date(now));
        let report_key =
            report::emit(self.store.as_ref(), &self.destination, &document, self.format).await?;

        let summary = RunSummary {
            window_days: days,
            report_key,
            resolved,
            in_window,
            parsed,
            skipped,
            records,
            stats,
        };
        info!(
            days,
            key = %summary.report_key,
            parsed,
            skipped,
            suites = stats.suites,
            cases = stats.cases,
            flaky_cases = stats.flaky_cases,
            "window complete"
        );
        Ok(summary)
    }

    /// Run every configured window in order. Runs are independent: a failed
    /// window does not stop the next one.
    pub async fn run_all(&self, now: DateTime<Utc>) -> Vec<(u32, Result<RunSummary, RunError>)> {
        let mut runs = Vec::with_capacity(self.windows.len());
        for &days in &self.windows {
            let result = self.run_window(days, now).await;
            if let Err(err) = &result {
                warn!(days, error = %err, "window run failed");
            }
            runs.push((days, result));
        }
        runs
    }

    async fn fetch_and_parse<'r>(
        &self,
        object: &'r ObjectRef,
    ) -> Result<(&'r ObjectRef, Result<Vec<SuiteOutcome>, JunitError>), RunError> {
        let bytes = self
            .store
            .get(&object.bucket, &object.key)
            .await
            .map_err(|source| RunError::Fetch {
                bucket: object.bucket.clone(),
                key: object.key.clone(),
                source,
            })?;
        Ok((object, junit::parse(&bytes)))
    }
}
