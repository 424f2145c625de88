//! Per-branch, per-suite and per-case pass/fail counters.
//!
//! ```text
//! AggregationState
//!   branch -> suite name -> SuiteEntry { counter, cases: CaseKey -> Counter }
//! ```
//!
//! A suite's counter moves once per artifact. Its failure count follows the
//! suite's own `failures` attribute, independently of which cases were
//! flagged. Counters only ever grow through [`Counter::record`], which keeps
//! `failures <= total`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::junit::SuiteOutcome;

/// Occurrence counts. `failures <= total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counter {
    failures: u64,
    total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    /// Never failed.
    Passing,
    /// Both passed and failed.
    Flaky,
    /// Failed every time.
    Failing,
}

impl Counter {
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn record(&mut self, failed: bool) {
        self.total += 1;
        if failed {
            self.failures += 1;
        }
    }

    pub fn stability(&self) -> Stability {
        if self.failures == 0 {
            Stability::Passing
        } else if self.failures < self.total {
            Stability::Flaky
        } else {
            Stability::Failing
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaseKey {
    pub suite: String,
    pub class: String,
    pub method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteEntry {
    pub counter: Counter,
    pub cases: BTreeMap<CaseKey, Counter>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub branches: usize,
    pub suites: usize,
    pub cases: usize,
    pub flaky_cases: usize,
}

/// The mutable state of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationState {
    branches: BTreeMap<String, BTreeMap<String, SuiteEntry>>,
}

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one artifact's suites into the state.
    ///
    /// Suites sharing a name inside the artifact are one occurrence: the
    /// suite failed if any of them reported failures, and their records are
    /// counted together.
    pub fn fold(&mut self, branch: &str, outcomes: &[SuiteOutcome]) {
        let mut grouped: BTreeMap<&str, (bool, Vec<&SuiteOutcome>)> = BTreeMap::new();
        for outcome in outcomes {
            let group = grouped.entry(outcome.name.as_str()).or_default();
            group.0 |= outcome.failed;
            group.1.push(outcome);
        }
        if grouped.is_empty() {
            return;
        }

        let suites = self.branches.entry(branch.to_string()).or_default();
        for (name, (failed, parts)) in grouped {
            let entry = suites.entry(name.to_string()).or_default();
            entry.counter.record(failed);
            for record in parts.iter().flat_map(|p| &p.records) {
                let key = CaseKey {
                    suite: name.to_string(),
                    class: record.class.clone(),
                    method: record.method.clone(),
                };
                entry.cases.entry(key).or_default().record(record.failed);
            }
        }
    }

    /// Fold the suites of several artifacts from one branch.
    pub fn fold_all<'a, I>(&mut self, branch: &str, artifacts: I)
    where
        I: IntoIterator<Item = &'a [SuiteOutcome]>,
    {
        for outcomes in artifacts {
            self.fold(branch, outcomes);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.branches.keys().map(String::as_str)
    }

    pub fn suite(&self, branch: &str, suite: &str) -> Option<&SuiteEntry> {
        self.branches.get(branch)?.get(suite)
    }

    pub fn case(&self, branch: &str, suite: &str, class: &str, method: &str) -> Option<Counter> {
        let key = CaseKey {
            suite: suite.to_string(),
            class: class.to_string(),
            method: method.to_string(),
        };
        self.suite(branch, suite)?.cases.get(&key).copied()
    }

    /// Every `(branch, suite, entry)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &SuiteEntry)> {
        self.branches.iter().flat_map(|(branch, suites)| {
            suites
                .iter()
                .map(move |(suite, entry)| (branch.as_str(), suite.as_str(), entry))
        })
    }

    pub fn stats(&self) -> AggregationStats {
        let mut stats = AggregationStats {
            branches: self.branches.len(),
            ..AggregationStats::default()
        };
        for (_, _, entry) in self.iter() {
            stats.suites += 1;
            stats.cases += entry.cases.len();
            stats.flaky_cases += entry
                .cases
                .values()
                .filter(|c| c.stability() == Stability::Flaky)
                .count();
        }
        stats
    }
}
