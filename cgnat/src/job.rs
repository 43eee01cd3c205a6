// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Running several jobs: rows of (private pool, public pool) come from a [`JobSource`], each is
//! planned independently and its outcome handed to a [`ResultSink`]. A job that fails does not
//! stop the others.

use crate::alloc::{AllocationPlan, plan};
use crate::config::AllocParams;
use crate::errors::PlanError;
use crate::mapping::MappingTable;
use crate::rules::RuleScript;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// A (private pool, public pool) pair, as read from the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "private")]
    pub private_pool: String,
    #[serde(rename = "public")]
    pub public_pool: String,
}

impl Job {
    #[must_use]
    pub fn new(private_pool: impl Into<String>, public_pool: impl Into<String>) -> Self {
        Self {
            private_pool: private_pool.into(),
            public_pool: public_pool.into(),
        }
    }

    /// # Errors
    ///
    /// See [`crate::plan`].
    pub fn plan(&self, params: &AllocParams) -> Result<AllocationPlan, PlanError> {
        plan(&self.private_pool, &self.public_pool, params)
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.private_pool.trim(), self.public_pool.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Failed to read jobs: {0}")]
    Source(String),
    #[error("Failed to write results: {0}")]
    Sink(String),
}

/// Where jobs come from
pub trait JobSource {
    /// # Errors
    ///
    /// Fails if the input cannot be read or understood.
    fn jobs(&mut self) -> Result<Vec<Job>, JobError>;
}

impl JobSource for Vec<Job> {
    fn jobs(&mut self) -> Result<Vec<Job>, JobError> {
        Ok(std::mem::take(self))
    }
}

/// The result of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job: Job,
    pub result: Result<AllocationPlan, PlanError>,
}

/// Where outcomes go
pub trait ResultSink {
    /// # Errors
    ///
    /// Fails if the outcome cannot be recorded; this aborts the run.
    fn job_done(&mut self, outcome: &JobOutcome) -> Result<(), JobError>;

    /// Called once after the last job.
    ///
    /// # Errors
    ///
    /// Fails if the results cannot be written.
    fn finish(&mut self) -> Result<(), JobError>;
}

/// Counters for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs_ok: usize,
    pub jobs_failed: usize,
    pub records: usize,
    pub warnings: usize,
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} jobs planned, {} failed, {} hosts mapped, {} warnings",
            self.jobs_ok, self.jobs_failed, self.records, self.warnings
        )
    }
}

/// Plan every job of `source` with `params` and hand the outcomes to `sink`, in input order.
///
/// # Errors
///
/// Fails if the source cannot be read or the sink cannot write. Jobs that fail to plan are
/// reported to the sink and counted, they do not make the run fail.
pub fn run_jobs<S, K>(
    source: &mut S,
    sink: &mut K,
    params: &AllocParams,
) -> Result<RunSummary, JobError>
where
    S: JobSource + ?Sized,
    K: ResultSink + ?Sized,
{
    let jobs = source.jobs()?;
    info!("Planning {} jobs", jobs.len());
    let mut summary = RunSummary::default();
    for job in jobs {
        info!("CGNAT rules for {job}");
        let result = job.plan(params);
        match &result {
            Ok(plan) => {
                summary.jobs_ok += 1;
                summary.records += plan.records().len();
                summary.warnings += plan.warnings().len();
                for warning in plan.warnings() {
                    warn!("{job}: {warning}");
                }
                debug!("{job}: {plan}");
            }
            Err(e) => {
                summary.jobs_failed += 1;
                error!("{job}: {e}");
            }
        }
        sink.job_done(&JobOutcome { job, result })?;
    }
    sink.finish()?;
    info!("{summary}");
    Ok(summary)
}

/// A sink building the rule script and the mapping table of a run in memory.
#[derive(Debug, Clone, Default)]
pub struct PlanCollector {
    script: RuleScript,
    mapping: MappingTable,
    outcomes: usize,
    finished: bool,
}

impl PlanCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
    /// Number of outcomes received so far
    #[must_use]
    pub fn outcomes(&self) -> usize {
        self.outcomes
    }
    /// The full script text, including the trailing mapping comments.
    #[must_use]
    pub fn script(&self) -> String {
        self.script.clone().finish()
    }
}

impl ResultSink for PlanCollector {
    fn job_done(&mut self, outcome: &JobOutcome) -> Result<(), JobError> {
        let job = &outcome.job;
        match &outcome.result {
            Ok(plan) => {
                self.script
                    .push_plan(&job.private_pool, &job.public_pool, plan);
                self.mapping.extend(plan.records());
            }
            Err(e) => self
                .script
                .push_failure(&job.private_pool, &job.public_pool, e),
        }
        self.outcomes += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), JobError> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Job, JobError, JobOutcome, JobSource, PlanCollector, ResultSink, run_jobs};
    use crate::{AllocParams, AllocWarning};
    use tracing_test::traced_test;

    struct FailingSink;
    impl ResultSink for FailingSink {
        fn job_done(&mut self, _outcome: &JobOutcome) -> Result<(), JobError> {
            Err(JobError::Sink("disk full".to_string()))
        }
        fn finish(&mut self) -> Result<(), JobError> {
            Ok(())
        }
    }

    struct BrokenSource;
    impl JobSource for BrokenSource {
        fn jobs(&mut self) -> Result<Vec<Job>, JobError> {
            Err(JobError::Source("no such file".to_string()))
        }
    }

    #[test]
    #[traced_test]
    fn test_failed_job_does_not_stop_run() {
        let mut jobs = vec![
            Job::new("10.0.0.0/26", "203.0.113.0/30"),
            Job::new("10.0.1.0/26", "not-a-network"),
            Job::new("10.0.2.0/27", "203.0.113.8/30"),
            Job::new("10.0.3.0/25", "203.0.113.12/30"),
        ];
        let mut sink = PlanCollector::new();
        let summary = run_jobs(&mut jobs, &mut sink, &AllocParams::default()).unwrap();

        assert_eq!(summary.jobs_ok, 2);
        assert_eq!(summary.jobs_failed, 2);
        assert_eq!(summary.records, 62 + 124);
        assert_eq!(summary.warnings, 0);
        assert_eq!(sink.outcomes(), 4);
        assert!(sink.is_finished());
        assert_eq!(sink.mapping().len(), 186);

        let script = sink.script();
        assert!(script.contains("# CGNAT Rules for 10.0.1.0/26 -> not-a-network\n# Skipped: "));
        assert!(script.contains("# CGNAT Rules for 10.0.2.0/27 -> 203.0.113.8/30\n# Skipped: "));
        assert!(script.contains("src-address=10.0.3.126 to-addresses=203.0.113.14"));
        assert!(logs_contain("not-a-network"));
    }

    #[test]
    #[traced_test]
    fn test_warnings_are_counted_and_logged() {
        let mut jobs = vec![Job::new("10.0.0.0/24", "203.0.113.0/30")];
        let mut sink = PlanCollector::new();
        let summary = run_jobs(&mut jobs, &mut sink, &AllocParams::default()).unwrap();
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.records, 124);
        assert!(logs_contain("Not enough public IPs"));
        assert!(sink.script().contains("# Warning: Not enough public IPs"));
    }

    #[test]
    fn test_source_and_sink_errors() {
        let mut sink = PlanCollector::new();
        assert_eq!(
            run_jobs(&mut BrokenSource, &mut sink, &AllocParams::default()),
            Err(JobError::Source("no such file".to_string()))
        );
        assert!(!sink.is_finished());

        let mut jobs = vec![Job::new("10.0.0.0/26", "203.0.113.0/30")];
        assert_eq!(
            run_jobs(&mut jobs, &mut FailingSink, &AllocParams::default()),
            Err(JobError::Sink("disk full".to_string()))
        );
    }

    #[test]
    fn test_job_outcome_keeps_warnings_as_data() {
        let job = Job::new("10.0.0.0/26", "198.51.100.1/32");
        let params = AllocParams {
            base_port: 65000,
            ..AllocParams::default()
        };
        let plan = job.plan(&params).unwrap();
        assert!(plan.records().is_empty());
        assert!(matches!(
            plan.warnings(),
            [AllocWarning::PortRangeExceeded { .. }]
        ));
        assert_eq!(job.to_string(), "10.0.0.0/26 -> 198.51.100.1/32");
    }
}
