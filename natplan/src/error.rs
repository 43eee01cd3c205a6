// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use cgnat::{AllocParamsBuilderError, JobError};
use std::path::PathBuf;
use thiserror::Error;
use tracectl::TraceCtlError;

/// Errors that abort a run. Jobs that fail to plan are not among them.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid tracing configuration: {0}")]
    Tracing(#[from] TraceCtlError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("Invalid allocation parameters: {0}")]
    Params(#[from] AllocParamsBuilderError),
    #[error("No jobs given: pass --input FILE or a PRIVATE PUBLIC pair")]
    NoJobs,
    #[error("No project name given")]
    NoName,
    #[error("Invalid project name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}
