// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors that make a job fail. Pool and port exhaustion are not errors: they are reported as
//! [`crate::AllocWarning`]s alongside the records produced so far.

use ipnet::Ipv4Net;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Invalid network '{pool}': {reason}")]
    InvalidNetwork { pool: String, reason: String },
    #[error("Network {block} is smaller than a single /{sub_prefix} sub-block")]
    UndersizedBlock { block: Ipv4Net, sub_prefix: u8 },
    #[error("Sub-block prefix length {0} is out of range [0, 32]")]
    InvalidSubBlockPrefix(u8),
    #[error("Invalid allocation parameters: {0}")]
    InvalidParams(&'static str),
}

impl PlanError {
    pub(crate) fn invalid_network(pool: &str, reason: impl ToString) -> Self {
        PlanError::InvalidNetwork {
            pool: pool.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Tell if the error is about a malformed or undersized pool, as opposed to bad
    /// allocation parameters.
    #[must_use]
    pub fn is_invalid_network(&self) -> bool {
        matches!(
            self,
            PlanError::InvalidNetwork { .. } | PlanError::UndersizedBlock { .. }
        )
    }
}
