// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(clippy::module_name_repetitions)]

//! Carrier-Grade NAT (CGNAT) allocation planning
//!
//! This package computes a deterministic source NAT plan for a pool of private addresses and a
//! pool of public addresses: the private pool is split into fixed-size sub-blocks, each
//! sub-block is paired with the next public address, and every host of the sub-block gets its
//! own range of ports under that address. The plan renders as firewall rule statements and as
//! a mapping table.
//!
//! # Example
//!
//! ```
//! use natplan_cgnat::{AllocParams, NatRule, plan};
//!
//! let plan = plan("10.0.0.0/26", "203.0.113.0/30", &AllocParams::default()).unwrap();
//! assert_eq!(plan.records().len(), 62);
//! assert!(plan.warnings().is_empty());
//!
//! let rules = NatRule::for_record(&plan.records()[0]);
//! assert_eq!(
//!     rules[0].to_string(),
//!     "add action=src-nat chain=srcnat protocol=tcp src-address=10.0.0.1 to-addresses=203.0.113.1 to-ports=1-1000"
//! );
//! ```
//!
//! # Exhaustion
//!
//! - When the public pool has no address left for a sub-block, the job stops there: the
//!   remaining sub-blocks are dropped and an [`AllocWarning::PoolExhausted`] is returned.
//! - When the port space of a public address cannot hold another range, the remaining hosts of
//!   that sub-block are skipped with an [`AllocWarning::PortRangeExceeded`], and allocation
//!   goes on with the next sub-block.
//!
//! # Limitations
//!
//! - Only IPv4 pools are supported.

pub mod alloc;
pub mod block;
pub mod config;
pub mod errors;
pub mod job;
pub mod mapping;
pub mod partition;
pub mod port;
pub mod rules;


// re-exports
pub use alloc::{
    AllocState, AllocWarning, AllocationPlan, AllocationRecord, Allocator, allocate, plan,
};
pub use block::{AddressBlock, HostPolicy};
pub use config::{AllocParams, AllocParamsBuilder, AllocParamsBuilderError};
pub use errors::PlanError;
pub use job::{
    Job, JobError, JobOutcome, JobSource, PlanCollector, ResultSink, RunSummary, run_jobs,
};
pub use mapping::{MappingFormat, MappingRow, MappingTable};
pub use partition::{Partition, SubBlock, partition};
pub use port::PortRange;
pub use rules::{NatRule, RuleScript};

use tracectl::trace_target;
trace_target!("cgnat", LevelFilter::INFO, &["nat"]);
