// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Allocator: pairs each private sub-block with the next public address and gives every host of
//! the sub-block a sequential range of ports under that address.
//!
//! The allocator is a small state machine fed one sub-block at a time:
//!
//! ```text
//!   Running ──(port space of the public address exhausted)──> SubBlockSkipped
//!   SubBlockSkipped ──(next sub-block serviced)──> Running
//!   Running | SubBlockSkipped ──(public pool exhausted)──> PoolExhausted (terminal)
//! ```
//!
//! Running out of ports only ends the current sub-block: the next one gets a fresh public
//! address. Running out of public addresses ends the whole job, and the sub-blocks left over
//! are dropped.

use crate::block::AddressBlock;
use crate::config::AllocParams;
use crate::errors::PlanError;
use crate::partition::{Partition, SubBlock};
use crate::port::{PortCursor, PortRange};
use ipnet::Ipv4Net;
use std::collections::HashMap;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::num::NonZero;
#[allow(unused)]
use tracing::{debug, trace};

/// State of an [`Allocator`] after the last sub-block it was fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocState {
    /// Every host of the last sub-block got a port range.
    #[default]
    Running,
    /// The last sub-block ran out of ports before all its hosts were served.
    SubBlockSkipped,
    /// No public address was left for a sub-block. Terminal.
    PoolExhausted,
}

/// Non-fatal conditions met while allocating. They are expected in real deployments and are
/// returned to the caller along with the records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocWarning {
    #[error("Not enough public IPs for all /{} subnets: no public address left for {sub_block}", .sub_block.prefix_len())]
    PoolExhausted { sub_block: Ipv4Net },
    #[error("Port range exceeded for {public}. Skipping further hosts of {sub_block}, starting at {host}")]
    PortRangeExceeded {
        public: Ipv4Addr,
        sub_block: Ipv4Net,
        host: Ipv4Addr,
    },
}

/// One private host, the public address it is translated to and its ports under that address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationRecord {
    pub host: Ipv4Addr,
    pub public: Ipv4Addr,
    pub ports: PortRange,
}

/// A public address and the sub-block it was paired with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub sub_block: Ipv4Net,
    pub public: Ipv4Addr,
}

/// The outcome of a job: records in allocation order, and the warnings raised on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    pub(crate) records: Vec<AllocationRecord>,
    pub(crate) warnings: Vec<AllocWarning>,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) dropped: u64,
    pub(crate) state: AllocState,
}

impl AllocationPlan {
    #[must_use]
    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }
    #[must_use]
    pub fn warnings(&self) -> &[AllocWarning] {
        &self.warnings
    }
    /// Sub-blocks that got a public address, in order
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
    #[must_use]
    pub fn serviced_sub_blocks(&self) -> usize {
        self.bindings.len()
    }
    /// Sub-blocks left without a public address when the pool ran out
    #[must_use]
    pub fn dropped_sub_blocks(&self) -> u64 {
        self.dropped
    }
    #[must_use]
    pub fn final_state(&self) -> AllocState {
        self.state
    }
    #[must_use]
    pub fn is_pool_exhausted(&self) -> bool {
        self.state == AllocState::PoolExhausted
    }

    /// Records grouped by public address, each group in allocation order.
    #[must_use]
    pub fn records_by_public(&self) -> HashMap<Ipv4Addr, Vec<&AllocationRecord>> {
        let mut groups: HashMap<Ipv4Addr, Vec<&AllocationRecord>> = HashMap::new();
        for record in &self.records {
            groups.entry(record.public).or_default().push(record);
        }
        groups
    }
}

impl Display for AllocationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hosts mapped over {} public addresses",
            self.records.len(),
            self.bindings.len()
        )?;
        if self.dropped > 0 {
            write!(f, ", {} sub-blocks dropped", self.dropped)?;
        }
        if !self.warnings.is_empty() {
            write!(f, ", {} warnings", self.warnings.len())?;
        }
        Ok(())
    }
}

/// Walks sub-blocks and the public pool in lockstep. The pool is any ordered source of public
/// addresses; each address is used for at most one sub-block.
#[derive(Debug)]
pub struct Allocator<P: Iterator<Item = Ipv4Addr>> {
    pool: P,
    base_port: NonZero<u16>,
    ports_per_user: NonZero<u16>,
    state: AllocState,
    plan: AllocationPlan,
}

impl<P: Iterator<Item = Ipv4Addr>> Allocator<P> {
    #[must_use]
    pub fn new(pool: P, base_port: NonZero<u16>, ports_per_user: NonZero<u16>) -> Self {
        Self {
            pool,
            base_port,
            ports_per_user,
            state: AllocState::Running,
            plan: AllocationPlan::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> AllocState {
        self.state
    }
    #[must_use]
    pub fn records(&self) -> &[AllocationRecord] {
        &self.plan.records
    }

    /// Feed the next sub-block and return the state it leads to. Once the pool is exhausted,
    /// further sub-blocks are ignored.
    pub fn allocate_sub_block(&mut self, sub_block: &SubBlock) -> AllocState {
        if self.state == AllocState::PoolExhausted {
            return self.state;
        }
        let Some(public) = self.pool.next() else {
            debug!("No public address left for sub-block {sub_block}");
            self.plan.warnings.push(AllocWarning::PoolExhausted {
                sub_block: sub_block.net(),
            });
            self.state = AllocState::PoolExhausted;
            return self.state;
        };
        debug!("Sub-block {sub_block} -> {public}");
        self.plan.bindings.push(Binding {
            sub_block: sub_block.net(),
            public,
        });

        let mut ports = PortCursor::new(self.base_port, self.ports_per_user);
        for host in sub_block.hosts() {
            let Some(range) = ports.take() else {
                debug!(
                    "Port range exceeded for {public} at host {host} (would end at {})",
                    ports.next_end()
                );
                self.plan.warnings.push(AllocWarning::PortRangeExceeded {
                    public,
                    sub_block: sub_block.net(),
                    host,
                });
                self.state = AllocState::SubBlockSkipped;
                return self.state;
            };
            trace!("{host} => {public}:{range}");
            self.plan.records.push(AllocationRecord {
                host,
                public,
                ports: range,
            });
        }
        self.state = AllocState::Running;
        self.state
    }

    /// Close the run. `dropped` is the number of sub-blocks that were never serviced.
    #[must_use]
    pub fn finish(mut self, dropped: u64) -> AllocationPlan {
        self.plan.dropped = dropped;
        self.plan.state = self.state;
        self.plan
    }
}

/// Allocate the sub-blocks of `partition` against the addresses of `public`, with the given
/// parameters.
///
/// # Errors
///
/// Fails only if the parameters are invalid.
pub fn allocate(
    partition: &Partition,
    public: &AddressBlock,
    params: &AllocParams,
) -> Result<AllocationPlan, PlanError> {
    let (base_port, ports_per_user) = params.ports()?;
    let mut allocator = Allocator::new(
        public.addresses(params.public_policy),
        base_port,
        ports_per_user,
    );
    let mut visited = 0u64;
    for sub_block in partition.iter() {
        visited += 1;
        if allocator.allocate_sub_block(&sub_block) == AllocState::PoolExhausted {
            break;
        }
    }
    let dropped = match allocator.state() {
        // the sub-block that hit the empty pool is dropped along with the ones after it
        AllocState::PoolExhausted => partition.len() - visited + 1,
        AllocState::Running | AllocState::SubBlockSkipped => 0,
    };
    let plan = allocator.finish(dropped);
    debug!(
        "Allocated {} hosts of {} over {} public addresses, {} warnings",
        plan.records.len(),
        partition.block(),
        plan.bindings.len(),
        plan.warnings.len()
    );
    Ok(plan)
}

/// Run a whole job: parse both pools, split the private one and allocate it.
///
/// # Errors
///
/// Fails with [`PlanError::InvalidNetwork`] if either pool is malformed, and with the other
/// [`PlanError`] variants on undersized pools or bad parameters.
pub fn plan(
    private_pool: &str,
    public_pool: &str,
    params: &AllocParams,
) -> Result<AllocationPlan, PlanError> {
    params.validate()?;
    let private = AddressBlock::parse(private_pool)?;
    let public = AddressBlock::parse(public_pool)?;
    let partition = Partition::new(private, params.sub_block_prefix, params.host_policy)?;
    allocate(&partition, &public, params)
}

#[cfg(test)]
mod test {
    use super::{AllocState, AllocWarning, Allocator, allocate};
    use crate::block::{AddressBlock, HostPolicy};
    use crate::config::AllocParams;
    use crate::partition::partition;
    use std::net::Ipv4Addr;
    use std::num::NonZero;

    fn nz(value: u16) -> NonZero<u16> {
        NonZero::new(value).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        // 2 sub-blocks of 4 addresses, room for 2 hosts per public address
        let parts = partition("10.0.0.0/29", 30, HostPolicy::AllAddresses).unwrap();
        let subs: Vec<_> = parts.iter().collect();
        let pool = [Ipv4Addr::new(192, 0, 2, 1)].into_iter();
        let mut allocator = Allocator::new(pool, nz(1), nz(30000));
        assert_eq!(allocator.state(), AllocState::Running);

        // Running -> SubBlockSkipped: 2 of 4 hosts served
        assert_eq!(allocator.allocate_sub_block(&subs[0]), AllocState::SubBlockSkipped);
        assert_eq!(allocator.records().len(), 2);

        // SubBlockSkipped -> PoolExhausted: no address left for the second sub-block
        assert_eq!(allocator.allocate_sub_block(&subs[1]), AllocState::PoolExhausted);

        // terminal: feeding more sub-blocks changes nothing
        assert_eq!(allocator.allocate_sub_block(&subs[0]), AllocState::PoolExhausted);
        let plan = allocator.finish(1);
        assert_eq!(plan.records().len(), 2);
        assert_eq!(plan.final_state(), AllocState::PoolExhausted);
        assert_eq!(
            plan.warnings(),
            &[
                AllocWarning::PortRangeExceeded {
                    public: Ipv4Addr::new(192, 0, 2, 1),
                    sub_block: "10.0.0.0/30".parse().unwrap(),
                    host: Ipv4Addr::new(10, 0, 0, 2),
                },
                AllocWarning::PoolExhausted {
                    sub_block: "10.0.0.4/30".parse().unwrap()
                },
            ]
        );
    }

    #[test]
    fn test_skipped_sub_block_resumes_running() {
        let parts = partition("10.0.0.0/29", 30, HostPolicy::AllAddresses).unwrap();
        let subs: Vec<_> = parts.iter().collect();
        let pool = [Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)].into_iter();
        let mut allocator = Allocator::new(pool, nz(40000), nz(10000));

        assert_eq!(allocator.allocate_sub_block(&subs[0]), AllocState::SubBlockSkipped);
        assert_eq!(allocator.allocate_sub_block(&subs[1]), AllocState::SubBlockSkipped);
        let plan = allocator.finish(0);
        // 40000-49999, 50000-59999, then 60000-69999 does not fit
        assert_eq!(plan.records().len(), 4);
        assert_eq!(plan.serviced_sub_blocks(), 2);
        assert_eq!(plan.dropped_sub_blocks(), 0);
        assert!(!plan.is_pool_exhausted());
        let publics: Vec<Ipv4Addr> = plan.records().iter().map(|r| r.public).collect();
        assert_eq!(
            publics,
            vec![
                Ipv4Addr::new(192, 0, 2, 1),
                Ipv4Addr::new(192, 0, 2, 1),
                Ipv4Addr::new(192, 0, 2, 2),
                Ipv4Addr::new(192, 0, 2, 2)
            ]
        );
    }

    #[test]
    fn test_all_addresses_public_policy() {
        let parts = partition("10.0.0.0/24", 26, HostPolicy::UsableHosts).unwrap();
        let public = AddressBlock::parse("203.0.113.0/30").unwrap();
        let params = AllocParams {
            public_policy: HostPolicy::AllAddresses,
            ..AllocParams::default()
        };
        let plan = allocate(&parts, &public, &params).unwrap();
        assert_eq!(plan.serviced_sub_blocks(), 4);
        assert!(plan.warnings().is_empty());
        let publics: Vec<Ipv4Addr> = plan.bindings().iter().map(|b| b.public).collect();
        assert_eq!(publics.first(), Some(&Ipv4Addr::new(203, 0, 113, 0)));
        assert_eq!(publics.last(), Some(&Ipv4Addr::new(203, 0, 113, 3)));
    }

    #[test]
    fn test_invalid_params() {
        let parts = partition("10.0.0.0/26", 26, HostPolicy::UsableHosts).unwrap();
        let public = AddressBlock::parse("203.0.113.0/30").unwrap();
        let params = AllocParams {
            ports_per_user: 0,
            ..AllocParams::default()
        };
        assert!(allocate(&parts, &public, &params).is_err());
    }

    #[test]
    fn test_plan_display() {
        let parts = partition("10.0.0.0/24", 26, HostPolicy::UsableHosts).unwrap();
        let public = AddressBlock::parse("203.0.113.0/30").unwrap();
        let plan = allocate(&parts, &public, &AllocParams::default()).unwrap();
        assert_eq!(
            plan.to_string(),
            "124 hosts mapped over 2 public addresses, 2 sub-blocks dropped, 1 warnings"
        );
    }
}
