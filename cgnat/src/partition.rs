// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Subnet partitioner: splits a private block into fixed-size sub-blocks, each with its ordered
//! sequence of candidate hosts.

use crate::block::{AddressBlock, HostPolicy};
use crate::errors::PlanError;
use ipnet::{Ipv4AddrRange, Ipv4Net};
use std::fmt::Display;
#[allow(unused)]
use tracing::{debug, trace};

/// Prefix length of the sub-blocks a private pool is split into, unless configured otherwise
pub const DEFAULT_SUB_BLOCK_PREFIX: u8 = 26;

/// One fixed-size slice of the private block. Its hosts are derived from its network and the
/// host policy of the partition it comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubBlock {
    net: Ipv4Net,
    policy: HostPolicy,
    index: usize,
}

impl SubBlock {
    #[must_use]
    pub fn net(&self) -> Ipv4Net {
        self.net
    }
    /// Position of the sub-block within its partition, starting at 0
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
    #[must_use]
    pub fn hosts(&self) -> Ipv4AddrRange {
        self.policy.addresses(self.net)
    }
    #[must_use]
    pub fn host_count(&self) -> u64 {
        self.policy.count(self.net)
    }
}

impl Display for SubBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net)
    }
}

/// The exhaustive, non-overlapping split of a private block into sub-blocks of the same prefix
/// length, in ascending address order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    block: AddressBlock,
    sub_prefix: u8,
    policy: HostPolicy,
}

impl Partition {
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidSubBlockPrefix`] if `sub_prefix` is over 32, and
    /// [`PlanError::UndersizedBlock`] if the block cannot hold a single sub-block.
    pub fn new(
        block: AddressBlock,
        sub_prefix: u8,
        policy: HostPolicy,
    ) -> Result<Self, PlanError> {
        if sub_prefix > 32 {
            return Err(PlanError::InvalidSubBlockPrefix(sub_prefix));
        }
        if block.prefix_len() > sub_prefix {
            return Err(PlanError::UndersizedBlock {
                block: block.net(),
                sub_prefix,
            });
        }
        let partition = Self {
            block,
            sub_prefix,
            policy,
        };
        debug!(
            "Partitioning {block} into {} /{sub_prefix} sub-blocks, {} hosts each ({policy})",
            partition.len(),
            partition.hosts_per_sub_block()
        );
        Ok(partition)
    }

    #[must_use]
    pub fn block(&self) -> AddressBlock {
        self.block
    }
    #[must_use]
    pub fn sub_prefix(&self) -> u8 {
        self.sub_prefix
    }
    #[must_use]
    pub fn policy(&self) -> HostPolicy {
        self.policy
    }

    /// Number of sub-blocks
    #[must_use]
    pub fn len(&self) -> u64 {
        1u64 << (self.sub_prefix - self.block.prefix_len())
    }
    /// A partition always holds at least one sub-block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn hosts_per_sub_block(&self) -> u64 {
        self.iter().next().map_or(0, |sub| sub.host_count())
    }

    /// Iterate over the sub-blocks in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = SubBlock> + '_ {
        // the prefix length was validated in new(), so the split cannot fail
        self.block
            .net()
            .subnets(self.sub_prefix)
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(index, net)| {
                trace!("Sub-block #{index}: {net}");
                SubBlock {
                    net,
                    policy: self.policy,
                    index,
                }
            })
    }
}

/// Parse a private pool and split it into sub-blocks.
///
/// # Errors
///
/// Fails with [`PlanError::InvalidNetwork`] if the pool does not parse, and otherwise as
/// [`Partition::new`].
pub fn partition(
    private_pool: &str,
    sub_prefix: u8,
    policy: HostPolicy,
) -> Result<Partition, PlanError> {
    let block = AddressBlock::parse(private_pool)?;
    Partition::new(block, sub_prefix, policy)
}
