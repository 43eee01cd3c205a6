// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Address blocks: the private and public pools of a job, and the policy deciding which of
//! their addresses can be handed out.

use crate::errors::PlanError;
use ipnet::{IpNet, Ipv4AddrRange, Ipv4Net};
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Which addresses of a block are candidates for allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HostPolicy {
    /// Exclude the network and broadcast addresses: 62 addresses in a /26. Blocks of length
    /// /31 and /32 have no such pair and yield all their addresses.
    #[default]
    UsableHosts,
    /// Every address of the block, network and broadcast included: 64 addresses in a /26.
    AllAddresses,
}

impl HostPolicy {
    /// The ordered candidate addresses of `net` under this policy.
    #[must_use]
    pub fn addresses(self, net: Ipv4Net) -> Ipv4AddrRange {
        match self {
            HostPolicy::UsableHosts => net.hosts(),
            HostPolicy::AllAddresses => Ipv4AddrRange::new(net.network(), net.broadcast()),
        }
    }

    /// How many addresses [`HostPolicy::addresses`] yields for `net`.
    #[must_use]
    pub fn count(self, net: Ipv4Net) -> u64 {
        let size = 1u64 << (32 - u32::from(net.prefix_len()));
        match self {
            HostPolicy::UsableHosts if net.prefix_len() < 31 => size - 2,
            HostPolicy::UsableHosts | HostPolicy::AllAddresses => size,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HostPolicy::UsableHosts => "usable-hosts",
            HostPolicy::AllAddresses => "all-addresses",
        }
    }
}

impl FromStr for HostPolicy {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "usable-hosts" | "usable" | "hosts" => Ok(HostPolicy::UsableHosts),
            "all-addresses" | "all" => Ok(HostPolicy::AllAddresses),
            other => Err(format!(
                "Unknown host policy '{other}': expected usable-hosts or all-addresses"
            )),
        }
    }
}

impl Display for HostPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An IPv4 CIDR block. The network address is always aligned on the prefix length: blocks
/// with host bits set are rejected rather than silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressBlock(Ipv4Net);

impl AddressBlock {
    /// Parse a pool given as `a.b.c.d/len`. A bare address is taken as a /32.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidNetwork`] if the string is not an IPv4 CIDR block, or if it
    /// has host bits set.
    pub fn parse(pool: &str) -> Result<Self, PlanError> {
        let input = pool.trim();
        let net = match input.parse::<Ipv4Net>() {
            Ok(net) => net,
            Err(e) => {
                if let Ok(addr) = input.parse::<Ipv4Addr>() {
                    Ipv4Net::from(addr)
                } else if let Ok(IpNet::V6(_)) = input.parse::<IpNet>() {
                    return Err(PlanError::invalid_network(
                        pool,
                        "IPv6 pools are not supported",
                    ));
                } else {
                    return Err(PlanError::invalid_network(pool, e));
                }
            }
        };
        if net.trunc() != net {
            return Err(PlanError::invalid_network(
                pool,
                format!("host bits set, did you mean {}?", net.trunc()),
            ));
        }
        Ok(Self(net))
    }

    #[must_use]
    pub fn net(&self) -> Ipv4Net {
        self.0
    }
    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }
    /// Number of addresses the block covers, regardless of any policy
    #[must_use]
    pub fn size(&self) -> u64 {
        HostPolicy::AllAddresses.count(self.0)
    }
    #[must_use]
    pub fn addresses(&self, policy: HostPolicy) -> Ipv4AddrRange {
        policy.addresses(self.0)
    }
}

impl FromStr for AddressBlock {
    type Err = PlanError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        AddressBlock::parse(input)
    }
}

impl From<Ipv4Net> for AddressBlock {
    fn from(net: Ipv4Net) -> Self {
        Self(net.trunc())
    }
}

impl Display for AddressBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::{AddressBlock, HostPolicy};
    use crate::PlanError;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_block() {
        let block = AddressBlock::parse("10.0.0.0/24").unwrap();
        assert_eq!(block.prefix_len(), 24);
        assert_eq!(block.size(), 256);
        assert_eq!(block.to_string(), "10.0.0.0/24");

        // surrounding whitespace, as found in spreadsheet exports
        let block = AddressBlock::parse("  100.64.0.0/10 ").unwrap();
        assert_eq!(block.prefix_len(), 10);

        // bare address
        let block = AddressBlock::parse("203.0.113.7").unwrap();
        assert_eq!(block.prefix_len(), 32);
        assert_eq!(block.size(), 1);
    }

    #[test]
    fn test_parse_block_fail() {
        for pool in ["", "10.0.0.0/33", "10.0.0/24", "not-a-network", "10.0.0.0/"] {
            let err = AddressBlock::parse(pool).unwrap_err();
            assert!(err.is_invalid_network(), "{pool}: {err}");
        }

        let err = AddressBlock::parse("2001:db8::/64").unwrap_err();
        let PlanError::InvalidNetwork { reason, .. } = err else {
            panic!("unexpected error {err}");
        };
        assert!(reason.contains("IPv6"));

        let err = AddressBlock::parse("10.0.0.5/24").unwrap_err();
        let PlanError::InvalidNetwork { reason, .. } = err else {
            panic!("unexpected error {err}");
        };
        assert!(reason.contains("10.0.0.0/24"));
    }

    #[test]
    fn test_host_policy_counts() {
        let net = "10.0.0.64/26".parse().unwrap();
        assert_eq!(HostPolicy::UsableHosts.count(net), 62);
        assert_eq!(HostPolicy::AllAddresses.count(net), 64);
        assert_eq!(HostPolicy::UsableHosts.addresses(net).count(), 62);
        assert_eq!(HostPolicy::AllAddresses.addresses(net).count(), 64);

        let usable: Vec<Ipv4Addr> = HostPolicy::UsableHosts.addresses(net).collect();
        assert_eq!(usable.first(), Some(&Ipv4Addr::new(10, 0, 0, 65)));
        assert_eq!(usable.last(), Some(&Ipv4Addr::new(10, 0, 0, 126)));

        let all: Vec<Ipv4Addr> = HostPolicy::AllAddresses.addresses(net).collect();
        assert_eq!(all.first(), Some(&Ipv4Addr::new(10, 0, 0, 64)));
        assert_eq!(all.last(), Some(&Ipv4Addr::new(10, 0, 0, 127)));

        // no network/broadcast pair to exclude
        for len in [31, 32] {
            let net = format!("10.0.0.0/{len}").parse().unwrap();
            assert_eq!(
                HostPolicy::UsableHosts.count(net),
                HostPolicy::AllAddresses.count(net)
            );
            assert_eq!(
                HostPolicy::UsableHosts.addresses(net).count(),
                usize::try_from(HostPolicy::UsableHosts.count(net)).unwrap()
            );
        }

        // a /30 public pool has two usable addresses
        let net = "203.0.113.0/30".parse().unwrap();
        let usable: Vec<Ipv4Addr> = HostPolicy::UsableHosts.addresses(net).collect();
        assert_eq!(
            usable,
            vec![Ipv4Addr::new(203, 0, 113, 1), Ipv4Addr::new(203, 0, 113, 2)]
        );
    }

    #[test]
    fn test_host_policy_from_str() {
        assert_eq!("usable-hosts".parse(), Ok(HostPolicy::UsableHosts));
        assert_eq!("ALL".parse(), Ok(HostPolicy::AllAddresses));
        assert!("some".parse::<HostPolicy>().is_err());
        assert_eq!(
            HostPolicy::AllAddresses.to_string().parse(),
            Ok(HostPolicy::AllAddresses)
        );
    }
}
