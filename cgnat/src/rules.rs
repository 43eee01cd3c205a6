// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Source NAT rule statements, rendered from allocation records and parsed back.
//!
//! Every record yields three statements: a TCP and a UDP port-restricted translation, and a
//! catch-all translation for other protocols:
//!
//! ```text
//! add action=src-nat chain=srcnat protocol=tcp src-address=<host> to-addresses=<public> to-ports=<start>-<end>
//! add action=src-nat chain=srcnat protocol=udp src-address=<host> to-addresses=<public> to-ports=<start>-<end>
//! add action=src-nat chain=srcnat src-address=<host> to-addresses=<public>
//! ```

use crate::alloc::{AllocationPlan, AllocationRecord};
use crate::errors::PlanError;
use crate::port::PortRange;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Section marker selecting the firewall NAT table
pub const NAT_SECTION: &str = "/ip firewall nat";
pub const MAPPING_HEADER: &str = "# Mapping of Private IPs to Public IP and Port Ranges";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleParseError {
    #[error("not an 'add' statement: '{0}'")]
    NotAnAddStatement(String),
    #[error("malformed token '{0}': expected key=value")]
    MalformedToken(String),
    #[error("field '{0}' is given twice")]
    DuplicateField(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid value '{value}' for field '{field}'")]
    InvalidValue { field: &'static str, value: String },
    #[error("port range given without a protocol")]
    PortsWithoutProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `src-nat` statement of the `srcnat` chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NatRule {
    PortForward {
        protocol: Protocol,
        src: Ipv4Addr,
        to: Ipv4Addr,
        ports: PortRange,
    },
    CatchAll {
        src: Ipv4Addr,
        to: Ipv4Addr,
    },
}

impl NatRule {
    /// The three statements implementing one allocation record, in emission order
    #[must_use]
    pub fn for_record(record: &AllocationRecord) -> [NatRule; 3] {
        let port_forward = |protocol| NatRule::PortForward {
            protocol,
            src: record.host,
            to: record.public,
            ports: record.ports,
        };
        [
            port_forward(Protocol::Tcp),
            port_forward(Protocol::Udp),
            NatRule::CatchAll {
                src: record.host,
                to: record.public,
            },
        ]
    }

    /// Recover the allocation record a port-restricted statement was rendered from
    #[must_use]
    pub fn to_record(&self) -> Option<AllocationRecord> {
        match *self {
            NatRule::PortForward { src, to, ports, .. } => Some(AllocationRecord {
                host: src,
                public: to,
                ports,
            }),
            NatRule::CatchAll { .. } => None,
        }
    }

    #[must_use]
    pub fn src(&self) -> Ipv4Addr {
        match *self {
            NatRule::PortForward { src, .. } | NatRule::CatchAll { src, .. } => src,
        }
    }
}

impl Display for NatRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NatRule::PortForward {
                protocol,
                src,
                to,
                ports,
            } => write!(
                f,
                "add action=src-nat chain=srcnat protocol={protocol} src-address={src} to-addresses={to} to-ports={ports}"
            ),
            NatRule::CatchAll { src, to } => write!(
                f,
                "add action=src-nat chain=srcnat src-address={src} to-addresses={to}"
            ),
        }
    }
}

#[derive(Default)]
struct RuleFields<'a> {
    action: Option<&'a str>,
    chain: Option<&'a str>,
    protocol: Option<&'a str>,
    src: Option<&'a str>,
    to: Option<&'a str>,
    ports: Option<&'a str>,
}

impl<'a> RuleFields<'a> {
    fn set(&mut self, key: &str, value: &'a str) -> Result<(), RuleParseError> {
        let slot = match key {
            "action" => &mut self.action,
            "chain" => &mut self.chain,
            "protocol" => &mut self.protocol,
            "src-address" => &mut self.src,
            "to-addresses" => &mut self.to,
            "to-ports" => &mut self.ports,
            other => return Err(RuleParseError::UnknownField(other.to_string())),
        };
        if slot.replace(value).is_some() {
            return Err(RuleParseError::DuplicateField(key.to_string()));
        }
        Ok(())
    }
}

fn expect_value(
    field: &'static str,
    value: Option<&str>,
    expected: &str,
) -> Result<(), RuleParseError> {
    match value {
        None => Err(RuleParseError::MissingField(field)),
        Some(v) if v == expected => Ok(()),
        Some(v) => Err(RuleParseError::InvalidValue {
            field,
            value: v.to_string(),
        }),
    }
}

fn parse_addr(field: &'static str, value: Option<&str>) -> Result<Ipv4Addr, RuleParseError> {
    let value = value.ok_or(RuleParseError::MissingField(field))?;
    value.parse().map_err(|_| RuleParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

impl FromStr for NatRule {
    type Err = RuleParseError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut tokens = input.split_whitespace();
        if tokens.next() != Some("add") {
            return Err(RuleParseError::NotAnAddStatement(input.to_string()));
        }
        let mut fields = RuleFields::default();
        for token in tokens {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| RuleParseError::MalformedToken(token.to_string()))?;
            fields.set(key, value)?;
        }
        expect_value("action", fields.action, "src-nat")?;
        expect_value("chain", fields.chain, "srcnat")?;
        let src = parse_addr("src-address", fields.src)?;
        let to = parse_addr("to-addresses", fields.to)?;

        let Some(protocol) = fields.protocol else {
            if fields.ports.is_some() {
                return Err(RuleParseError::PortsWithoutProtocol);
            }
            return Ok(NatRule::CatchAll { src, to });
        };
        let protocol = match protocol {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            other => {
                return Err(RuleParseError::InvalidValue {
                    field: "protocol",
                    value: other.to_string(),
                });
            }
        };
        let ports = fields.ports.ok_or(RuleParseError::MissingField("to-ports"))?;
        let ports = ports.parse().map_err(|_| RuleParseError::InvalidValue {
            field: "to-ports",
            value: ports.to_string(),
        })?;
        Ok(NatRule::PortForward {
            protocol,
            src,
            to,
            ports,
        })
    }
}

/// Parse the statements of a script, skipping blank lines, comments and section markers.
///
/// # Errors
///
/// Fails on the first statement that does not parse.
pub fn parse_rules(script: &str) -> Result<Vec<NatRule>, RuleParseError> {
    script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('/'))
        .map(str::parse::<NatRule>)
        .collect()
}

/// A rule script for a whole run: the NAT section marker, then per job a header and its
/// statements, and a trailing comment block listing every record of the run.
#[derive(Debug, Clone)]
pub struct RuleScript {
    text: String,
    mapping: Vec<AllocationRecord>,
}

impl Default for RuleScript {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleScript {
    #[must_use]
    pub fn new() -> Self {
        Self {
            text: format!("{NAT_SECTION}\n"),
            mapping: Vec::new(),
        }
    }

    fn push_header(&mut self, private_pool: &str, public_pool: &str) {
        self.text.push_str(&format!(
            "\n# CGNAT Rules for {} -> {}\n",
            comment_text(private_pool.trim()),
            comment_text(public_pool.trim())
        ));
    }

    pub fn push_plan(&mut self, private_pool: &str, public_pool: &str, plan: &AllocationPlan) {
        self.push_header(private_pool, public_pool);
        for record in plan.records() {
            for rule in NatRule::for_record(record) {
                self.text.push_str(&format!("{rule}\n"));
            }
        }
        for warning in plan.warnings() {
            let warning = comment_text(&warning.to_string());
            self.text.push_str(&format!("# Warning: {warning}\n"));
        }
        self.mapping.extend_from_slice(plan.records());
    }

    /// Record a job that could not be planned, so the script still accounts for its row.
    pub fn push_failure(&mut self, private_pool: &str, public_pool: &str, error: &PlanError) {
        self.push_header(private_pool, public_pool);
        let error = comment_text(&error.to_string());
        self.text.push_str(&format!("# Skipped: {error}\n"));
    }

    #[must_use]
    pub fn records(&self) -> &[AllocationRecord] {
        &self.mapping
    }

    /// Append the mapping comment block and return the script text.
    #[must_use]
    pub fn finish(mut self) -> String {
        self.text.push_str(&format!("\n\n{MAPPING_HEADER}\n"));
        for record in &self.mapping {
            self.text.push_str(&format!(
                "# {} => {}:{}\n",
                record.host, record.public, record.ports
            ));
        }
        self.text
    }
}

/// `text` with its control characters escaped, so that it cannot break out of a comment line.
fn comment_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}
