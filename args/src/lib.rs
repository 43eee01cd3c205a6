// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Command line of the natplan tool

pub use clap::Parser;
use cgnat::config::{DEFAULT_BASE_PORT, DEFAULT_PORTS_PER_USER};
use cgnat::partition::DEFAULT_SUB_BLOCK_PREFIX;
use cgnat::{
    AllocParams, AllocParamsBuilder, AllocParamsBuilderError, HostPolicy, MappingFormat,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_OUTPUT_DIR: &str = "Outputs";

fn parse_delimiter(value: &str) -> Result<u8, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && !c.is_ascii_alphanumeric() && c != '/' => {
            u8::try_from(c).map_err(|e| e.to_string())
        }
        _ => Err(format!("'{value}' is not a single ASCII punctuation or space character")),
    }
}

#[derive(Parser, Debug)]
#[command(name = "natplan")]
#[command(version)]
#[command(about = "Plan CGNAT source-NAT rules from private and public address pools", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct CmdArgs {
    #[arg(
        long,
        short,
        value_name = "FILE",
        conflicts_with = "pools",
        help = "File listing the jobs, one private/public pool pair per line (text or CSV), or a YAML list of {private, public} entries"
    )]
    input: Option<PathBuf>,

    #[arg(
        long,
        value_name = "CHAR",
        requires = "input",
        value_parser = parse_delimiter,
        help = "Field separator of a text input file. Guessed from its first line when absent"
    )]
    delimiter: Option<u8>,

    #[arg(
        long,
        value_name = "DIR",
        default_value = DEFAULT_OUTPUT_DIR,
        help = "Directory the rule script and the mapping table are written to"
    )]
    output_dir: PathBuf,

    #[arg(
        long,
        short,
        value_name = "NAME",
        help = "Base name of the output files. Prompted for when absent"
    )]
    name: Option<String>,

    #[arg(
        long,
        value_name = "PORT",
        default_value_t = DEFAULT_BASE_PORT,
        value_parser = clap::value_parser!(u16).range(1..),
        help = "First port handed out under each public address"
    )]
    base_port: u16,

    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_PORTS_PER_USER,
        value_parser = clap::value_parser!(u16).range(1..),
        help = "Number of ports given to each private host"
    )]
    ports_per_user: u16,

    #[arg(
        long,
        value_name = "LEN",
        default_value_t = DEFAULT_SUB_BLOCK_PREFIX,
        value_parser = clap::value_parser!(u8).range(0..=32),
        help = "Prefix length of the sub-blocks the private pools are split into"
    )]
    sub_block_prefix: u8,

    #[arg(
        long,
        value_name = "POLICY",
        default_value_t = HostPolicy::UsableHosts,
        value_parser = HostPolicy::from_str,
        help = "Private addresses to allocate in each sub-block: usable-hosts or all-addresses"
    )]
    host_policy: HostPolicy,

    #[arg(
        long,
        value_name = "POLICY",
        default_value_t = HostPolicy::UsableHosts,
        value_parser = HostPolicy::from_str,
        help = "Addresses of the public pools to translate to: usable-hosts or all-addresses"
    )]
    public_policy: HostPolicy,

    #[arg(
        long,
        value_name = "FORMAT",
        default_value_t = MappingFormat::Csv,
        value_parser = MappingFormat::from_str,
        help = "Format of the mapping table: csv or yaml"
    )]
    mapping_format: MappingFormat,

    #[arg(
        long,
        default_value_t = false,
        help = "Print the rule script and the mapping table instead of writing files"
    )]
    stdout: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Show configurable tracing targets and exit"
    )]
    show_tracing_targets: bool,

    #[arg(
        long,
        value_name = "tracing configuration",
        help = "Tracing config string as comma-separated sequence of tag=level, with level one in [off,error,warn,info,debug,trace].
Passing default=level sets the default log-level.
Passing all=level allows setting the log-level of all targets to level.
E.g. default=error,all=info,cgnat=debug"
    )]
    tracing: Option<String>,

    #[arg(
        value_name = "PRIVATE PUBLIC",
        num_args = 2,
        help = "A single job given inline: private pool then public pool, e.g. 100.64.0.0/22 203.0.113.0/28"
    )]
    pools: Vec<String>,
}

impl CmdArgs {
    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }
    pub fn delimiter(&self) -> Option<u8> {
        self.delimiter
    }
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn mapping_format(&self) -> MappingFormat {
        self.mapping_format
    }
    pub fn stdout(&self) -> bool {
        self.stdout
    }
    pub fn show_tracing_targets(&self) -> bool {
        self.show_tracing_targets
    }
    pub fn tracing(&self) -> Option<&String> {
        self.tracing.as_ref()
    }

    /// The job given on the command line, if any, as (private, public)
    pub fn inline_job(&self) -> Option<(&str, &str)> {
        match self.pools.as_slice() {
            [private, public] => Some((private.as_str(), public.as_str())),
            _ => None,
        }
    }

    /// Allocation parameters applied to every job of the run
    ///
    /// # Errors
    ///
    /// Fails if the flags do not make valid parameters.
    pub fn alloc_params(&self) -> Result<AllocParams, AllocParamsBuilderError> {
        let params = AllocParamsBuilder::default()
            .base_port(self.base_port)
            .ports_per_user(self.ports_per_user)
            .sub_block_prefix(self.sub_block_prefix)
            .host_policy(self.host_policy)
            .public_policy(self.public_policy)
            .build()?;
        debug!("{params}");
        Ok(params)
    }
}
