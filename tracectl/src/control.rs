// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing configuration: a level per registered target, tag-based overrides and the
//! installation of the global subscriber.

use ordermap::OrderMap;
use std::str::FromStr;
#[allow(unused)]
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::LevelFilter;
use crate::targets::{LOG_TARGETS, LogTarget};
use crate::trace_target;

trace_target!("tracectl", LevelFilter::INFO, &[]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceCtlError {
    #[error("Invalid syntax '{0}': it should be tag=loglevel")]
    Syntax(String),
    #[error("Invalid level '{0}': expected one of off,error,warn,info,debug,trace")]
    Level(String),
    #[error("No tracing target has tag '{0}'")]
    UnknownTag(String),
    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: Vec<&'static str>,
}
impl TargetCfg {
    fn new(decl: &LogTarget) -> Self {
        // a target can always be referred to by its name
        let mut tags = decl.tags.to_vec();
        if !tags.contains(&decl.name) {
            tags.push(decl.name);
        }
        Self {
            target: decl.target,
            name: decl.name,
            level: decl.level,
            tags,
        }
    }
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The tracing levels of every target linked into the binary, plus the level applied to
/// events from anything else.
#[derive(Debug)]
pub struct TraceCtl {
    pub(crate) level: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
}

impl TraceCtl {
    /// Build a configuration from the link-time registry of targets.
    #[must_use]
    pub fn new(level: LevelFilter) -> Self {
        let mut ctl = Self {
            level,
            targets: OrderMap::new(),
        };
        for decl in LOG_TARGETS {
            if let Some(prior) = ctl.targets.insert(decl.target, TargetCfg::new(decl)) {
                warn!("Target {} has been multiply defined!", prior.target);
            }
        }
        ctl
    }

    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.level
    }
    pub fn set_default_level(&mut self, level: LevelFilter) {
        self.level = level;
    }
    pub fn set_level_all(&mut self, level: LevelFilter) {
        for target in self.targets.values_mut() {
            target.level = level;
        }
    }

    /// Set the level of all the targets carrying `tag`. Returns how many targets carry it.
    pub fn set_tag_level(&mut self, tag: &str, level: LevelFilter) -> usize {
        let mut matched = 0;
        for target in self.targets.values_mut() {
            if target.tags.contains(&tag) {
                target.level = level;
                matched += 1;
            }
        }
        matched
    }

    #[must_use]
    pub fn target(&self, target: &str) -> Option<&TargetCfg> {
        self.targets.get(target)
    }
    #[must_use]
    pub fn target_by_name(&self, name: &str) -> Option<&TargetCfg> {
        self.targets.values().find(|t| t.name == name)
    }

    /// Parse a string made of comma-separated tag=level, where level=off,error,warn,info,debug,trace
    fn parse_config(input: &str) -> Result<OrderMap<String, LevelFilter>, TraceCtlError> {
        let mut result = OrderMap::new();
        for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let Some((tag, level)) = item.split_once('=') else {
                return Err(TraceCtlError::Syntax(item.to_string()));
            };
            let level = LevelFilter::from_str(level.trim())
                .map_err(|_| TraceCtlError::Level(level.trim().to_string()))?;
            result.insert(tag.trim().to_string(), level);
        }
        Ok(result)
    }

    /// Apply a configuration string such as `default=error,all=info,cgnat=debug`. `default`
    /// sets the level for unregistered targets, `all` sets every registered target, and any
    /// other key is a tag; later tags override `all`.
    ///
    /// # Errors
    ///
    /// Fails on malformed items, unknown levels and tags no target carries. Nothing is changed
    /// when an error is returned.
    pub fn setup_from_string(&mut self, input: &str) -> Result<(), TraceCtlError> {
        let config = Self::parse_config(input)?;
        if let Some(unknown) = config.keys().find(|tag| {
            *tag != "default"
                && *tag != "all"
                && !self.targets.values().any(|t| t.tags.contains(&tag.as_str()))
        }) {
            return Err(TraceCtlError::UnknownTag(unknown.clone()));
        }

        if let Some(level) = config.get("default") {
            self.set_default_level(*level);
        }
        if let Some(level) = config.get("all") {
            self.set_level_all(*level);
        }
        for (tag, level) in config.iter().filter(|(t, _)| *t != "default" && *t != "all") {
            self.set_tag_level(tag, *level);
        }
        Ok(())
    }

    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new(self.level.to_string());
        for target in self.targets.values() {
            if let Ok(directive) = format!("{}={}", target.target, target.level).parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }

    /// Render the configuration as a string that [`TraceCtl::setup_from_string`] accepts.
    #[must_use]
    pub fn as_config_string(&self) -> String {
        let mut out = format!("default={}", self.level);
        for target in self.targets.values() {
            out += format!(",{}={}", target.name, target.level).as_str();
        }
        out
    }

    /// Install the global subscriber. Logs go to stderr so that stdout stays usable for
    /// generated output.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already installed.
    pub fn install(&self) -> Result<(), TraceCtlError> {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(false)
            .with_level(true);
        tracing_subscriber::registry()
            .with(self.env_filter())
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TraceCtlError::Init(e.to_string()))?;
        debug!("Tracing initialized: {}", self.as_config_string());
        Ok(())
    }
}
