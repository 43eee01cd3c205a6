// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display implementations

use crate::control::{TargetCfg, TraceCtl};
use std::fmt::Display;

macro_rules! TARGET_FMT {
    () => {
        "{:>16} │ {:>8} │ {:<40} │ {}"
    };
}

impl Display for TargetCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            format_args!(
                TARGET_FMT!(),
                self.name,
                self.level,
                self.target,
                self.tags.join(",")
            )
        )
    }
}

impl Display for TraceCtl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "──────── Tracing configuration per target ────────")?;
        writeln!(
            f,
            "{}",
            format_args!(TARGET_FMT!(), "NAME", "LEVEL", "TARGET", "TAGS")
        )?;
        for target in self.targets.values() {
            writeln!(f, "{target}")?;
        }
        write!(
            f,
            "{}",
            format_args!(TARGET_FMT!(), "(default)", self.level, "--", "--")
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{LevelFilter, TraceCtl};

    #[test]
    fn test_display_lists_targets() {
        let ctl = TraceCtl::new(LevelFilter::WARN);
        let out = ctl.to_string();
        assert!(out.contains("natplan_tracectl::control"));
        assert!(out.lines().last().unwrap().contains("(default)"));
        assert!(out.lines().last().unwrap().contains(&LevelFilter::WARN.to_string()));
    }
}
