// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Link-time list of the tracing targets of every crate in the binary. Each crate adds its own
//! entry with [`trace_target!`] and [`crate::TraceCtl`] collects them at startup.

use crate::LevelFilter;
use linkme::distributed_slice;

/// One registry entry. `target` is the module path events come from; `name` is how the
/// command line refers to it.
#[derive(Debug)]
pub struct LogTarget {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: &'static [&'static str],
}
impl LogTarget {
    pub const fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}

#[distributed_slice]
pub static LOG_TARGETS: [LogTarget];

#[macro_export]
/// Declare the tracing target of the calling module, its short name, default level and tags
macro_rules! trace_target {
    // anonymous const: every expansion gets its own `LOG_TGT`
    ($name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            use linkme::distributed_slice;
            use $crate::LevelFilter;
            use $crate::targets::{LOG_TARGETS, LogTarget};

            #[distributed_slice(LOG_TARGETS)]
            static LOG_TGT: LogTarget = LogTarget::new(module_path!(), $name, $level, $tags);
        };
    };
}
