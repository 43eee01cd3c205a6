// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Writing the results of a run: the rule script and the mapping table, either as files named
//! after the project or on stdout.

use cgnat::{JobError, JobOutcome, MappingFormat, PlanCollector, ResultSink};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of the rule script
pub const SCRIPT_EXTENSION: &str = "rsc";

#[derive(Debug, Clone)]
enum Destination {
    Files { dir: PathBuf, name: String },
    Stdout,
}

/// A [`ResultSink`] that collects the whole run in memory and writes it out when the run
/// finishes.
#[derive(Debug)]
pub struct FileSink {
    destination: Destination,
    format: MappingFormat,
    collector: PlanCollector,
    written: Vec<PathBuf>,
}

impl FileSink {
    /// Write `<dir>/<name>.rsc` and `<dir>/<name>.<csv|yaml>`
    pub fn files(dir: impl Into<PathBuf>, name: impl Into<String>, format: MappingFormat) -> Self {
        Self::with_destination(
            Destination::Files {
                dir: dir.into(),
                name: name.into(),
            },
            format,
        )
    }

    /// Print the script, then the mapping table, on stdout
    pub fn stdout(format: MappingFormat) -> Self {
        Self::with_destination(Destination::Stdout, format)
    }

    fn with_destination(destination: Destination, format: MappingFormat) -> Self {
        Self {
            destination,
            format,
            collector: PlanCollector::new(),
            written: Vec::new(),
        }
    }

    /// Files written by [`ResultSink::finish`]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_file(&mut self, path: PathBuf, content: &str) -> Result<(), JobError> {
        std::fs::write(&path, content)
            .map_err(|e| JobError::Sink(format!("{}: {e}", path.display())))?;
        debug!("Wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }

    fn write_files(
        &mut self,
        dir: &Path,
        name: &str,
        script: &str,
        mapping: &str,
    ) -> Result<(), JobError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| JobError::Sink(format!("{}: {e}", dir.display())))?;
        self.write_file(dir.join(format!("{name}.{SCRIPT_EXTENSION}")), script)?;
        let extension = self.format.extension();
        self.write_file(dir.join(format!("{name}.{extension}")), mapping)
    }
}

impl ResultSink for FileSink {
    fn job_done(&mut self, outcome: &JobOutcome) -> Result<(), JobError> {
        self.collector.job_done(outcome)
    }

    fn finish(&mut self) -> Result<(), JobError> {
        self.collector.finish()?;
        let script = self.collector.script();
        let mapping = self
            .collector
            .mapping()
            .render(self.format)
            .map_err(|e| JobError::Sink(e.to_string()))?;
        debug!(
            "Rendered {} mapping rows as {}",
            self.collector.mapping().len(),
            self.format
        );
        match self.destination.clone() {
            Destination::Files { dir, name } => self.write_files(&dir, &name, &script, &mapping),
            Destination::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{script}")
                    .and_then(|()| writeln!(out, "{mapping}"))
                    .map_err(|e| JobError::Sink(format!("stdout: {e}")))
            }
        }
    }
}
