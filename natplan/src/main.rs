// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]

mod error;
mod prompt;
mod sink;
mod source;

use crate::error::CliError;
use crate::prompt::{ask_name, check_name};
use crate::sink::FileSink;
use crate::source::FileSource;

use args::{CmdArgs, Parser};
use cgnat::{Job, JobSource, RunSummary, run_jobs};
use std::process::ExitCode;
use tracectl::{TraceCtl, trace_target};
use tracing::{error, info, level_filters::LevelFilter};

trace_target!("natplan", LevelFilter::INFO, &["cli"]);

fn init_logging(args: &CmdArgs) -> Result<TraceCtl, CliError> {
    let mut tctl = TraceCtl::new(LevelFilter::WARN);
    if let Some(tracing) = args.tracing() {
        tctl.setup_from_string(tracing)?;
    }
    Ok(tctl)
}

fn project_name(args: &CmdArgs) -> Result<String, CliError> {
    match args.name() {
        Some(name) => check_name(name)
            .map(|()| name.to_string())
            .map_err(|reason| CliError::InvalidName {
                name: name.to_string(),
                reason,
            }),
        None => ask_name(&mut std::io::stdin().lock(), &mut std::io::stdout()),
    }
}

fn run(args: &CmdArgs) -> Result<RunSummary, CliError> {
    let mut source: Box<dyn JobSource> = if let Some(path) = args.input() {
        Box::new(FileSource::new(path).with_delimiter(args.delimiter()))
    } else if let Some((private, public)) = args.inline_job() {
        Box::new(vec![Job::new(private, public)])
    } else {
        return Err(CliError::NoJobs);
    };

    let mut sink = if args.stdout() {
        FileSink::stdout(args.mapping_format())
    } else {
        let name = project_name(args)?;
        FileSink::files(args.output_dir(), name, args.mapping_format())
    };

    let params = args.alloc_params()?;
    let summary = run_jobs(source.as_mut(), &mut sink, &params)?;
    for path in sink.written() {
        info!("Wrote {}", path.display());
    }
    Ok(summary)
}

fn main() -> ExitCode {
    /* parse cmd line args */
    let args = CmdArgs::parse();

    /* initialize logging */
    let tctl = match init_logging(&args) {
        Ok(tctl) => tctl,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if args.show_tracing_targets() {
        println!("{tctl}");
        return ExitCode::SUCCESS;
    }
    if let Err(e) = tctl.install() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(summary) => {
            if summary.jobs_failed > 0 {
                info!("{} of the jobs could not be planned, see the script", summary.jobs_failed);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
