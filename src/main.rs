use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use tracerate::cli::{Cli, Commands, OutputFormat, ResolutionArgs};
use tracerate::config::{ConfigError, ResolutionSet};
use tracerate::pipeline::{run_replay, Interrupted, ReplayFailures};
use tracerate::replay::ReplayError;
use tracerate::trace::TraceError;

fn print_resolutions(args: &ResolutionArgs, format: OutputFormat) -> Result<()> {
    let set = ResolutionSet::resolve(&args.resolution, args.config.as_deref())?;
    match format {
        OutputFormat::Text => {
            for r in set.as_slice() {
                println!(
                    "{}\twindow {}s\t{} segments\trotate every {}s",
                    r.name,
                    r.window_seconds,
                    r.segment_count,
                    r.rotation_period()
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&set)?);
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let result: Result<()> = match cli.command {
        Some(Commands::Replay(replay)) => run_replay(replay),
        Some(Commands::Resolutions { resolutions, format }) => print_resolutions(&resolutions, format),
        None => {
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(err) = result {
        let code = exit_code_for_error(&err);
        eprintln!("error: {err:?}");
        std::process::exit(code);
    }
}

fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    // 2: bad trace, 3: bad config, 4: aborted replays, 5: output I/O, 130: interrupted, 1: other
    for cause in err.chain() {
        if cause.is::<TraceError>() {
            return 2;
        }
        if cause.is::<ConfigError>() {
            return 3;
        }
        if cause.is::<ReplayFailures>() {
            return 4;
        }
        if let Some(replay) = cause.downcast_ref::<ReplayError>() {
            return match replay {
                ReplayError::Config(_) => 3,
                _ => 4,
            };
        }
        if cause.is::<Interrupted>() {
            return 130;
        }
        if cause.is::<std::io::Error>() {
            return 5;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_bad_trace() {
        let err = anyhow::Error::from(TraceError::Malformed { line: 3, reason: "x".into() });
        assert_eq!(exit_code_for_error(&err), 2);
    }

    #[test]
    fn exit_code_trace_io_is_input_error() {
        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err = anyhow::Error::from(TraceError::from(io)).context("Loading trace");
        assert_eq!(exit_code_for_error(&err), 2);
    }

    #[test]
    fn exit_code_config() {
        let err = anyhow::Error::from(ConfigError::NoResolutions).context("Resolving resolutions");
        assert_eq!(exit_code_for_error(&err), 3);
    }

    #[test]
    fn exit_code_aborted_replays() {
        let err = anyhow::Error::from(ReplayFailures { failed: 1, total: 3 });
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn exit_code_write_failure() {
        let err = anyhow::Error::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied)).context("Writing x");
        assert_eq!(exit_code_for_error(&err), 5);
    }

    #[test]
    fn exit_code_interrupted() {
        let err = anyhow::Error::from(Interrupted { completed: 1, total: 2 });
        assert_eq!(exit_code_for_error(&err), 130);
    }

    #[test]
    fn exit_code_other() {
        let err = anyhow::anyhow!("other");
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
