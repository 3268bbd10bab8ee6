use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Resolution;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a trace file and write per-category rate tables
    Replay(Replay),
    /// Show the effective resolution set
    Resolutions {
        #[command(flatten)]
        resolutions: ResolutionArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Args, Clone, Debug, Default)]
pub struct ResolutionArgs {
    /// Sliding window as NAME=WINDOW_SECONDS:SEGMENTS (repeatable, overrides --config)
    #[arg(long = "resolution", short = 'r', value_name = "NAME=WINDOW:SEGMENTS")]
    pub resolution: Vec<Resolution>,

    /// TOML file with [[resolution]] tables
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
pub struct Replay {
    /// Trace file: one `time_sec category` pair per line
    #[arg(long)]
    pub src_file: PathBuf,

    /// Directory for the per-category .data files
    #[arg(long, default_value = ".")]
    pub out_folder: PathBuf,

    #[command(flatten)]
    pub resolutions: ResolutionArgs,

    /// Number of categories replayed in parallel
    #[arg(long, short = 'j', default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_args_parse() {
        let cli = Cli::try_parse_from([
            "tracerate",
            "replay",
            "--src-file",
            "wc.log",
            "--out-folder",
            "out",
            "-r",
            "1sec=1:1",
            "--resolution",
            "5min=300:30",
            "-j",
            "4",
            "--format",
            "json",
        ])
        .unwrap();
        let Some(Commands::Replay(replay)) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(replay.src_file, PathBuf::from("wc.log"));
        assert_eq!(replay.jobs, 4);
        assert_eq!(replay.format, OutputFormat::Json);
        let names: Vec<&str> = replay.resolutions.resolution.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["1sec", "5min"]);
    }

    #[test]
    fn bad_resolution_is_a_usage_error() {
        let res = Cli::try_parse_from(["tracerate", "replay", "--src-file", "x", "-r", "1sec=1:0"]);
        assert!(res.is_err());
    }

    #[test]
    fn zero_jobs_rejected() {
        let res = Cli::try_parse_from(["tracerate", "replay", "--src-file", "x", "-j", "0"]);
        assert!(res.is_err());
    }
}
