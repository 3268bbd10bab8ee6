use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel as channel;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cli::{OutputFormat, Replay};
use crate::config::{Resolution, ResolutionSet};
use crate::output::{output_path, write_rate_file};
use crate::replay::{replay, ReplayError};
use crate::trace::{load_categories, CategoryTrace};

/// Raised after every other category has finished when at least one replay
/// hit an ordering violation.
#[derive(Debug, Error)]
#[error("{failed} of {total} categories aborted")]
pub struct ReplayFailures {
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Error)]
#[error("interrupted after {completed} of {total} categories")]
pub struct Interrupted {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeakRate {
    pub resolution: String,
    pub peak: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryOutcome {
    Written {
        category: String,
        events: usize,
        span_sec: u64,
        output: PathBuf,
        peaks: Vec<PeakRate>,
    },
    Aborted {
        category: String,
        events: usize,
        reason: String,
    },
}

impl CategoryOutcome {
    pub fn category(&self) -> &str {
        match self {
            CategoryOutcome::Written { category, .. } | CategoryOutcome::Aborted { category, .. } => category,
        }
    }
}

pub fn run_replay(args: Replay) -> Result<()> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    {
        let stop = stop_flag.clone();
        let _ = ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        });
    }

    let resolutions = ResolutionSet::resolve(&args.resolutions.resolution, args.resolutions.config.as_deref())
        .context("Resolving resolutions")?;
    info!(resolutions = ?resolutions.names().collect::<Vec<_>>(), "Using resolutions");

    info!(src = %args.src_file.display(), "Reading input data");
    let categories = load_categories(&args.src_file)
        .with_context(|| format!("Loading trace {}", args.src_file.display()))?;
    info!(categories = categories.len(), "Grouped and sorted by category");

    std::fs::create_dir_all(&args.out_folder)
        .with_context(|| format!("Creating output folder {}", args.out_folder.display()))?;

    let total = categories.len();
    let mut outcomes = replay_categories(
        categories,
        resolutions.as_slice(),
        &args.src_file,
        &args.out_folder,
        usize::from(args.jobs),
        &stop_flag,
    )?;
    outcomes.sort_by(|a, b| a.category().cmp(b.category()));

    print_summary(&outcomes, args.format)?;

    if outcomes.len() < total {
        return Err(Interrupted {
            completed: outcomes.len(),
            total,
        }
        .into());
    }
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, CategoryOutcome::Aborted { .. }))
        .count();
    if failed > 0 {
        return Err(ReplayFailures { failed, total }.into());
    }
    Ok(())
}

/// Replays every category on `jobs` worker threads. Each category owns its
/// own simulation, so results do not depend on the number of workers.
pub fn replay_categories(
    categories: Vec<CategoryTrace>,
    resolutions: &[Resolution],
    src_file: &Path,
    out_folder: &Path,
    jobs: usize,
    stop_flag: &Arc<AtomicBool>,
) -> Result<Vec<CategoryOutcome>> {
    let (work_tx, work_rx) = channel::unbounded::<CategoryTrace>();
    let (done_tx, done_rx) = channel::unbounded::<Result<CategoryOutcome>>();
    for category in categories {
        // receiver is alive until the workers are spawned below
        work_tx.send(category).ok();
    }
    drop(work_tx);

    let mut workers = Vec::with_capacity(jobs);
    for worker in 0..jobs.max(1) {
        let work_rx = work_rx.clone();
        let done_tx = done_tx.clone();
        let stop = stop_flag.clone();
        let resolutions = resolutions.to_vec();
        let src_file = src_file.to_path_buf();
        let out_folder = out_folder.to_path_buf();
        workers.push(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let Ok(trace) = work_rx.recv() else {
                    break;
                };
                let outcome = replay_one(&trace, &resolutions, &src_file, &out_folder);
                if done_tx.send(outcome).is_err() {
                    break;
                }
            }
            tracing::debug!(worker, "Worker exiting");
        }));
    }
    drop(done_tx);

    let mut outcomes = Vec::new();
    let mut first_err = None;
    for outcome in done_rx.iter() {
        match outcome {
            Ok(o) => outcomes.push(o),
            Err(e) => {
                error!(error = %format!("{e:#}"), "Category failed");
                stop_flag.store(true, Ordering::Relaxed);
                first_err.get_or_insert(e);
            }
        }
    }
    for handle in workers {
        if handle.join().is_err() {
            warn!("Replay worker panicked");
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}

/// Ordering violations abort only this category; write failures are fatal.
fn replay_one(
    trace: &CategoryTrace,
    resolutions: &[Resolution],
    src_file: &Path,
    out_folder: &Path,
) -> Result<CategoryOutcome> {
    info!(
        category = %trace.category,
        until = trace.span_sec(),
        samples = trace.len(),
        "Simulating category"
    );

    let (stats, columns) = match replay(trace.events(), resolutions) {
        Ok(done) => done,
        Err(e @ ReplayError::OrderingViolation { .. }) => {
            error!(category = %trace.category, error = %e, "Replay aborted");
            return Ok(CategoryOutcome::Aborted {
                category: trace.category.clone(),
                events: trace.len(),
                reason: e.to_string(),
            });
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Replaying category {}", trace.category));
        }
    };

    let path = output_path(out_folder, src_file, &trace.category);
    write_rate_file(&path, trace, &columns).with_context(|| format!("Writing {}", path.display()))?;
    info!(category = %trace.category, rotations = ?stats.rotations, output = %path.display(), "Wrote rates");

    let peaks = columns
        .iter()
        .map(|c| PeakRate {
            resolution: c.name.clone(),
            peak: c.values.iter().copied().max().unwrap_or(0),
        })
        .collect();
    Ok(CategoryOutcome::Written {
        category: trace.category.clone(),
        events: trace.len(),
        span_sec: trace.span_sec(),
        output: path,
        peaks,
    })
}

fn print_summary(outcomes: &[CategoryOutcome], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for outcome in outcomes {
                match outcome {
                    CategoryOutcome::Written {
                        category,
                        events,
                        span_sec,
                        output,
                        peaks,
                    } => {
                        let peaks = peaks
                            .iter()
                            .map(|p| format!("{}={}", p.resolution, p.peak))
                            .collect::<Vec<_>>()
                            .join(" ");
                        println!("{category}\t{events} events\t{span_sec}s\tpeak {peaks}\t{}", output.display());
                    }
                    CategoryOutcome::Aborted { category, events, reason } => {
                        println!("{category}\t{events} events\taborted: {reason}");
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcomes).context("Serializing summary")?);
        }
    }
    Ok(())
}
