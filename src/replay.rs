use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{ConfigError, Resolution};
use crate::estimator::RateEstimator;
use crate::sim::{Scheduler, SimError, TaskId};
use crate::trace::TraceEvent;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("trace out of order at event {index}: expected clock at {expected}s, clock is at {clock}s")]
    OrderingViolation { index: usize, expected: f64, clock: f64 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Rate samples for one resolution, one value per trace event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateColumn {
    pub name: String,
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayStats {
    pub events_recorded: usize,
    pub rotations: Vec<u64>,
    pub final_clock: f64,
}

#[derive(Debug, Clone, Copy)]
enum Task {
    Rotate(usize),
    Drive,
}

struct Lane {
    name: String,
    estimator: RateEstimator,
    rotations: u64,
    rates: Vec<u64>,
}

/// Replays one time-ordered trace against a fixed set of resolutions.
///
/// Every resolution gets its own periodic rotation task on a shared
/// [`Scheduler`]; the driver task wakes at each event timestamp, records the
/// event into every estimator and samples its rate. Rotation tasks are
/// registered before the driver, so rotations due at an event's timestamp
/// have already fired when the event is recorded.
pub struct TraceReplayer {
    events: Vec<TraceEvent>,
    lanes: Vec<Lane>,
    scheduler: Scheduler,
    tasks: Vec<Task>,
    driver: TaskId,
    cursor: usize,
}

impl TraceReplayer {
    pub fn new(events: Vec<TraceEvent>, resolutions: &[Resolution]) -> Result<Self, ReplayError> {
        let mut scheduler = Scheduler::new();
        let mut lanes = Vec::with_capacity(resolutions.len());
        let mut tasks = Vec::with_capacity(resolutions.len() + 1);

        for (i, resolution) in resolutions.iter().enumerate() {
            let estimator = RateEstimator::from_resolution(resolution)?;
            let task = scheduler.register();
            debug_assert_eq!(task.index(), tasks.len());
            scheduler.schedule_at(task, estimator.rotation_time(1))?;
            tasks.push(Task::Rotate(i));
            lanes.push(Lane {
                name: resolution.name.clone(),
                estimator,
                rotations: 0,
                rates: Vec::with_capacity(events.len()),
            });
        }

        let driver = scheduler.register();
        tasks.push(Task::Drive);
        if let Some(first) = events.first() {
            scheduler.schedule_at(driver, first.relative_time_sec as f64)?;
        }

        Ok(Self {
            events,
            lanes,
            scheduler,
            tasks,
            driver,
            cursor: 0,
        })
    }

    /// Runs the simulation until the driver has sampled every event but the last.
    pub fn run(&mut self) -> Result<ReplayStats, ReplayError> {
        if self.events.len() >= 2 {
            while let Some(task) = self.scheduler.next() {
                let kind = self.tasks[task.index()];
                match kind {
                    Task::Rotate(lane) => self.rotate(task, lane)?,
                    Task::Drive => {
                        if !self.drive()? {
                            break;
                        }
                    }
                }
            }
        }

        let stats = ReplayStats {
            events_recorded: self.cursor,
            rotations: self.lanes.iter().map(|l| l.rotations).collect(),
            final_clock: self.scheduler.now(),
        };
        debug!(
            events = stats.events_recorded,
            clock = stats.final_clock,
            "Replay finished"
        );
        Ok(stats)
    }

    fn rotate(&mut self, task: TaskId, lane: usize) -> Result<(), ReplayError> {
        let lane = &mut self.lanes[lane];
        lane.estimator.rotate();
        lane.rotations += 1;
        // absolute time of the next rotation, so repeated rotations do not accumulate drift
        let next_at = lane.estimator.rotation_time(lane.rotations + 1);
        trace!(lane = %lane.name, clock = self.scheduler.now(), rate = lane.estimator.current_rate(), "Rotated");
        self.scheduler.schedule_at(task, next_at)?;
        Ok(())
    }

    /// Samples the event under the cursor and sleeps until the next one.
    /// Returns `false` once the driver has reached the final event, which has
    /// no successor to look ahead to and is left unsampled.
    fn drive(&mut self) -> Result<bool, ReplayError> {
        let now = self.scheduler.now();
        let expected = self.events[self.cursor].relative_time_sec as f64;
        if now != expected {
            return Err(ReplayError::OrderingViolation {
                index: self.cursor,
                expected,
                clock: now,
            });
        }

        let next = self.cursor + 1;
        if next == self.events.len() {
            return Ok(false);
        }

        for lane in &mut self.lanes {
            lane.estimator.record(1);
            lane.rates.push(lane.estimator.current_rate());
        }

        let next_at = self.events[next].relative_time_sec as f64;
        if next_at < expected {
            return Err(ReplayError::OrderingViolation {
                index: next,
                expected: next_at,
                clock: now,
            });
        }
        self.scheduler.hold(self.driver, next_at - expected)?;
        self.cursor = next;
        Ok(true)
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Closes every rate column with the trailing 0 for the final event, which
    /// is never sampled, so each column is exactly as long as the trace.
    /// Only meaningful after [`run`](Self::run) has succeeded.
    pub fn finalize(self) -> Vec<RateColumn> {
        let len = self.events.len();
        self.lanes
            .into_iter()
            .map(|mut lane| {
                if len > 0 {
                    lane.rates.push(0);
                }
                debug_assert_eq!(lane.rates.len(), len);
                RateColumn {
                    name: lane.name,
                    values: lane.rates,
                }
            })
            .collect()
    }
}

/// Builds a replayer, runs it and finalizes the columns in one go.
pub fn replay(
    events: Vec<TraceEvent>,
    resolutions: &[Resolution],
) -> Result<(ReplayStats, Vec<RateColumn>), ReplayError> {
    let mut replayer = TraceReplayer::new(events, resolutions)?;
    let stats = replayer.run()?;
    Ok((stats, replayer.finalize()))
}
