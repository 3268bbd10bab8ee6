//! Sliding-window event rates over timestamped traces.
//!
//! Each trace is replayed through a discrete-event simulation: the events
//! drive a virtual clock, and one [`estimator::RateEstimator`] per configured
//! resolution rotates on its own schedule on that same clock. The rate
//! sampled at each event is the number of events in the trailing window.

pub mod cli;
pub mod config;
pub mod estimator;
pub mod output;
pub mod pipeline;
pub mod replay;
pub mod sim;
pub mod trace;
