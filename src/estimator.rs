use crate::config::{check_window, ConfigError, Resolution};

/// Sliding-window event counter backed by a ring of per-segment counts.
///
/// The estimator has no notion of time. Whoever owns it calls [`rotate`]
/// once every [`rotation_period`] simulated seconds; between rotations
/// [`record`] adds events to the current segment.
///
/// An event recorded at time `t` stays counted for somewhere in
/// `(window - period, window]` seconds, depending on where `t` falls inside
/// its segment. It is always gone `window_seconds` after it was recorded.
///
/// [`rotate`]: RateEstimator::rotate
/// [`record`]: RateEstimator::record
/// [`rotation_period`]: RateEstimator::rotation_period
#[derive(Debug, Clone)]
pub struct RateEstimator {
    window_seconds: f64,
    segments: Vec<u64>,
    head_index: u64,
    running_total: u64,
}

impl RateEstimator {
    pub fn new(window_seconds: f64, segment_count: usize) -> Result<Self, ConfigError> {
        check_window("rate estimator", window_seconds, segment_count)?;
        Ok(Self {
            window_seconds,
            segments: vec![0; segment_count],
            head_index: 0,
            running_total: 0,
        })
    }

    pub fn from_resolution(resolution: &Resolution) -> Result<Self, ConfigError> {
        resolution.validate()?;
        Self::new(resolution.window_seconds, resolution.segment_count)
    }

    fn slot(&self) -> usize {
        (self.head_index % self.segments.len() as u64) as usize
    }

    pub fn record(&mut self, count: u64) {
        let slot = self.slot();
        self.segments[slot] += count;
        self.running_total += count;
    }

    /// Moves the head one segment forward and expires whatever that segment
    /// still holds from `segment_count` rotations ago.
    pub fn rotate(&mut self) {
        self.head_index += 1;
        let expiring = self.slot();
        self.running_total -= self.segments[expiring];
        self.segments[expiring] = 0;
    }

    /// Events counted within the trailing window.
    pub fn current_rate(&self) -> u64 {
        self.running_total
    }

    pub fn rotation_period(&self) -> f64 {
        self.window_seconds / self.segments.len() as f64
    }

    /// Simulated time of the `k`-th rotation, `k * window / segments`.
    ///
    /// Divides once instead of multiplying by the rounded period, so a
    /// rotation that falls on an integer second lands exactly on it.
    pub fn rotation_time(&self, k: u64) -> f64 {
        (k as f64 * self.window_seconds) / self.segments.len() as f64
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn head_index(&self) -> u64 {
        self.head_index
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}
