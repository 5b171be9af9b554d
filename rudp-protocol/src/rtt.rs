//! RTT (Round-Trip Time) measurement
//!
//! Every acknowledged message yields one sample: the time between its most
//! recent transmission and the arrival of its acknowledgment.

use std::collections::VecDeque;
use std::time::Duration;

/// Number of raw samples kept for reporting
pub const MAX_RTT_SAMPLES: usize = 1024;

/// RTT estimator
///
/// Tracks RTT measurements and calculates smoothed RTT and variance.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    /// Smoothed RTT (microseconds)
    srtt: f64,
    /// RTT variance (microseconds)
    rtt_var: f64,
    /// Number of samples
    sample_count: u64,
}

impl RttEstimator {
    pub fn new() -> Self {
        RttEstimator {
            srtt: 0.0,
            rtt_var: 0.0,
            sample_count: 0,
        }
    }

    /// Update with a new RTT sample
    pub fn update(&mut self, sample: Duration) {
        let sample = sample.as_micros() as f64;

        if self.sample_count == 0 {
            self.srtt = sample;
            self.rtt_var = sample / 2.0;
        } else {
            let alpha = 0.125;
            let beta = 0.25;

            let error = sample - self.srtt;
            self.srtt += alpha * error;
            self.rtt_var = (1.0 - beta) * self.rtt_var + beta * error.abs();
        }

        self.sample_count += 1;
    }

    /// Smoothed RTT, if any sample was taken
    pub fn srtt(&self) -> Option<Duration> {
        (self.sample_count > 0).then(|| Duration::from_micros(self.srtt as u64))
    }

    /// RTT variance, if any sample was taken
    pub fn rtt_var(&self) -> Option<Duration> {
        (self.sample_count > 0).then(|| Duration::from_micros(self.rtt_var as u64))
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// RTT samples and aggregates
#[derive(Debug, Clone, Default)]
pub struct RttStats {
    recent: VecDeque<Duration>,
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
    estimator: RttEstimator,
}

impl RttStats {
    pub fn record(&mut self, sample: Duration) {
        if self.recent.len() == MAX_RTT_SAMPLES {
            self.recent.pop_front();
        }
        self.recent.push_back(sample);

        self.count += 1;
        self.total += sample;
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = Some(self.max.map_or(sample, |m| m.max(sample)));
        self.estimator.update(sample);
    }

    /// Total number of samples recorded
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Most recent samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = Duration> + '_ {
        self.recent.iter().copied()
    }

    /// Mean over all samples
    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let micros = self.total.as_micros() / self.count as u128;
        Some(Duration::from_micros(micros as u64))
    }

    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    pub fn smoothed(&self) -> Option<Duration> {
        self.estimator.srtt()
    }

    pub fn variance(&self) -> Option<Duration> {
        self.estimator.rtt_var()
    }
}
