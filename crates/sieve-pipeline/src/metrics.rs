#![forbid(unsafe_code)]

//! Phase measurements and how they combine into a per-query total.

use std::time::{Duration, Instant};

/// Resource figures observed over one phase of a run.
///
/// Latency is always known. The remaining fields are reported only when
/// whoever performed the measurement actually sampled them, so each is
/// optional and missing values drop out of merges instead of reading as
/// zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Measurement {
    pub latency: Duration,
    pub cpu_percent: Option<f64>,
    pub peak_memory_mb: Option<f64>,
    pub avg_memory_mb: Option<f64>,
    pub iops: Option<f64>,
}

impl Measurement {
    pub fn from_latency(latency: Duration) -> Self {
        Measurement {
            latency,
            ..Measurement::default()
        }
    }

    /// Combines measurements of phases that ran back to back.
    ///
    /// Latencies add, peak memory takes the maximum, and the averaged
    /// quantities (cpu, average memory, iops) are weighted by the latency
    /// of each phase that reported them.
    pub fn merge_sequential(phases: &[Measurement]) -> Measurement {
        let latency = phases.iter().map(|m| m.latency).sum();
        let peak_memory_mb = phases
            .iter()
            .filter_map(|m| m.peak_memory_mb)
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            });
        Measurement {
            latency,
            cpu_percent: weighted_mean(phases, |m| m.cpu_percent),
            peak_memory_mb,
            avg_memory_mb: weighted_mean(phases, |m| m.avg_memory_mb),
            iops: weighted_mean(phases, |m| m.iops),
        }
    }
}

fn weighted_mean(phases: &[Measurement], field: impl Fn(&Measurement) -> Option<f64>) -> Option<f64> {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for m in phases {
        if let Some(v) = field(m) {
            let secs = m.latency.as_secs_f64();
            weighted += v * secs;
            weight += secs;
        }
    }
    if weight > 0.0 {
        Some(weighted / weight)
    } else {
        None
    }
}

/// Measures a closure and reports what it observed while it ran.
///
/// The default [`WallClock`] only times the call. A platform-specific
/// implementation can additionally sample memory and io counters.
pub trait Instrument {
    fn measure<T>(&self, f: impl FnOnce() -> T) -> (T, Measurement);
}

/// Instrument that records wall-clock latency and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct WallClock;

impl Instrument for WallClock {
    fn measure<T>(&self, f: impl FnOnce() -> T) -> (T, Measurement) {
        let start = Instant::now();
        let value = f();
        (value, Measurement::from_latency(start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn m(secs: u64, cpu: Option<f64>, peak: Option<f64>, avg: Option<f64>) -> Measurement {
        Measurement {
            latency: Duration::from_secs(secs),
            cpu_percent: cpu,
            peak_memory_mb: peak,
            avg_memory_mb: avg,
            iops: None,
        }
    }

    #[test]
    fn latencies_add_and_peaks_take_the_max() {
        let total =
            Measurement::merge_sequential(&[m(2, None, Some(100.0), None), m(3, None, Some(40.0), None)]);
        assert_eq!(total.latency, Duration::from_secs(5));
        assert_eq!(total.peak_memory_mb, Some(100.0));
    }

    #[test]
    fn averages_weight_by_phase_duration() {
        let total =
            Measurement::merge_sequential(&[m(1, Some(80.0), None, Some(10.0)), m(3, Some(40.0), None, Some(30.0))]);
        // (80*1 + 40*3) / 4 and (10*1 + 30*3) / 4.
        assert_eq!(total.cpu_percent, Some(50.0));
        assert_eq!(total.avg_memory_mb, Some(25.0));
    }

    #[test]
    fn missing_samples_drop_out_instead_of_reading_as_zero() {
        let total = Measurement::merge_sequential(&[m(2, None, None, None), m(2, Some(60.0), None, None)]);
        assert_eq!(total.cpu_percent, Some(60.0));
        assert_eq!(total.peak_memory_mb, None);
        assert_eq!(total.iops, None);
    }

    #[test]
    fn all_missing_stays_missing() {
        let total = Measurement::merge_sequential(&[m(1, None, None, None)]);
        assert_eq!(total.cpu_percent, None);
        assert_eq!(total.avg_memory_mb, None);
    }

    #[test]
    fn wall_clock_times_the_closure() {
        let (value, measured) = WallClock.measure(|| 7);
        assert_eq!(value, 7);
        assert_eq!(measured.cpu_percent, None);
    }
}
