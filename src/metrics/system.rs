use parking_lot::Mutex;
use sysinfo::System;

/// Host resource usage, sampled at report time rather than stored.
pub trait SystemSampler: Send + Sync {
    /// 1-minute load average relative to CPU count, in `[0, 100]`.
    fn cpu_usage_percent(&self) -> f64;
    /// Used memory relative to total, in `[0, 100]`.
    fn memory_usage_percent(&self) -> f64;
}

/// A single reading of both system gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl SystemSample {
    pub fn take(sampler: &dyn SystemSampler) -> Self {
        Self {
            cpu_percent: sampler.cpu_usage_percent(),
            memory_percent: sampler.memory_usage_percent(),
        }
    }
}

/// `sysinfo`-backed sampler for the machine we are running on.
pub struct HostSampler {
    sys: Mutex<System>,
    cpu_count: usize,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();
        let cpu_count = sys.cpus().len().max(1);
        Self {
            sys: Mutex::new(sys),
            cpu_count,
        }
    }
}

impl SystemSampler for HostSampler {
    fn cpu_usage_percent(&self) -> f64 {
        let load = System::load_average().one;
        clamp_percent(load / self.cpu_count as f64 * 100.0)
    }

    fn memory_usage_percent(&self) -> f64 {
        let mut sys = self.sys.lock();
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        clamp_percent(sys.used_memory() as f64 / total as f64 * 100.0)
    }
}

fn clamp_percent(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_readings_stay_in_range() {
        let sampler = HostSampler::new();
        let sample = SystemSample::take(&sampler);
        assert!((0.0..=100.0).contains(&sample.cpu_percent));
        assert!((0.0..=100.0).contains(&sample.memory_percent));
    }

    #[test]
    fn clamp_handles_overload_and_nan() {
        assert_eq!(clamp_percent(250.0), 100.0);
        assert_eq!(clamp_percent(-3.0), 0.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(42.5), 42.5);
    }
}
