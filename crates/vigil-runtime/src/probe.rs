use std::sync::{Mutex, PoisonError};

use sysinfo::System;

use vigil_core::probe::PerformanceProbe;

/// CPU probe backed by sysinfo.
///
/// Each call reports global CPU usage averaged over all cores since the
/// previous call. The first call covers the time since construction.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceProbe for SysinfoProbe {
    fn avg_cpu_utilization(&self) -> f32 {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_usage();
        system.global_cpu_usage().clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_a_percentage() {
        let probe = SysinfoProbe::new();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let sample = probe.avg_cpu_utilization();
        assert!((0.0..=100.0).contains(&sample));
    }
}
