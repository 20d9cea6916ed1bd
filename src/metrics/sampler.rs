//! Host load sampling

use anyhow::Result;
use std::sync::{Mutex, PoisonError};
use sysinfo::System;

/// CPU and memory usage in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostLoad {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

pub trait SystemSampler: Send + Sync {
    fn sample(&self) -> Result<HostLoad>;
}

/// Samples the local host through `sysinfo`.
///
/// CPU usage is a delta between refreshes, so the `System` is kept across
/// ticks; the first reading after startup may be 0.
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler for SysinfoSampler {
    fn sample(&self) -> Result<HostLoad> {
        let mut sys = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_cpu();
        sys.refresh_memory();

        let cpus = sys.cpus();
        anyhow::ensure!(!cpus.is_empty(), "no CPUs reported by host");
        let cpu = cpus.iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64;

        let total = sys.total_memory();
        anyhow::ensure!(total > 0, "host reported zero total memory");
        let memory = sys.used_memory() as f64 / total as f64 * 100.0;

        Ok(HostLoad {
            cpu_percent: cpu,
            memory_percent: memory,
        })
    }
}
