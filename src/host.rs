//! Host facts and system-wide CPU usage
//!
//! Only memory and CPU figures are refreshed; the process table is never
//! scanned.

use std::fmt;
use sysinfo::System;

/// Static facts about the machine we are heating up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSummary {
    pub logical_cpus: usize,
    pub physical_cpus: usize,
    pub total_memory_mb: u64,
    pub used_memory_mb: u64,
}

impl fmt::Display for HostSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} logical / {} physical CPUs, {} of {} MB memory in use",
            self.logical_cpus, self.physical_cpus, self.used_memory_mb, self.total_memory_mb
        )
    }
}

/// System-wide CPU usage sampler
///
/// sysinfo computes usage between two refreshes, so `mark` at the start of
/// a window and `usage_since_mark` at its end gives the average over it.
pub struct HostProbe {
    sys: System,
}

impl HostProbe {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        Self { sys }
    }

    pub fn summary(&self) -> HostSummary {
        HostSummary {
            logical_cpus: num_cpus::get(),
            physical_cpus: num_cpus::get_physical(),
            total_memory_mb: self.sys.total_memory() / 1024 / 1024,
            used_memory_mb: self.sys.used_memory() / 1024 / 1024,
        }
    }

    pub fn mark(&mut self) {
        self.sys.refresh_cpu_usage();
    }

    /// Average system CPU usage in percent since the last `mark`
    pub fn usage_since_mark(&mut self) -> f32 {
        self.sys.refresh_cpu_usage();
        self.sys.global_cpu_usage()
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}
