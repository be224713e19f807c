//! Resident memory sampling around a run

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Samples this process's resident set size
///
/// The reported usage is the growth of the peak sample over the baseline
/// taken at construction.
pub struct MemoryProbe {
    system: System,
    pid: Option<Pid>,
    baseline: Option<u64>,
    peak: Option<u64>,
}

impl MemoryProbe {
    /// Take the baseline sample; a disabled probe reports nothing
    pub fn start(enabled: bool) -> Self {
        let pid = if enabled {
            sysinfo::get_current_pid()
                .map_err(|e| tracing::debug!("Memory sampling unavailable: {}", e))
                .ok()
        } else {
            None
        };

        let mut probe = Self {
            system: System::new(),
            pid,
            baseline: None,
            peak: None,
        };
        probe.baseline = probe.read_rss();
        probe
    }

    fn read_rss(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::new().with_memory(),
        );
        self.system.process(pid).map(|p| p.memory())
    }

    /// Record another sample
    pub fn sample(&mut self) {
        if let Some(rss) = self.read_rss() {
            self.peak = Some(self.peak.map_or(rss, |peak| peak.max(rss)));
        }
    }

    /// Peak growth over the baseline in MiB
    pub fn delta_mb(&self) -> Option<f64> {
        let baseline = self.baseline?;
        let peak = self.peak?;
        Some(peak.saturating_sub(baseline) as f64 / BYTES_PER_MIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_probe_reports_nothing() {
        let mut probe = MemoryProbe::start(false);
        probe.sample();
        assert_eq!(probe.delta_mb(), None);
    }

    #[test]
    fn test_enabled_probe_reports_non_negative_growth() {
        let mut probe = MemoryProbe::start(true);
        let ballast = vec![1u8; 8 * 1024 * 1024];
        probe.sample();
        assert_eq!(ballast.len(), 8 * 1024 * 1024);
        if let Some(delta) = probe.delta_mb() {
            assert!(delta >= 0.0);
        }
    }

    #[test]
    fn test_no_sample_no_delta() {
        let probe = MemoryProbe::start(true);
        assert_eq!(probe.delta_mb(), None);
    }
}
