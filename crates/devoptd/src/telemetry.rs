//! System telemetry collection
//!
//! Gathers CPU, memory, disk, network and process state from a metrics
//! provider, adds optional GPU/display probe data and the editor settings,
//! and freezes the result into a `Snapshot`.

use crate::probes::{DisplayProbe, GpuProbe};
use chrono::Utc;
use devopt_common::{
    ConfigDocument, DiskUsage, MemoryUsage, NetworkCounters, ProcessEntry, Snapshot,
};
use std::path::Path;
use std::process::Command;
use sysinfo::{Disks, Networks, ProcessStatus, System};
use tracing::{debug, info};

/// Why a single process could not be read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error("process {0} vanished during the scan")]
    Vanished(u32),
}

/// Raw machine metrics from one sampling pass
#[derive(Debug, Clone)]
pub struct MachineSample {
    pub cpu_percent: f32,
    pub memory: MemoryUsage,
    pub disk: DiskUsage,
    pub os: String,
    pub python_version: String,
    pub network: NetworkCounters,
    /// Per-process results in collection order
    pub processes: Vec<Result<ProcessEntry, ProcessError>>,
}

/// Source of machine metrics
pub trait MetricsProvider: Send + Sync {
    fn sample(&self) -> MachineSample;
}

/// Metrics from the `sysinfo` crate
#[derive(Debug, Clone, Default)]
pub struct SysinfoProvider;

impl MetricsProvider for SysinfoProvider {
    fn sample(&self) -> MachineSample {
        let mut sys = System::new_all();
        // CPU usage needs two refreshes separated by the minimum interval
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu();
        sys.refresh_processes();

        let total_memory = sys.total_memory();
        let memory = MemoryUsage {
            percent: percent_of(sys.used_memory(), total_memory),
            total: total_memory,
            available: sys.available_memory(),
            used: sys.used_memory(),
        };

        let processes = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                process_entry(
                    pid.as_u32(),
                    process.status(),
                    process.name(),
                    process.cpu_usage(),
                    percent_of(process.memory(), total_memory),
                )
            })
            .collect();

        MachineSample {
            cpu_percent: sys.global_cpu_info().cpu_usage(),
            memory,
            disk: root_disk_usage(),
            os: os_family().to_string(),
            python_version: detect_python_version(),
            network: network_counters(),
            processes,
        }
    }
}

/// One row of the process table. Zombies are still listed; only processes
/// that exited between the listing and the read are dropped.
fn process_entry(
    pid: u32,
    status: ProcessStatus,
    name: &str,
    cpu_percent: f32,
    memory_percent: f32,
) -> Result<ProcessEntry, ProcessError> {
    if status == ProcessStatus::Dead {
        return Err(ProcessError::Vanished(pid));
    }
    Ok(ProcessEntry {
        pid,
        name: name.to_string(),
        cpu_percent,
        memory_percent,
    })
}

fn percent_of(part: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 100.0) as f32
}

/// Usage of the filesystem mounted at `/` (or the first disk on other platforms)
fn root_disk_usage() -> DiskUsage {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.iter().next());

    match disk {
        Some(disk) => {
            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);
            DiskUsage {
                percent: percent_of(used, total),
                total,
                used,
                free,
            }
        }
        None => DiskUsage::default(),
    }
}

fn network_counters() -> NetworkCounters {
    let networks = Networks::new_with_refreshed_list();
    networks
        .iter()
        .fold(NetworkCounters::default(), |acc, (_name, data)| NetworkCounters {
            bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
            bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
        })
}

/// OS family name as users know it
pub fn os_family() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        other => other,
    }
}

/// Version of the Python interpreter on PATH, or "unavailable"
fn detect_python_version() -> String {
    for program in ["python3", "python"] {
        let Ok(output) = Command::new(program).arg("--version").output() else {
            continue;
        };
        if !output.status.success() {
            continue;
        }
        // Older interpreters print the version on stderr
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        if let Some(version) = parse_python_version(&text) {
            return version;
        }
    }
    "unavailable".to_string()
}

/// `Python 3.12.1` -> `3.12.1`
pub fn parse_python_version(text: &str) -> Option<String> {
    let version = text.trim().strip_prefix("Python ")?.trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

/// Drop unreadable entries, order by descending CPU (pid breaks ties), keep `limit`
pub fn rank_processes(
    entries: impl IntoIterator<Item = Result<ProcessEntry, ProcessError>>,
    limit: usize,
) -> Vec<ProcessEntry> {
    let mut processes: Vec<ProcessEntry> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(process) => Some(process),
            Err(e) => {
                debug!("Skipping process: {}", e);
                None
            }
        })
        .collect();

    processes.sort_by(|a, b| {
        b.cpu_percent
            .total_cmp(&a.cpu_percent)
            .then_with(|| a.pid.cmp(&b.pid))
    });
    processes.truncate(limit);
    processes
}

/// Builds snapshots from a provider and the optional probes
pub struct SnapshotCollector {
    provider: Box<dyn MetricsProvider>,
    gpu: Box<dyn GpuProbe>,
    display: Box<dyn DisplayProbe>,
    process_limit: usize,
}

impl SnapshotCollector {
    pub fn new(
        provider: Box<dyn MetricsProvider>,
        gpu: Box<dyn GpuProbe>,
        display: Box<dyn DisplayProbe>,
        process_limit: usize,
    ) -> Self {
        Self {
            provider,
            gpu,
            display,
            process_limit,
        }
    }

    /// sysinfo metrics plus the platform's default probes
    pub fn for_this_machine(process_limit: usize) -> Self {
        Self::new(
            Box::new(SysinfoProvider),
            crate::probes::default_gpu_probe(),
            crate::probes::default_display_probe(),
            process_limit,
        )
    }

    /// Capture a snapshot embedding the given editor settings
    pub fn collect(&self, ide_settings: ConfigDocument) -> Snapshot {
        info!("Collecting system snapshot");
        let sample = self.provider.sample();

        let processes = rank_processes(sample.processes, self.process_limit);
        let gpu = self.gpu.primary_gpu().into_option();
        let screen_resolution = self.display.primary_resolution().into_option().unwrap_or_default();

        info!(
            "Snapshot: cpu {:.1}%, memory {:.1}%, disk {:.1}%, {} processes kept",
            sample.cpu_percent,
            sample.memory.percent,
            sample.disk.percent,
            processes.len()
        );

        Snapshot {
            cpu_percent: sample.cpu_percent,
            memory: sample.memory,
            disk: sample.disk,
            os: sample.os,
            python_version: sample.python_version,
            network: sample.network,
            gpu,
            screen_resolution,
            processes,
            ide_settings,
            collected_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::NoProbe;

    fn entry(pid: u32, cpu: f32) -> Result<ProcessEntry, ProcessError> {
        Ok(ProcessEntry {
            pid,
            name: format!("proc-{}", pid),
            cpu_percent: cpu,
            memory_percent: 0.5,
        })
    }

    #[test]
    fn test_rank_processes_orders_by_cpu_then_pid() {
        let ranked = rank_processes(
            vec![entry(7, 1.0), entry(3, 50.0), entry(9, 50.0), entry(1, 0.0)],
            10,
        );
        let pids: Vec<u32> = ranked.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![3, 9, 7, 1]);
    }

    #[test]
    fn test_rank_processes_caps_at_limit() {
        let entries: Vec<_> = (0..250).map(|pid| entry(pid, (pid % 17) as f32)).collect();
        let ranked = rank_processes(entries, 100);
        assert_eq!(ranked.len(), 100);
        assert!(ranked
            .windows(2)
            .all(|w| w[0].cpu_percent >= w[1].cpu_percent));
    }

    #[test]
    fn test_rank_processes_skips_errors() {
        let ranked = rank_processes(
            vec![
                entry(1, 5.0),
                Err(ProcessError::Vanished(2)),
                entry(4, 2.0),
            ],
            100,
        );
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_zombies_stay_in_the_table() {
        let zombie = process_entry(12, ProcessStatus::Zombie, "defunct-worker", 0.0, 0.0).unwrap();
        assert_eq!(zombie.pid, 12);
        assert_eq!(zombie.name, "defunct-worker");

        let unnamed = process_entry(13, ProcessStatus::Run, "", 1.5, 0.2).unwrap();
        assert_eq!(unnamed.name, "");

        assert_eq!(
            process_entry(14, ProcessStatus::Dead, "gone", 0.0, 0.0),
            Err(ProcessError::Vanished(14))
        );

        let ranked = rank_processes(
            vec![
                process_entry(1, ProcessStatus::Run, "busy", 40.0, 1.0),
                process_entry(2, ProcessStatus::Zombie, "defunct", 0.0, 0.0),
                process_entry(3, ProcessStatus::Dead, "gone", 0.0, 0.0),
            ],
            100,
        );
        let pids: Vec<u32> = ranked.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 2]);
    }

    #[test]
    fn test_parse_python_version() {
        assert_eq!(parse_python_version("Python 3.12.1\n"), Some("3.12.1".to_string()));
        assert_eq!(parse_python_version("Python "), None);
        assert_eq!(parse_python_version("bash: python: not found"), None);
    }

    #[test]
    fn test_percent_of_zero_total() {
        assert_eq!(percent_of(10, 0), 0.0);
        assert_eq!(percent_of(25, 100), 25.0);
    }

    struct StaticProvider;

    impl MetricsProvider for StaticProvider {
        fn sample(&self) -> MachineSample {
            MachineSample {
                cpu_percent: 12.5,
                memory: MemoryUsage { percent: 40.0, ..MemoryUsage::default() },
                disk: DiskUsage { percent: 70.0, ..DiskUsage::default() },
                os: "Linux".to_string(),
                python_version: "3.11.4".to_string(),
                network: NetworkCounters { bytes_sent: 10, bytes_recv: 20 },
                processes: vec![entry(1, 1.0), Err(ProcessError::Vanished(2)), entry(3, 3.0)],
            }
        }
    }

    #[test]
    fn test_collect_with_unavailable_probes() {
        let collector =
            SnapshotCollector::new(Box::new(StaticProvider), Box::new(NoProbe), Box::new(NoProbe), 100);
        let mut settings = ConfigDocument::new();
        settings.insert("editor.fontSize".to_string(), serde_json::json!(14));

        let snapshot = collector.collect(settings.clone());
        assert_eq!(snapshot.cpu_percent, 12.5);
        assert_eq!(snapshot.python_version, "3.11.4");
        assert!(snapshot.gpu.is_none());
        assert_eq!(snapshot.screen_resolution, devopt_common::ScreenResolution(0, 0));
        assert_eq!(snapshot.processes.len(), 2);
        assert_eq!(snapshot.processes[0].pid, 3);
        assert_eq!(snapshot.ide_settings, settings);
        assert_eq!(snapshot.network.total(), 30);
    }
}
