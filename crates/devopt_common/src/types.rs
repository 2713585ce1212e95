//! Core data types for the optimizer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Editor settings document: string keys to arbitrary JSON values
pub type ConfigDocument = serde_json::Map<String, serde_json::Value>;

/// Virtual memory usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub percent: f32,
    /// Bytes
    pub total: u64,
    pub available: u64,
    pub used: u64,
}

/// Usage of the root filesystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub percent: f32,
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Cumulative network I/O counters across all interfaces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

impl NetworkCounters {
    pub fn total(&self) -> u64 {
        self.bytes_sent.saturating_add(self.bytes_recv)
    }
}

/// First GPU reported by the GPU probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub load_percent: f32,
    /// Megabytes
    pub memory_used: f64,
    pub memory_total: f64,
}

/// Primary display resolution, serialized as `[width, height]`.
/// `(0, 0)` when no display probe is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenResolution(pub u32, pub u32);

impl ScreenResolution {
    pub fn width(&self) -> u32 {
        self.0
    }

    pub fn height(&self) -> u32 {
        self.1
    }

    pub fn is_known(&self) -> bool {
        self.0 > 0 && self.1 > 0
    }
}

/// One row of the running process table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// Point-in-time capture of machine, process and editor state.
///
/// Built once per analysis run and never mutated afterwards. Optional probe
/// data always keeps its key: `gpu` serializes as `{}` and
/// `screen_resolution` as `[0, 0]` when unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cpu_percent: f32,
    pub memory: MemoryUsage,
    pub disk: DiskUsage,
    pub os: String,
    pub python_version: String,
    pub network: NetworkCounters,
    #[serde(with = "gpu_slot")]
    pub gpu: Option<GpuInfo>,
    pub screen_resolution: ScreenResolution,
    pub processes: Vec<ProcessEntry>,
    pub ide_settings: ConfigDocument,
    pub collected_at: DateTime<Utc>,
}

impl Snapshot {
    /// Minimal snapshot with the required metrics; everything else empty
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn with_usage(cpu_percent: f32, memory_percent: f32, disk_percent: f32) -> Self {
        Self {
            cpu_percent,
            memory: MemoryUsage {
                percent: memory_percent,
                ..MemoryUsage::default()
            },
            disk: DiskUsage {
                percent: disk_percent,
                ..DiskUsage::default()
            },
            os: std::env::consts::OS.to_string(),
            python_version: "unavailable".to_string(),
            network: NetworkCounters::default(),
            gpu: None,
            screen_resolution: ScreenResolution::default(),
            processes: Vec::new(),
            ide_settings: ConfigDocument::new(),
            collected_at: Utc::now(),
        }
    }

    /// Pretty JSON used for prompts and the JSON API
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// `Option<GpuInfo>` stored as `{}` when absent
mod gpu_slot {
    use super::*;

    pub fn serialize<S: Serializer>(gpu: &Option<GpuInfo>, s: S) -> Result<S::Ok, S::Error> {
        match gpu {
            Some(info) => info.serialize(s),
            None => serde_json::Map::new().serialize(s),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<GpuInfo>, D::Error> {
        let raw = serde_json::Map::<String, serde_json::Value>::deserialize(d)?;
        if raw.is_empty() {
            return Ok(None);
        }
        serde_json::from_value(serde_json::Value::Object(raw))
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// Optimization advice produced by a recommendation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Recommendation {
    /// Opaque markdown prose from the AI service
    Prose(String),
    /// Independent one-line advisories from the rule table
    Advisories(Vec<String>),
}

impl Recommendation {
    pub fn is_empty(&self) -> bool {
        match self {
            Recommendation::Prose(text) => text.trim().is_empty(),
            Recommendation::Advisories(items) => items.is_empty(),
        }
    }
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    NotRun,
    Running,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::NotRun => write!(f, "not run"),
            Phase::Running => write!(f, "running"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// Everything the dashboard shows for the current session.
///
/// Passed into and returned from every session operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    pub snapshot: Option<Snapshot>,
    pub recommendation: Option<Recommendation>,
    pub applied_changes: Vec<String>,
    pub last_error: Option<String>,
    /// Bumped on every start and reset; results from an older run are dropped
    pub generation: u64,
}

impl SessionState {
    /// True when no results are held
    pub fn is_cleared(&self) -> bool {
        self.snapshot.is_none() && self.recommendation.is_none() && self.applied_changes.is_empty()
    }
}
