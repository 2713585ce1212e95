//! Optional platform probes
//!
//! GPU and display information depend on tools that may not be installed.
//! Probes report `Availability::Unavailable` instead of failing, and the
//! snapshot keeps an empty placeholder for them.

use devopt_common::{GpuInfo, ScreenResolution};
use std::process::Command;
use tracing::debug;

/// Result of querying an optional capability
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    Available(T),
    /// Reason the capability could not be queried
    Unavailable(String),
}

impl<T> Availability<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Availability::Available(value) => Some(value),
            Availability::Unavailable(reason) => {
                debug!("Probe unavailable: {}", reason);
                None
            }
        }
    }
}

/// Reports the first GPU on the machine
pub trait GpuProbe: Send + Sync {
    fn primary_gpu(&self) -> Availability<GpuInfo>;
}

/// Reports the resolution of the primary monitor
pub trait DisplayProbe: Send + Sync {
    fn primary_resolution(&self) -> Availability<ScreenResolution>;
}

/// Probe used when a capability is disabled or unsupported on this platform
#[derive(Debug, Clone, Default)]
pub struct NoProbe;

impl GpuProbe for NoProbe {
    fn primary_gpu(&self) -> Availability<GpuInfo> {
        Availability::Unavailable("no GPU probe for this platform".to_string())
    }
}

impl DisplayProbe for NoProbe {
    fn primary_resolution(&self) -> Availability<ScreenResolution> {
        Availability::Unavailable("no display probe for this platform".to_string())
    }
}

fn run_tool(program: &str, args: &[&str]) -> Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("{} not runnable: {}", program, e))?;
    if !output.status.success() {
        return Err(format!("{} exited with {}", program, output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// NVIDIA GPUs via `nvidia-smi`
#[derive(Debug, Clone, Default)]
pub struct NvidiaSmiProbe;

impl GpuProbe for NvidiaSmiProbe {
    fn primary_gpu(&self) -> Availability<GpuInfo> {
        let stdout = match run_tool(
            "nvidia-smi",
            &[
                "--query-gpu=name,utilization.gpu,memory.used,memory.total",
                "--format=csv,noheader,nounits",
            ],
        ) {
            Ok(stdout) => stdout,
            Err(reason) => return Availability::Unavailable(reason),
        };

        match stdout.lines().find_map(parse_nvidia_smi_line) {
            Some(gpu) => Availability::Available(gpu),
            None => Availability::Unavailable("nvidia-smi reported no GPUs".to_string()),
        }
    }
}

/// Parse `name, load, mem_used, mem_total` as printed by nvidia-smi
pub fn parse_nvidia_smi_line(line: &str) -> Option<GpuInfo> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 || fields[0].is_empty() {
        return None;
    }
    Some(GpuInfo {
        name: fields[0].to_string(),
        load_percent: fields[1].parse().ok()?,
        memory_used: fields[2].parse().ok()?,
        memory_total: fields[3].parse().ok()?,
    })
}

/// X11/XWayland displays via `xrandr`
#[derive(Debug, Clone, Default)]
pub struct XrandrProbe;

impl DisplayProbe for XrandrProbe {
    fn primary_resolution(&self) -> Availability<ScreenResolution> {
        match run_tool("xrandr", &["--current"]) {
            Ok(stdout) => match parse_xrandr(&stdout) {
                Some(res) => Availability::Available(res),
                None => Availability::Unavailable("xrandr reported no connected monitor".to_string()),
            },
            Err(reason) => Availability::Unavailable(reason),
        }
    }
}

/// Geometry of the primary connected output, else the first connected one
pub fn parse_xrandr(output: &str) -> Option<ScreenResolution> {
    let connected: Vec<&str> = output
        .lines()
        .filter(|line| line.contains(" connected"))
        .collect();

    let primary = connected.iter().find(|line| line.contains(" primary "));
    primary
        .into_iter()
        .chain(connected.iter())
        .find_map(|line| line.split_whitespace().find_map(parse_geometry))
}

/// `1920x1080+0+0` -> (1920, 1080)
fn parse_geometry(token: &str) -> Option<ScreenResolution> {
    let (size, _offset) = token.split_once('+')?;
    let (w, h) = size.split_once('x')?;
    Some(ScreenResolution(w.parse().ok()?, h.parse().ok()?))
}

/// macOS displays via `system_profiler`
#[derive(Debug, Clone, Default)]
pub struct SystemProfilerProbe;

impl DisplayProbe for SystemProfilerProbe {
    fn primary_resolution(&self) -> Availability<ScreenResolution> {
        match run_tool("system_profiler", &["SPDisplaysDataType"]) {
            Ok(stdout) => match parse_system_profiler(&stdout) {
                Some(res) => Availability::Available(res),
                None => Availability::Unavailable("no resolution in system_profiler output".to_string()),
            },
            Err(reason) => Availability::Unavailable(reason),
        }
    }
}

/// First `Resolution: W x H` line
pub fn parse_system_profiler(output: &str) -> Option<ScreenResolution> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Resolution:")?;
        let mut numbers = rest
            .split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty());
        let w = numbers.next()?.parse().ok()?;
        let h = numbers.next()?.parse().ok()?;
        Some(ScreenResolution(w, h))
    })
}

/// GPU probe for the running platform
pub fn default_gpu_probe() -> Box<dyn GpuProbe> {
    if cfg!(target_os = "macos") {
        Box::new(NoProbe)
    } else {
        Box::new(NvidiaSmiProbe)
    }
}

/// Display probe for the running platform
pub fn default_display_probe() -> Box<dyn DisplayProbe> {
    if cfg!(target_os = "macos") {
        Box::new(SystemProfilerProbe)
    } else if cfg!(unix) {
        Box::new(XrandrProbe)
    } else {
        Box::new(NoProbe)
    }
}
