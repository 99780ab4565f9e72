use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How much the health monitor reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthMonitorLevel {
    /// The monitor never starts.
    Off,
    /// Samples are taken, but only logged when a threshold is exceeded.
    Silent,
    /// Every sample is logged.
    Noisy,
}

impl fmt::Display for HealthMonitorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthMonitorLevel::Off => "OFF",
            HealthMonitorLevel::Silent => "SILENT",
            HealthMonitorLevel::Noisy => "NOISY",
        };
        f.write_str(name)
    }
}

impl FromStr for HealthMonitorLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" => Ok(HealthMonitorLevel::Off),
            "SILENT" => Ok(HealthMonitorLevel::Silent),
            "NOISY" => Ok(HealthMonitorLevel::Noisy),
            other => Err(format!("Unknown health monitor level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthSettings {
    pub level: HealthMonitorLevel,
    pub interval: Duration,
    /// Used memory, in percent of total, above which SILENT logs a sample.
    pub memory_threshold: f64,
    /// One-minute load average, in percent of available CPUs, above which SILENT logs.
    pub load_threshold: f64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            level: HealthMonitorLevel::Silent,
            interval: Duration::from_secs(30),
            memory_threshold: 70.0,
            load_threshold: 70.0,
        }
    }
}

/// One reading of the node's resource indicators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSample {
    pub taken_at_ms: u64,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub load_one: f64,
    pub load_five: f64,
    pub load_fifteen: f64,
    pub cpu_count: usize,
    pub proxy_count: usize,
    pub object_listener_count: usize,
    pub member_count: usize,
    pub connection_count: usize,
}

impl HealthSample {
    pub fn memory_used_percent(&self) -> f64 {
        if self.memory_total_bytes == 0 {
            return 0.0;
        }
        self.memory_used_bytes as f64 * 100.0 / self.memory_total_bytes as f64
    }

    pub fn load_percent(&self) -> f64 {
        if self.cpu_count == 0 {
            return 0.0;
        }
        self.load_one * 100.0 / self.cpu_count as f64
    }

    pub fn exceeds(&self, settings: &HealthSettings) -> bool {
        self.memory_used_percent() > settings.memory_threshold
            || self.load_percent() > settings.load_threshold
    }
}

impl fmt::Display for HealthSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory.used={}MB memory.total={}MB memory.used/total={:.2}% load.system={:.2}/{:.2}/{:.2} \
             load.percent={:.2}% cpus={} proxies={} object.listeners={} members={} connections={}",
            self.memory_used_bytes / (1024 * 1024),
            self.memory_total_bytes / (1024 * 1024),
            self.memory_used_percent(),
            self.load_one,
            self.load_five,
            self.load_fifteen,
            self.load_percent(),
            self.cpu_count,
            self.proxy_count,
            self.object_listener_count,
            self.member_count,
            self.connection_count,
        )
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
