//! Instance configuration.
//!
//! Every field can come from a command-line flag or the matching `GRID_*` environment
//! variable. Parsing configuration files is left to the embedding application, which can
//! build an `InstanceConfig` directly.

use crate::health::types::{HealthMonitorLevel, HealthSettings};

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, clap::Args)]
pub struct InstanceConfig {
    /// Instance name. A unique one is generated when absent.
    #[arg(long, env = "GRID_INSTANCE_NAME")]
    pub name: Option<String>,

    #[arg(
        long,
        env = "GRID_HEALTH_MONITORING_LEVEL",
        value_enum,
        ignore_case = true,
        default_value_t = HealthMonitorLevel::Silent
    )]
    pub health_level: HealthMonitorLevel,

    /// Seconds between two health samples.
    #[arg(long, env = "GRID_HEALTH_MONITORING_DELAY_SECONDS", default_value_t = 30)]
    pub health_delay_seconds: u64,

    /// Used memory percentage above which a SILENT monitor logs.
    #[arg(long, env = "GRID_HEALTH_MEMORY_THRESHOLD", default_value_t = 70.0)]
    pub health_memory_threshold: f64,

    /// Load percentage (per CPU) above which a SILENT monitor logs.
    #[arg(long, env = "GRID_HEALTH_LOAD_THRESHOLD", default_value_t = 70.0)]
    pub health_load_threshold: f64,

    /// User context seed entry as `key=value`; repeatable. Values are parsed as JSON and
    /// fall back to plain strings.
    #[arg(long = "context", value_parser = parse_context_entry)]
    pub user_context: Vec<(String, Value)>,
}

impl InstanceConfig {
    pub fn instance_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("grid-{}", uuid::Uuid::new_v4()),
        }
    }

    pub fn health_settings(&self) -> HealthSettings {
        HealthSettings {
            level: self.health_level,
            // tokio intervals reject a zero period
            interval: Duration::from_secs(self.health_delay_seconds.max(1)),
            memory_threshold: self.health_memory_threshold,
            load_threshold: self.health_load_threshold,
        }
    }

    pub fn user_context_template(&self) -> HashMap<String, Value> {
        self.user_context.iter().cloned().collect()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_health_level(mut self, level: HealthMonitorLevel) -> Self {
        self.health_level = level;
        self
    }

    pub fn with_health_delay_seconds(mut self, seconds: u64) -> Self {
        self.health_delay_seconds = seconds;
        self
    }

    pub fn with_context_entry(mut self, key: &str, value: Value) -> Self {
        self.user_context.retain(|(existing, _)| existing != key);
        self.user_context.push((key.to_string(), value));
        self
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: None,
            health_level: HealthMonitorLevel::Silent,
            health_delay_seconds: 30,
            health_memory_threshold: 70.0,
            health_load_threshold: 70.0,
            user_context: Vec::new(),
        }
    }
}

fn parse_context_entry(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
