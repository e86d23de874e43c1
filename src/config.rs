//! Configuration for the fanhatd daemon.
//!
//! A single YAML document selects the temperature source, the bus and device
//! address, the retry budget and the actuation policy. It is loaded once at
//! startup and never changes while the control loop runs.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{LevelFilter, info};
use serde::{Deserialize, Serialize};

use crate::{
    actuation::{FanSpeed, FanState, Rgb},
    drivers::cooling_hat::protocol::{DEVICE_ADDR, LedEffect},
    error::ConfigError,
    policy::ActuationPolicy,
    retry::RetryPolicy,
    temperature_sensors::thermal_zone::DEFAULT_THERMAL_ZONE,
};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FANHATD_CONFIG";

/// Main configuration structure.
///
/// # Example
///
/// ```yaml
/// version: 1
/// bus_number: 1
/// sleep_seconds: 2.0
/// sensor:
///   kind: thermal-zone
///   path: /sys/class/thermal/thermal_zone0/temp
/// policy:
///   kind: hysteresis
///   trigger_temp: 55.0
///   hysteresis_temp: 10.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Number N of the `/dev/i2c-N` bus the hat sits on.
    #[serde(default = "defaults::bus_number")]
    pub bus_number: u8,

    #[serde(default = "defaults::device_address")]
    pub device_address: u8,

    /// Pause between control ticks.
    #[serde(default = "defaults::sleep_seconds")]
    pub sleep_seconds: f64,

    /// 0 = warnings only, 1 = state changes, 2+ = every tick.
    #[serde(default = "defaults::verbose")]
    pub verbose: u8,

    #[serde(default)]
    pub retry: RetryCfg,

    #[serde(default)]
    pub sensor: SensorCfg,

    /// Write the first computed state even if it matches the declared initial state.
    #[serde(default = "defaults::force_initial_write")]
    pub force_initial_write: bool,

    /// Firmware LED animation started at boot for fan-only policies.
    #[serde(default)]
    pub led_effect: Option<LedEffect>,

    #[serde(default)]
    pub policy: PolicyCfg,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryCfg {
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Constant pause between failed attempts, in milliseconds.
    #[serde(default = "defaults::delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            delay_ms: defaults::delay_ms(),
        }
    }
}

/// Temperature source variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SensorCfg {
    /// Kernel thermal zone file holding millidegrees.
    ThermalZone {
        #[serde(default = "defaults::thermal_zone")]
        path: PathBuf,
    },
    /// lm-sensors chip feature (e.g. chip `cpu_thermal-virtual-0`, feature `temp1`).
    LmSensors { chip: String, feature: String },
}

impl Default for SensorCfg {
    fn default() -> Self {
        SensorCfg::ThermalZone {
            path: defaults::thermal_zone(),
        }
    }
}

/// Actuation policy variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PolicyCfg {
    /// Fan fully on at `trigger_temp`, off again at `trigger_temp - hysteresis_temp`.
    Hysteresis {
        trigger_temp: f64,
        hysteresis_temp: f64,
        #[serde(default)]
        initial_state: FanState,
    },
    /// Fan speed from an ascending temperature table. The table is looked up
    /// again only once the reading moves `deadband` °C away from the last lookup.
    FanSteps {
        steps: Vec<FanStepCfg>,
        above: FanSpeed,
        #[serde(default = "defaults::deadband")]
        deadband: f64,
    },
    /// LED color from an ascending temperature table, with the same deadband.
    ColorSteps {
        steps: Vec<ColorStepCfg>,
        above: Rgb,
        #[serde(default = "defaults::deadband")]
        deadband: f64,
    },
    /// LED color blended linearly from `cold` at `lower` to `hot` at `upper`.
    ColorBlend {
        lower: f64,
        upper: f64,
        cold: Rgb,
        hot: Rgb,
    },
}

impl Default for PolicyCfg {
    fn default() -> Self {
        PolicyCfg::Hysteresis {
            trigger_temp: defaults::trigger_temp(),
            hysteresis_temp: defaults::hysteresis_temp(),
            initial_state: FanState::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FanStepCfg {
    /// Inclusive upper bound in °C.
    pub upto: f64,
    pub speed: FanSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStepCfg {
    pub upto: f64,
    pub rgb: Rgb,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            bus_number: defaults::bus_number(),
            device_address: defaults::device_address(),
            sleep_seconds: defaults::sleep_seconds(),
            verbose: defaults::verbose(),
            retry: RetryCfg::default(),
            sensor: SensorCfg::default(),
            force_initial_write: defaults::force_initial_write(),
            led_effect: None,
            policy: PolicyCfg::default(),
        }
    }
}

impl Config {
    /// Checks every invariant that can be checked without touching hardware.
    ///
    /// Policy construction is part of validation, so a config that passes
    /// here always yields a working [`ActuationPolicy`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        // 7-bit addressing, reserved ranges excluded
        if !(0x03..=0x77).contains(&self.device_address) {
            return Err(ConfigError::OutOfRange {
                what: "device address",
                value: self.device_address,
                min: 0x03,
                max: 0x77,
            });
        }
        self.interval()?;
        self.retry_policy()?;
        if let Some(effect) = &self.led_effect {
            effect.validate()?;
        }
        ActuationPolicy::from_cfg(&self.policy)?;
        Ok(())
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.sleep_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or(ConfigError::InvalidDuration("sleep_seconds"))
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    /// Log level from `verbose`, raised by `extra` (the `-v` count).
    pub fn log_level(&self, extra: u8) -> LevelFilter {
        match self.verbose.saturating_add(extra) {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Ok(config)
    }

    /// Loads configuration from `path` or the standard locations.
    ///
    /// Search order:
    /// 1. Provided path parameter
    /// 2. `FANHATD_CONFIG` environment variable
    /// 3. `XDG_CONFIG_HOME/fanhatd/config.yml` or `~/.config/fanhatd/config.yml`
    /// 4. `/etc/fanhatd/config.yml`
    ///
    /// Built-in defaults are used when no file is found.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let Some(config_path) = path.or_else(locate_config) else {
            info!("No configuration file found, using built-in defaults");
            return Ok(Config::default());
        };

        info!("Loading config from: {}", config_path.display());
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config: {}", config_path.display()))
    }
}

fn locate_config() -> Option<PathBuf> {
    if let Some(env_path) = env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("fanhatd/config.yml");
        if cfg_dir.exists() {
            return Some(cfg_dir);
        }
    }

    let etc = Path::new("/etc/fanhatd/config.yml");
    etc.exists().then(|| etc.to_path_buf())
}

mod defaults {
    use std::path::PathBuf;

    use super::{DEFAULT_THERMAL_ZONE, DEVICE_ADDR};

    pub fn bus_number() -> u8 {
        1
    }

    pub fn device_address() -> u8 {
        DEVICE_ADDR
    }

    pub fn sleep_seconds() -> f64 {
        2.0
    }

    pub fn verbose() -> u8 {
        1
    }

    pub fn max_attempts() -> u32 {
        3
    }

    pub fn delay_ms() -> u64 {
        100
    }

    pub fn force_initial_write() -> bool {
        true
    }

    pub fn deadband() -> f64 {
        1.0
    }

    pub fn thermal_zone() -> PathBuf {
        PathBuf::from(DEFAULT_THERMAL_ZONE)
    }

    pub fn trigger_temp() -> f64 {
        55.0
    }

    pub fn hysteresis_temp() -> f64 {
        10.0
    }
}
