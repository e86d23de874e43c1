//! Error taxonomy for the control core.
//!
//! Three classes matter to callers:
//! - [`ConfigError`]: an invariant was violated while building a component.
//!   Always raised before the control loop starts.
//! - [`TransientWriteError`]: one bus write attempt failed and was retried.
//! - [`FatalIoError`]: retries were exhausted or the temperature source
//!   failed. The loop stops and the process exits non-zero.

use std::io;

use thiserror::Error;

/// Failure of a single register write on the bus.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("cannot open i2c bus {bus} at address {addr:#04x}: {reason}")]
    Open { bus: u8, addr: u8, reason: String },

    #[error("i2c write failed: {0}")]
    Write(String),
}

/// Failure to obtain a usable temperature sample.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("cannot read temperature from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed temperature value {raw:?} in {path}")]
    Parse { path: String, raw: String },

    #[error("lm-sensors: {0}")]
    LmSensors(String),

    #[error("implausible temperature {0}°C")]
    OutOfRange(f64),
}

/// A failed attempt that was recovered by retrying.
#[derive(Error, Debug)]
#[error("write attempt {attempt} failed: {source}")]
pub struct TransientWriteError {
    pub attempt: u32,
    #[source]
    pub source: BusError,
}

/// Unrecoverable I/O fault. The control loop must stop.
#[derive(Error, Debug)]
pub enum FatalIoError {
    #[error(
        "cannot write register {reg:#04x} of device {addr:#04x} after {attempts} attempts: {source}"
    )]
    WriteExhausted {
        addr: u8,
        reg: u8,
        attempts: u32,
        /// Registers of the same command written before this one failed.
        completed: usize,
        #[source]
        source: BusError,
    },

    #[error("temperature source failed: {0}")]
    TemperatureRead(#[from] SensorError),
}

impl FatalIoError {
    /// Records how many registers of a multi-register command went through.
    pub fn after_registers(self, written: usize) -> Self {
        match self {
            FatalIoError::WriteExhausted {
                addr,
                reg,
                attempts,
                source,
                ..
            } => FatalIoError::WriteExhausted {
                addr,
                reg,
                attempts,
                completed: written,
                source,
            },
            other => other,
        }
    }

    /// True when the device was left with a half-applied command.
    pub fn is_partial(&self) -> bool {
        matches!(self, FatalIoError::WriteExhausted { completed, .. } if *completed > 0)
    }
}

/// Configuration invariant violated at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error(
        "release temperature {release}°C must be below trigger temperature {trigger}°C"
    )]
    HysteresisInverted { trigger: f64, release: f64 },

    #[error("threshold bounds must be strictly ascending (entry {index}: {bound})")]
    UnsortedThresholds { index: usize, bound: f64 },

    #[error("threshold table needs at least one entry")]
    EmptyThresholdTable,

    #[error("blend range [{lower}, {upper}] is empty")]
    EmptyBlendRange { lower: f64, upper: f64 },

    #[error("fan speed {0}% is not supported (0, 20..=90 in steps of 10, or 100)")]
    InvalidFanSpeed(u8),

    #[error("{what} {value} is out of range {min}..={max}")]
    OutOfRange {
        what: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },

    #[error("{0} must be a positive number of seconds")]
    InvalidDuration(&'static str),

    #[error("deadband {0}°C must be a finite, non-negative number")]
    InvalidDeadband(f64),

    #[error("unsupported config version {0}")]
    UnsupportedVersion(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_write_reports_attempts_and_cause() {
        let err = FatalIoError::WriteExhausted {
            addr: 0x0d,
            reg: 0x08,
            attempts: 3,
            completed: 0,
            source: BusError::Write("Remote I/O error".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("0x08"));
        assert!(msg.contains("0x0d"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("Remote I/O error"));
        assert!(!err.is_partial());
        assert!(err.after_registers(2).is_partial());
    }

    #[test]
    fn sensor_error_converts_into_fatal() {
        let err: FatalIoError = SensorError::OutOfRange(300.0).into();
        assert!(matches!(
            err,
            FatalIoError::TemperatureRead(SensorError::OutOfRange(_))
        ));
        assert!(!err.after_registers(3).is_partial());
    }
}
