//! Bounded-attempt register writes.

use std::{num::NonZeroU32, time::Duration};

use crate::{
    drivers::cooling_hat::{device_io::BusPort, protocol::Command},
    error::{BusError, ConfigError, FatalIoError, TransientWriteError},
};

/// Attempt budget and constant pause between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, ConfigError> {
        let max_attempts = NonZeroU32::new(max_attempts).ok_or(ConfigError::ZeroAttempts)?;
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    pub fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Outcome of a successful write: how many attempts it took and what failed on the way.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub attempts: u32,
    pub failures: Vec<TransientWriteError>,
}

impl WriteReport {
    pub fn merge(&mut self, other: WriteReport) {
        self.attempts += other.attempts;
        self.failures.extend(other.failures);
    }

    pub fn had_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Wraps a [`BusPort`] with a bounded retry budget.
///
/// The writer never logs; transient failures are handed back in the
/// [`WriteReport`] and exhaustion becomes [`FatalIoError::WriteExhausted`].
pub struct RetryingWriter<P> {
    port: P,
    policy: RetryPolicy,
}

impl<P: BusPort> RetryingWriter<P> {
    pub fn new(port: P, policy: RetryPolicy) -> Self {
        Self { port, policy }
    }

    pub async fn write(&mut self, addr: u8, reg: u8, value: u8) -> Result<WriteReport, FatalIoError> {
        let max = self.policy.max_attempts.get();
        let mut failures = Vec::new();
        let mut attempt = 1;
        loop {
            match self.port.write_register(addr, reg, value) {
                Ok(()) => {
                    return Ok(WriteReport {
                        attempts: attempt,
                        failures,
                    });
                }
                Err(source) if attempt >= max => {
                    return Err(FatalIoError::WriteExhausted {
                        addr,
                        reg,
                        attempts: attempt,
                        completed: 0,
                        source,
                    });
                }
                Err(source) => {
                    failures.push(TransientWriteError { attempt, source });
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Writes every register of `command` in order, each with the full budget.
    ///
    /// On exhaustion the error records how many registers were already written.
    pub async fn write_command(
        &mut self,
        addr: u8,
        command: &Command,
    ) -> Result<WriteReport, FatalIoError> {
        let mut report = WriteReport::default();
        for (written, (reg, value)) in command.to_writes().into_iter().enumerate() {
            let step = self
                .write(addr, reg, value)
                .await
                .map_err(|e| e.after_registers(written))?;
            report.merge(step);
        }
        Ok(report)
    }

    /// Single attempt without retry.
    pub fn write_once(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), BusError> {
        self.port.write_register(addr, reg, value)
    }
}
