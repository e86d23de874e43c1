//! The sample → evaluate → emit → sleep cycle.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    actuation::Actuation,
    drivers::cooling_hat::{device_io::BusPort, protocol::Command},
    error::FatalIoError,
    policy::ActuationPolicy,
    retry::{RetryingWriter, WriteReport},
    sensors::{TemperatureSource, validate_reading},
};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Desired state equals the last emitted one; nothing written.
    Unchanged,
    Written,
    /// Cancellation was seen before a write cycle could start.
    Cancelled,
}

/// Owns the bus, the policy and the last emitted state for the whole run.
pub struct ControlLoop<P> {
    source: Box<dyn TemperatureSource>,
    policy: ActuationPolicy,
    writer: RetryingWriter<P>,
    device_addr: u8,
    interval: Duration,
    last_emitted: Option<Actuation>,
}

impl<P: BusPort> ControlLoop<P> {
    /// With `force_initial_write` unset, the device is assumed to already hold
    /// the policy's declared initial state.
    pub fn new(
        source: Box<dyn TemperatureSource>,
        policy: ActuationPolicy,
        writer: RetryingWriter<P>,
        device_addr: u8,
        interval: Duration,
        force_initial_write: bool,
    ) -> Self {
        let last_emitted = if force_initial_write {
            None
        } else {
            policy.declared_state()
        };
        Self {
            source,
            policy,
            writer,
            device_addr,
            interval,
            last_emitted,
        }
    }

    /// Logs the initial reading and writes the policy's startup commands
    /// followed by `extra`. Any exhausted write is fatal.
    pub async fn startup(&mut self, extra: &[Command]) -> Result<f64, FatalIoError> {
        let temperature = self.read_temperature().await?;
        info!(
            "Starting with {} at {temperature:.2}°C, policy {}",
            self.source.name(),
            self.policy
        );

        let mut commands = self.policy.startup_commands();
        commands.extend_from_slice(extra);
        for command in &commands {
            debug!("Startup command {command:?}");
            let report = self.writer.write_command(self.device_addr, command).await?;
            log_transient(&report);
        }
        Ok(temperature)
    }

    pub async fn tick(&mut self, cancel: &CancellationToken) -> Result<TickOutcome, FatalIoError> {
        let temperature = self.read_temperature().await?;
        let desired = self.policy.evaluate(temperature);

        if self.last_emitted == Some(desired) {
            debug!("{temperature:.2}°C, {desired} unchanged");
            return Ok(TickOutcome::Unchanged);
        }
        if cancel.is_cancelled() {
            return Ok(TickOutcome::Cancelled);
        }

        let report = self
            .writer
            .write_command(self.device_addr, &desired.command())
            .await?;
        log_transient(&report);
        info!("{temperature:.2}°C, {desired}");
        self.last_emitted = Some(desired);
        Ok(TickOutcome::Written)
    }

    /// Ticks until `cancel` fires, then puts the device in its safe state.
    ///
    /// A fatal error returns without the safe-state write, unless a command
    /// was left half-applied on the device.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), FatalIoError> {
        while !cancel.is_cancelled() {
            match self.tick(cancel).await {
                Ok(TickOutcome::Cancelled) => break,
                Ok(_) => {}
                Err(e) => {
                    if e.is_partial() {
                        warn!("Command left half-applied, attempting safe state");
                        self.shutdown();
                    }
                    return Err(e);
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Shutting down");
        self.shutdown();
        Ok(())
    }

    /// One attempt per register, failures logged and swallowed.
    /// Returns whether every write went through.
    pub fn shutdown(&mut self) -> bool {
        let mut clean = true;
        for command in self.policy.safe_state() {
            for (reg, value) in command.to_writes() {
                if let Err(e) = self.writer.write_once(self.device_addr, reg, value) {
                    error!("Safe-state write of register {reg:#04x} failed: {e}");
                    clean = false;
                }
            }
        }
        clean
    }

    pub fn last_emitted(&self) -> Option<Actuation> {
        self.last_emitted
    }

    async fn read_temperature(&self) -> Result<f64, FatalIoError> {
        Ok(validate_reading(self.source.read().await?)?)
    }
}

fn log_transient(report: &WriteReport) {
    for failure in &report.failures {
        warn!("{failure}, retrying");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actuation::{FanSpeed, FanState, Rgb},
        config::{FanStepCfg, PolicyCfg},
        drivers::cooling_hat::{device_io::MockBusPort, protocol},
        error::{BusError, SensorError},
        retry::RetryPolicy,
    };
    use async_trait::async_trait;
    use mockall::{Sequence, predicate::eq};
    use pretty_assertions::assert_eq;
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    /// Replays a fixed list of readings, then fails.
    struct ScriptedSource(Mutex<VecDeque<f64>>);

    impl ScriptedSource {
        fn boxed(temps: &[f64]) -> Box<dyn TemperatureSource> {
            Box::new(Self(Mutex::new(temps.iter().copied().collect())))
        }
    }

    #[async_trait]
    impl TemperatureSource for ScriptedSource {
        async fn read(&self) -> Result<f64, SensorError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SensorError::LmSensors("script exhausted".into()))
        }

        fn name(&self) -> String {
            "scripted".into()
        }
    }

    fn hysteresis() -> ActuationPolicy {
        ActuationPolicy::from_cfg(&PolicyCfg::default()).unwrap()
    }

    fn blend() -> ActuationPolicy {
        ActuationPolicy::from_cfg(&PolicyCfg::ColorBlend {
            lower: 45.0,
            upper: 50.0,
            cold: Rgb::new(0, 0, 255),
            hot: Rgb::new(255, 0, 0),
        })
        .unwrap()
    }

    fn control_loop(
        temps: &[f64],
        policy: ActuationPolicy,
        port: MockBusPort,
        force: bool,
    ) -> ControlLoop<MockBusPort> {
        let retry = RetryPolicy::new(3, Duration::from_millis(10)).unwrap();
        ControlLoop::new(
            ScriptedSource::boxed(temps),
            policy,
            RetryingWriter::new(port, retry),
            protocol::DEVICE_ADDR,
            Duration::from_secs(2),
            force,
        )
    }

    fn expect_fan(port: &mut MockBusPort, seq: &mut Sequence, byte: u8) {
        port.expect_write_register()
            .with(eq(protocol::DEVICE_ADDR), eq(protocol::FAN_SPEED_REG), eq(byte))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _, _| Ok(()));
    }

    #[tokio::test]
    async fn writes_only_on_state_change() {
        let mut port = MockBusPort::new();
        let mut seq = Sequence::new();
        expect_fan(&mut port, &mut seq, 0x00);
        expect_fan(&mut port, &mut seq, 0x01);
        expect_fan(&mut port, &mut seq, 0x00);

        let cancel = CancellationToken::new();
        let mut cl = control_loop(&[50.0, 56.0, 50.0, 46.0, 44.0], hysteresis(), port, true);
        let outcomes = [
            cl.tick(&cancel).await.unwrap(),
            cl.tick(&cancel).await.unwrap(),
            cl.tick(&cancel).await.unwrap(),
            cl.tick(&cancel).await.unwrap(),
            cl.tick(&cancel).await.unwrap(),
        ];
        assert_eq!(
            outcomes,
            [
                TickOutcome::Written,
                TickOutcome::Written,
                TickOutcome::Unchanged,
                TickOutcome::Unchanged,
                TickOutcome::Written,
            ]
        );
        assert_eq!(cl.last_emitted(), Some(Actuation::Fan(FanState::Off)));
    }

    #[tokio::test]
    async fn declared_initial_state_suppresses_first_write() {
        let mut port = MockBusPort::new();
        port.expect_write_register().never();

        let cancel = CancellationToken::new();
        let mut cl = control_loop(&[40.0], hysteresis(), port, false);
        assert_eq!(cl.tick(&cancel).await.unwrap(), TickOutcome::Unchanged);
    }

    #[tokio::test]
    async fn blend_policy_writes_all_leds() {
        let mut port = MockBusPort::new();
        let mut seq = Sequence::new();
        for (reg, value) in [(0x00, 0xff), (0x01, 128), (0x02, 0), (0x03, 128)] {
            port.expect_write_register()
                .with(eq(protocol::DEVICE_ADDR), eq(reg), eq(value))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _| Ok(()));
        }

        let mut cl = control_loop(&[47.5, 47.5], blend(), port, true);
        let cancel = CancellationToken::new();
        assert_eq!(cl.tick(&cancel).await.unwrap(), TickOutcome::Written);
        assert_eq!(cl.tick(&cancel).await.unwrap(), TickOutcome::Unchanged);
        assert_eq!(cl.last_emitted(), Some(Actuation::Color(Rgb::new(128, 0, 128))));
    }

    #[tokio::test]
    async fn fan_steps_write_once_while_hovering_on_a_bound() {
        let forty = FanSpeed::from_percent(40).unwrap();
        let policy = ActuationPolicy::from_cfg(&PolicyCfg::FanSteps {
            steps: vec![
                FanStepCfg { upto: 45.0, speed: FanSpeed::OFF },
                FanStepCfg { upto: 47.0, speed: forty },
            ],
            above: FanSpeed::FULL,
            deadband: 1.0,
        })
        .unwrap();

        let mut port = MockBusPort::new();
        let mut seq = Sequence::new();
        expect_fan(&mut port, &mut seq, forty.register_value());

        let temps = [46.9, 47.1, 46.9, 47.1, 46.9, 47.1];
        let mut cl = control_loop(&temps, policy, port, true);
        let cancel = CancellationToken::new();
        let mut outcomes = Vec::new();
        for _ in temps {
            outcomes.push(cl.tick(&cancel).await.unwrap());
        }
        assert_eq!(
            outcomes.iter().filter(|o| **o == TickOutcome::Written).count(),
            1
        );
        assert_eq!(cl.last_emitted(), Some(Actuation::Speed(forty)));
    }

    #[tokio::test]
    async fn transient_failures_do_not_stop_the_loop() {
        let mut port = MockBusPort::new();
        let mut seq = Sequence::new();
        port.expect_write_register()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(BusError::Write("nack".into())));
        expect_fan(&mut port, &mut seq, 0x01);

        let mut cl = control_loop(&[60.0], hysteresis(), port, true);
        let cancel = CancellationToken::new();
        assert_eq!(cl.tick(&cancel).await.unwrap(), TickOutcome::Written);
        assert_eq!(cl.last_emitted(), Some(Actuation::Fan(FanState::On)));
    }

    #[tokio::test]
    async fn exhausted_write_is_fatal_and_keeps_last_state() {
        let mut port = MockBusPort::new();
        port.expect_write_register()
            .times(3)
            .returning(|_, _, _| Err(BusError::Write("nack".into())));

        let mut cl = control_loop(&[60.0], hysteresis(), port, true);
        let err = cl.tick(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FatalIoError::WriteExhausted { attempts: 3, .. }));
        assert_eq!(cl.last_emitted(), None);
    }

    #[tokio::test]
    async fn implausible_reading_is_fatal() {
        let port = MockBusPort::new();
        let mut cl = control_loop(&[-273.0], hysteresis(), port, true);
        let err = cl.tick(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            FatalIoError::TemperatureRead(SensorError::OutOfRange(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_tick_starts_no_write() {
        let mut port = MockBusPort::new();
        port.expect_write_register().never();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut cl = control_loop(&[60.0], hysteresis(), port, true);
        assert_eq!(cl.tick(&cancel).await.unwrap(), TickOutcome::Cancelled);
    }

    #[tokio::test]
    async fn startup_clears_effect_for_color_policies() {
        let mut port = MockBusPort::new();
        port.expect_write_register()
            .with(eq(protocol::DEVICE_ADDR), eq(protocol::RGB_OFF_REG), eq(0x00))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut cl = control_loop(&[42.0], blend(), port, true);
        assert_eq!(cl.startup(&[]).await.unwrap(), 42.0);
    }

    #[tokio::test]
    async fn startup_applies_extra_commands() {
        let mut port = MockBusPort::new();
        let mut seq = Sequence::new();
        for (reg, value) in [
            (protocol::RGB_EFFECT_REG, 1),
            (protocol::RGB_SPEED_REG, 3),
            (protocol::RGB_COLOR_REG, 4),
        ] {
            port.expect_write_register()
                .with(eq(protocol::DEVICE_ADDR), eq(reg), eq(value))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _| Ok(()));
        }

        let extra = [
            Command::SetEffect(1),
            Command::SetEffectSpeed(3),
            Command::SetEffectColor(4),
        ];
        let mut cl = control_loop(&[42.0], hysteresis(), port, true);
        cl.startup(&extra).await.unwrap();
    }

    #[test]
    fn shutdown_turns_fan_off_once_and_swallows_errors() {
        let mut port = MockBusPort::new();
        port.expect_write_register()
            .with(eq(protocol::DEVICE_ADDR), eq(protocol::FAN_SPEED_REG), eq(0x00))
            .times(1)
            .returning(|_, _, _| Err(BusError::Write("nack".into())));

        let mut cl = control_loop(&[], hysteresis(), port, true);
        assert!(!cl.shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel_and_writes_safe_state() {
        let mut port = MockBusPort::new();
        let mut seq = Sequence::new();
        expect_fan(&mut port, &mut seq, FanSpeed::FULL.register_value());
        expect_fan(&mut port, &mut seq, FanSpeed::OFF.register_value());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let mut cl = control_loop(&[60.0, 60.0], hysteresis(), port, true);
        cl.run(&cancel).await.unwrap();
        assert_eq!(cl.last_emitted(), Some(Actuation::Fan(FanState::On)));
    }

    #[tokio::test(start_paused = true)]
    async fn half_written_color_gets_safe_state_before_fatal() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&writes);
        let mut port = MockBusPort::new();
        port.expect_write_register().returning(move |_, reg, value| {
            log.lock().unwrap().push((reg, value));
            match reg {
                protocol::LED_G_VALUE_REG => Err(BusError::Write("nack".into())),
                _ => Ok(()),
            }
        });

        let mut cl = control_loop(&[47.5], blend(), port, true);
        let err = cl.run(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_partial());
        assert_eq!(
            *writes.lock().unwrap(),
            vec![
                (protocol::LED_SELECT_REG, 0xff),
                (protocol::LED_R_VALUE_REG, 128),
                (protocol::LED_G_VALUE_REG, 0),
                (protocol::LED_G_VALUE_REG, 0),
                (protocol::LED_G_VALUE_REG, 0),
                (protocol::RGB_OFF_REG, 0x00),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_single_register_skips_safe_state() {
        let mut port = MockBusPort::new();
        port.expect_write_register()
            .with(eq(protocol::DEVICE_ADDR), eq(protocol::FAN_SPEED_REG), eq(0x01))
            .times(3)
            .returning(|_, _, _| Err(BusError::Write("nack".into())));

        let mut cl = control_loop(&[60.0], hysteresis(), port, true);
        let err = cl.run(&CancellationToken::new()).await.unwrap_err();
        assert!(!err.is_partial());
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_fatal_without_safe_state() {
        let mut port = MockBusPort::new();
        let mut seq = Sequence::new();
        expect_fan(&mut port, &mut seq, 0x01);

        // second read fails
        let mut cl = control_loop(&[60.0], hysteresis(), port, true);
        let err = cl.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FatalIoError::TemperatureRead(_)));
    }
}
