//! Application entry point and builder pattern implementation.

use anyhow::{Context, Result, anyhow};
use log::{error, info};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    control_loop::ControlLoop,
    drivers::cooling_hat::{I2cBus, device_io::BusPort, protocol::Command},
    error::{BusError, ConfigError, FatalIoError, SensorError},
    policy::ActuationPolicy,
    retry::RetryingWriter,
    temperature_sensors,
};

/// Exit code for an invalid or unreadable configuration.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for a bus or device fault.
pub const EXIT_BUS: u8 = 3;
/// Exit code for a temperature source fault.
pub const EXIT_SENSOR: u8 = 4;

/// Wires configuration, bus and temperature source into a [`ControlLoop`]
/// and runs it until SIGINT or SIGTERM.
///
/// # Example
///
/// ```no_run
/// use fanhatd::{application::Application, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load(None).await?;
/// Application::builder().with_config(config).build()?.run().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Application {
    config: Config,
    policy: ActuationPolicy,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> &ActuationPolicy {
        &self.policy
    }

    /// Builds the loop around `bus`, opening the configured temperature source.
    pub fn control_loop<P: BusPort>(&self, bus: P) -> Result<ControlLoop<P>> {
        let source = temperature_sensors::from_cfg(&self.config.sensor)
            .context("Failed to open temperature source")?;
        let writer = RetryingWriter::new(bus, self.config.retry_policy()?);
        Ok(ControlLoop::new(
            source,
            self.policy.clone(),
            writer,
            self.config.device_address,
            self.config.interval()?,
            self.config.force_initial_write,
        ))
    }

    /// Extra startup commands: the configured LED effect, for fan-only policies.
    pub fn startup_commands(&self) -> Vec<Command> {
        match &self.config.led_effect {
            Some(effect) if !self.policy.drives_leds() => effect.commands().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Runs the daemon on the configured `/dev/i2c-N` bus.
    pub async fn run(self) -> Result<()> {
        let bus = I2cBus::new(self.config.bus_number);
        info!(
            "Using {} device {:#04x}",
            bus.path().display(),
            self.config.device_address
        );
        let mut control = self.control_loop(bus)?;

        let cancel = CancellationToken::new();
        tokio::spawn(watch_signals(cancel.clone()));

        control
            .startup(&self.startup_commands())
            .await
            .context("Startup failed")?;
        control.run(&cancel).await.context("Control loop stopped")?;
        info!("Stopped");
        Ok(())
    }
}

/// Cancels `cancel` on the first SIGINT or SIGTERM.
async fn watch_signals(cancel: CancellationToken) {
    let signals = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    );
    let (mut sigint, mut sigterm) = match signals {
        (Ok(int), Ok(term)) => (int, term),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to listen for shutdown signals: {e}");
            cancel.cancel();
            return;
        }
    };
    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown..."),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
    cancel.cancel();
}

/// Process exit code for an error returned by startup or the control loop.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() || cause.is::<serde_yaml::Error>() {
            return EXIT_CONFIG;
        }
        if cause.is::<BusError>() {
            return EXIT_BUS;
        }
        if cause.is::<SensorError>() {
            return EXIT_SENSOR;
        }
        if let Some(fatal) = cause.downcast_ref::<FatalIoError>() {
            return match fatal {
                FatalIoError::WriteExhausted { .. } => EXIT_BUS,
                FatalIoError::TemperatureRead(_) => EXIT_SENSOR,
            };
        }
    }
    1
}

/// Builder pattern for creating Application instances.
pub struct ApplicationBuilder {
    config: Option<Config>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self { config: None }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Validates the configuration and builds the policy.
    pub fn build(self) -> Result<Application> {
        let config = self
            .config
            .ok_or_else(|| anyhow!("Configuration is required"))?;
        config.validate().context("Invalid configuration")?;
        let policy = ActuationPolicy::from_cfg(&config.policy)?;
        Ok(Application { config, policy })
    }
}
