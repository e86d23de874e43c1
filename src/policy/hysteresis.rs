use crate::{actuation::FanState, error::ConfigError};

/// Edge reported by [`HysteresisGate::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TurnOn,
    TurnOff,
    NoChange,
}

/// Trigger temperature and the gap below it at which the fan is released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisConfig {
    trigger_temp: f64,
    hysteresis_temp: f64,
}

impl HysteresisConfig {
    /// Fails unless `trigger_temp - hysteresis_temp < trigger_temp`.
    pub fn new(trigger_temp: f64, hysteresis_temp: f64) -> Result<Self, ConfigError> {
        let release = trigger_temp - hysteresis_temp;
        if !trigger_temp.is_finite() || !release.is_finite() || release >= trigger_temp {
            return Err(ConfigError::HysteresisInverted {
                trigger: trigger_temp,
                release,
            });
        }
        Ok(Self {
            trigger_temp,
            hysteresis_temp,
        })
    }

    pub fn trigger_temp(&self) -> f64 {
        self.trigger_temp
    }

    pub fn release_temp(&self) -> f64 {
        self.trigger_temp - self.hysteresis_temp
    }
}

/// On/off switch with a dead-zone between release and trigger.
///
/// # Example
///
/// ```
/// use fanhatd::actuation::FanState;
/// use fanhatd::policy::hysteresis::{Action, HysteresisConfig, HysteresisGate};
///
/// let mut gate = HysteresisGate::new(HysteresisConfig::new(55.0, 10.0)?, FanState::Off);
/// assert_eq!(gate.update(56.0), Action::TurnOn);
/// assert_eq!(gate.update(50.0), Action::NoChange);
/// assert_eq!(gate.update(45.0), Action::TurnOff);
/// # Ok::<(), fanhatd::error::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    config: HysteresisConfig,
    state: FanState,
}

impl HysteresisGate {
    pub fn new(config: HysteresisConfig, initial: FanState) -> Self {
        Self {
            config,
            state: initial,
        }
    }

    pub fn update(&mut self, temperature: f64) -> Action {
        match self.state {
            FanState::Off if temperature >= self.config.trigger_temp => {
                self.state = FanState::On;
                Action::TurnOn
            }
            FanState::On if temperature <= self.config.release_temp() => {
                self.state = FanState::Off;
                Action::TurnOff
            }
            _ => Action::NoChange,
        }
    }

    pub fn state(&self) -> FanState {
        self.state
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.config
    }
}
