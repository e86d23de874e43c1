//! Values the control loop pushes to the cooling hat.
//!
//! An [`Actuation`] is what a policy wants the device to show for the current
//! tick. The loop compares it against the last emitted one to decide whether
//! a bus write is needed at all.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{drivers::cooling_hat::protocol::Command, error::ConfigError};

/// Binary fan state used by the hysteresis policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanState {
    #[default]
    Off,
    On,
}

impl FanState {
    /// Fan speed that realizes this state on the device.
    pub const fn speed(self) -> FanSpeed {
        match self {
            FanState::Off => FanSpeed::OFF,
            FanState::On => FanSpeed::FULL,
        }
    }
}

impl fmt::Display for FanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanState::Off => f.write_str("OFF"),
            FanState::On => f.write_str("ON"),
        }
    }
}

/// One of the ten fan duty levels the hat understands.
///
/// The register takes a single byte: `0x00` stops the fan, `0x01` runs it at
/// full speed and `0x02..=0x09` select 20%..90%. There is no 10% level.
///
/// # Example
///
/// ```
/// use fanhatd::actuation::FanSpeed;
///
/// let speed = FanSpeed::from_percent(40)?;
/// assert_eq!(speed.register_value(), 0x04);
/// assert_eq!(FanSpeed::FULL.register_value(), 0x01);
/// assert!(FanSpeed::from_percent(10).is_err());
/// # Ok::<(), fanhatd::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FanSpeed(u8);

impl FanSpeed {
    pub const OFF: FanSpeed = FanSpeed(0);
    pub const FULL: FanSpeed = FanSpeed(100);

    /// Every supported level, ascending.
    pub const LEVELS: [u8; 10] = [0, 20, 30, 40, 50, 60, 70, 80, 90, 100];

    pub fn from_percent(percent: u8) -> Result<Self, ConfigError> {
        if Self::LEVELS.contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(ConfigError::InvalidFanSpeed(percent))
        }
    }

    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Byte written to the fan speed register.
    pub const fn register_value(self) -> u8 {
        match self.0 {
            0 => 0x00,
            100 => 0x01,
            p => p / 10,
        }
    }
}

impl TryFrom<u8> for FanSpeed {
    type Error = ConfigError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        Self::from_percent(percent)
    }
}

impl From<FanSpeed> for u8 {
    fn from(speed: FanSpeed) -> Self {
        speed.0
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// RGB triple. Deserializes from `[r, g, b]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(rgb: Rgb) -> Self {
        rgb.channels()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Desired device output for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuation {
    Fan(FanState),
    Speed(FanSpeed),
    Color(Rgb),
}

impl Actuation {
    /// Device command that puts this actuation on the hat.
    pub fn command(self) -> Command {
        match self {
            Actuation::Fan(state) => Command::SetFan(state.speed()),
            Actuation::Speed(speed) => Command::SetFan(speed),
            Actuation::Color(rgb) => Command::all_leds(rgb),
        }
    }
}

impl fmt::Display for Actuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actuation::Fan(state) => write!(f, "fan {state}"),
            Actuation::Speed(speed) => write!(f, "fan speed {speed}"),
            Actuation::Color(rgb) => write!(f, "color {rgb}"),
        }
    }
}
