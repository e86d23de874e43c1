use serde::{Deserialize, Serialize};

use crate::{
    actuation::{FanSpeed, Rgb},
    error::ConfigError,
};

/// Default SMBus address of the hat.
pub const DEVICE_ADDR: u8 = 0x0d;

pub const LED_SELECT_REG: u8 = 0x00;
pub const LED_R_VALUE_REG: u8 = 0x01;
pub const LED_G_VALUE_REG: u8 = 0x02;
pub const LED_B_VALUE_REG: u8 = 0x03;
pub const RGB_EFFECT_REG: u8 = 0x04;
pub const RGB_SPEED_REG: u8 = 0x05;
pub const RGB_COLOR_REG: u8 = 0x06;
pub const RGB_OFF_REG: u8 = 0x07;
pub const FAN_SPEED_REG: u8 = 0x08;

/// LED select value addressing every LED at once.
pub const ALL_LEDS: u8 = 0xff;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    SetFan(FanSpeed),
    SetRgb { led: u8, rgb: Rgb },
    RgbOff,
    SetEffect(u8),
    SetEffectSpeed(u8),
    SetEffectColor(u8),
}

impl Command {
    /// Static color on every LED.
    pub const fn all_leds(rgb: Rgb) -> Self {
        Command::SetRgb { led: ALL_LEDS, rgb }
    }

    /// Register writes, in bus order, as `(register, value)` pairs.
    pub fn to_writes(&self) -> Vec<(u8, u8)> {
        match *self {
            Command::SetFan(speed) => vec![(FAN_SPEED_REG, speed.register_value())],
            Command::SetRgb { led, rgb } => vec![
                (LED_SELECT_REG, led),
                (LED_R_VALUE_REG, rgb.r),
                (LED_G_VALUE_REG, rgb.g),
                (LED_B_VALUE_REG, rgb.b),
            ],
            Command::RgbOff => vec![(RGB_OFF_REG, 0x00)],
            Command::SetEffect(effect) => vec![(RGB_EFFECT_REG, effect)],
            Command::SetEffectSpeed(speed) => vec![(RGB_SPEED_REG, speed)],
            Command::SetEffectColor(color) => vec![(RGB_COLOR_REG, color)],
        }
    }
}

/// Built-in LED animation of the hat firmware.
///
/// `effect` selects the animation (0..=4), `speed` its pace (1..=3) and
/// `color` one of the firmware palette entries (0..=6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedEffect {
    pub effect: u8,
    pub speed: u8,
    pub color: u8,
}

impl LedEffect {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("led effect", self.effect, 0, 4)?;
        check_range("led effect speed", self.speed, 1, 3)?;
        check_range("led effect color", self.color, 0, 6)
    }

    pub fn commands(&self) -> [Command; 3] {
        [
            Command::SetEffect(self.effect),
            Command::SetEffectSpeed(self.speed),
            Command::SetEffectColor(self.color),
        ]
    }
}

fn check_range(what: &'static str, value: u8, min: u8, max: u8) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            what,
            value,
            min,
            max,
        })
    }
}
