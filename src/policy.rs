//! Temperature-to-actuation policies.
//!
//! One [`ActuationPolicy`] is chosen at startup from configuration and drives
//! the control loop for the whole run:
//! - `Hysteresis`: fan on/off with a dead-zone ([`hysteresis::HysteresisGate`])
//! - `FanSteps`: discrete fan speed table with a deadband ([`threshold::SteppedLevel`])
//! - `ColorSteps`: discrete LED color table with a deadband ([`threshold::SteppedLevel`])
//! - `ColorBlend`: continuous LED gradient ([`blend::ColorBlender`])

pub mod blend;
pub mod hysteresis;
pub mod threshold;

use std::fmt;

use log::info;

use crate::{
    actuation::{Actuation, FanSpeed, FanState, Rgb},
    config::PolicyCfg,
    drivers::cooling_hat::protocol::Command,
    error::ConfigError,
};

use self::{
    blend::ColorBlender,
    hysteresis::{Action, HysteresisConfig, HysteresisGate},
    threshold::{SteppedLevel, ThresholdMapper},
};

#[derive(Debug, Clone)]
pub enum ActuationPolicy {
    Hysteresis(HysteresisGate),
    FanSteps(SteppedLevel<FanSpeed>),
    ColorSteps(SteppedLevel<Rgb>),
    ColorBlend(ColorBlender),
}

impl ActuationPolicy {
    /// Builds the policy, enforcing every construction invariant.
    pub fn from_cfg(cfg: &PolicyCfg) -> Result<Self, ConfigError> {
        Ok(match cfg {
            PolicyCfg::Hysteresis {
                trigger_temp,
                hysteresis_temp,
                initial_state,
            } => ActuationPolicy::Hysteresis(HysteresisGate::new(
                HysteresisConfig::new(*trigger_temp, *hysteresis_temp)?,
                *initial_state,
            )),
            PolicyCfg::FanSteps {
                steps,
                above,
                deadband,
            } => ActuationPolicy::FanSteps(SteppedLevel::new(
                ThresholdMapper::new(steps.iter().map(|s| (s.upto, s.speed)).collect(), *above)?,
                *deadband,
            )?),
            PolicyCfg::ColorSteps {
                steps,
                above,
                deadband,
            } => ActuationPolicy::ColorSteps(SteppedLevel::new(
                ThresholdMapper::new(steps.iter().map(|s| (s.upto, s.rgb)).collect(), *above)?,
                *deadband,
            )?),
            PolicyCfg::ColorBlend {
                lower,
                upper,
                cold,
                hot,
            } => ActuationPolicy::ColorBlend(ColorBlender::new(*lower, *upper, *cold, *hot)?),
        })
    }

    /// Desired device output for `temperature`. The hysteresis gate and the
    /// step deadbands carry state between calls.
    pub fn evaluate(&mut self, temperature: f64) -> Actuation {
        match self {
            ActuationPolicy::Hysteresis(gate) => {
                match gate.update(temperature) {
                    Action::TurnOn => info!("Fan action: ON at {temperature:.2}°C"),
                    Action::TurnOff => info!("Fan action: OFF at {temperature:.2}°C"),
                    Action::NoChange => {}
                }
                Actuation::Fan(gate.state())
            }
            ActuationPolicy::FanSteps(level) => Actuation::Speed(level.update(temperature)),
            ActuationPolicy::ColorSteps(level) => Actuation::Color(level.update(temperature)),
            ActuationPolicy::ColorBlend(blender) => Actuation::Color(blender.blend(temperature)),
        }
    }

    /// State the device is declared to be in before the first tick, if the
    /// policy has one.
    pub fn declared_state(&self) -> Option<Actuation> {
        match self {
            ActuationPolicy::Hysteresis(gate) => Some(Actuation::Fan(gate.state())),
            _ => None,
        }
    }

    pub fn drives_leds(&self) -> bool {
        matches!(
            self,
            ActuationPolicy::ColorSteps(_) | ActuationPolicy::ColorBlend(_)
        )
    }

    /// Commands issued once before the first tick.
    pub fn startup_commands(&self) -> Vec<Command> {
        if self.drives_leds() {
            // clears any running firmware effect
            vec![Command::RgbOff]
        } else {
            Vec::new()
        }
    }

    /// Commands that leave the driven actuator in a safe, quiet state.
    pub fn safe_state(&self) -> Vec<Command> {
        if self.drives_leds() {
            vec![Command::RgbOff]
        } else {
            vec![Command::SetFan(FanState::Off.speed())]
        }
    }
}

impl fmt::Display for ActuationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuationPolicy::Hysteresis(gate) => {
                let cfg = gate.config();
                write!(
                    f,
                    "hysteresis: on at >= {:.2}°C, off at <= {:.2}°C (initial {})",
                    cfg.trigger_temp(),
                    cfg.release_temp(),
                    gate.state()
                )
            }
            ActuationPolicy::FanSteps(level) => {
                write!(f, "fan steps (deadband {}°C):", level.deadband())?;
                write_table(f, level.table())
            }
            ActuationPolicy::ColorSteps(level) => {
                write!(f, "color steps (deadband {}°C):", level.deadband())?;
                write_table(f, level.table())
            }
            ActuationPolicy::ColorBlend(blender) => {
                let (lower, upper) = blender.bounds();
                let (cold, hot) = blender.colors();
                write!(
                    f,
                    "color blend: {cold} at {lower:.2}°C to {hot} at {upper:.2}°C"
                )
            }
        }
    }
}

fn write_table<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    table: &ThresholdMapper<T>,
) -> fmt::Result {
    for (bound, level) in table.iter() {
        match bound {
            Some(bound) => write!(f, " <={bound}°C {level},")?,
            None => write!(f, " above {level}")?,
        }
    }
    Ok(())
}
