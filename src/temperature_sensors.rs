//! Temperature source backends.

pub mod lm_sensor;
pub mod thermal_zone;

use crate::{config::SensorCfg, error::SensorError, sensors::TemperatureSource};

use self::{lm_sensor::LmSensorSource, thermal_zone::ThermalZoneSensor};

/// Opens the source described by `cfg`.
pub fn from_cfg(cfg: &SensorCfg) -> Result<Box<dyn TemperatureSource>, SensorError> {
    Ok(match cfg {
        SensorCfg::ThermalZone { path } => Box::new(ThermalZoneSensor::new(path.clone())),
        SensorCfg::LmSensors { chip, feature } => {
            Box::new(LmSensorSource::discover(chip, feature)?)
        }
    })
}
