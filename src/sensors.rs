use async_trait::async_trait;

use crate::error::SensorError;

/// Lowest reading accepted as a real sample, in °C.
pub const MIN_PLAUSIBLE_TEMP: f64 = -50.0;

/// Highest reading accepted as a real sample, in °C.
pub const MAX_PLAUSIBLE_TEMP: f64 = 150.0;

#[async_trait]
pub trait TemperatureSource: Send + Sync {
    /// Current temperature in degrees Celsius.
    async fn read(&self) -> Result<f64, SensorError>;

    fn name(&self) -> String;
}

/// Rejects non-finite or implausible readings as a read fault.
pub fn validate_reading(temperature: f64) -> Result<f64, SensorError> {
    if temperature.is_finite() && (MIN_PLAUSIBLE_TEMP..=MAX_PLAUSIBLE_TEMP).contains(&temperature) {
        Ok(temperature)
    } else {
        Err(SensorError::OutOfRange(temperature))
    }
}
