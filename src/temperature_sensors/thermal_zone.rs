use std::path::PathBuf;

use async_trait::async_trait;

use crate::{error::SensorError, sensors::TemperatureSource};

pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Kernel thermal zone exposed as a file holding millidegrees Celsius.
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TemperatureSource for ThermalZoneSensor {
    async fn read(&self) -> Result<f64, SensorError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SensorError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let line = raw.lines().next().unwrap_or_default().trim();
        line.parse::<f64>()
            .map(|milli| milli / 1000.0)
            .map_err(|_| SensorError::Parse {
                path: self.path.display().to_string(),
                raw: line.to_string(),
            })
    }

    fn name(&self) -> String {
        format!("thermal:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn zone_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn reads_millidegrees() {
        let file = zone_file("47500\n");
        let sensor = ThermalZoneSensor::new(file.path());
        assert_eq!(sensor.read().await.unwrap(), 47.5);
    }

    #[tokio::test]
    async fn negative_values_are_parsed() {
        let file = zone_file("-4250\n");
        let sensor = ThermalZoneSensor::new(file.path());
        assert_eq!(sensor.read().await.unwrap(), -4.25);
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let file = zone_file("hot\n");
        let sensor = ThermalZoneSensor::new(file.path());
        match sensor.read().await {
            Err(SensorError::Parse { raw, .. }) => assert_eq!(raw, "hot"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let sensor = ThermalZoneSensor::new("/nonexistent/thermal_zone9/temp");
        assert!(matches!(sensor.read().await, Err(SensorError::Io { .. })));
        assert_eq!(sensor.name(), "thermal:/nonexistent/thermal_zone9/temp");
    }
}
