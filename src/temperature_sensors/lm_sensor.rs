use std::sync::LazyLock;

use async_trait::async_trait;
use lm_sensors::{
    LMSensors, SubFeatureRef,
    value::{Kind as ValueKind, Value},
};
use log::{info, warn};

use crate::{error::SensorError, sensors::TemperatureSource};

/// Wrapper making the lm-sensors handle shareable across tasks.
pub struct LMSensorsRef(pub LMSensors);

// SAFETY: libsensors (>= 3.6) guards all operations with an internal global mutex.
// The library is thread-safe but does not implement Send/Sync markers.
unsafe impl Send for LMSensorsRef {}
unsafe impl Sync for LMSensorsRef {}

/// Process-wide lm-sensors instance, `None` if libsensors is unavailable.
pub static LMSENSORS: LazyLock<Option<LMSensorsRef>> =
    LazyLock::new(|| match lm_sensors::Initializer::default().initialize() {
        Ok(sensors) => {
            info!("lm-sensors initialized successfully");
            Some(LMSensorsRef(sensors))
        }
        Err(e) => {
            warn!("lm-sensors not available: {e}");
            None
        }
    });

/// Temperature input of one lm-sensors chip feature (e.g. `cpu_thermal-virtual-0` / `temp1`).
pub struct LmSensorSource {
    key: String,
    subf: SubFeatureRef<'static>,
}

// SAFETY: libsensors (>= 3.6) guards all sensor access with an internal global mutex.
//         The `SubFeatureRef::value()` call is read-only.
//         Therefore, moving this pointer across threads cannot cause data races.
unsafe impl Send for LmSensorSource {}
unsafe impl Sync for LmSensorSource {}

impl LmSensorSource {
    /// Looks up `feature` on `chip` using the global lm-sensors instance.
    pub fn discover(chip: &str, feature: &str) -> Result<Self, SensorError> {
        let lms = LMSENSORS
            .as_ref()
            .ok_or_else(|| SensorError::LmSensors("libsensors is not available".into()))?;
        Self::discover_in(&lms.0, chip, feature)
    }

    pub fn discover_in(
        lmsensors: &'static LMSensors,
        chip: &str,
        feature: &str,
    ) -> Result<Self, SensorError> {
        let not_found = |what: &str| SensorError::LmSensors(format!("{what} not found"));

        let chip_ref = lmsensors
            .chip_iter(None)
            .find(|c| c.name().map(|n| n == chip).unwrap_or(false))
            .ok_or_else(|| not_found(&format!("chip {chip}")))?;
        let feat_ref = chip_ref
            .feature_iter()
            .find(|f| {
                f.name()
                    .map(|n| n.unwrap_or("N/A"))
                    .map(|s| s == feature)
                    .unwrap_or(false)
            })
            .ok_or_else(|| not_found(&format!("feature {feature} on chip {chip}")))?;
        let subf = feat_ref
            .sub_feature_iter()
            .find(|s| matches!(s.kind(), Some(ValueKind::TemperatureInput)))
            .ok_or_else(|| not_found(&format!("temperature input of {chip}:{feature}")))?;

        let key = format!("lm:{chip}:{feature}");
        info!("Found LM sensor: {key}");
        Ok(Self { key, subf })
    }
}

#[async_trait]
impl TemperatureSource for LmSensorSource {
    async fn read(&self) -> Result<f64, SensorError> {
        match self
            .subf
            .value()
            .map_err(|e| SensorError::LmSensors(e.to_string()))?
        {
            Value::TemperatureInput(t) => Ok(t),
            other => Err(SensorError::LmSensors(format!(
                "non-temperature value {other:?}"
            ))),
        }
    }

    fn name(&self) -> String {
        self.key.clone()
    }
}
