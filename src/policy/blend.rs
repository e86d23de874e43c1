use crate::{actuation::Rgb, error::ConfigError};

/// Linear gradient from `cold` at `lower` to `hot` at `upper`.
///
/// Temperatures outside the range are clamped. Channels are rounded half
/// away from zero, so the midpoint of 0 and 255 is 128.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBlender {
    lower: f64,
    upper: f64,
    cold: Rgb,
    hot: Rgb,
}

impl ColorBlender {
    pub fn new(lower: f64, upper: f64, cold: Rgb, hot: Rgb) -> Result<Self, ConfigError> {
        if !lower.is_finite() || !upper.is_finite() || upper <= lower {
            return Err(ConfigError::EmptyBlendRange { lower, upper });
        }
        Ok(Self {
            lower,
            upper,
            cold,
            hot,
        })
    }

    /// Position of `temperature` inside the range, in `[0, 1]`.
    pub fn fraction(&self, temperature: f64) -> f64 {
        let clamped = temperature.clamp(self.lower, self.upper);
        (clamped - self.lower) / (self.upper - self.lower)
    }

    pub fn blend(&self, temperature: f64) -> Rgb {
        let f = self.fraction(temperature);
        let [r, g, b] = [
            (self.cold.r, self.hot.r),
            (self.cold.g, self.hot.g),
            (self.cold.b, self.hot.b),
        ]
        .map(|(cold, hot)| mix(cold, hot, f));
        Rgb::new(r, g, b)
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    pub fn colors(&self) -> (Rgb, Rgb) {
        (self.cold, self.hot)
    }
}

/// One-shot blend; validates the range on every call.
///
/// # Example
///
/// ```
/// use fanhatd::actuation::Rgb;
/// use fanhatd::policy::blend::blend;
///
/// let cold = Rgb::new(0, 0, 255);
/// let hot = Rgb::new(255, 0, 0);
/// assert_eq!(blend(47.5, 45.0, 50.0, cold, hot)?, Rgb::new(128, 0, 128));
/// # Ok::<(), fanhatd::error::ConfigError>(())
/// ```
pub fn blend(
    temperature: f64,
    lower: f64,
    upper: f64,
    cold: Rgb,
    hot: Rgb,
) -> Result<Rgb, ConfigError> {
    Ok(ColorBlender::new(lower, upper, cold, hot)?.blend(temperature))
}

// cold + (hot - cold) * f is exact at f = 0 and f = 1 and monotonic in f.
fn mix(cold: u8, hot: u8, fraction: f64) -> u8 {
    let cold = f64::from(cold);
    let hot = f64::from(hot);
    (cold + (hot - cold) * fraction).round().clamp(0.0, 255.0) as u8
}
