use crate::error::ConfigError;

/// Discrete temperature table.
///
/// Holds strictly ascending `(upper_bound, level)` brackets and one overflow
/// level for temperatures above the last bound. A temperature maps to the
/// level of the first bracket whose bound is `>=` the temperature.
///
/// The payload is generic: fan speeds and discrete colors share the same
/// bucketing.
///
/// # Example
///
/// ```
/// use fanhatd::policy::threshold::ThresholdMapper;
///
/// let table = ThresholdMapper::new(vec![(45.0, 0), (47.0, 40), (49.0, 60)], 100)?;
/// assert_eq!(*table.map(44.0), 0);
/// assert_eq!(*table.map(45.0), 0);
/// assert_eq!(*table.map(46.5), 40);
/// assert_eq!(*table.map(80.0), 100);
/// # Ok::<(), fanhatd::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdMapper<T> {
    brackets: Vec<(f64, T)>,
    overflow: T,
}

impl<T> ThresholdMapper<T> {
    pub fn new(brackets: Vec<(f64, T)>, overflow: T) -> Result<Self, ConfigError> {
        check_ascending(&brackets)?;
        Ok(Self { brackets, overflow })
    }

    /// Builds a mapper from a table whose last entry is the open-ended bracket.
    ///
    /// The last bound still takes part in the ordering check (it is usually
    /// `f64::INFINITY`), but its level is returned for everything above the
    /// previous bound.
    pub fn from_table(mut table: Vec<(f64, T)>) -> Result<Self, ConfigError> {
        check_ascending(&table)?;
        let (_, overflow) = table.pop().ok_or(ConfigError::EmptyThresholdTable)?;
        Ok(Self {
            brackets: table,
            overflow,
        })
    }

    pub fn map(&self, temperature: f64) -> &T {
        let idx = self
            .brackets
            .partition_point(|(upper, _)| *upper < temperature);
        self.brackets
            .get(idx)
            .map_or(&self.overflow, |(_, level)| level)
    }

    /// Number of levels, overflow included.
    pub fn level_count(&self) -> usize {
        self.brackets.len() + 1
    }

    /// Bounds and levels in ascending order; the overflow bracket has no bound.
    pub fn iter(&self) -> impl Iterator<Item = (Option<f64>, &T)> {
        self.brackets
            .iter()
            .map(|(bound, level)| (Some(*bound), level))
            .chain(std::iter::once((None, &self.overflow)))
    }
}

/// A [`ThresholdMapper`] that re-buckets only after the temperature has moved.
///
/// The table is consulted again once the reading differs from the reading of
/// the last evaluation by at least `deadband` °C. A sensor hovering around a
/// bracket bound therefore keeps its level.
///
/// # Example
///
/// ```
/// use fanhatd::policy::threshold::{SteppedLevel, ThresholdMapper};
///
/// let table = ThresholdMapper::new(vec![(45.0, 0), (47.0, 40)], 100)?;
/// let mut level = SteppedLevel::new(table, 1.0)?;
/// assert_eq!(level.update(46.9), 40);
/// assert_eq!(level.update(47.1), 40);
/// assert_eq!(level.update(48.0), 100);
/// # Ok::<(), fanhatd::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SteppedLevel<T> {
    table: ThresholdMapper<T>,
    deadband: f64,
    anchor: Option<(f64, T)>,
}

impl<T: Copy> SteppedLevel<T> {
    pub fn new(table: ThresholdMapper<T>, deadband: f64) -> Result<Self, ConfigError> {
        if !deadband.is_finite() || deadband < 0.0 {
            return Err(ConfigError::InvalidDeadband(deadband));
        }
        Ok(Self {
            table,
            deadband,
            anchor: None,
        })
    }

    pub fn update(&mut self, temperature: f64) -> T {
        match self.anchor {
            Some((at, level)) if (temperature - at).abs() < self.deadband => level,
            _ => {
                let level = *self.table.map(temperature);
                self.anchor = Some((temperature, level));
                level
            }
        }
    }

    pub fn table(&self) -> &ThresholdMapper<T> {
        &self.table
    }

    pub fn deadband(&self) -> f64 {
        self.deadband
    }
}

fn check_ascending<T>(brackets: &[(f64, T)]) -> Result<(), ConfigError> {
    let mut previous: Option<f64> = None;
    for (index, (bound, _)) in brackets.iter().enumerate() {
        if bound.is_nan() || previous.is_some_and(|p| *bound <= p) {
            return Err(ConfigError::UnsortedThresholds {
                index,
                bound: *bound,
            });
        }
        previous = Some(*bound);
    }
    Ok(())
}
