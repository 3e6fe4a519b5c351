use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::device::{DeviceId, Location};
use crate::random::{RandomSource, RandomValueGenerator};
use crate::reading::Reading;
use crate::registry::DeviceRegistry;

/// An invalid [`IndexRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// The lower bound is greater than the upper bound.
    Inverted {
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },
    /// The text is not in the `MIN..=MAX` form.
    Syntax(String),
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Inverted { min, max } => {
                write!(f, "range lower bound {min} is greater than upper bound {max}")
            }
            Self::Syntax(text) => write!(f, "`{text}` is not a `MIN..=MAX` range"),
        }
    }
}

impl std::error::Error for RangeError {}

/// A non-empty inclusive range of numeric indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    min: u32,
    max: u32,
}

impl IndexRange {
    /// Creates an [`IndexRange`] from `min` to `max`, both included.
    ///
    /// # Errors
    ///
    /// An error is returned when `min` is greater than `max`.
    pub const fn new(min: u32, max: u32) -> Result<Self, RangeError> {
        if min > max {
            return Err(RangeError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    /// Returns the lower bound.
    #[must_use]
    pub const fn min(self) -> u32 {
        self.min
    }

    /// Returns the upper bound.
    #[must_use]
    pub const fn max(self) -> u32 {
        self.max
    }

    /// Checks whether the index lies in the range.
    #[must_use]
    pub const fn contains(self, index: u32) -> bool {
        self.min <= index && index <= self.max
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}..={}", self.min, self.max)
    }
}

impl FromStr for IndexRange {
    type Err = RangeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let syntax = || RangeError::Syntax(text.into());
        let (min, max) = text.trim().split_once("..=").ok_or_else(syntax)?;
        let min = min.trim().parse().map_err(|_| syntax())?;
        let max = max.trim().parse().map_err(|_| syntax())?;
        Self::new(min, max)
    }
}

impl From<IndexRange> for RangeInclusive<u32> {
    fn from(range: IndexRange) -> Self {
        range.min..=range.max
    }
}

// Default device indices.
const DEFAULT_DEVICES: IndexRange = IndexRange { min: 1, max: 5 };
// Default warehouse indices.
const DEFAULT_WAREHOUSES: IndexRange = IndexRange { min: 1, max: 3 };

/// The index ranges devices and locations are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    devices: IndexRange,
    warehouses: IndexRange,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorConfig {
    /// Creates a [`GeneratorConfig`] with devices `1..=5` and
    /// warehouses `1..=3`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            devices: DEFAULT_DEVICES,
            warehouses: DEFAULT_WAREHOUSES,
        }
    }

    /// Sets the device index range.
    #[must_use]
    pub const fn devices(mut self, devices: IndexRange) -> Self {
        self.devices = devices;
        self
    }

    /// Sets the warehouse index range.
    #[must_use]
    pub const fn warehouses(mut self, warehouses: IndexRange) -> Self {
        self.warehouses = warehouses;
        self
    }

    /// Returns the device index range.
    #[must_use]
    pub const fn device_range(&self) -> IndexRange {
        self.devices
    }

    /// Returns the warehouse index range.
    #[must_use]
    pub const fn warehouse_range(&self) -> IndexRange {
        self.warehouses
    }
}

/// Builds one [`Reading`] per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadingBuilder {
    config: GeneratorConfig,
}

impl ReadingBuilder {
    /// Creates a [`ReadingBuilder`] from a [`GeneratorConfig`].
    #[must_use]
    pub const fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Returns the [`GeneratorConfig`].
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Builds a [`Reading`].
    ///
    /// Draws happen in this order: device index, sensor type (only when the
    /// device is new to the registry), value, warehouse index.
    /// The location is drawn again on every call, it is not bound to the
    /// device as the sensor type is.
    pub fn build_reading<R: RandomSource>(
        &self,
        registry: &mut DeviceRegistry,
        generator: &mut RandomValueGenerator<R>,
    ) -> Reading {
        let devices = self.config.devices;
        let device_id =
            DeviceId::from_index(generator.uniform_int(devices.min(), devices.max()));

        let sensor_type = registry.resolve_sensor_type(&device_id, generator);
        let value = generator.sensor_value(sensor_type);

        let warehouses = self.config.warehouses;
        let location =
            Location::from_index(generator.uniform_int(warehouses.min(), warehouses.max()));

        Reading::new(device_id, sensor_type, location, value)
    }
}
