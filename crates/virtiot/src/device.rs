use std::fmt;

use serde::{Deserialize, Serialize};

// Prefix of every device identifier.
const DEVICE_PREFIX: &str = "device_";
// Prefix of every location.
const LOCATION_PREFIX: &str = "Warehouse_";

/// The kind of sensor mounted on a simulated device.
///
/// A device is bound to one sensor type the first time it appears and keeps
/// it for the whole process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    /// A temperature sensor, in degrees Celsius.
    Temperature,
    /// A pressure sensor.
    Pressure,
}

impl SensorType {
    /// Returns the half-open interval `[min, max)` of the values
    /// produced by this sensor type.
    #[must_use]
    pub const fn bounds(self) -> (f64, f64) {
        match self {
            Self::Temperature => (-10.0, 100.0),
            Self::Pressure => (1.0, 101.0),
        }
    }

    /// Returns the [`SensorType`] name as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Pressure => "Pressure",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A simulated device identifier, formatted as `device_<n>`.
///
/// Identifiers are drawn from a small range, so the same identifier is
/// expected to appear many times during a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a [`DeviceId`] from its numeric index.
    #[must_use]
    #[inline]
    pub fn from_index(index: u32) -> Self {
        Self(format!("{DEVICE_PREFIX}{index}"))
    }

    /// Returns the [`DeviceId`] as a [`&str`].
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The place a reading comes from, formatted as `Warehouse_<n>`.
///
/// Unlike the sensor type, a location is not bound to a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    /// Creates a [`Location`] from its numeric index.
    #[must_use]
    #[inline]
    pub fn from_index(index: u32) -> Self {
        Self(format!("{LOCATION_PREFIX}{index}"))
    }

    /// Returns the [`Location`] as a [`&str`].
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{deserialize, serialize};

    use super::{DeviceId, Location, SensorType};

    #[test]
    fn device_and_location_format() {
        assert_eq!(DeviceId::from_index(3).as_str(), "device_3");
        assert_eq!(Location::from_index(1).to_string(), "Warehouse_1");
        assert_eq!(DeviceId::from("device_9"), DeviceId::from_index(9));
    }

    #[test]
    fn sensor_type_wire_names() {
        assert_eq!(serialize(SensorType::Temperature), json!("Temperature"));
        assert_eq!(serialize(SensorType::Pressure), json!("Pressure"));
        assert_eq!(
            deserialize::<SensorType>(json!("Pressure")),
            SensorType::Pressure
        );
        assert_eq!(SensorType::Temperature.to_string(), "Temperature");
    }

    #[test]
    fn transparent_identifiers() {
        assert_eq!(serialize(DeviceId::from_index(2)), json!("device_2"));
        assert_eq!(
            deserialize::<Location>(json!("Warehouse_3")),
            Location::from_index(3)
        );
    }

    #[test]
    fn sensor_bounds() {
        assert_eq!(SensorType::Temperature.bounds(), (-10.0, 100.0));
        assert_eq!(SensorType::Pressure.bounds(), (1.0, 101.0));
    }
}
