use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceId, Location, SensorType};

/// One structured sensor measurement.
///
/// A reading is built and published within a single tick and never
/// retained. On the wire it is a `JSON` object with the `device_id`,
/// `sensor_type`, `location` and `value` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Device identifier.
    pub device_id: DeviceId,
    /// Sensor type bound to the device.
    pub sensor_type: SensorType,
    /// Where the reading comes from.
    pub location: Location,
    /// Measured value, with at most two decimal digits.
    pub value: f64,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{} ({}) at {}: {}",
            self.device_id, self.sensor_type, self.location, self.value
        )
    }
}

impl Reading {
    /// Creates a [`Reading`].
    #[must_use]
    pub const fn new(
        device_id: DeviceId,
        sensor_type: SensorType,
        location: Location,
        value: f64,
    ) -> Self {
        Self {
            device_id,
            sensor_type,
            location,
            value,
        }
    }

    /// Serializes the [`Reading`] into its `JSON` wire format.
    ///
    /// # Errors
    ///
    /// Serialization only fails for values that a generated reading
    /// never holds, so an error here reveals a defect.
    #[inline]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use crate::device::{DeviceId, Location, SensorType};
    use crate::random::round_hundredths;
    use crate::{deserialize, serialize};

    use super::Reading;

    fn reading() -> Reading {
        Reading::new(
            DeviceId::from_index(4),
            SensorType::Temperature,
            Location::from_index(2),
            23.45,
        )
    }

    #[test]
    fn wire_format() {
        assert_eq!(
            serialize(reading()),
            json!({
                "device_id": "device_4",
                "sensor_type": "Temperature",
                "location": "Warehouse_2",
                "value": 23.45,
            })
        );
        assert_eq!(
            reading().to_json().unwrap(),
            r#"{"device_id":"device_4","sensor_type":"Temperature","location":"Warehouse_2","value":23.45}"#
        );
    }

    #[test]
    fn parse_by_key() {
        let parsed: Reading = serde_json::from_str(
            r#"{"value":-3.5,"location":"Warehouse_1","sensor_type":"Pressure","device_id":"device_1"}"#,
        )
        .unwrap();

        assert_eq!(
            parsed,
            Reading::new(
                DeviceId::from_index(1),
                SensorType::Pressure,
                Location::from_index(1),
                -3.5
            )
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            reading().to_string(),
            "device_4 (Temperature) at Warehouse_2: 23.45"
        );
    }

    proptest! {
        #[test]
        fn serialization_round_trip(
            device in 1u32..=5,
            warehouse in 1u32..=3,
            pressure in any::<bool>(),
            raw in -10.0f64..101.0,
        ) {
            let sensor_type = if pressure { SensorType::Pressure } else { SensorType::Temperature };
            let reading = Reading::new(
                DeviceId::from_index(device),
                sensor_type,
                Location::from_index(warehouse),
                round_hundredths(raw),
            );

            let json = reading.to_json().unwrap();
            let parsed: Reading = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(&parsed, &reading);

            let value = serialize(&reading);
            prop_assert!(value["value"].is_f64() || value["value"].is_i64() || value["value"].is_u64());
            prop_assert_eq!(deserialize::<Reading>(value), reading);
        }
    }
}
