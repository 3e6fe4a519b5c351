use indexmap::IndexMap;
use indexmap::map::Iter;

use log::debug;

use crate::device::{DeviceId, SensorType};
use crate::random::{RandomSource, RandomValueGenerator};

/// The registry of simulated devices.
///
/// It maps each [`DeviceId`] to the [`SensorType`] assigned on its first
/// appearance. Entries are never removed nor changed, so the registry only
/// grows. Devices are kept in the order they first appeared.
///
/// Resolution takes `&mut self`, hence a registry shared among concurrent
/// tasks must sit behind a mutex or be owned by a single task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceRegistry {
    devices: IndexMap<DeviceId, SensorType>,
}

impl DeviceRegistry {
    /// Creates an empty [`DeviceRegistry`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self {
            devices: IndexMap::new(),
        }
    }

    /// Returns the [`SensorType`] of a device, assigning one on first sight.
    ///
    /// A device seen for the first time receives a [`SensorType`] drawn
    /// from the generator with equal probability, which is stored and
    /// returned. A known device returns its stored type without consuming
    /// any draw.
    pub fn resolve_sensor_type<R: RandomSource>(
        &mut self,
        device_id: &DeviceId,
        generator: &mut RandomValueGenerator<R>,
    ) -> SensorType {
        if let Some(sensor_type) = self.devices.get(device_id) {
            return *sensor_type;
        }

        let sensor_type = generator.sensor_type();
        debug!("First sight of `{device_id}`, assigned sensor type `{sensor_type}`");
        let _previous = self.devices.insert(device_id.clone(), sensor_type);
        sensor_type
    }

    /// Returns the [`SensorType`] of a known device.
    #[must_use]
    #[inline]
    pub fn get(&self, device_id: &DeviceId) -> Option<SensorType> {
        self.devices.get(device_id).copied()
    }

    /// Returns the number of known devices.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Checks whether no device has been seen yet.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Returns an iterator over the known devices, in order of appearance.
    #[inline]
    pub fn iter(&self) -> Iter<'_, DeviceId, SensorType> {
        self.devices.iter()
    }
}

impl<'a> IntoIterator for &'a DeviceRegistry {
    type Item = (&'a DeviceId, &'a SensorType);
    type IntoIter = Iter<'a, DeviceId, SensorType>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::device::{DeviceId, SensorType};
    use crate::random::{RandomValueGenerator, RngSource, SequenceSource};

    use super::DeviceRegistry;

    #[test]
    fn first_sight() {
        let mut registry = DeviceRegistry::new();
        let mut generator = RandomValueGenerator::new(RngSource::seeded(42));
        let device = DeviceId::from("device_9");

        let first = registry.resolve_sensor_type(&device, &mut generator);
        assert!(matches!(
            first,
            SensorType::Temperature | SensorType::Pressure
        ));

        let second = registry.resolve_sensor_type(&device, &mut generator);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&device), Some(first));
    }

    #[test]
    fn known_device_consumes_no_draw() {
        let mut registry = DeviceRegistry::new();
        // A draw below one half assigns a pressure sensor.
        let mut generator = RandomValueGenerator::new(SequenceSource::new(vec![0.1, 0.9]));
        let device = DeviceId::from_index(1);

        assert_eq!(
            registry.resolve_sensor_type(&device, &mut generator),
            SensorType::Pressure
        );
        assert_eq!(
            registry.resolve_sensor_type(&device, &mut generator),
            SensorType::Pressure
        );

        // The draw left untouched goes to the next new device.
        assert_eq!(
            registry.resolve_sensor_type(&DeviceId::from_index(2), &mut generator),
            SensorType::Temperature
        );
    }

    #[test]
    fn devices_kept_in_appearance_order() {
        let mut registry = DeviceRegistry::new();
        let mut generator = RandomValueGenerator::new(SequenceSource::constant(0.7));

        for index in [3, 1, 3, 2, 1] {
            let _sensor_type =
                registry.resolve_sensor_type(&DeviceId::from_index(index), &mut generator);
        }

        let order: Vec<&str> = registry.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, ["device_3", "device_1", "device_2"]);
        assert!(
            (&registry)
                .into_iter()
                .all(|(_, sensor_type)| *sensor_type == SensorType::Temperature)
        );
    }

    proptest! {
        #[test]
        fn sensor_types_are_sticky(seed in any::<u64>(), indices in prop::collection::vec(1u32..=5, 1..200)) {
            let mut registry = DeviceRegistry::new();
            let mut generator = RandomValueGenerator::new(RngSource::seeded(seed));
            let mut first_seen = std::collections::HashMap::new();

            for index in indices {
                let device = DeviceId::from_index(index);
                let sensor_type = registry.resolve_sensor_type(&device, &mut generator);
                let expected = *first_seen.entry(device).or_insert(sensor_type);
                prop_assert_eq!(sensor_type, expected);
            }
            prop_assert!(registry.len() <= 5);
        }
    }
}
