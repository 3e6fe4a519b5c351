//! The device state and reading generation engine of a synthetic IoT
//! telemetry publisher.
//!
//! This crate provides APIs to:
//!
//! - Draw bounded random integers and sensor values from an injectable
//!   random source, so that every generated value can be reproduced in tests.
//! - Keep a registry of simulated devices, where each device is bound to a
//!   sensor type the first time it appears and keeps it for its whole life.
//! - Build one structured [`reading::Reading`] per publishing tick, ready to
//!   be serialized as a `JSON` message.
//!
//! A reading always contains a device identifier, its sensor type, a
//! location and a value rounded to two decimal places. The sensor type of a
//! device is sticky, while its location is drawn again on every reading.
//!
//! This crate does not know anything about networking or timers: the
//! publishing loop lives in a separate runtime crate.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Reading construction and the generator configuration.
pub mod builder;
/// Device identifiers, locations and sensor types.
pub mod device;
/// Random sources and the bounded value generator.
pub mod random;
/// A structured sensor reading.
pub mod reading;
/// The registry of simulated devices.
pub mod registry;

#[cfg(test)]
pub(crate) fn serialize<T: serde::Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[cfg(test)]
pub(crate) fn deserialize<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}
