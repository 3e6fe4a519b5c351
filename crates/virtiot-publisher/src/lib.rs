//! The `virtiot-publisher` library crate publishes the synthetic readings
//! produced by `virtiot` on an MQTT broker at a fixed interval.
//!
//! Core functionalities of this crate include:
//!
//! - Loading the mutual TLS credentials needed to authenticate against the
//!   broker, either from PEM files or from a secret document whose fields
//!   are base64-encoded PEM blocks
//! - Connecting to the broker and turning its network events into a small
//!   set of transport events
//! - Scheduling a reading at every tick of a timer which runs only while the
//!   connection is open
//!
//! Publishing is fire-and-forget: a message is handed to the transport
//! without waiting for the broker acknowledgement.
//!
//! `virtiot-publisher` leverages `tokio` as an asynchronous executor, so the
//! network event loop and the publishing loop run concurrently.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// TLS credentials and secret documents.
pub mod credentials;
/// Error management.
pub mod error;
/// An MQTT transport.
pub mod mqtt;
/// The publishing scheduler.
pub mod scheduler;
/// The transport contract.
pub mod transport;
