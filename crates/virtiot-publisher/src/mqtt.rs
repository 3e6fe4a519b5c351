use std::time::Duration;

use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions};
use rumqttc::{TlsConfiguration, Transport as MqttLayer};

use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, info};

use crate::credentials::TlsMaterial;
use crate::error::{Error, ErrorKind, Result};
use crate::transport::{Transport, TransportEvent};

// The capacity of the bounded outgoing request channel.
const ASYNC_CHANNEL_CAPACITY: usize = 10;

// The capacity of the transport events channel.
const EVENTS_CHANNEL_CAPACITY: usize = 16;

// Default port for MQTT over TLS.
const DEFAULT_PORT: u16 = 8883;

// Keep alive time to send `pingreq` to broker when the connection is idle.
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

// Pause before polling again after a connection failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connection parameters of an MQTT-over-TLS broker.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    endpoint: String,
    port: u16,
    client_id: String,
    keep_alive: Duration,
    tls: TlsMaterial,
}

impl MqttConfig {
    /// Creates a [`MqttConfig`] for the given endpoint and client identifier
    /// on port `8883`, authenticated with the given [`TlsMaterial`].
    #[must_use]
    #[inline]
    pub fn new(endpoint: impl Into<String>, client_id: impl Into<String>, tls: TlsMaterial) -> Self {
        Self {
            endpoint: endpoint.into(),
            port: DEFAULT_PORT,
            client_id: client_id.into(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            tls,
        }
    }

    /// Sets the broker port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the keep alive interval.
    #[must_use]
    pub const fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the broker endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn options(&self) -> MqttOptions {
        let tls = TlsConfiguration::Simple {
            ca: self.tls.root_ca.clone(),
            alpn: None,
            client_auth: Some((self.tls.certificate.clone(), self.tls.private_key.clone())),
        };

        let mut options = MqttOptions::new(&self.client_id, &self.endpoint, self.port);
        let _ = options
            .set_keep_alive(self.keep_alive)
            .set_clean_start(true)
            .set_transport(MqttLayer::Tls(tls));
        options
    }
}

// What a polled event means for the publisher.
#[derive(Debug, PartialEq)]
enum Signal {
    ConnAck,
    Disconnect,
    Failure(String),
    Ignored,
}

#[inline]
fn classify(event: &std::result::Result<Event, ConnectionError>) -> Signal {
    match event {
        Ok(Event::Incoming(Packet::ConnAck(_))) => Signal::ConnAck,
        Ok(Event::Incoming(Packet::Disconnect(_))) => Signal::Disconnect,
        Ok(_) => Signal::Ignored,
        Err(e) => Signal::Failure(e.to_string()),
    }
}

// Turns signals into transport events, reporting a close only for a
// connection that was actually open.
#[derive(Debug, Default)]
struct EventMapper {
    connected: bool,
}

impl EventMapper {
    fn map(&mut self, signal: Signal) -> Vec<TransportEvent> {
        match signal {
            Signal::ConnAck => {
                self.connected = true;
                vec![TransportEvent::Connected]
            }
            Signal::Disconnect => self.close().into_iter().collect(),
            Signal::Failure(e) => {
                let mut events = vec![TransportEvent::Error(e)];
                events.extend(self.close());
                events
            }
            Signal::Ignored => Vec::new(),
        }
    }

    fn close(&mut self) -> Option<TransportEvent> {
        std::mem::replace(&mut self.connected, false).then_some(TransportEvent::Closed)
    }
}

// Returns `false` when cancelled before the delay elapses.
async fn pause(cancellation_token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        () = cancellation_token.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

async fn run_event_pump(
    mut eventloop: EventLoop,
    cancellation_token: CancellationToken,
    sender: mpsc::Sender<TransportEvent>,
) {
    let mut mapper = EventMapper::default();
    'pump: loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            // Poll the `MQTT` event coming from the network
            event = eventloop.poll() => {
                let signal = classify(&event);
                let failed = matches!(signal, Signal::Failure(_));

                for transport_event in mapper.map(signal) {
                    if let Err(e) = sender.send(transport_event).await {
                        error!("Stop forwarding transport events: {e}");
                        break 'pump;
                    }
                }

                // The next poll reconnects.
                if failed && !pause(&cancellation_token, RECONNECT_DELAY).await {
                    break 'pump;
                }
            }
        }
    }

    // An open connection ends with the pump.
    if let Some(closed) = mapper.close() {
        let _ = sender.try_send(closed);
    }
    debug!("Transport event pump stopped");
    drop(eventloop);
}

/// The background task polling the broker connection.
#[derive(Debug)]
pub struct EventPump {
    handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl EventPump {
    /// Waits for the task to end by itself for at most `grace`, then
    /// cancels it.
    ///
    /// The task ends by itself once the transport events receiver has been
    /// dropped and the connection fails, for example because the broker
    /// closed it after a disconnection request.
    ///
    /// # Errors
    ///
    /// An error is returned when the task panicked.
    pub async fn stop(mut self, grace: Duration) -> Result<()> {
        let joined = match timeout(grace, &mut self.handle).await {
            Ok(joined) => joined,
            Err(_) => {
                debug!("Transport event pump still running, cancelling it");
                self.cancellation_token.cancel();
                self.handle.await
            }
        };

        joined.map_err(|e| {
            Error::new(
                ErrorKind::Transport,
                format!("Transport event pump failed: {e}"),
            )
        })
    }
}

/// A [`Transport`] publishing over MQTT.
///
/// Messages are published with quality of service `1`, at least once,
/// and never retained.
#[derive(Debug, Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

/// An open MQTT connection.
#[derive(Debug)]
pub struct MqttConnection {
    /// The [`Transport`] used to publish.
    pub transport: MqttTransport,
    /// The transport events.
    pub events: Receiver<TransportEvent>,
    /// The task polling the network, also stopped by the cancellation
    /// token passed to [`MqttTransport::connect`].
    pub pump: EventPump,
}

impl MqttTransport {
    /// Starts connecting to the broker described by [`MqttConfig`].
    ///
    /// The handshake happens in a background task, which reports
    /// [`TransportEvent::Connected`] once completed and keeps reconnecting
    /// after failures until the cancellation token is cancelled.
    ///
    /// It must be called from within a `tokio` runtime.
    #[must_use]
    pub fn connect(config: &MqttConfig, cancellation_token: CancellationToken) -> MqttConnection {
        info!(
            "Connecting to `{}:{}` as `{}`",
            config.endpoint, config.port, config.client_id
        );

        let (client, eventloop) = AsyncClient::new(config.options(), ASYNC_CHANNEL_CAPACITY);
        let (sender, events) = mpsc::channel(EVENTS_CHANNEL_CAPACITY);

        let handle = tokio::spawn(run_event_pump(
            eventloop,
            cancellation_token.clone(),
            sender,
        ));

        MqttConnection {
            transport: Self { client },
            events,
            pump: EventPump {
                handle,
                cancellation_token,
            },
        }
    }

    /// Requests a disconnection from the broker, without waiting.
    ///
    /// The request is sent after the messages already queued.
    ///
    /// # Errors
    ///
    /// An error is returned when the disconnection request cannot be
    /// queued, for example because the outgoing queue is full.
    pub fn disconnect(&self) -> Result<()> {
        self.client.try_disconnect().map_err(Error::from)
    }
}

impl Transport for MqttTransport {
    fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.client
            .try_publish(topic.to_owned(), QoS::AtLeastOnce, false, payload)
            .map_err(|e| {
                Error::new(
                    ErrorKind::Transport,
                    format!("Impossible to publish on topic `{topic}`: {e}"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rumqttc::v5::{AsyncClient, ConnectionError};

    use tokio_util::sync::CancellationToken;

    use crate::credentials::TlsMaterial;
    use crate::credentials::tests::{CA, CERT, KEY};
    use crate::error::ErrorKind;
    use crate::transport::{Transport, TransportEvent};

    use super::{
        ASYNC_CHANNEL_CAPACITY, EventMapper, EventPump, MqttConfig, MqttTransport, Signal,
        classify, pause,
    };

    fn material() -> TlsMaterial {
        TlsMaterial::new(
            KEY.into(),
            CERT.into(),
            CA.into(),
            ErrorKind::Credentials,
        )
        .unwrap()
    }

    #[test]
    fn mqtt_options() {
        let config = MqttConfig::new("broker.example.com", "iOTestID", material())
            .port(8884)
            .keep_alive(Duration::from_secs(10));

        assert_eq!(config.endpoint(), "broker.example.com");
        assert_eq!(config.client_id(), "iOTestID");

        let options = config.options();
        assert_eq!(options.client_id(), "iOTestID");
        assert_eq!(
            options.broker_address(),
            ("broker.example.com".into(), 8884)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(10));
    }

    #[test]
    fn failures_are_classified() {
        let event = Err(ConnectionError::Io(std::io::Error::other("reset by peer")));
        assert!(matches!(
            classify(&event),
            Signal::Failure(e) if e.contains("reset by peer")
        ));
    }

    #[test]
    fn connection_lifecycle_events() {
        let mut mapper = EventMapper::default();

        // Failures before the first connection do not report a close.
        assert_eq!(
            mapper.map(Signal::Failure("refused".into())),
            [TransportEvent::Error("refused".into())]
        );
        assert_eq!(mapper.map(Signal::Disconnect), []);

        assert_eq!(mapper.map(Signal::ConnAck), [TransportEvent::Connected]);
        assert_eq!(mapper.map(Signal::Ignored), []);
        assert_eq!(mapper.map(Signal::Disconnect), [TransportEvent::Closed]);

        assert_eq!(mapper.map(Signal::ConnAck), [TransportEvent::Connected]);
        assert_eq!(
            mapper.map(Signal::Failure("reset".into())),
            [
                TransportEvent::Error("reset".into()),
                TransportEvent::Closed
            ]
        );
        assert_eq!(
            mapper.map(Signal::Failure("reset".into())),
            [TransportEvent::Error("reset".into())]
        );
    }

    #[test]
    fn pump_exit_closes_open_connection() {
        let mut mapper = EventMapper::default();
        assert_eq!(mapper.close(), None);

        assert_eq!(mapper.map(Signal::ConnAck), [TransportEvent::Connected]);
        assert_eq!(mapper.close(), Some(TransportEvent::Closed));
        assert_eq!(mapper.close(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_pause_is_cancellable() {
        let cancellation_token = CancellationToken::new();
        assert!(pause(&cancellation_token, Duration::from_secs(1)).await);

        cancellation_token.cancel();
        assert!(!pause(&cancellation_token, Duration::from_secs(3600)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_with_full_queue() {
        let config = MqttConfig::new("broker.example.com", "iOTestID", material());
        // The event loop is never polled, so the queue never drains.
        let (client, eventloop) = AsyncClient::new(config.options(), ASYNC_CHANNEL_CAPACITY);
        let transport = MqttTransport { client };

        for _ in 0..ASYNC_CHANNEL_CAPACITY {
            transport.publish("iot/sub", "{}".into()).unwrap();
        }
        assert_eq!(
            transport.publish("iot/sub", "{}".into()).unwrap_err().kind(),
            ErrorKind::Transport
        );

        // The disconnection request fails instead of waiting for room.
        assert_eq!(transport.disconnect().unwrap_err().kind(), ErrorKind::Transport);

        // A pump which never ends by itself is cancelled after the grace.
        let cancellation_token = CancellationToken::new();
        let pump_token = cancellation_token.clone();
        let handle = tokio::spawn(async move {
            pump_token.cancelled().await;
            drop(eventloop);
        });

        EventPump {
            handle,
            cancellation_token: cancellation_token.clone(),
        }
        .stop(Duration::from_millis(500))
        .await
        .unwrap();
        assert!(cancellation_token.is_cancelled());
    }

    #[tokio::test]
    async fn pump_ending_by_itself_is_not_cancelled() {
        let cancellation_token = CancellationToken::new();
        let handle = tokio::spawn(async {});

        EventPump {
            handle,
            cancellation_token: cancellation_token.clone(),
        }
        .stop(Duration::from_secs(5))
        .await
        .unwrap();
        assert!(!cancellation_token.is_cancelled());
    }
}
