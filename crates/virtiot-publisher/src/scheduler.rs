use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, info, warn};

use virtiot::builder::ReadingBuilder;
use virtiot::random::{RandomSource, RandomValueGenerator, RngSource};
use virtiot::reading::Reading;
use virtiot::registry::DeviceRegistry;

use crate::error::{Error, ErrorKind, Result};
use crate::transport::{Transport, TransportEvent};

/// Default topic readings are published on.
pub const DEFAULT_TOPIC: &str = "iot/sub";

/// Default time between two readings.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(4000);

/// Scheduler states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No connection has been established yet.
    Disconnected,
    /// Connected, readings are published at every tick.
    Publishing,
    /// The connection was closed, or the reading limit was reached.
    Closed,
    /// The transport reported an error.
    Errored,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "Disconnected",
            Self::Publishing => "Publishing",
            Self::Closed => "Closed",
            Self::Errored => "Errored",
        })
    }
}

/// Publishing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    topic: String,
    interval: Duration,
    max_readings: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerConfig {
    /// Creates a [`SchedulerConfig`] publishing on `iot/sub` every four
    /// seconds, without a reading limit.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self {
            topic: DEFAULT_TOPIC.into(),
            interval: DEFAULT_INTERVAL,
            max_readings: None,
        }
    }

    /// Sets the publishing topic.
    #[must_use]
    #[inline]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Sets the time between two readings.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stops publishing after the given number of readings.
    #[must_use]
    pub const fn max_readings(mut self, max_readings: u64) -> Self {
        self.max_readings = Some(max_readings);
        self
    }

    /// Returns the publishing topic.
    #[must_use]
    pub fn publish_topic(&self) -> &str {
        &self.topic
    }

    /// Returns the time between two readings.
    #[must_use]
    pub const fn publish_interval(&self) -> Duration {
        self.interval
    }

    /// Returns the reading limit, if any.
    #[must_use]
    pub const fn reading_limit(&self) -> Option<u64> {
        self.max_readings
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// An error is returned when the topic is empty or contains a wildcard,
    /// or when the interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.topic.is_empty() {
            return Err(Error::new(ErrorKind::Config, "Empty publishing topic"));
        }

        if self.topic.contains(['#', '+']) {
            return Err(Error::new(
                ErrorKind::Config,
                format!("Wildcards are not allowed in publishing topic `{}`", self.topic),
            ));
        }

        if self.interval.is_zero() {
            return Err(Error::new(
                ErrorKind::Config,
                "The publishing interval must be greater than zero",
            ));
        }

        Ok(())
    }
}

// A missing timer never fires.
async fn next_tick(timer: &mut Option<Interval>) -> Instant {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}

/// Publishes a synthetic reading at every tick of a timer which runs only
/// while the transport is connected.
///
/// The timer is started when the transport reports a connection and
/// stopped when it reports a close. A transport error is only logged: the
/// timer keeps running until the transport reports the close.
///
/// Each scheduler owns its [`DeviceRegistry`], so the sensor type of a
/// device stays the same for the whole lifetime of the scheduler.
#[derive(Debug)]
pub struct PublishScheduler<T, R = RngSource> {
    transport: T,
    config: SchedulerConfig,
    builder: ReadingBuilder,
    registry: DeviceRegistry,
    generator: RandomValueGenerator<R>,
    state: SchedulerState,
    timer_armed: bool,
    published: u64,
}

impl<T: Transport> PublishScheduler<T> {
    /// Creates a [`PublishScheduler`] with the default [`ReadingBuilder`]
    /// and a generator seeded by the operating system.
    ///
    /// # Errors
    ///
    /// An error is returned when the configuration is not valid.
    #[inline]
    pub fn new(transport: T, config: SchedulerConfig) -> Result<Self> {
        Self::with_generator(
            transport,
            config,
            ReadingBuilder::default(),
            RandomValueGenerator::from_os_rng(),
        )
    }
}

impl<T: Transport, R: RandomSource> PublishScheduler<T, R> {
    /// Creates a [`PublishScheduler`] with the given [`ReadingBuilder`] and
    /// [`RandomValueGenerator`].
    ///
    /// # Errors
    ///
    /// An error is returned when the configuration is not valid.
    pub fn with_generator(
        transport: T,
        config: SchedulerConfig,
        builder: ReadingBuilder,
        generator: RandomValueGenerator<R>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            transport,
            config,
            builder,
            registry: DeviceRegistry::new(),
            generator,
            state: SchedulerState::Disconnected,
            timer_armed: false,
            published: 0,
        })
    }

    /// Returns the current [`SchedulerState`].
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Returns the number of readings handed to the transport.
    #[must_use]
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Whether the publishing timer is running.
    #[must_use]
    pub const fn is_timer_armed(&self) -> bool {
        self.timer_armed
    }

    /// Returns the device registry.
    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Applies a [`TransportEvent`].
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("Connected, publishing on `{}`", self.config.topic);
                if self.timer_armed {
                    warn!("Publishing timer already running, keeping it");
                }
                self.timer_armed = true;
                self.state = SchedulerState::Publishing;
            }
            TransportEvent::Closed => {
                if self.timer_armed {
                    info!("Connection closed");
                } else {
                    warn!("Connection closed while not publishing");
                }
                self.timer_armed = false;
                self.state = SchedulerState::Closed;
            }
            TransportEvent::Error(e) => {
                error!("Transport error: {e}");
                self.state = SchedulerState::Errored;
            }
        }
    }

    /// Builds and publishes a reading.
    ///
    /// Nothing happens when the timer is not running or the reading limit
    /// has been reached. The publication is not awaited: the returned
    /// [`Reading`] has been handed to the transport, which may still fail
    /// to deliver it.
    pub fn tick(&mut self) -> Option<Reading> {
        if !self.timer_armed || self.limit_reached() {
            return None;
        }

        let reading = self
            .builder
            .build_reading(&mut self.registry, &mut self.generator);

        match self.send_reading(&reading) {
            Ok(payload) => {
                info!("Message sent: {payload}");
                self.published += 1;
                Some(reading)
            }
            Err(e) => {
                error!("Impossible to publish reading `{reading}`: {e}");
                None
            }
        }
    }

    fn send_reading(&self, reading: &Reading) -> Result<String> {
        let payload = reading.to_json()?;
        self.transport.publish(&self.config.topic, payload.clone())?;
        Ok(payload)
    }

    /// Whether the reading limit has been reached.
    #[must_use]
    pub fn limit_reached(&self) -> bool {
        self.config
            .max_readings
            .is_some_and(|max_readings| self.published >= max_readings)
    }

    /// Runs the scheduler until the cancellation token is cancelled, the
    /// events channel is closed, or the reading limit is reached.
    ///
    /// The first reading is published one interval after the connection.
    /// Ticks missed because of a slow transport are skipped.
    pub async fn run(
        &mut self,
        mut events: Receiver<TransportEvent>,
        cancellation_token: CancellationToken,
    ) {
        let mut timer = None;

        loop {
            tokio::select! {
                // Use the cancellation token to stop the loop
                () = cancellation_token.cancelled() => {
                    debug!("Scheduler cancelled");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Transport events channel closed");
                        break;
                    };
                    self.handle_event(event);
                    self.sync_timer(&mut timer);
                }
                _ = next_tick(&mut timer) => {
                    if self.tick().is_some() && self.limit_reached() {
                        info!("Published {} readings, stopping", self.published);
                        self.timer_armed = false;
                        self.state = SchedulerState::Closed;
                        break;
                    }
                }
            }
        }
    }

    fn sync_timer(&self, timer: &mut Option<Interval>) {
        match (self.timer_armed, timer.is_some()) {
            (true, false) => {
                let period = self.config.interval;
                let mut interval = interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                *timer = Some(interval);
            }
            (false, true) => *timer = None,
            _ => {}
        }
    }
}
