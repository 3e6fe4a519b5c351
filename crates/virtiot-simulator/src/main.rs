//! A command line simulator publishing the synthetic readings of a fleet of
//! virtual devices on an MQTT broker, such as AWS IoT Core, authenticated
//! with mutual TLS.

mod bootstrap;
mod cli;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use tokio_util::sync::CancellationToken;

use tracing::{error, info, warn};

use virtiot::builder::ReadingBuilder;
use virtiot::random::RandomValueGenerator;

use virtiot_publisher::error::Result;
use virtiot_publisher::mqtt::{MqttConfig, MqttConnection, MqttTransport};
use virtiot_publisher::scheduler::PublishScheduler;

use crate::cli::{CheckSecretArgs, Cli, Command, RunArgs};

// Time left to the transport to flush pending messages on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::CheckSecret(args) => check_secret(&args),
    };
    exit_code(&result)
}

// Reports the failure once, the error is not returned to the runtime.
fn exit_code(result: &Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let scheduler_config = args.scheduler_config();
    scheduler_config.validate()?;

    let tls = bootstrap::load_credentials(&args.credentials)?;
    let mqtt_config = MqttConfig::new(args.endpoint.as_str(), args.client_id.as_str(), tls)
        .port(args.port)
        .keep_alive(Duration::from_secs(args.keep_alive_secs));

    let cancellation_token = CancellationToken::new();
    let MqttConnection {
        transport,
        events,
        pump,
    } = MqttTransport::connect(&mqtt_config, cancellation_token.clone());

    let mut scheduler = PublishScheduler::with_generator(
        transport.clone(),
        scheduler_config,
        ReadingBuilder::new(args.generator_config()),
        RandomValueGenerator::from_os_rng(),
    )?;

    tokio::select! {
        () = scheduler.run(events, cancellation_token.clone()) => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Interrupted, shutting down"),
            Err(e) => error!("Impossible to listen for the interrupt signal: {e}"),
        },
    }

    info!(
        "Published {} readings from {} devices",
        scheduler.published(),
        scheduler.registry().len()
    );

    // Never waits on a full request queue.
    if let Err(e) = transport.disconnect() {
        warn!("{e}");
    }
    // The pump ends once the broker closes the connection, otherwise it is
    // cancelled after the grace.
    pump.stop(SHUTDOWN_GRACE).await
}

fn check_secret(args: &CheckSecretArgs) -> Result<()> {
    let material = bootstrap::load_secret_material(&args.secret)?;
    println!("{}", bootstrap::secret_summary(&material, args.show_ca));
    Ok(())
}
