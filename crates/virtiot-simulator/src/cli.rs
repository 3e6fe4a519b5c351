use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use tracing::Level;

use virtiot::builder::{GeneratorConfig, IndexRange};

use virtiot_publisher::credentials::SecretDocument;
use virtiot_publisher::scheduler::{DEFAULT_TOPIC, SchedulerConfig};

const DEFAULT_ENDPOINT: &str = "xxxxxxxxx-ats.iot.us-east-1.amazonaws.com";

#[derive(Debug, Parser)]
#[command(name = "virtiot-simulator")]
#[command(about = "Publishes synthetic IoT sensor readings on an MQTT broker")]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,

    /// Enable debug logging
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    pub(crate) verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    pub(crate) quiet: bool,
}

impl Cli {
    pub(crate) const fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        }
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Connect to the broker and publish a reading at every interval
    Run(RunArgs),
    /// Decode the secret document and print a summary of its content
    CheckSecret(CheckSecretArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    /// Broker endpoint
    #[arg(long, env = "IOT_END_POINT", default_value = DEFAULT_ENDPOINT)]
    pub(crate) endpoint: String,

    /// Broker port
    #[arg(long, env = "IOT_PORT", default_value_t = 8883)]
    pub(crate) port: u16,

    /// Client identifier
    #[arg(long, env = "IOT_CLIENT_ID", default_value = "iOTestID")]
    pub(crate) client_id: String,

    /// Topic readings are published on
    #[arg(long, env = "IOT_TOPIC", default_value = DEFAULT_TOPIC)]
    pub(crate) topic: String,

    /// Milliseconds between two readings
    #[arg(
        long,
        env = "PUBLISH_INTERVAL_MS",
        default_value_t = 4000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub(crate) interval_ms: u64,

    /// Device indices, as `MIN..=MAX`
    #[arg(long, default_value = "1..=5")]
    pub(crate) devices: IndexRange,

    /// Warehouse indices, as `MIN..=MAX`
    #[arg(long, default_value = "1..=3")]
    pub(crate) warehouses: IndexRange,

    /// Stop after publishing this many readings
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) max_readings: Option<u64>,

    /// Seconds of idleness before pinging the broker
    #[arg(long, default_value_t = 30)]
    pub(crate) keep_alive_secs: u64,

    #[command(flatten)]
    pub(crate) credentials: CredentialArgs,
}

impl RunArgs {
    pub(crate) const fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new()
            .devices(self.devices)
            .warehouses(self.warehouses)
    }

    pub(crate) fn scheduler_config(&self) -> SchedulerConfig {
        let config = SchedulerConfig::new()
            .topic(self.topic.as_str())
            .interval(Duration::from_millis(self.interval_ms));
        match self.max_readings {
            Some(max_readings) => config.max_readings(max_readings),
            None => config,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct CredentialArgs {
    /// Private key file (PEM format)
    #[arg(long, requires_all = ["cert", "ca"], conflicts_with = "secret_file")]
    pub(crate) key: Option<PathBuf>,

    /// Device certificate file (PEM format)
    #[arg(long, requires_all = ["key", "ca"])]
    pub(crate) cert: Option<PathBuf>,

    /// Root CA certificate file (PEM format)
    #[arg(long, requires_all = ["key", "cert"])]
    pub(crate) ca: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) secret: SecretArgs,
}

#[derive(Debug, Args)]
pub(crate) struct SecretArgs {
    /// File containing the secret document
    #[arg(long)]
    pub(crate) secret_file: Option<PathBuf>,

    /// The secret document
    #[arg(long, env = "IOT_SECRET_STRING", hide_env_values = true)]
    pub(crate) secret_string: Option<String>,

    /// Region of the secret
    #[arg(long, env = "AWS_DEFAULT_REGION", default_value = "us-east-1")]
    pub(crate) region: String,

    /// Name of the secret
    #[arg(long, env = "SECRET_NAME", default_value = "iot/cert/prod")]
    pub(crate) secret_name: String,
}

impl SecretArgs {
    // A secret file takes precedence over the inline document.
    pub(crate) fn document(&self) -> Option<SecretDocument> {
        self.secret_file
            .clone()
            .map(SecretDocument::File)
            .or_else(|| self.secret_string.clone().map(SecretDocument::Inline))
    }
}

#[derive(Debug, Args)]
pub(crate) struct CheckSecretArgs {
    #[command(flatten)]
    pub(crate) secret: SecretArgs,

    /// Also print the root CA certificate
    #[arg(long)]
    pub(crate) show_ca: bool,
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use clap::{CommandFactory, Parser};

    use tracing::Level;

    use virtiot::builder::IndexRange;

    use virtiot_publisher::credentials::SecretDocument;

    use super::{Cli, Command};

    fn run_args(args: &[&str]) -> super::RunArgs {
        let cli = Cli::try_parse_from(["virtiot-simulator", "run"].iter().chain(args)).unwrap();
        match cli.command {
            Command::Run(args) => args,
            Command::CheckSecret(_) => panic!("Expected the `run` command"),
        }
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_with_key_files() {
        let args = run_args(&[
            "--key",
            "private.pem.key",
            "--cert",
            "certificate.pem.crt",
            "--ca",
            "AmazonRootCA1.pem",
            "--devices",
            "1..=10",
            "--interval-ms",
            "500",
            "--max-readings",
            "1",
        ]);

        assert_eq!(args.port, 8883);
        assert_eq!(args.keep_alive_secs, 30);
        assert_eq!(args.credentials.key, Some(PathBuf::from("private.pem.key")));
        assert_eq!(args.devices, IndexRange::new(1, 10).unwrap());

        let generator_config = args.generator_config();
        assert_eq!(generator_config.device_range(), IndexRange::new(1, 10).unwrap());
        assert_eq!(generator_config.warehouse_range(), IndexRange::new(1, 3).unwrap());

        let scheduler_config = args.scheduler_config();
        assert_eq!(scheduler_config.publish_interval(), Duration::from_millis(500));
        assert_eq!(scheduler_config.reading_limit(), Some(1));
    }

    #[test]
    fn secret_file_takes_precedence() {
        let args = run_args(&[
            "--secret-file",
            "secret.json",
            "--secret-string",
            "{}",
            "--topic",
            "plant/readings",
        ]);

        assert_eq!(
            args.credentials.secret.document(),
            Some(SecretDocument::File("secret.json".into()))
        );
        assert_eq!(args.scheduler_config().publish_topic(), "plant/readings");
    }

    #[test]
    fn invalid_arguments() {
        for args in [
            // Incomplete key files.
            &["run", "--key", "private.pem.key"][..],
            // Key files and secret file together.
            &[
                "run",
                "--key",
                "k",
                "--cert",
                "c",
                "--ca",
                "a",
                "--secret-file",
                "s",
            ][..],
            &["run", "--devices", "5..=1"][..],
            &["run", "--devices", "1-5"][..],
            &["run", "--interval-ms", "0"][..],
            &["run", "--max-readings", "0"][..],
            &["check-secret", "--verbose", "--quiet"][..],
        ] {
            assert!(
                Cli::try_parse_from(std::iter::once("virtiot-simulator").chain(args.iter().copied()))
                    .is_err(),
                "{args:?}"
            );
        }
    }

    #[test]
    fn check_secret() {
        let cli = Cli::try_parse_from([
            "virtiot-simulator",
            "-v",
            "check-secret",
            "--secret-file",
            "secret.json",
            "--show-ca",
        ])
        .unwrap();

        assert_eq!(cli.log_level(), Level::DEBUG);
        let Command::CheckSecret(args) = cli.command else {
            panic!("Expected the `check-secret` command");
        };
        assert!(args.show_ca);
        assert_eq!(
            args.secret.document(),
            Some(SecretDocument::File("secret.json".into()))
        );
    }
}
