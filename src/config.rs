//! Runtime configuration for both binaries.
//!
//! Every setting is a command-line flag that falls back to an environment
//! variable, then to a default.

use clap::{App, Arg, ArgMatches};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt::Display;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_UDP_PORT: u16 = 8090;
pub const DEFAULT_STATUS_PORT: u16 = 8091;
pub const DEFAULT_TARGET: &str = "telemetry-ingestion:8090";
pub const DEFAULT_WORKERS: usize = 16;
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;
pub const DEFAULT_PERIOD_MS: u64 = 1000;
pub const DEFAULT_BACKOFF_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Cli(#[from] clap::Error),
    #[error("missing value for {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "telemetry".to_string(),
            user: "telemetry_user".to_string(),
            password: "telemetry_pass".to_string(),
            pool_size: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub udp_port: u16,
    pub status_port: u16,
    pub workers: usize,
    pub queue_depth: usize,
    /// When false, readings go to a bounded in-memory store instead of PostgreSQL.
    pub persist: bool,
    pub database: DatabaseConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            status_port: DEFAULT_STATUS_PORT,
            workers: DEFAULT_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            persist: true,
            database: DatabaseConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn app() -> App<'static, 'static> {
        App::new("satlink-ingest")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Receives CCSDS telemetry datagrams, classifies, exports metrics and stores them")
            .arg(
                Arg::with_name("udp-port")
                    .long("udp-port")
                    .value_name("PORT")
                    .env("UDP_PORT")
                    .help("UDP port to receive telemetry on")
                    .takes_value(true)
                    .default_value("8090"),
            )
            .arg(
                Arg::with_name("status-port")
                    .long("status-port")
                    .value_name("PORT")
                    .env("STATUS_PORT")
                    .help("TCP port serving /health and /metrics")
                    .takes_value(true)
                    .default_value("8091"),
            )
            .arg(
                Arg::with_name("workers")
                    .long("workers")
                    .value_name("COUNT")
                    .env("INGEST_WORKERS")
                    .help("Number of packet processing workers")
                    .takes_value(true)
                    .default_value("16"),
            )
            .arg(
                Arg::with_name("queue-depth")
                    .long("queue-depth")
                    .value_name("DATAGRAMS")
                    .env("INGEST_QUEUE_DEPTH")
                    .help("Datagrams buffered between receiver and workers")
                    .takes_value(true)
                    .default_value("1024"),
            )
            .arg(
                Arg::with_name("no-store")
                    .long("no-store")
                    .help("Keep readings in memory instead of PostgreSQL"),
            )
            .arg(
                Arg::with_name("db-host")
                    .long("db-host")
                    .value_name("HOST")
                    .env("DB_HOST")
                    .takes_value(true)
                    .default_value("localhost"),
            )
            .arg(
                Arg::with_name("db-port")
                    .long("db-port")
                    .value_name("PORT")
                    .env("DB_PORT")
                    .takes_value(true)
                    .default_value("5432"),
            )
            .arg(
                Arg::with_name("db-name")
                    .long("db-name")
                    .value_name("NAME")
                    .env("DB_NAME")
                    .takes_value(true)
                    .default_value("telemetry"),
            )
            .arg(
                Arg::with_name("db-user")
                    .long("db-user")
                    .value_name("USER")
                    .env("DB_USER")
                    .takes_value(true)
                    .default_value("telemetry_user"),
            )
            .arg(
                Arg::with_name("db-password")
                    .long("db-password")
                    .value_name("PASSWORD")
                    .env("DB_PASSWORD")
                    .takes_value(true)
                    .default_value("telemetry_pass"),
            )
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::app().get_matches_from_safe(args)?;
        Self::from_matches(&matches)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(std::env::args_os())
    }

    fn from_matches(matches: &ArgMatches<'_>) -> Result<Self, ConfigError> {
        let workers = parse_positive(matches, "workers")?;
        let config = Self {
            udp_port: parse(matches, "udp-port")?,
            status_port: parse(matches, "status-port")?,
            workers,
            queue_depth: parse_positive(matches, "queue-depth")?,
            persist: !matches.is_present("no-store"),
            database: DatabaseConfig {
                host: value(matches, "db-host")?.to_string(),
                port: parse(matches, "db-port")?,
                name: value(matches, "db-name")?.to_string(),
                user: value(matches, "db-user")?.to_string(),
                password: value(matches, "db-password")?.to_string(),
                // one connection per worker, the only place rows are written from
                pool_size: workers,
            },
        };
        Ok(config)
    }

    pub fn udp_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.udp_port))
    }

    pub fn status_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.status_port))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// `host:port` of the ingestion service, resolved at connect time.
    pub target: String,
    pub subsystem_id: u16,
    pub period_ms: u64,
    pub backoff_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            subsystem_id: crate::protocol::SUBSYSTEM_ID,
            period_ms: DEFAULT_PERIOD_MS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

impl GeneratorConfig {
    pub fn app() -> App<'static, 'static> {
        App::new("satlink-generator")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Emits one CCSDS telemetry datagram per tick to the ingestion service")
            .arg(
                Arg::with_name("target")
                    .long("target")
                    .value_name("HOST:PORT")
                    .env("INGEST_ADDR")
                    .help("Ingestion service address")
                    .takes_value(true)
                    .default_value(DEFAULT_TARGET),
            )
            .arg(
                Arg::with_name("subsystem-id")
                    .long("subsystem-id")
                    .value_name("ID")
                    .env("SUBSYSTEM_ID")
                    .takes_value(true)
                    .default_value("1"),
            )
            .arg(
                Arg::with_name("period-ms")
                    .long("period-ms")
                    .value_name("MILLIS")
                    .env("TICK_PERIOD_MS")
                    .help("Interval between packets")
                    .takes_value(true)
                    .default_value("1000"),
            )
            .arg(
                Arg::with_name("backoff-ms")
                    .long("backoff-ms")
                    .value_name("MILLIS")
                    .env("SEND_BACKOFF_MS")
                    .help("Pause after a failed send")
                    .takes_value(true)
                    .default_value("5000"),
            )
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::app().get_matches_from_safe(args)?;
        Ok(Self {
            target: value(&matches, "target")?.to_string(),
            subsystem_id: parse(&matches, "subsystem-id")?,
            period_ms: parse_positive(&matches, "period-ms")?,
            backoff_ms: parse(&matches, "backoff-ms")?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(std::env::args_os())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

fn value<'a>(matches: &'a ArgMatches<'_>, name: &'static str) -> Result<&'a str, ConfigError> {
    matches.value_of(name).ok_or(ConfigError::Missing(name))
}

fn parse<T>(matches: &ArgMatches<'_>, name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = value(matches, name)?;
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive<T>(matches: &ArgMatches<'_>, name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: Display,
{
    let parsed: T = parse(matches, name)?;
    if parsed == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: value(matches, name)?.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}
