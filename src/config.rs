use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::broker::SimulatedBrokerConfig;
use crate::error::ProducerError;

/// Settings for the underlying producer: a bootstrap address plus
/// driver options passed through verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub bootstrap_servers: String,
    pub options: BTreeMap<String, String>,
}

impl ProducerConfig {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            options: BTreeMap::new(),
        }
    }

    /// Add one driver option, replacing any earlier value for the key
    pub fn option(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.options.insert(key.into(), value.to_string());
        self
    }

    pub fn options<I, K, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        for (key, value) in options {
            self.options.insert(key.into(), value.to_string());
        }
        self
    }

    /// Local sanity checks; option names and values are left to the driver
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.bootstrap_servers.trim().is_empty() {
            return Err(ProducerError::Configuration(
                "bootstrap servers must not be empty".to_string(),
            ));
        }
        if self.options.keys().any(|key| key.trim().is_empty()) {
            return Err(ProducerError::Configuration(
                "producer option names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Enqueue latency benchmark
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Kafka bootstrap servers
    #[arg(short = 'b', long, env = "BOOTSTRAP_SERVERS", default_value = "localhost:9092")]
    pub bootstrap_servers: String,

    /// Extra producer option as key=value (repeatable)
    #[arg(short = 'X', long = "option", env = "PRODUCER_OPTIONS", value_delimiter = ',')]
    pub options: Vec<String>,

    /// Topic to produce to
    #[arg(short, long, env = "PRODUCE_TOPIC", default_value = "loadtest")]
    pub topic: String,

    /// Request name reported instead of the topic
    #[arg(short, long, env = "REQUEST_NAME")]
    pub name: Option<String>,

    /// Number of messages to send
    #[arg(short, long, env = "PRODUCE_MESSAGES", default_value = "1000")]
    pub messages: u64,

    /// Payload size in bytes
    #[arg(short = 's', long, env = "PRODUCE_PAYLOAD_SIZE", default_value = "100")]
    pub payload_size: usize,

    /// Messages per second (0 = as fast as possible)
    #[arg(short, long, env = "PRODUCE_RATE", default_value = "0")]
    pub rate: f64,

    /// Attach a random UUID key to every message
    #[arg(long, env = "PRODUCE_KEYED")]
    pub keyed: bool,

    /// Seconds to wait for outstanding deliveries on stop
    #[arg(long, env = "STOP_TIMEOUT", default_value = "5")]
    pub stop_timeout: f64,

    /// Use the in-process simulated broker instead of Kafka
    #[arg(long, env = "SIMULATE_BROKER")]
    pub simulate: bool,

    /// Simulated acknowledgment delay in milliseconds
    #[arg(long, env = "ACK_DELAY_MS", default_value = "5")]
    pub ack_delay_ms: u64,

    /// Simulated delivery failure rate (0.0 to 1.0)
    #[arg(long, env = "FAILURE_RATE", default_value = "0.0")]
    pub failure_rate: f64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Producer
    pub producer: ProducerConfig,
    pub stop_timeout: Duration,

    // Workload
    pub topic: String,
    pub name: Option<String>,
    pub messages: u64,
    pub payload_size: usize,
    pub rate: f64,
    pub keyed: bool,

    // Simulation
    pub simulate: bool,
    pub simulated: SimulatedBrokerConfig,

    pub log_level: String,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > .env > defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let options = args
            .options
            .iter()
            .map(|raw| parse_option(raw))
            .collect::<Result<Vec<_>>>()?;

        let stop_timeout = Duration::try_from_secs_f64(args.stop_timeout).map_err(|_| {
            anyhow::anyhow!(
                "STOP_TIMEOUT must be a non-negative number of seconds, got {}",
                args.stop_timeout
            )
        })?;

        Ok(Config {
            producer: ProducerConfig::new(args.bootstrap_servers).options(options),
            stop_timeout,
            topic: args.topic,
            name: args.name,
            messages: args.messages,
            payload_size: args.payload_size,
            rate: args.rate,
            keyed: args.keyed,
            simulate: args.simulate,
            simulated: SimulatedBrokerConfig {
                ack_delay: Duration::from_millis(args.ack_delay_ms),
                failure_rate: args.failure_rate,
                ..Default::default()
            },
            log_level: args.log_level,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.producer.validate()?;

        if self.topic.trim().is_empty() {
            anyhow::bail!("PRODUCE_TOPIC must not be empty");
        }
        if !(0.0..=1.0).contains(&self.simulated.failure_rate) {
            anyhow::bail!(
                "FAILURE_RATE must be between 0.0 and 1.0, got {}",
                self.simulated.failure_rate
            );
        }
        if !self.rate.is_finite() || self.rate < 0.0 {
            anyhow::bail!("PRODUCE_RATE must be a non-negative number, got {}", self.rate);
        }
        if self.rate > 0.0 && self.send_interval().is_none() {
            anyhow::bail!("PRODUCE_RATE {} is too small to schedule", self.rate);
        }

        Ok(())
    }

    /// Gap between sends for a throttled workload; `None` means unthrottled
    /// or a rate too small to represent
    pub fn send_interval(&self) -> Option<Duration> {
        if self.rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / self.rate)
            .ok()
            .map(|period| period.max(Duration::from_nanos(1)))
    }
}

/// Parse a `key=value` producer option
fn parse_option(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Producer option '{}' must be in key=value form", raw))?;

    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Producer option '{}' has an empty key", raw);
    }

    Ok((key.to_string(), value.trim().to_string()))
}
