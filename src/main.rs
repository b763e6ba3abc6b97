use anyhow::Result;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use kafka_enqueue_timer::broker::{BrokerClient, SimulatedBroker};
use kafka_enqueue_timer::config::Config;
use kafka_enqueue_timer::{
    ChannelSink, CompletionEvent, EventSink, ProducerClient, SendRequest, TracingSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        topic = %config.topic,
        messages = config.messages,
        payload_size = config.payload_size,
        "Enqueue benchmark starting"
    );

    let (sink, events) = ChannelSink::new();
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let collector = tokio::spawn(collect_events(events));

    let started = Instant::now();
    if config.simulate {
        tracing::info!(
            ack_delay_ms = config.simulated.ack_delay.as_millis() as u64,
            failure_rate = config.simulated.failure_rate,
            "Using simulated broker"
        );
        let broker = SimulatedBroker::new(config.simulated.clone());
        run(ProducerClient::new(broker, sink), &config).await?;
    } else {
        run(connect_kafka(&config, sink)?, &config).await?;
    }

    let summary = collector.await?;
    summary.print(started.elapsed());

    Ok(())
}

#[cfg(feature = "kafka")]
fn connect_kafka(
    config: &Config,
    sink: Arc<dyn EventSink>,
) -> Result<ProducerClient<kafka_enqueue_timer::broker::KafkaBroker>> {
    tracing::info!(
        bootstrap_servers = %config.producer.bootstrap_servers,
        "Connecting to Kafka"
    );
    Ok(ProducerClient::connect(&config.producer, sink)?)
}

#[cfg(not(feature = "kafka"))]
fn connect_kafka(
    _config: &Config,
    _sink: Arc<dyn EventSink>,
) -> Result<ProducerClient<SimulatedBroker>> {
    anyhow::bail!(
        "Built without the `kafka` feature; rebuild with --features kafka or pass --simulate"
    )
}

/// Send the configured workload, then drain the producer
async fn run<B: BrokerClient + 'static>(client: ProducerClient<B>, config: &Config) -> Result<()> {
    let client = Arc::new(client);
    let payload = Bytes::from(vec![b'x'; config.payload_size]);

    let mut ticker = config.send_interval().map(tokio::time::interval);

    let mut rejected = 0u64;
    for sequence in 0..config.messages {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        } else if sequence % 1000 == 0 {
            tokio::task::yield_now().await;
        }

        let mut request = SendRequest::new(config.topic.clone(), payload.clone())
            .with_context("sequence", sequence);
        if let Some(name) = &config.name {
            request = request.name(name.clone());
        }
        if config.keyed {
            request = request.key(uuid::Uuid::new_v4().to_string());
        }

        if client.send(request).is_err() {
            rejected += 1;
            // Give the producer a chance to drain its queue
            client.poll();
        }
    }

    if rejected > 0 {
        tracing::warn!(rejected = rejected, "Some messages were rejected before submission");
    }

    // Flushing blocks, so keep it off the runtime threads
    let stop_timeout = config.stop_timeout;
    let drain = client.clone();
    let abandoned = tokio::task::spawn_blocking(move || drain.shutdown(stop_timeout)).await?;
    if abandoned > 0 {
        tracing::warn!(abandoned = abandoned, "Messages still in flight at shutdown");
    }

    Ok(())
}

/// Totals gathered from completion events
#[derive(Debug, Default)]
struct Summary {
    completed: u64,
    failed: u64,
    bytes: u64,
    total_elapsed_ms: f64,
    max_elapsed_ms: f64,
}

impl Summary {
    fn record(&mut self, event: &CompletionEvent) {
        self.completed += 1;
        if !event.is_success() {
            self.failed += 1;
        }
        self.bytes += event.response_length;
        self.total_elapsed_ms += event.elapsed_ms;
        self.max_elapsed_ms = self.max_elapsed_ms.max(event.elapsed_ms);
    }

    fn mean_elapsed_ms(&self) -> f64 {
        if self.completed == 0 {
            return 0.0;
        }
        self.total_elapsed_ms / self.completed as f64
    }

    fn print(&self, wall: Duration) {
        println!("\n=== Enqueue Summary ===");
        println!("Completed: {} ({} failed)", self.completed, self.failed);
        println!("Bytes: {}", self.bytes);
        println!(
            "Latency: mean {:.2}ms, max {:.2}ms",
            self.mean_elapsed_ms(),
            self.max_elapsed_ms
        );
        println!(
            "Throughput: {:.1} msg/s over {:.2}s",
            self.completed as f64 / wall.as_secs_f64().max(f64::EPSILON),
            wall.as_secs_f64()
        );
    }
}

/// Consume events until every sender is gone
async fn collect_events(mut events: mpsc::UnboundedReceiver<CompletionEvent>) -> Summary {
    let mut summary = Summary::default();
    while let Some(event) = events.recv().await {
        summary.record(&event);
        TracingSink.fire_request(event);
    }
    summary
}
