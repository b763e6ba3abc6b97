// Kafka Enqueue Timer - Library root

pub mod broker;
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod request;
pub mod session;
pub mod sink;

pub use broker::{BrokerClient, OutboundMessage, SimulatedBroker, SimulatedBrokerConfig};
pub use client::ProducerClient;
pub use config::ProducerConfig;
pub use delivery::{DeliveryCallback, PendingSend};
pub use error::{DeliveryError, ProducerError};
pub use event::{CompletionEvent, RequestContext, RequestType};
pub use request::SendRequest;
pub use session::ProducerSession;
pub use sink::{ChannelSink, EventSink, RecordingSink, TracingSink};
