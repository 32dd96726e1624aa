/// Configuration loading: file, environment, defaults.
pub mod config;
/// Demo scenarios built on the public broker API.
pub mod demo;
/// Common error types: worker lifecycle, logging setup, configuration.
pub mod error;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Pub/Sub: message catalog, Broker, Subscription.
pub mod pubsub;
/// Consumer workers with a mailbox and a background thread.
pub mod worker;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use self::config::{BrokerConfig, DemoConfig, Settings};
/// Operation errors.
pub use error::{ConfigError, LoggingError, WorkerError};
/// Logging setup.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Pub/Sub API.
pub use pubsub::{Broker, BrokerStats, Catalog, Delivery, Member, Subscription};
/// Consumer workers.
pub use worker::{ConsumerWorker, Mailbox, WorkerBuilder, WorkerReport, WorkerState};
