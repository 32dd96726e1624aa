mod settings;

pub use settings::{BrokerConfig, DemoConfig, Settings, DEFAULT_CONFIG_FILE, ENV_PREFIX};
