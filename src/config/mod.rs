pub mod schema;

pub use schema::{Config, HttpConfig, LoggingConfig, TimeoutsConfig};
