pub mod batch;
pub mod config;
pub mod error;
pub mod types;

pub use batch::BoundedBatch;
pub use config::{Config, CrawlSettings};
pub use error::ConfigError;
pub use types::*;
