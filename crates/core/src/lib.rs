pub mod config;
pub mod error;

pub use config::{AppConfig, FunnelConfig, IngestConfig};
pub use error::{CampaignError, CampaignResult};
