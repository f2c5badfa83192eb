pub mod codec;
pub mod config;
pub mod error;
pub mod ports;
pub mod registry;
pub mod types;

pub use config::AppConfig;
pub use error::{CampaignError, CampaignResult};
pub use registry::{HandlerRegistry, PayloadHandler};
