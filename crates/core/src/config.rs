use serde::Deserialize;

use crate::types::MAX_RECIPIENTS_PER_SEND;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CAMPAIGN_DISPATCH__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub email: EmailProviderConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Maximum campaigns processed in parallel within one run.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_recipients_per_send")]
    pub max_recipients_per_send: usize,
    #[serde(default = "default_audience_page_size")]
    pub audience_page_size: usize,
    /// Status channel capacity per due campaign.
    #[serde(default = "default_event_buffer_per_campaign")]
    pub event_buffer_per_campaign: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default = "default_true")]
    pub open_tracking: bool,
    #[serde(default = "default_true")]
    pub click_tracking: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_max_concurrency() -> usize {
    10
}
fn default_max_recipients_per_send() -> usize {
    MAX_RECIPIENTS_PER_SEND
}
fn default_audience_page_size() -> usize {
    1000
}
fn default_event_buffer_per_campaign() -> usize {
    100
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_from_email() -> String {
    "campaigns@campaignexpress.io".to_string()
}
fn default_from_name() -> String {
    "Campaign Express".to_string()
}
fn default_true() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_recipients_per_send: default_max_recipients_per_send(),
            audience_page_size: default_audience_page_size(),
            event_buffer_per_campaign: default_event_buffer_per_campaign(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl DispatchConfig {
    /// Recipients per send, clamped to the provider cap.
    pub fn batch_size(&self) -> usize {
        self.max_recipients_per_send.clamp(1, MAX_RECIPIENTS_PER_SEND)
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    pub fn page_size(&self) -> usize {
        self.audience_page_size.max(1)
    }

    /// Status channel capacity for a run over `campaigns` due campaigns.
    pub fn event_buffer(&self, campaigns: usize) -> usize {
        campaigns.saturating_mul(self.event_buffer_per_campaign).max(1)
    }
}

impl Default for EmailProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            open_tracking: true,
            click_tracking: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            dispatch: DispatchConfig::default(),
            email: EmailProviderConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Load with an optional TOML file layered under the environment.
    pub fn load_from(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_DISPATCH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
