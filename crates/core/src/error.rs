use thiserror::Error;
use uuid::Uuid;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tenant lookup failed for {tenant_id}: {message}")]
    TenantLookup { tenant_id: Uuid, message: String },

    #[error("Audience resolution failed: {0}")]
    AudienceResolution(String),

    #[error("Email content fetch failed: {0}")]
    ContentFetch(String),

    #[error("Email content decode failed: {0}")]
    ContentDecode(String),

    #[error("Email send failed: {0}")]
    Send(String),

    #[error("Campaign persistence error: {0}")]
    Persistence(String),

    #[error("Campaign {campaign_id} failed: {source}")]
    CampaignFailed {
        campaign_id: Uuid,
        #[source]
        source: Box<CampaignError>,
    },

    #[error("Campaign worker error: {0}")]
    Worker(String),

    #[error("No handler registered for payload kind: {0}")]
    UnknownPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    /// Errors that abort the campaign they occur in and mark it failed.
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            CampaignError::TenantLookup { .. }
            | CampaignError::AudienceResolution(_)
            | CampaignError::ContentFetch(_)
            | CampaignError::ContentDecode(_) => true,
            CampaignError::CampaignFailed { source, .. } => source.is_unrecoverable(),
            _ => false,
        }
    }

    /// The campaign this error is attributed to, if any.
    pub fn campaign_id(&self) -> Option<Uuid> {
        match self {
            CampaignError::CampaignFailed { campaign_id, .. } => Some(*campaign_id),
            _ => None,
        }
    }

    pub fn for_campaign(self, campaign_id: Uuid) -> Self {
        CampaignError::CampaignFailed {
            campaign_id,
            source: Box::new(self),
        }
    }
}
