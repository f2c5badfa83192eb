//! Collaborator capabilities consumed by the dispatch engine.
//!
//! Persistence, tenant lookup, segment evaluation and the email provider live
//! outside the engine; it only sees these traits, injected as `Arc<dyn _>`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CampaignResult;
use crate::types::{AudiencePage, Campaign, Email, Recipient, Tenant};

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Campaigns with status pending and `schedule <= cutoff` (epoch seconds).
    async fn pending_campaigns(&self, cutoff: i64) -> CampaignResult<Vec<Campaign>>;

    /// Last-write-wins persistence of the whole campaign row.
    async fn update(&self, campaign: &Campaign) -> CampaignResult<()>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn get_tenant(&self, tenant_id: Uuid) -> CampaignResult<Tenant>;
}

#[async_trait]
pub trait AudienceSource: Send + Sync {
    /// Fetch one page of a segment's audience. An empty `next_cursor` marks
    /// the final page.
    async fn download_page(
        &self,
        tenant: &Tenant,
        segment_id: Uuid,
        cursor: &str,
        limit: usize,
    ) -> CampaignResult<AudiencePage>;
}

#[async_trait]
pub trait EmailStore: Send + Sync {
    async fn get_email(&self, tenant: &Tenant, email_id: Uuid) -> CampaignResult<Email>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send one message to at most ten recipients.
    async fn send_email(
        &self,
        campaign_email_id: Uuid,
        from: &str,
        to: &[Recipient],
        subject: &str,
        html: &str,
    ) -> CampaignResult<()>;
}
