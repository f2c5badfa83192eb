//! Email variant content resolution.

use campaign_core::codec::decode_html;
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::ports::EmailStore;
use campaign_core::types::Tenant;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct ContentResolver {
    store: Arc<dyn EmailStore>,
}

impl ContentResolver {
    pub fn new(store: Arc<dyn EmailStore>) -> Self {
        Self { store }
    }

    /// Fetch a template and decode its stored body into raw HTML.
    ///
    /// Any failure here is fatal to the enclosing campaign.
    pub async fn resolve(&self, tenant: &Tenant, email_id: Uuid) -> CampaignResult<String> {
        let email = self.store.get_email(tenant, email_id).await.map_err(|e| match e {
            CampaignError::ContentFetch(_) => e,
            other => CampaignError::ContentFetch(format!("email {email_id}: {other}")),
        })?;

        let html = decode_html(&email.html_encoded).map_err(|e| match e {
            CampaignError::ContentDecode(msg) => {
                CampaignError::ContentDecode(format!("email {email_id}: {msg}"))
            }
            other => other,
        })?;

        debug!(email_id = %email_id, bytes = html.len(), "Email content resolved");
        Ok(html)
    }
}
