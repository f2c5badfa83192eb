//! Audience resolution by cursor pagination.

use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::ports::AudienceSource;
use campaign_core::types::{Recipient, Tenant};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Materializes a segment's full audience by paging until the source returns
/// an empty cursor.
///
/// The whole audience is held in memory before partitioning; the source does
/// not expose a streaming variant.
pub struct AudiencePager {
    source: Arc<dyn AudienceSource>,
    page_size: usize,
}

impl AudiencePager {
    pub fn new(source: Arc<dyn AudienceSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    /// Resolve every recipient of `segment_id`, in source order.
    ///
    /// The first failing page aborts resolution; no partial audience is
    /// returned and nothing is retried.
    pub async fn resolve(&self, tenant: &Tenant, segment_id: Uuid) -> CampaignResult<Vec<Recipient>> {
        let mut audience = Vec::new();
        let mut cursor = String::new();
        let mut pages = 0usize;

        loop {
            let page = self
                .source
                .download_page(tenant, segment_id, &cursor, self.page_size)
                .await
                .map_err(|e| {
                    let reason = match e {
                        CampaignError::AudienceResolution(msg) => msg,
                        other => other.to_string(),
                    };
                    CampaignError::AudienceResolution(format!(
                        "segment {segment_id} page {pages}: {reason}"
                    ))
                })?;

            pages += 1;
            metrics::counter!("audience.pages_fetched").increment(1);
            audience.extend(page.recipients);

            if page.next_cursor.is_empty() {
                break;
            }
            cursor = page.next_cursor;
        }

        debug!(
            segment_id = %segment_id,
            pages = pages,
            size = audience.len(),
            "Audience resolved"
        );

        Ok(audience)
    }
}
