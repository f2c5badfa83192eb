//! Campaign dispatcher: runs every due campaign through its send pipeline.
//!
//! One worker task per due campaign, at most `max_concurrency` at a time.
//! Each worker runs audience → content → partition → batches → progress for
//! its own campaign and reports state changes to the status actor. Workers
//! are isolated: a failing campaign never cancels another.

use campaign_core::config::DispatchConfig;
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::ports::{
    AudienceSource, CampaignRepository, EmailSender, EmailStore, TenantDirectory,
};
use campaign_core::types::{Campaign, CampaignStatus, StatusEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::audience::AudiencePager;
use crate::batcher::DispatchBatcher;
use crate::content::ContentResolver;
use crate::partition::partition;
use crate::progress::ProgressEmitter;
use crate::status::{StatusActor, StatusHandle};

/// External capabilities the dispatcher runs against.
#[derive(Clone)]
pub struct DispatchServices {
    pub repository: Arc<dyn CampaignRepository>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub audience: Arc<dyn AudienceSource>,
    pub emails: Arc<dyn EmailStore>,
    pub sender: Arc<dyn EmailSender>,
}

pub struct Dispatcher {
    config: DispatchConfig,
    repository: Arc<dyn CampaignRepository>,
    worker: Arc<CampaignWorker>,
}

impl Dispatcher {
    /// `default_from` is used for tenants without their own sender identity.
    pub fn new(
        config: DispatchConfig,
        default_from: impl Into<String>,
        services: DispatchServices,
    ) -> Self {
        let worker = CampaignWorker {
            tenants: services.tenants,
            pager: AudiencePager::new(services.audience, config.page_size()),
            content: ContentResolver::new(services.emails),
            batcher: DispatchBatcher::new(services.sender, config.batch_size()),
            default_from: default_from.into(),
        };

        info!(
            max_concurrency = config.concurrency(),
            batch_size = config.batch_size(),
            page_size = config.page_size(),
            "Campaign dispatcher initialized"
        );

        Self {
            config,
            repository: services.repository,
            worker: Arc::new(worker),
        }
    }

    /// Dispatch every campaign that is pending and due at `as_of`.
    ///
    /// Returns the first worker error seen, for visibility only: state already
    /// applied by other workers is never rolled back.
    pub async fn run(&self, as_of: DateTime<Utc>) -> CampaignResult<()> {
        let cutoff = as_of.timestamp();
        metrics::counter!("dispatch.runs").increment(1);

        let campaigns = self.repository.pending_campaigns(cutoff).await?;
        metrics::gauge!("dispatch.campaigns_due").set(campaigns.len() as f64);

        if campaigns.is_empty() {
            debug!(cutoff = cutoff, "No campaigns due");
            return Ok(());
        }

        info!(cutoff = cutoff, due = campaigns.len(), "Dispatching due campaigns");

        let (status, actor) = StatusActor::spawn(
            self.repository.clone(),
            campaigns.clone(),
            self.config.event_buffer(campaigns.len()),
        );

        let limiter = Arc::new(Semaphore::new(self.config.concurrency()));
        let mut workers = Vec::with_capacity(campaigns.len());

        for campaign in campaigns {
            // Blocks until a slot frees up.
            let permit = match limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "Concurrency limiter closed, stopping dispatch");
                    break;
                }
            };

            let id = campaign.id;
            let worker = self.worker.clone();
            let status = status.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                worker.execute(campaign, status).await
            });
            workers.push((id, handle));
        }

        let total = workers.len();
        let mut failed = 0usize;
        let mut first_error = None;
        for (id, handle) in workers {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    // A panicked worker never reported its own failure.
                    metrics::counter!("dispatch.campaigns_failed").increment(1);
                    error!(campaign_id = %id, error = %e, "Campaign worker aborted");
                    status.send(StatusEvent::failed(id, e.to_string())).await;
                    Err(CampaignError::Worker(e.to_string()).for_campaign(id))
                }
            };
            if let Err(e) = result {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        // Last handle; the actor exits once the buffer is drained.
        drop(status);

        match actor.await {
            Ok(states) => {
                let completed = states
                    .values()
                    .filter(|c| c.status == CampaignStatus::Running && c.progress == 100)
                    .count();
                info!(
                    campaigns = total,
                    completed = completed,
                    failed = failed,
                    "Dispatch run finished"
                );
            }
            Err(e) => error!(error = %e, "Status actor terminated abnormally"),
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Pipeline for a single campaign. Shared by all workers of a dispatcher.
struct CampaignWorker {
    tenants: Arc<dyn TenantDirectory>,
    pager: AudiencePager,
    content: ContentResolver,
    batcher: DispatchBatcher,
    default_from: String,
}

impl CampaignWorker {
    async fn execute(&self, campaign: Campaign, status: StatusHandle) -> CampaignResult<()> {
        match self.run_pipeline(&campaign, &status).await {
            Ok(()) => Ok(()),
            Err(e) => {
                metrics::counter!("dispatch.campaigns_failed").increment(1);
                error!(campaign_id = %campaign.id, error = %e, "Campaign failed");
                status
                    .send(StatusEvent::failed(campaign.id, e.to_string()))
                    .await;
                Err(e.for_campaign(campaign.id))
            }
        }
    }

    async fn run_pipeline(&self, campaign: &Campaign, status: &StatusHandle) -> CampaignResult<()> {
        let tenant = self
            .tenants
            .get_tenant(campaign.tenant_id)
            .await
            .map_err(|e| match e {
                CampaignError::TenantLookup { .. } => e,
                other => CampaignError::TenantLookup {
                    tenant_id: campaign.tenant_id,
                    message: other.to_string(),
                },
            })?;

        let audience = self.pager.resolve(&tenant, campaign.segment_id).await?;
        let segment_size = audience.len() as u64;
        status
            .send(StatusEvent::running(campaign.id, segment_size))
            .await;

        // All content is resolved before the first send so a bad template
        // fails the campaign without a partial delivery.
        let mut bodies = Vec::with_capacity(campaign.emails.len());
        for variant in &campaign.emails {
            bodies.push(self.content.resolve(&tenant, variant.email_id).await?);
        }

        let buckets = partition(&audience, &campaign.ratios());
        let from = tenant
            .from_email
            .as_deref()
            .unwrap_or(self.default_from.as_str());

        if campaign.emails.is_empty() {
            warn!(campaign_id = %campaign.id, "Campaign has no email variants");
        }

        let mut progress = ProgressEmitter::new(campaign.id, segment_size, status.clone());
        let last = campaign.emails.len().saturating_sub(1);
        let mut failed_batches = 0usize;

        for (index, ((variant, html), bucket)) in campaign
            .emails
            .iter()
            .zip(&bodies)
            .zip(buckets)
            .enumerate()
        {
            let outcome = self
                .batcher
                .dispatch(from, variant, html, bucket, index == last, &mut progress)
                .await;
            failed_batches += outcome.failed_batches;
        }

        info!(
            campaign_id = %campaign.id,
            audience = segment_size,
            attempted = progress.attempted(),
            failed_batches = failed_batches,
            "Campaign dispatched"
        );

        Ok(())
    }
}
