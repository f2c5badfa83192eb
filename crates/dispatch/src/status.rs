//! Serialized campaign status writer.
//!
//! Workers never touch storage directly: they push [`StatusEvent`]s into a
//! bounded channel and a single [`StatusActor`] task merges each delta into
//! its in-memory copy of the campaign and persists the result. Each campaign
//! therefore has exactly one writer stream.
//!
//! Shutdown is driven by channel closure. Once every [`StatusHandle`] has been
//! dropped the actor drains whatever is still buffered and then exits, so no
//! event that was successfully sent is ever lost.

use campaign_core::ports::CampaignRepository;
use campaign_core::types::{Campaign, StatusEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Cloneable sender side handed to campaign workers.
#[derive(Clone)]
pub struct StatusHandle {
    sender: mpsc::Sender<StatusEvent>,
}

impl StatusHandle {
    /// Queue an event for the actor. Waits if the buffer is full.
    pub async fn send(&self, event: StatusEvent) {
        let campaign_id = event.campaign_id;
        if self.sender.send(event).await.is_err() {
            metrics::counter!("status.events_dropped").increment(1);
            warn!(campaign_id = %campaign_id, "Status actor gone, event dropped");
        }
    }
}

pub struct StatusActor {
    repository: Arc<dyn CampaignRepository>,
    campaigns: HashMap<Uuid, Campaign>,
    receiver: mpsc::Receiver<StatusEvent>,
}

impl StatusActor {
    /// Spawn the actor over the campaigns of one run.
    ///
    /// The join handle resolves to the final in-memory campaign states once
    /// all handles are dropped and the buffer is drained.
    pub fn spawn(
        repository: Arc<dyn CampaignRepository>,
        campaigns: Vec<Campaign>,
        capacity: usize,
    ) -> (StatusHandle, JoinHandle<HashMap<Uuid, Campaign>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let actor = Self {
            repository,
            campaigns: campaigns.into_iter().map(|c| (c.id, c)).collect(),
            receiver,
        };

        debug!(
            campaigns = actor.campaigns.len(),
            capacity = capacity,
            "Status actor started"
        );

        let handle = tokio::spawn(actor.run());
        (StatusHandle { sender }, handle)
    }

    async fn run(mut self) -> HashMap<Uuid, Campaign> {
        let mut processed = 0u64;
        while let Some(event) = self.receiver.recv().await {
            self.apply(event).await;
            processed += 1;
        }

        info!(events = processed, "Status actor drained and stopped");
        self.campaigns
    }

    async fn apply(&mut self, event: StatusEvent) {
        let Some(campaign) = self.campaigns.get_mut(&event.campaign_id) else {
            warn!(campaign_id = %event.campaign_id, "Status event for unknown campaign ignored");
            return;
        };

        if campaign.apply(&event.delta) {
            metrics::counter!("status.updates_applied").increment(1);
        }

        debug!(
            campaign_id = %campaign.id,
            status = ?campaign.status,
            progress = campaign.progress,
            "Persisting campaign status"
        );

        // Failures only diverge the stored row until the next successful write.
        if let Err(e) = self.repository.update(campaign).await {
            metrics::counter!("status.persist_errors").increment(1);
            error!(
                campaign_id = %campaign.id,
                error = %e,
                "Failed to persist campaign status"
            );
        }
    }
}
