//! Attempted-send progress for one campaign run.

use campaign_core::types::StatusEvent;
use tracing::debug;
use uuid::Uuid;

use crate::status::StatusHandle;

/// Converts cumulative attempted sends into a 0–100 progress value and emits
/// a progress event after every batch.
///
/// Progress counts attempts, not confirmed deliveries: a failed batch still
/// advances it.
pub struct ProgressEmitter {
    campaign_id: Uuid,
    segment_size: u64,
    attempted: u64,
    status: StatusHandle,
}

impl ProgressEmitter {
    pub fn new(campaign_id: Uuid, segment_size: u64, status: StatusHandle) -> Self {
        Self {
            campaign_id,
            segment_size,
            attempted: 0,
            status,
        }
    }

    /// `floor(attempted * 100 / segment_size)`, 0 for an empty segment.
    pub fn percent(attempted: u64, segment_size: u64) -> u8 {
        if segment_size == 0 {
            return 0;
        }
        let pct = attempted.saturating_mul(100) / segment_size;
        pct.min(100) as u8
    }

    /// Record a batch of `recipients` attempts and emit the new progress.
    /// The final batch of the final variant always reports 100.
    pub async fn record(&mut self, recipients: usize, terminal: bool) -> u8 {
        self.attempted += recipients as u64;
        let progress = if terminal {
            100
        } else {
            Self::percent(self.attempted, self.segment_size)
        };

        debug!(
            campaign_id = %self.campaign_id,
            attempted = self.attempted,
            progress = progress,
            "Campaign progress"
        );

        self.status
            .send(StatusEvent::progress(self.campaign_id, progress))
            .await;
        progress
    }

    pub fn attempted(&self) -> u64 {
        self.attempted
    }
}
