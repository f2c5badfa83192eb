//! Campaign domain types shared by the dispatch engine and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard provider cap on recipients per send call.
pub const MAX_RECIPIENTS_PER_SEND: usize = 10;

/// An opaque recipient address resolved from a segment.
pub type Recipient = String;

// ─── Campaign ──────────────────────────────────────────────────────────────

/// A scheduled bulk-email send split across one or more email variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub segment_id: Uuid,
    /// Audience count, set once per run after resolution.
    #[serde(default)]
    pub segment_size: u64,
    /// 0–100, monotonic while running.
    #[serde(default)]
    pub progress: u8,
    pub status: CampaignStatus,
    /// Reason recorded when the campaign is marked failed.
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Ordered variants; ratios sum to 100 (validated at creation).
    pub emails: Vec<CampaignEmail>,
    /// Epoch seconds at which the campaign becomes due.
    pub schedule: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Running,
    Failed,
}

impl Campaign {
    /// Whether the campaign is pending and its schedule is at or before `cutoff`.
    pub fn is_due(&self, cutoff: i64) -> bool {
        self.status == CampaignStatus::Pending && self.schedule <= cutoff
    }

    /// Ratios of the variants in list order.
    pub fn ratios(&self) -> Vec<u32> {
        self.emails.iter().map(|e| e.ratio).collect()
    }

    /// Merge a status delta. Only fields that actually differ are written and
    /// `updated_at` is bumped only when something changed.
    pub fn apply(&mut self, delta: &CampaignDelta) -> bool {
        let mut changed = false;

        if let Some(status) = delta.status {
            if self.status != status {
                self.status = status;
                changed = true;
            }
        }
        if let Some(size) = delta.segment_size {
            if self.segment_size != size {
                self.segment_size = size;
                changed = true;
            }
        }
        if let Some(progress) = delta.progress {
            let progress = progress.min(100);
            if self.progress != progress {
                self.progress = progress;
                changed = true;
            }
        }
        if let Some(reason) = &delta.failure_reason {
            if self.failure_reason.as_deref() != Some(reason.as_str()) {
                self.failure_reason = Some(reason.clone());
                changed = true;
            }
        }

        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

// ─── Campaign email (variant) ──────────────────────────────────────────────

/// One templated email and its audience share within a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignEmail {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub email_id: Uuid,
    pub subject: String,
    /// Share of the audience, 0–100.
    pub ratio: u32,
    #[serde(default)]
    pub open_count: u64,
    #[serde(default)]
    pub click_counts: u64,
}

// ─── Tenant / email template ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    /// Sender identity used for outbound mail; falls back to the provider default.
    #[serde(default)]
    pub from_email: Option<String>,
}

/// Stored email template. The body is `base64(urlencode(html))`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Email {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub html_encoded: String,
}

/// One page of a cursor-paginated audience download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudiencePage {
    pub recipients: Vec<Recipient>,
    /// Empty when the audience is exhausted.
    pub next_cursor: String,
}

// ─── Status events ─────────────────────────────────────────────────────────

/// Field changes carried by a status event. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignDelta {
    pub status: Option<CampaignStatus>,
    pub segment_size: Option<u64>,
    pub progress: Option<u8>,
    pub failure_reason: Option<String>,
}

/// In-memory message from a campaign worker to the status actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub campaign_id: Uuid,
    pub delta: CampaignDelta,
}

impl StatusEvent {
    /// Audience resolved: campaign is now running with a known size.
    pub fn running(campaign_id: Uuid, segment_size: u64) -> Self {
        Self {
            campaign_id,
            delta: CampaignDelta {
                status: Some(CampaignStatus::Running),
                segment_size: Some(segment_size),
                ..Default::default()
            },
        }
    }

    /// Progress advanced; status is left as is.
    pub fn progress(campaign_id: Uuid, progress: u8) -> Self {
        Self {
            campaign_id,
            delta: CampaignDelta {
                progress: Some(progress),
                ..Default::default()
            },
        }
    }

    pub fn failed(campaign_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            campaign_id,
            delta: CampaignDelta {
                status: Some(CampaignStatus::Failed),
                failure_reason: Some(reason.into()),
                ..Default::default()
            },
        }
    }
}
