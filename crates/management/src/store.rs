//! In-memory management store backed by DashMap.
//!
//! Production: replace with PostgreSQL (sqlx) or similar ACID store.
//! This provides the same collaborator surface for development and testing.

use async_trait::async_trait;
use campaign_core::codec::encode_html;
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::ports::{AudienceSource, CampaignRepository, EmailStore, TenantDirectory};
use campaign_core::types::{
    AudiencePage, Campaign, CampaignEmail, CampaignStatus, Email, Recipient, Tenant,
};
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Thread-safe in-memory store for tenants, segments, email templates and campaigns.
pub struct ManagementStore {
    tenants: DashMap<Uuid, Tenant>,
    segments: DashMap<Uuid, Vec<Recipient>>,
    emails: DashMap<Uuid, Email>,
    campaigns: DashMap<Uuid, Campaign>,
}

impl Default for ManagementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementStore {
    pub fn new() -> Self {
        info!("Management store initialized (in-memory, development mode)");
        Self {
            tenants: DashMap::new(),
            segments: DashMap::new(),
            emails: DashMap::new(),
            campaigns: DashMap::new(),
        }
    }

    /// Store pre-populated with a demo tenant and two due campaigns.
    pub fn with_demo_data() -> Self {
        let store = Self::new();
        store.seed_demo_data();
        store
    }

    // ─── Tenants ───────────────────────────────────────────────────────────

    pub fn insert_tenant(&self, name: &str, from_email: Option<&str>) -> Tenant {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            from_email: from_email.map(str::to_string),
        };
        self.tenants.insert(tenant.id, tenant.clone());
        tenant
    }

    pub fn remove_tenant(&self, id: Uuid) -> bool {
        self.tenants.remove(&id).is_some()
    }

    // ─── Segments ──────────────────────────────────────────────────────────

    /// Store a resolved segment membership list.
    pub fn insert_segment(&self, members: Vec<Recipient>) -> Uuid {
        let id = Uuid::new_v4();
        self.segments.insert(id, members);
        id
    }

    // ─── Email templates ───────────────────────────────────────────────────

    /// Store a template from raw HTML, encoded the way bodies are persisted.
    pub fn insert_email(&self, tenant_id: Uuid, name: &str, html: &str) -> Email {
        let email = Email {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            html_encoded: encode_html(html),
        };
        self.emails.insert(email.id, email.clone());
        email
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    /// Create a pending campaign with one variant per `(email_id, subject, ratio)`.
    pub fn create_campaign(
        &self,
        tenant_id: Uuid,
        name: &str,
        segment_id: Uuid,
        schedule: i64,
        variants: &[(Uuid, &str, u32)],
    ) -> Campaign {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let campaign = Campaign {
            id,
            tenant_id,
            name: name.to_string(),
            description: None,
            segment_id,
            segment_size: 0,
            progress: 0,
            status: CampaignStatus::Pending,
            failure_reason: None,
            emails: variants
                .iter()
                .map(|&(email_id, subject, ratio)| CampaignEmail {
                    id: Uuid::new_v4(),
                    campaign_id: id,
                    email_id,
                    subject: subject.to_string(),
                    ratio,
                    open_count: 0,
                    click_counts: 0,
                })
                .collect(),
            schedule,
            created_at: now,
            updated_at: now,
        };
        self.campaigns.insert(id, campaign.clone());
        campaign
    }

    pub fn get_campaign(&self, id: Uuid) -> Option<Campaign> {
        self.campaigns.get(&id).map(|r| r.value().clone())
    }

    pub fn list_campaigns(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> =
            self.campaigns.iter().map(|r| r.value().clone()).collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    // ─── Demo Data ─────────────────────────────────────────────────────────

    fn seed_demo_data(&self) {
        let tenant = self.insert_tenant("Acme Retail", Some("news@acme-retail.example"));

        let members: Vec<Recipient> = (0..137)
            .map(|i| format!("shopper{i:03}@example.com"))
            .collect();
        let segment = self.insert_segment(members);

        let welcome = self.insert_email(
            tenant.id,
            "Spring welcome",
            "<html><body><h1>Spring is here</h1><p>Take 20% off today.</p></body></html>",
        );
        let reminder = self.insert_email(
            tenant.id,
            "Spring reminder",
            "<html><body><h1>Last chance</h1><p>Your 20% off ends tonight.</p></body></html>",
        );

        let now = Utc::now().timestamp();
        self.create_campaign(
            tenant.id,
            "Spring Sale A/B",
            segment,
            now,
            &[
                (welcome.id, "Spring is here", 70),
                (reminder.id, "Last chance for spring", 30),
            ],
        );
        self.create_campaign(
            tenant.id,
            "Spring Sale Follow-up",
            segment,
            now + 3600,
            &[(reminder.id, "Still thinking it over?", 100)],
        );

        info!(
            tenants = self.tenants.len(),
            campaigns = self.campaigns.len(),
            "Demo data seeded"
        );
    }
}

#[async_trait]
impl CampaignRepository for ManagementStore {
    async fn pending_campaigns(&self, cutoff: i64) -> CampaignResult<Vec<Campaign>> {
        let mut due: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|r| r.value().is_due(cutoff))
            .map(|r| r.value().clone())
            .collect();
        due.sort_by_key(|c| c.schedule);
        Ok(due)
    }

    async fn update(&self, campaign: &Campaign) -> CampaignResult<()> {
        if !self.campaigns.contains_key(&campaign.id) {
            return Err(CampaignError::Persistence(format!(
                "campaign {} not found",
                campaign.id
            )));
        }
        self.campaigns.insert(campaign.id, campaign.clone());
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for ManagementStore {
    async fn get_tenant(&self, tenant_id: Uuid) -> CampaignResult<Tenant> {
        self.tenants
            .get(&tenant_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CampaignError::TenantLookup {
                tenant_id,
                message: "tenant not found".into(),
            })
    }
}

#[async_trait]
impl AudienceSource for ManagementStore {
    /// The cursor is the stringified offset of the next member.
    async fn download_page(
        &self,
        _tenant: &Tenant,
        segment_id: Uuid,
        cursor: &str,
        limit: usize,
    ) -> CampaignResult<AudiencePage> {
        let offset: usize = if cursor.is_empty() {
            0
        } else {
            cursor.parse().map_err(|_| {
                CampaignError::AudienceResolution(format!("invalid cursor {cursor:?}"))
            })?
        };

        let members = self.segments.get(&segment_id).ok_or_else(|| {
            CampaignError::AudienceResolution(format!("segment {segment_id} not found"))
        })?;

        let start = offset.min(members.len());
        let end = members.len().min(start.saturating_add(limit.max(1)));
        let next_cursor = if end < members.len() {
            end.to_string()
        } else {
            String::new()
        };

        debug!(
            segment_id = %segment_id,
            offset = start,
            count = end - start,
            "Audience page served"
        );

        Ok(AudiencePage {
            recipients: members[start..end].to_vec(),
            next_cursor,
        })
    }
}

#[async_trait]
impl EmailStore for ManagementStore {
    async fn get_email(&self, tenant: &Tenant, email_id: Uuid) -> CampaignResult<Email> {
        self.emails
            .get(&email_id)
            .map(|r| r.value().clone())
            .filter(|e| e.tenant_id == tenant.id)
            .ok_or_else(|| {
                CampaignError::ContentFetch(format!(
                    "email {email_id} not found for tenant {}",
                    tenant.id
                ))
            })
    }
}
