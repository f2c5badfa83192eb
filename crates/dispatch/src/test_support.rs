//! Scriptable in-memory collaborators for engine tests.

use async_trait::async_trait;
use campaign_core::codec::encode_html;
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::ports::{
    AudienceSource, CampaignRepository, EmailSender, EmailStore, TenantDirectory,
};
use campaign_core::types::{
    AudiencePage, Campaign, CampaignEmail, CampaignStatus, Email, Recipient, Tenant,
    MAX_RECIPIENTS_PER_SEND,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// A pending campaign with one variant per ratio.
pub fn campaign(schedule: i64, ratios: &[u32]) -> Campaign {
    let now = Utc::now();
    let id = Uuid::new_v4();
    Campaign {
        id,
        tenant_id: Uuid::new_v4(),
        name: "Test campaign".into(),
        description: None,
        segment_id: Uuid::new_v4(),
        segment_size: 0,
        progress: 0,
        status: CampaignStatus::Pending,
        failure_reason: None,
        emails: ratios
            .iter()
            .enumerate()
            .map(|(i, &ratio)| CampaignEmail {
                id: Uuid::new_v4(),
                campaign_id: id,
                email_id: Uuid::new_v4(),
                subject: format!("Variant {i}"),
                ratio,
                open_count: 0,
                click_counts: 0,
            })
            .collect(),
        schedule,
        created_at: now,
        updated_at: now,
    }
}

pub fn recipients(n: usize) -> Vec<Recipient> {
    (0..n).map(|i| format!("user{i}@example.com")).collect()
}

#[derive(Default)]
pub struct FakeBackend {
    campaigns: Mutex<Vec<Campaign>>,
    history: Mutex<HashMap<Uuid, Vec<Campaign>>>,
    tenants: Mutex<HashMap<Uuid, Tenant>>,
    segments: Mutex<HashMap<Uuid, Vec<Recipient>>>,
    emails: Mutex<HashMap<Uuid, Email>>,
    /// Segment → zero-based page index that fails.
    failing_pages: Mutex<HashMap<Uuid, usize>>,
    update_failures: AtomicUsize,
    page_calls: AtomicUsize,
    pending_unavailable: AtomicBool,
}

impl FakeBackend {
    /// Store `campaign` together with its tenant, an audience of `audience`
    /// members and a decodable template for every variant.
    pub fn seed(&self, campaign: &Campaign, audience: usize) {
        self.tenants.lock().unwrap().insert(
            campaign.tenant_id,
            Tenant {
                id: campaign.tenant_id,
                name: "Acme".into(),
                from_email: Some("news@acme.test".into()),
            },
        );
        self.segments
            .lock()
            .unwrap()
            .insert(campaign.segment_id, recipients(audience));
        for variant in &campaign.emails {
            self.put_email(
                campaign.tenant_id,
                variant.email_id,
                encode_html(&format!("<p>{}</p>", variant.subject)),
            );
        }
        self.campaigns.lock().unwrap().push(campaign.clone());
    }

    pub fn put_email(&self, tenant_id: Uuid, email_id: Uuid, html_encoded: String) {
        self.emails.lock().unwrap().insert(
            email_id,
            Email {
                id: email_id,
                tenant_id,
                name: "template".into(),
                html_encoded,
            },
        );
    }

    pub fn put_segment(&self, segment_id: Uuid, members: Vec<Recipient>) {
        self.segments.lock().unwrap().insert(segment_id, members);
    }

    pub fn remove_tenant(&self, tenant_id: Uuid) {
        self.tenants.lock().unwrap().remove(&tenant_id);
    }

    pub fn fail_page(&self, segment_id: Uuid, page: usize) {
        self.failing_pages.lock().unwrap().insert(segment_id, page);
    }

    pub fn fail_pending_lookup(&self) {
        self.pending_unavailable.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_updates(&self, n: usize) {
        self.update_failures.store(n, Ordering::SeqCst);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Every successfully persisted version of a campaign, oldest first.
    pub fn persisted(&self, id: Uuid) -> Vec<Campaign> {
        self.history
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn latest(&self, id: Uuid) -> Option<Campaign> {
        self.persisted(id).pop()
    }
}

#[async_trait]
impl CampaignRepository for FakeBackend {
    async fn pending_campaigns(&self, cutoff: i64) -> CampaignResult<Vec<Campaign>> {
        if self.pending_unavailable.load(Ordering::SeqCst) {
            return Err(CampaignError::Persistence("campaign store unavailable".into()));
        }
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_due(cutoff))
            .cloned()
            .collect())
    }

    async fn update(&self, campaign: &Campaign) -> CampaignResult<()> {
        let remaining = self.update_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.update_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CampaignError::Persistence("write rejected".into()));
        }

        let mut campaigns = self.campaigns.lock().unwrap();
        if let Some(stored) = campaigns.iter_mut().find(|c| c.id == campaign.id) {
            *stored = campaign.clone();
        }
        self.history
            .lock()
            .unwrap()
            .entry(campaign.id)
            .or_default()
            .push(campaign.clone());
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for FakeBackend {
    async fn get_tenant(&self, tenant_id: Uuid) -> CampaignResult<Tenant> {
        self.tenants
            .lock()
            .unwrap()
            .get(&tenant_id)
            .cloned()
            .ok_or_else(|| CampaignError::TenantLookup {
                tenant_id,
                message: "not found".into(),
            })
    }
}

#[async_trait]
impl AudienceSource for FakeBackend {
    async fn download_page(
        &self,
        _tenant: &Tenant,
        segment_id: Uuid,
        cursor: &str,
        limit: usize,
    ) -> CampaignResult<AudiencePage> {
        let page = self.page_calls.fetch_add(1, Ordering::SeqCst);
        let offset: usize = if cursor.is_empty() {
            0
        } else {
            cursor
                .parse()
                .map_err(|_| CampaignError::AudienceResolution("bad cursor".into()))?
        };

        if let Some(&failing) = self.failing_pages.lock().unwrap().get(&segment_id) {
            if offset / limit.max(1) == failing {
                return Err(CampaignError::AudienceResolution(format!(
                    "page {page} unavailable"
                )));
            }
        }

        let segments = self.segments.lock().unwrap();
        let members = segments
            .get(&segment_id)
            .ok_or_else(|| CampaignError::AudienceResolution("unknown segment".into()))?;
        let end = members.len().min(offset + limit);
        let next_cursor = if end < members.len() {
            end.to_string()
        } else {
            String::new()
        };
        Ok(AudiencePage {
            recipients: members[offset.min(end)..end].to_vec(),
            next_cursor,
        })
    }
}

#[async_trait]
impl EmailStore for FakeBackend {
    async fn get_email(&self, _tenant: &Tenant, email_id: Uuid) -> CampaignResult<Email> {
        self.emails
            .lock()
            .unwrap()
            .get(&email_id)
            .cloned()
            .ok_or_else(|| CampaignError::ContentFetch(format!("email {email_id} not found")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentBatch {
    pub campaign_email_id: Uuid,
    pub from: String,
    pub to: Vec<Recipient>,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct FakeSender {
    sent: Mutex<Vec<SentBatch>>,
    fail_all: AtomicBool,
    /// Zero-based call indexes that fail.
    failing_calls: Mutex<HashSet<usize>>,
    calls: AtomicUsize,
    panic_on_send: AtomicBool,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeSender {
    pub fn failing() -> Self {
        let sender = Self::default();
        sender.fail_all.store(true, Ordering::SeqCst);
        sender
    }

    /// Every send panics, taking its worker task down.
    pub fn panicking() -> Self {
        let sender = Self::default();
        sender.panic_on_send.store(true, Ordering::SeqCst);
        sender
    }

    /// Every send takes `latency` to complete.
    pub fn slow(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Highest number of sends observed in progress at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_call(&self, index: usize) {
        self.failing_calls.lock().unwrap().insert(index);
    }

    /// Every attempted batch, including failed ones.
    pub fn attempts(&self) -> Vec<SentBatch> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for FakeSender {
    async fn send_email(
        &self,
        campaign_email_id: Uuid,
        from: &str,
        to: &[Recipient],
        subject: &str,
        html: &str,
    ) -> CampaignResult<()> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(to.len() <= MAX_RECIPIENTS_PER_SEND, "batch over provider cap");
        if self.panic_on_send.load(Ordering::SeqCst) {
            panic!("sender blew up on call {index}");
        }

        if let Some(latency) = self.latency {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        self.sent.lock().unwrap().push(SentBatch {
            campaign_email_id,
            from: from.to_string(),
            to: to.to_vec(),
            subject: subject.to_string(),
            html: html.to_string(),
        });

        if self.fail_all.load(Ordering::SeqCst) || self.failing_calls.lock().unwrap().contains(&index)
        {
            return Err(CampaignError::Send("provider unavailable".into()));
        }
        Ok(())
    }
}
