//! SendGrid email delivery for campaign batches.
//!
//! Builds one SendGrid mail payload per batch (one personalization per
//! recipient so addresses are not disclosed to each other) and tracks
//! per-variant send counters.

use async_trait::async_trait;
use campaign_core::config::EmailProviderConfig;
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::ports::EmailSender;
use campaign_core::types::{Recipient, MAX_RECIPIENTS_PER_SEND};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

/// SendGrid email provider.
pub struct SendGridProvider {
    config: EmailProviderConfig,
    /// Recipients sent per campaign email variant.
    sent: DashMap<Uuid, u64>,
    requests: AtomicU64,
}

impl SendGridProvider {
    pub fn new(config: EmailProviderConfig) -> Self {
        info!(
            from = %config.from_email,
            open_tracking = config.open_tracking,
            click_tracking = config.click_tracking,
            "SendGrid provider initialized"
        );
        Self {
            config,
            sent: DashMap::new(),
            requests: AtomicU64::new(0),
        }
    }

    /// Build the SendGrid v3 mail/send payload for one batch.
    pub fn build_payload(
        &self,
        campaign_email_id: Uuid,
        from: &str,
        to: &[Recipient],
        subject: &str,
        html: &str,
    ) -> serde_json::Value {
        let personalizations: Vec<serde_json::Value> = to
            .iter()
            .map(|address| {
                serde_json::json!({
                    "to": [{"email": address}],
                    "custom_args": {"campaign_email_id": campaign_email_id.to_string()}
                })
            })
            .collect();

        serde_json::json!({
            "personalizations": personalizations,
            "from": {
                "email": from,
                "name": self.config.from_name
            },
            "subject": subject,
            "content": [{
                "type": "text/html",
                "value": html
            }],
            "tracking_settings": {
                "click_tracking": {"enable": self.config.click_tracking},
                "open_tracking": {"enable": self.config.open_tracking}
            }
        })
    }

    /// Recipients sent for a campaign email variant.
    pub fn sent_count(&self, campaign_email_id: Uuid) -> u64 {
        self.sent.get(&campaign_email_id).map(|v| *v).unwrap_or(0)
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &EmailProviderConfig {
        &self.config
    }
}

#[async_trait]
impl EmailSender for SendGridProvider {
    /// In production: POST the payload to https://api.sendgrid.com/v3/mail/send
    async fn send_email(
        &self,
        campaign_email_id: Uuid,
        from: &str,
        to: &[Recipient],
        subject: &str,
        html: &str,
    ) -> CampaignResult<()> {
        if to.is_empty() {
            return Err(CampaignError::Send("no recipients".into()));
        }
        if to.len() > MAX_RECIPIENTS_PER_SEND {
            return Err(CampaignError::Send(format!(
                "{} recipients exceeds provider limit of {}",
                to.len(),
                MAX_RECIPIENTS_PER_SEND
            )));
        }

        let payload = self.build_payload(campaign_email_id, from, to, subject, html);
        let body = serde_json::to_vec(&payload)?;

        debug!(
            campaign_email_id = %campaign_email_id,
            recipients = to.len(),
            bytes = body.len(),
            subject = %subject,
            "Sending email batch via SendGrid"
        );

        self.requests.fetch_add(1, Ordering::Relaxed);
        *self.sent.entry(campaign_email_id).or_insert(0) += to.len() as u64;

        metrics::counter!("sendgrid.emails_sent").increment(to.len() as u64);

        Ok(())
    }
}
