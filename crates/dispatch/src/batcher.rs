//! Provider-sized batching of a variant's bucket.
//!
//! A bucket is sent in consecutive chunks of at most `batch_size` recipients,
//! one provider call per chunk, strictly in order. A failed chunk is logged
//! and skipped; it is never retried and never fails the campaign.

use campaign_core::ports::EmailSender;
use campaign_core::types::{CampaignEmail, Recipient, MAX_RECIPIENTS_PER_SEND};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::progress::ProgressEmitter;

/// Outcome of dispatching one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batches: usize,
    pub failed_batches: usize,
    /// Recipients handed to the provider, whether or not the call succeeded.
    pub attempted: usize,
}

pub struct DispatchBatcher {
    sender: Arc<dyn EmailSender>,
    batch_size: usize,
}

impl DispatchBatcher {
    pub fn new(sender: Arc<dyn EmailSender>, batch_size: usize) -> Self {
        Self {
            sender,
            batch_size: batch_size.clamp(1, MAX_RECIPIENTS_PER_SEND),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Send `bucket` for one variant, emitting progress after every chunk.
    ///
    /// `last_variant` marks the campaign's final variant; its final chunk
    /// forces progress to 100.
    pub async fn dispatch(
        &self,
        from: &str,
        variant: &CampaignEmail,
        html: &str,
        bucket: &[Recipient],
        last_variant: bool,
        progress: &mut ProgressEmitter,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let total = bucket.len().div_ceil(self.batch_size);

        for (index, chunk) in bucket.chunks(self.batch_size).enumerate() {
            let result = self
                .sender
                .send_email(variant.id, from, chunk, &variant.subject, html)
                .await;

            outcome.batches += 1;
            outcome.attempted += chunk.len();
            metrics::counter!("dispatch.recipients_attempted").increment(chunk.len() as u64);

            match result {
                Ok(()) => {
                    metrics::counter!("dispatch.batches_sent").increment(1);
                }
                Err(e) => {
                    outcome.failed_batches += 1;
                    metrics::counter!("dispatch.batch_errors").increment(1);
                    warn!(
                        campaign_id = %variant.campaign_id,
                        campaign_email_id = %variant.id,
                        batch = index,
                        recipients = chunk.len(),
                        error = %e,
                        "Email batch send failed"
                    );
                }
            }

            let terminal = last_variant && index + 1 == total;
            progress.record(chunk.len(), terminal).await;
        }

        debug!(
            campaign_email_id = %variant.id,
            batches = outcome.batches,
            failed = outcome.failed_batches,
            attempted = outcome.attempted,
            "Variant dispatched"
        );

        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::status::StatusActor;
    use crate::test_support::{campaign, recipients, FakeBackend, FakeSender};

    #[tokio::test]
    async fn test_twenty_three_recipients_three_batches() {
        let backend = Arc::new(FakeBackend::default());
        let sender = Arc::new(FakeSender::default());
        let c = campaign(0, &[100]);
        let variant = c.emails[0].clone();
        let id = c.id;
        let (handle, actor) = StatusActor::spawn(backend.clone(), vec![c], 16);

        let bucket = recipients(23);
        let batcher = DispatchBatcher::new(sender.clone(), 10);
        let mut progress = ProgressEmitter::new(id, 23, handle);
        let outcome = batcher
            .dispatch("news@acme.test", &variant, "<p>hi</p>", &bucket, true, &mut progress)
            .await;
        drop(progress);
        actor.await.unwrap();

        assert_eq!(
            outcome,
            BatchOutcome {
                batches: 3,
                failed_batches: 0,
                attempted: 23
            }
        );

        let attempts = sender.attempts();
        let sizes: Vec<usize> = attempts.iter().map(|b| b.to.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(attempts[0].to, bucket[0..10].to_vec());
        assert_eq!(attempts[1].to, bucket[10..20].to_vec());
        assert_eq!(attempts[2].to, bucket[20..23].to_vec());
        assert!(attempts.iter().all(|b| b.campaign_email_id == variant.id
            && b.subject == variant.subject
            && b.html == "<p>hi</p>"
            && b.from == "news@acme.test"));

        assert_eq!(backend.latest(id).unwrap().progress, 100);
    }

    #[tokio::test]
    async fn test_failed_chunk_counts_as_attempted() {
        let backend = Arc::new(FakeBackend::default());
        let sender = Arc::new(FakeSender::default());
        sender.fail_call(1);
        let c = campaign(0, &[100]);
        let variant = c.emails[0].clone();
        let id = c.id;
        let (handle, actor) = StatusActor::spawn(backend.clone(), vec![c], 16);

        let batcher = DispatchBatcher::new(sender.clone(), 10);
        let mut progress = ProgressEmitter::new(id, 30, handle);
        let outcome = batcher
            .dispatch("a@b.c", &variant, "x", &recipients(30), false, &mut progress)
            .await;
        drop(progress);
        actor.await.unwrap();

        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.failed_batches, 1);
        assert_eq!(outcome.attempted, 30);

        let progress: Vec<u8> = backend.persisted(id).iter().map(|c| c.progress).collect();
        assert_eq!(progress, vec![33, 66, 100]);
    }

    #[tokio::test]
    async fn test_non_terminal_variant_not_forced() {
        let backend = Arc::new(FakeBackend::default());
        let sender = Arc::new(FakeSender::default());
        let c = campaign(0, &[50, 50]);
        let variant = c.emails[0].clone();
        let id = c.id;
        let (handle, actor) = StatusActor::spawn(backend.clone(), vec![c], 16);

        let batcher = DispatchBatcher::new(sender, 10);
        let mut progress = ProgressEmitter::new(id, 40, handle);
        batcher
            .dispatch("a@b.c", &variant, "x", &recipients(20), false, &mut progress)
            .await;
        drop(progress);
        actor.await.unwrap();

        assert_eq!(backend.latest(id).unwrap().progress, 50);
    }

    #[tokio::test]
    async fn test_empty_bucket_sends_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let sender = Arc::new(FakeSender::default());
        let c = campaign(0, &[100]);
        let variant = c.emails[0].clone();
        let id = c.id;
        let (handle, actor) = StatusActor::spawn(backend.clone(), vec![c], 4);

        let batcher = DispatchBatcher::new(sender.clone(), 10);
        let mut progress = ProgressEmitter::new(id, 0, handle);
        let outcome = batcher
            .dispatch("a@b.c", &variant, "x", &[], true, &mut progress)
            .await;
        drop(progress);
        actor.await.unwrap();

        assert_eq!(outcome, BatchOutcome::default());
        assert!(sender.attempts().is_empty());
        assert!(backend.persisted(id).is_empty());
    }

    #[test]
    fn test_batch_size_clamped() {
        let sender = Arc::new(FakeSender::default());
        assert_eq!(DispatchBatcher::new(sender.clone(), 100).batch_size(), 10);
        assert_eq!(DispatchBatcher::new(sender, 0).batch_size(), 1);
    }
}
