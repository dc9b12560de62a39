use std::sync::Arc;

use chrono::NaiveDate;
use common::entities::capsule::Capsule;
use derive_more::{Display, Error};
use futures::{stream, StreamExt};

use crate::{
    error::{MailError, StoreError},
    repositories::capsule::CapsuleStore,
    service::mailer::Mailer,
};

/// Why a single capsule was not delivered. The capsule stays eligible either
/// way, except for `AlreadyDelivered` which means some other run got there.
#[derive(Debug, Display, Error)]
pub enum DeliveryFailure {
    #[display(fmt = "send failed: {}", _0)]
    Mail(MailError),
    #[display(fmt = "mark delivered failed: {}", _0)]
    Store(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySummary {
    pub date: NaiveDate,
    pub found: usize,
    pub delivered: usize,
    pub failed: usize,
    pub failures: Vec<FailedDelivery>,
}

impl DeliverySummary {
    fn new(date: NaiveDate, found: usize) -> Self {
        Self {
            date,
            found,
            delivered: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, capsule: &Capsule, outcome: Result<(), DeliveryFailure>) {
        match outcome {
            Ok(()) => {
                log::info!(
                    "Delivered capsule {} to {}: \"{}\"",
                    capsule.id,
                    capsule.email,
                    capsule.subject
                );
                self.delivered += 1;
            }
            Err(DeliveryFailure::Store(StoreError::AlreadyDelivered { id })) => {
                log::warn!("Capsule {} was marked delivered by another run", id);
                self.failed += 1;
                self.failures.push(FailedDelivery {
                    id: id.to_hex(),
                    reason: "already delivered".to_string(),
                });
            }
            Err(err) => {
                log::error!("Failed to deliver capsule {}: {}", capsule.id, err);
                self.failed += 1;
                self.failures.push(FailedDelivery {
                    id: capsule.id.to_hex(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Sends every due capsule and marks it delivered.
///
/// A capsule is only marked after its send succeeded, so a crash between the
/// two steps produces a duplicate on the next run, never a lost letter.
/// Overlapping runs are not guarded against: two of them can both pick up the
/// same capsule before either marks it. The loser sees `AlreadyDelivered`.
pub struct DeliveryJob {
    store: Arc<dyn CapsuleStore>,
    mailer: Arc<dyn Mailer>,
    concurrency: usize,
}

impl DeliveryJob {
    pub fn new(store: Arc<dyn CapsuleStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            mailer,
            concurrency: 1,
        }
    }

    /// Maximum number of capsules in flight at once (default: 1).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Delivers everything due on `today`. Only a failing due query aborts the
    /// run; per-capsule failures are logged and counted.
    pub async fn run(&self, today: NaiveDate) -> Result<DeliverySummary, StoreError> {
        log::info!("Starting capsule delivery for {}", today);

        let due = self.store.query_due_unsent(today).await?;
        let summary = DeliverySummary::new(today, due.len());

        if due.is_empty() {
            log::info!("No capsules to deliver for {}", today);
            return Ok(summary);
        }

        log::info!("Found {} capsule(s) to deliver", due.len());

        // Record each outcome as it completes; a deadline may drop this future.
        let summary = stream::iter(due)
            .map(|capsule| async move {
                let outcome = self.deliver(&capsule).await;
                (capsule, outcome)
            })
            .buffer_unordered(self.concurrency)
            .fold(summary, |mut summary, (capsule, outcome)| async move {
                summary.record(&capsule, outcome);
                summary
            })
            .await;

        log::info!(
            "Capsule delivery for {} completed: {} delivered, {} failed",
            today,
            summary.delivered,
            summary.failed
        );

        Ok(summary)
    }

    async fn deliver(&self, capsule: &Capsule) -> Result<(), DeliveryFailure> {
        self.mailer
            .send_delivery(capsule)
            .await
            .map_err(DeliveryFailure::Mail)?;

        self.store
            .mark_delivered(capsule.id)
            .await
            .map_err(DeliveryFailure::Store)
    }
}
