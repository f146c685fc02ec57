//! Scheduler / Poller (§4.3): the `Scheduled` `EventProcessor` implementation.
//! On a fixed tick it reclaims stale `IN_PROGRESS` deliveries, claims a batch of
//! due work, and dispatches each claimed delivery to a bounded worker pool.
//!
//! `EventProcessor` itself is a pluggable lifecycle (`start`/`stop`/`on_event`)
//! so a future broker-backed implementation (Kafka, AMQP, change-data-capture)
//! can reuse the same delivery path by calling `on_event` from its own consumer
//! loop instead of polling.

use crate::config::ScimConfig;
use crate::domain::LocalEvent;
use crate::provisioning::http_client::ScimHttpClient;
use crate::provisioning::intake::EventIntake;
use crate::provisioning::token::TokenSigner;
use crate::provisioning::worker::{DeliveryWorker, Outcome};
use crate::repository::DeliveryRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

#[async_trait]
pub trait EventProcessor: Send + Sync {
    async fn start(self: Arc<Self>);
    async fn stop(&self);
    async fn on_event(&self, event: &LocalEvent);
}

pub struct ScheduledProcessor<H: ScimHttpClient + 'static, S: TokenSigner + 'static> {
    config: ScimConfig,
    deliveries: Arc<dyn DeliveryRepository>,
    worker: Arc<DeliveryWorker<H, S>>,
    intake: Arc<EventIntake>,
    loader: Arc<dyn DeliveryContextLoader>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    concurrency: Arc<Semaphore>,
}

/// Loads the `Destination`/`LocalEvent` pair a claimed `Delivery` needs. Kept
/// abstract so the scheduler doesn't depend on how events are re-hydrated (a
/// separate event-log store, an outbox table, a broker replay API, ...).
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryContextLoader: Send + Sync {
    async fn load(
        &self,
        delivery: &crate::domain::Delivery,
    ) -> anyhow::Result<Option<(crate::domain::Destination, LocalEvent)>>;
}

/// Default loader: destination from `DestinationRepository`, event from the
/// durable `EventLogRepository` intake persisted to before fanout.
pub struct RepositoryDeliveryContextLoader {
    destinations: Arc<dyn crate::repository::DestinationRepository>,
    event_log: Arc<dyn crate::repository::EventLogRepository>,
}

impl RepositoryDeliveryContextLoader {
    pub fn new(
        destinations: Arc<dyn crate::repository::DestinationRepository>,
        event_log: Arc<dyn crate::repository::EventLogRepository>,
    ) -> Self {
        Self {
            destinations,
            event_log,
        }
    }
}

#[async_trait]
impl DeliveryContextLoader for RepositoryDeliveryContextLoader {
    async fn load(
        &self,
        delivery: &crate::domain::Delivery,
    ) -> anyhow::Result<Option<(crate::domain::Destination, LocalEvent)>> {
        let destination = self.destinations.find_by_id(delivery.destination_id).await?;
        let event = self.event_log.find_by_id(delivery.event_id).await?;
        Ok(match (destination, event) {
            (Some(destination), Some(event)) => Some((destination, event)),
            _ => None,
        })
    }
}

impl<H: ScimHttpClient + 'static, S: TokenSigner + 'static> ScheduledProcessor<H, S> {
    pub fn new(
        config: ScimConfig,
        deliveries: Arc<dyn DeliveryRepository>,
        worker: Arc<DeliveryWorker<H, S>>,
        intake: Arc<EventIntake>,
        loader: Arc<dyn DeliveryContextLoader>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let concurrency = Arc::new(Semaphore::new(
            config.claim_batch_size.max(1) as usize,
        ));
        Self {
            config,
            deliveries,
            worker,
            intake,
            loader,
            shutdown_tx,
            shutdown_rx,
            concurrency,
        }
    }

    async fn tick(&self) {
        if let Err(err) = self.reclaim_stale().await {
            error!(error = %err, "failed to reclaim stale deliveries");
        }

        let claimed = match self
            .deliveries
            .claim_due(Utc::now(), self.config.claim_batch_size)
            .await
        {
            Ok(claimed) => claimed,
            Err(err) => {
                error!(error = %err, "failed to claim due deliveries");
                return;
            }
        };

        if claimed.is_empty() {
            return;
        }
        info!(count = claimed.len(), "claimed deliveries for this tick");

        let mut handles = Vec::with_capacity(claimed.len());
        for delivery in claimed {
            let permit = self.concurrency.clone().acquire_owned().await.expect("semaphore never closed");
            let worker = self.worker.clone();
            let loader = self.loader.clone();
            let deliveries = self.deliveries.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                match loader.load(&delivery).await {
                    Ok(Some((destination, event))) => {
                        match worker.attempt(&delivery, &destination, &event).await {
                            Ok(outcome) => log_outcome(&delivery, outcome),
                            Err(err) => error!(delivery_id = %delivery.id, error = %err, "delivery attempt errored"),
                        }
                    }
                    Ok(None) => {
                        warn!(delivery_id = %delivery.id, "source event no longer resolvable, marking failed");
                        let _ = deliveries
                            .mark_failed(delivery.id, None, "source event not found".to_string())
                            .await;
                    }
                    Err(err) => {
                        error!(delivery_id = %delivery.id, error = %err, "failed to load delivery context");
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn reclaim_stale(&self) -> anyhow::Result<()> {
        let threshold = Utc::now() - chrono::Duration::from_std(self.config.reclaim_staleness)?;
        let reclaimed = self.deliveries.mark_reclaimable(threshold).await?;
        if reclaimed > 0 {
            warn!(count = reclaimed, "reclaimed stale in-progress deliveries");
        }
        Ok(())
    }
}

fn log_outcome(delivery: &crate::domain::Delivery, outcome: Outcome) {
    match outcome {
        Outcome::Success => info!(delivery_id = %delivery.id, "delivery succeeded"),
        Outcome::Skipped => info!(delivery_id = %delivery.id, "delivery skipped (synthetic success)"),
        Outcome::Retrying => info!(delivery_id = %delivery.id, "delivery scheduled for retry"),
        Outcome::Failed => warn!(delivery_id = %delivery.id, "delivery permanently failed"),
    }
}

#[async_trait]
impl<H: ScimHttpClient + 'static, S: TokenSigner + 'static> EventProcessor for ScheduledProcessor<H, S> {
    async fn start(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("scheduler loop exiting, draining in-flight workers");
        let drain_deadline = tokio::time::sleep(self.config.drain_timeout);
        tokio::pin!(drain_deadline);
        tokio::select! {
            _ = self.concurrency.acquire_many(self.config.claim_batch_size.max(1)) => {}
            _ = &mut drain_deadline => {
                warn!("drain timeout elapsed with workers still in flight");
            }
        }
    }

    async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn on_event(&self, event: &LocalEvent) {
        self.intake.on_local_event(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScimConfig;
    use crate::domain::{Delivery, DeliveryStatus, StringUuid};
    use crate::provisioning::http_client::MockScimHttpClient;
    use crate::provisioning::token::JwtTokenSigner;
    use crate::repository::{MockDeliveryRepository, MockResourceMappingRepository};
    use chrono::Utc;
    use std::time::Duration;

    fn minter() -> Arc<crate::provisioning::token::TokenMinter<JwtTokenSigner>> {
        let signing = crate::config::SigningConfig {
            hmac_secret: "s".into(),
            kid: "k".into(),
            issuer_base_url: "https://auth.example.com".into(),
        };
        Arc::new(crate::provisioning::token::TokenMinter::new(
            JwtTokenSigner::new(&signing),
            signing.issuer_base_url,
            Duration::from_secs(3600),
        ))
    }

    fn pending_delivery() -> Delivery {
        Delivery {
            id: StringUuid::new_v4(),
            event_id: StringUuid::new_v4(),
            destination_id: StringUuid::new_v4(),
            status: DeliveryStatus::InProgress,
            retry_count: 0,
            last_http_status: None,
            last_error: None,
            scim_resource_id: None,
            next_retry_at: None,
            claimed_at: Some(Utc::now()),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn tick_with_no_claimed_work_does_nothing() {
        let mut deliveries = MockDeliveryRepository::new();
        deliveries.expect_mark_reclaimable().returning(|_| Ok(0));
        deliveries.expect_claim_due().returning(|_, _| Ok(vec![]));

        let worker = Arc::new(DeliveryWorker::new(
            Arc::new(MockDeliveryRepository::new()),
            Arc::new(MockResourceMappingRepository::new()),
            Arc::new(MockScimHttpClient::new()),
            minter(),
        ));

        let mut destinations = crate::repository::MockDestinationRepository::new();
        destinations.expect_list_enabled_for_tenant().returning(|_| Ok(vec![]));
        let intake = Arc::new(EventIntake::new(
            Arc::new(destinations),
            Arc::new(MockDeliveryRepository::new()),
            Arc::new(crate::repository::MockEventLogRepository::new()),
        ));

        let loader = Arc::new(MockDeliveryContextLoader::new());

        let processor = ScheduledProcessor::new(
            ScimConfig::default(),
            Arc::new(deliveries),
            worker,
            intake,
            loader,
        );
        processor.tick().await;
    }

    #[tokio::test]
    async fn tick_marks_failed_when_source_event_cannot_be_loaded() {
        let delivery = pending_delivery();
        let delivery_id = delivery.id;

        let mut deliveries = MockDeliveryRepository::new();
        deliveries.expect_mark_reclaimable().returning(|_| Ok(0));
        deliveries
            .expect_claim_due()
            .returning(move |_, _| Ok(vec![delivery.clone()]));
        deliveries
            .expect_mark_failed()
            .withf(move |id, _, _| *id == delivery_id)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let worker = Arc::new(DeliveryWorker::new(
            Arc::new(MockDeliveryRepository::new()),
            Arc::new(MockResourceMappingRepository::new()),
            Arc::new(MockScimHttpClient::new()),
            minter(),
        ));

        let mut destinations = crate::repository::MockDestinationRepository::new();
        destinations.expect_list_enabled_for_tenant().returning(|_| Ok(vec![]));
        let intake = Arc::new(EventIntake::new(
            Arc::new(destinations),
            Arc::new(MockDeliveryRepository::new()),
            Arc::new(crate::repository::MockEventLogRepository::new()),
        ));

        let mut loader = MockDeliveryContextLoader::new();
        loader.expect_load().times(1).returning(|_| Ok(None));

        let processor = ScheduledProcessor::new(
            ScimConfig::default(),
            Arc::new(deliveries),
            worker,
            intake,
            Arc::new(loader),
        );
        processor.tick().await;
    }
}
