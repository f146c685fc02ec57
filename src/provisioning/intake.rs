//! Event Intake & Fanout (§4.1): the entry point external collaborators call once
//! their own write has committed. Fans a single `LocalEvent` out to one `Delivery`
//! per destination enabled for the event's tenant, and never lets a fanout
//! failure propagate back into the caller's primary write path.

use crate::domain::LocalEvent;
use crate::repository::{DeliveryRepository, DestinationRepository, EventLogRepository};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct EventIntake {
    destinations: Arc<dyn DestinationRepository>,
    deliveries: Arc<dyn DeliveryRepository>,
    event_log: Arc<dyn EventLogRepository>,
}

impl EventIntake {
    pub fn new(
        destinations: Arc<dyn DestinationRepository>,
        deliveries: Arc<dyn DeliveryRepository>,
        event_log: Arc<dyn EventLogRepository>,
    ) -> Self {
        Self {
            destinations,
            deliveries,
            event_log,
        }
    }

    /// Fans `event` out to every enabled destination for its tenant. Each
    /// destination's `insert_pending` failure is logged and skipped rather than
    /// aborting the whole fanout — one bad destination must never block delivery
    /// to the others, and this call must never fail its caller's primary write.
    pub async fn on_local_event(&self, event: &LocalEvent) {
        if !event.is_scim_relevant() {
            return;
        }

        if let Err(err) = self.event_log.record(event).await {
            error!(event_id = %event.event_id, error = %err, "failed to persist event for replay, aborting fanout");
            return;
        }

        let destinations = match self.destinations.list_enabled_for_tenant(event.tenant_id).await {
            Ok(destinations) => destinations,
            Err(err) => {
                error!(tenant_id = %event.tenant_id, event_id = %event.event_id, error = %err, "failed to list destinations for fanout");
                return;
            }
        };

        if destinations.is_empty() {
            return;
        }

        for destination in destinations {
            match self.deliveries.insert_pending(event.event_id, destination.id).await {
                Ok(_) => {
                    info!(event_id = %event.event_id, destination_id = %destination.id, "queued delivery");
                }
                Err(err) => {
                    warn!(event_id = %event.event_id, destination_id = %destination.id, error = %err, "failed to queue delivery, skipping destination");
                }
            }
        }
    }
}
