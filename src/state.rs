//! Shared application state handed to axum handlers.

use crate::provisioning::DestinationService;
use crate::repository::{DeliveryRepository, DestinationRepository};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub destinations: Arc<dyn DestinationRepository>,
    pub deliveries: Arc<dyn DeliveryRepository>,
    pub destination_service: Arc<DestinationService>,
}
