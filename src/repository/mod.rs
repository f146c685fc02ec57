//! Persistence layer: typed repositories over the three tables of §6 plus the
//! client-application/scope ports the core consumes as external collaborators.

pub mod client_application;
pub mod delivery;
pub mod destination;
pub mod event_log;
pub mod resource_mapping;
pub mod scope;

pub use client_application::{ClientApplicationRepository, ClientApplicationRepositoryImpl};
pub use delivery::{DeliveryRepository, DeliveryRepositoryImpl};
pub use destination::{DestinationRepository, DestinationRepositoryImpl};
pub use event_log::{EventLogRepository, EventLogRepositoryImpl};
pub use resource_mapping::{ResourceMappingRepository, ResourceMappingRepositoryImpl};
pub use scope::{InMemoryScopeStore, ScopeStore};

#[cfg(test)]
pub use client_application::MockClientApplicationRepository;
#[cfg(test)]
pub use delivery::MockDeliveryRepository;
#[cfg(test)]
pub use destination::MockDestinationRepository;
#[cfg(test)]
pub use event_log::MockEventLogRepository;
#[cfg(test)]
pub use resource_mapping::MockResourceMappingRepository;
#[cfg(test)]
pub use scope::MockScopeStore;
