//! Outbound provisioning: event intake, the delivery state machine, the SCIM
//! translator/HTTP client/token minter an attempt composes, and the facade the
//! admin surface drives.

pub mod http_client;
pub mod intake;
pub mod scheduler;
pub mod scope_policy;
pub mod service;
pub mod token;
pub mod translator;
pub mod worker;

pub use intake::EventIntake;
pub use scheduler::{DeliveryContextLoader, EventProcessor, RepositoryDeliveryContextLoader, ScheduledProcessor};
pub use scope_policy::ScopePolicy;
pub use service::DestinationService;
pub use worker::DeliveryWorker;
