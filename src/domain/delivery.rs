//! Delivery: the durable record of propagating one local event to one destination.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    Pending,
    InProgress,
    Success,
    Retrying,
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: StringUuid,
    pub event_id: StringUuid,
    pub destination_id: StringUuid,
    pub status: DeliveryStatus,
    pub retry_count: u32,
    pub last_http_status: Option<i32>,
    /// Truncated to 1000 chars at the point it is written.
    pub last_error: Option<String>,
    pub scim_resource_id: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Set when a worker claims the row; used by the staleness-based reclaim check.
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Truncate an error message to the persisted column width.
pub fn truncate_error(msg: impl Into<String>) -> String {
    let mut s = msg.into();
    if s.len() > 1000 {
        s.truncate(1000);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_failed_are_terminal() {
        assert!(DeliveryStatus::Success.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::Retrying.is_terminal());
        assert!(!DeliveryStatus::InProgress.is_terminal());
    }

    #[test]
    fn truncate_error_caps_at_1000_chars() {
        let long = "x".repeat(2000);
        assert_eq!(truncate_error(long).len(), 1000);
    }

    #[test]
    fn truncate_error_leaves_short_messages_untouched() {
        assert_eq!(truncate_error("boom"), "boom");
    }
}
