use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a delivery job.
///
/// Forward order is `pending → assigned → in-progress → completed`; a cancel
/// sends a non-completed job back to the order pool as `pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// An unclaimed delivery opportunity in the available pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub receiver_name: String,
    pub pickup_address: String,
    pub delivery_address: String,
    #[serde(default = "pending_status")]
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

fn pending_status() -> JobStatus {
    JobStatus::Pending
}

/// A claimed delivery task owned by a courier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub receiver_name: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub assigned_at: DateTime<Utc>,
    pub pickup_verified: bool,
    pub delivery_verified: bool,
}

impl Job {
    /// Build an `assigned` job from a freshly claimed order.
    pub fn from_claimed(order: Order, assigned_at: DateTime<Utc>) -> Self {
        Self {
            id: order.id,
            receiver_name: order.receiver_name,
            pickup_address: order.pickup_address,
            delivery_address: order.delivery_address,
            status: JobStatus::Assigned,
            priority: order.priority,
            assigned_at,
            pickup_verified: false,
            delivery_verified: false,
        }
    }

    /// Strip assignment metadata and return the job to the pool as `pending`.
    pub fn into_order(self) -> Order {
        Order {
            id: self.id,
            receiver_name: self.receiver_name,
            pickup_address: self.pickup_address,
            delivery_address: self.delivery_address,
            status: JobStatus::Pending,
            priority: self.priority,
        }
    }
}
