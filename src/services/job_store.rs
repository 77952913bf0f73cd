use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::models::job::{Job, JobStatus, Order};
use crate::models::verification::VerificationKind;

#[derive(Default)]
struct StoreInner {
    orders: BTreeMap<String, Order>,
    jobs: BTreeMap<String, Job>,
}

/// In-memory owner of orders and jobs.
///
/// Every mutation takes the single lock, so status has exactly one writer and
/// racing claims on one order resolve first-writer-wins.
#[derive(Default)]
pub struct JobStore {
    inner: Mutex<StoreInner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store whose available pool holds `orders`.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::new();
        for order in orders {
            store.add_order(order);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put an order into the available pool (replacing one with the same id).
    pub fn add_order(&self, mut order: Order) {
        order.status = JobStatus::Pending;
        let mut inner = self.lock();
        if inner.jobs.contains_key(&order.id) {
            warn!(order_id = %order.id, "Ignoring order whose id is already a claimed job");
            return;
        }
        debug!(order_id = %order.id, "Order added to available pool");
        inner.orders.insert(order.id.clone(), order);
    }

    pub fn list_orders(&self) -> Vec<Order> {
        self.lock().orders.values().cloned().collect()
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.lock().jobs.values().cloned().collect()
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job, StoreError> {
        self.lock()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    /// Claim an order: it leaves the pool and becomes an `assigned` job.
    pub fn claim(&self, order_id: &str) -> Result<Job, StoreError> {
        let mut inner = self.lock();
        let order = inner
            .orders
            .remove(order_id)
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;

        let job = Job::from_claimed(order, Utc::now());
        inner.jobs.insert(job.id.clone(), job.clone());
        drop(inner);

        record_transition("claim");
        info!(job_id = %job.id, status = %job.status, "Order claimed");
        Ok(job)
    }

    /// `assigned → in-progress`.
    pub fn start(&self, job_id: &str) -> Result<Job, StoreError> {
        let job = self.mutate(job_id, "start", |job| {
            if job.status != JobStatus::Assigned {
                return Err(illegal(job, "start"));
            }
            job.status = JobStatus::InProgress;
            Ok(())
        })?;
        info!(job_id = %job.id, "Job started");
        Ok(job)
    }

    /// Drop the job and put its order back in the pool as `pending`.
    pub fn cancel(&self, job_id: &str) -> Result<Order, StoreError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        if job.status == JobStatus::Completed {
            return Err(illegal(job, "cancel"));
        }

        let Some(job) = inner.jobs.remove(job_id) else {
            return Err(StoreError::NotFound(job_id.to_string()));
        };
        let order = job.into_order();
        inner.orders.insert(order.id.clone(), order.clone());
        drop(inner);

        record_transition("cancel");
        info!(job_id = %order.id, "Job cancelled, order returned to pool");
        Ok(order)
    }

    /// Record a verified pickup. Only valid while `in-progress`.
    pub fn complete_pickup(&self, job_id: &str) -> Result<Job, StoreError> {
        self.complete(job_id, VerificationKind::Pickup)
    }

    /// Record a verified delivery; the job becomes `completed` once both legs
    /// are verified.
    pub fn complete_delivery(&self, job_id: &str) -> Result<Job, StoreError> {
        self.complete(job_id, VerificationKind::Delivery)
    }

    /// Apply a verified proof of the given kind.
    pub fn complete(&self, job_id: &str, kind: VerificationKind) -> Result<Job, StoreError> {
        let action = match kind {
            VerificationKind::Pickup => "complete_pickup",
            VerificationKind::Delivery => "complete_delivery",
        };
        let job = self.mutate(job_id, action, |job| {
            if job.status != JobStatus::InProgress {
                return Err(illegal(job, action));
            }
            match kind {
                VerificationKind::Pickup => job.pickup_verified = true,
                VerificationKind::Delivery => job.delivery_verified = true,
            }
            if job.pickup_verified && job.delivery_verified {
                job.status = JobStatus::Completed;
            }
            Ok(())
        })?;

        info!(
            job_id = %job.id,
            kind = %kind,
            status = %job.status,
            "Verified leg recorded"
        );
        Ok(job)
    }

    /// Run `apply` on a copy of the job and commit only if it succeeds, so a
    /// rejected transition leaves the stored job untouched.
    fn mutate<F>(&self, job_id: &str, action: &'static str, apply: F) -> Result<Job, StoreError>
    where
        F: FnOnce(&mut Job) -> Result<(), StoreError>,
    {
        let mut inner = self.lock();
        let stored = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

        let mut next = stored.clone();
        if let Err(e) = apply(&mut next) {
            debug!(job_id, action, error = %e, "Transition refused");
            return Err(e);
        }
        *stored = next.clone();
        drop(inner);

        record_transition(action);
        Ok(next)
    }
}

fn illegal(job: &Job, action: &'static str) -> StoreError {
    StoreError::IllegalState {
        job_id: job.id.clone(),
        status: job.status,
        action,
    }
}

fn record_transition(action: &'static str) {
    metrics::counter!("job_transitions_total", "action" => action).increment(1);
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StoreError {
    #[error("No order or job with id {0}")]
    NotFound(String),

    #[error("Cannot {action} job {job_id} while it is {status}")]
    IllegalState {
        job_id: String,
        status: JobStatus,
        action: &'static str,
    },
}
