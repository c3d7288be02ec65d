use crate::domain::model::{
    Charity, Confirmation, CourierOrder, CourierToken, Donor, LocalDay, NewOrder, Order,
    OrderStatus,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Backing store holding donors, charities, orders and food offers.
///
/// Listing operations return one `Result` per record so that a single record
/// with a broken shape does not hide the others.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Human readable name of the orders table/collection, used in logs.
    fn orders_location(&self) -> &str;

    /// Pending orders whose delivery falls later on `today`.
    async fn list_pending_orders_due_today(&self, today: &LocalDay)
        -> Result<Vec<Result<Order>>>;

    async fn list_confirmations_for_donor_today(
        &self,
        donor_id: &str,
        today: &LocalDay,
    ) -> Result<Vec<Confirmation>>;

    async fn list_donors(&self) -> Result<Vec<Result<Donor>>>;

    async fn list_charities(&self) -> Result<Vec<Result<Charity>>>;

    async fn get_donor(&self, donor_id: &str) -> Result<Donor>;

    async fn get_charity(&self, charity_id: &str) -> Result<Charity>;

    async fn set_order_status(&self, order: &Order, status: OrderStatus) -> Result<()>;

    async fn create_order(&self, order: &NewOrder) -> Result<()>;
}

/// Courier dispatch API.
#[async_trait]
pub trait Courier: Send + Sync {
    async fn fetch_token(&self) -> Result<CourierToken>;

    async fn create_order(&self, order: &CourierOrder, token: &CourierToken) -> Result<()>;

    async fn cancel_order(
        &self,
        identifier: &str,
        reason: &str,
        changed_at: DateTime<Utc>,
        token: &CourierToken,
    ) -> Result<()>;
}

/// Summary of one batch job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub attempted: usize,
    pub handled: usize,
}

/// One-shot batch job driven by [`crate::core::engine::JobEngine`].
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self) -> Result<JobSummary>;
}
