use crate::domain::model::{
    Charity, Confirmation, CourierOrder, CourierToken, Donor, LocalDay, NewOrder, Order,
    OrderStatus, TimeOfDay,
};
use crate::domain::ports::{Courier, OrderStore};
use crate::utils::error::{DispatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

fn schema_error(record_id: &str, message: &str) -> DispatchError {
    DispatchError::SchemaError {
        record_id: record_id.to_string(),
        message: message.to_string(),
    }
}

fn api_error(body: &str) -> DispatchError {
    DispatchError::ApiError {
        service: "fake".to_string(),
        status: 500,
        body: body.to_string(),
    }
}

#[derive(Default)]
pub struct StoreState {
    /// `Err` holds the id of a record that fails schema validation.
    pub orders: Vec<std::result::Result<Order, String>>,
    pub confirmations: HashMap<String, Vec<Confirmation>>,
    pub donors: Vec<std::result::Result<Donor, String>>,
    pub charities: Vec<Charity>,
    pub status_updates: Vec<(String, OrderStatus)>,
    /// Every `today` the store was queried with.
    pub queried_days: Vec<LocalDay>,
    pub created: Vec<NewOrder>,
    pub failing_confirmation_lookups: HashSet<String>,
    pub failing_status_updates: HashSet<String>,
    pub failing_creates: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct FakeStore {
    pub state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for FakeStore {
    fn orders_location(&self) -> &str {
        "fake orders"
    }

    async fn list_pending_orders_due_today(
        &self,
        today: &LocalDay,
    ) -> Result<Vec<Result<Order>>> {
        let mut state = self.state.lock().await;
        state.queried_days.push(*today);
        Ok(state
            .orders
            .iter()
            .map(|record| match record {
                Ok(order) => Ok(order.clone()),
                Err(id) => Err(schema_error(id, "missing field 'Identifikátor'")),
            })
            .collect())
    }

    async fn list_confirmations_for_donor_today(
        &self,
        donor_id: &str,
        today: &LocalDay,
    ) -> Result<Vec<Confirmation>> {
        let mut state = self.state.lock().await;
        state.queried_days.push(*today);
        if state.failing_confirmation_lookups.contains(donor_id) {
            return Err(api_error("offers table unavailable"));
        }
        Ok(state
            .confirmations
            .get(donor_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_donors(&self) -> Result<Vec<Result<Donor>>> {
        let state = self.state.lock().await;
        Ok(state
            .donors
            .iter()
            .map(|record| match record {
                Ok(donor) => Ok(donor.clone()),
                Err(id) => Err(schema_error(id, "missing field 'Vyzvednout od'")),
            })
            .collect())
    }

    async fn list_charities(&self) -> Result<Vec<Result<Charity>>> {
        let state = self.state.lock().await;
        Ok(state.charities.iter().cloned().map(Ok).collect())
    }

    async fn get_donor(&self, donor_id: &str) -> Result<Donor> {
        let state = self.state.lock().await;
        state
            .donors
            .iter()
            .filter_map(|record| record.as_ref().ok())
            .find(|donor| donor.id == donor_id)
            .cloned()
            .ok_or_else(|| DispatchError::NotFoundError {
                record_id: donor_id.to_string(),
                collection: "donors".to_string(),
            })
    }

    async fn get_charity(&self, charity_id: &str) -> Result<Charity> {
        let state = self.state.lock().await;
        state
            .charities
            .iter()
            .find(|charity| charity.id == charity_id)
            .cloned()
            .ok_or_else(|| DispatchError::NotFoundError {
                record_id: charity_id.to_string(),
                collection: "charities".to_string(),
            })
    }

    async fn set_order_status(&self, order: &Order, status: OrderStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failing_status_updates.contains(&order.id) {
            return Err(api_error("status update rejected"));
        }
        state.status_updates.push((order.id.clone(), status));
        Ok(())
    }

    async fn create_order(&self, order: &NewOrder) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failing_creates.contains(&order.courier.identifier) {
            return Err(api_error("insert rejected"));
        }
        state.created.push(order.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct CourierState {
    pub token_fetches: usize,
    pub created: Vec<CourierOrder>,
    pub canceled: Vec<(String, String)>,
    pub fail_token: bool,
    pub failing_cancels: HashSet<String>,
    pub failing_creates: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct FakeCourier {
    pub state: Arc<Mutex<CourierState>>,
}

impl FakeCourier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Courier for FakeCourier {
    async fn fetch_token(&self) -> Result<CourierToken> {
        let mut state = self.state.lock().await;
        state.token_fetches += 1;
        if state.fail_token {
            return Err(api_error("invalid_client"));
        }
        Ok(CourierToken {
            token_type: "Bearer".to_string(),
            expires_in: 3599,
            ext_expires_in: Some(3599),
            access_token: "token-123".to_string(),
        })
    }

    async fn create_order(&self, order: &CourierOrder, _token: &CourierToken) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failing_creates.contains(&order.identifier) {
            return Err(api_error("Invalid address"));
        }
        state.created.push(order.clone());
        Ok(())
    }

    async fn cancel_order(
        &self,
        identifier: &str,
        reason: &str,
        _changed_at: DateTime<Utc>,
        _token: &CourierToken,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failing_cancels.contains(identifier) {
            return Err(api_error("order already picked up"));
        }
        state
            .canceled
            .push((identifier.to_string(), reason.to_string()));
        Ok(())
    }
}

pub fn pending_order(id: &str, donor_id: &str, pickup_from: DateTime<Utc>) -> Order {
    Order {
        id: id.to_string(),
        identifier: format!("{}-charita-15.1.2024", id),
        donor_id: donor_id.to_string(),
        recipient_id: "recCharity".to_string(),
        pickup_from,
        pickup_to: None,
        status: OrderStatus::Pending,
    }
}

pub fn donor(id: &str, external_id: &str, recipient_ids: &[&str]) -> Donor {
    Donor {
        id: id.to_string(),
        external_id: external_id.to_string(),
        responsible_person: "Anna Strejcová".to_string(),
        phone: "+420123999888".to_string(),
        address: Some("Spojená 22, Praha 3".to_string()),
        pickup_from: TimeOfDay::from_hm(14, 0),
        pickup_to: TimeOfDay::from_hm(14, 30),
        deliver_from: TimeOfDay::from_hm(15, 0),
        deliver_to: TimeOfDay::from_hm(15, 30),
        recipient_ids: recipient_ids.iter().map(|id| id.to_string()).collect(),
        note: None,
    }
}

pub fn charity(id: &str, external_id: &str) -> Charity {
    Charity {
        id: id.to_string(),
        external_id: external_id.to_string(),
        responsible_person: "Jan Novák".to_string(),
        phone: "+420777111222".to_string(),
        address: "Husova 10, Beroun".to_string(),
        note: Some("Zazvoňte u zadního vchodu".to_string()),
    }
}
