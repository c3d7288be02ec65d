pub mod airtable;
pub mod dodo;
pub mod firestore;

use crate::config::toml_config::{CourierConfig, StoreBackend, StoreConfig};
use crate::domain::ports::{Courier, OrderStore};
use crate::utils::error::Result;
use airtable::AirtableStore;
use dodo::DodoClient;
use firestore::FirestoreStore;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// 依設定選擇資料來源，HTTP client 由呼叫端建立後共用
pub fn build_store(config: &StoreConfig, client: Client) -> Result<Arc<dyn OrderStore>> {
    let store: Arc<dyn OrderStore> = match config.backend {
        StoreBackend::Airtable => Arc::new(AirtableStore::with_client(
            client,
            config.airtable_settings()?,
        )),
        StoreBackend::Firestore => Arc::new(FirestoreStore::with_client(
            client,
            config.firestore_settings()?,
        )),
    };
    Ok(store)
}

pub fn build_courier(config: &CourierConfig) -> Result<Arc<dyn Courier>> {
    Ok(Arc::new(DodoClient::new(config.dodo_settings())?))
}

pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}
