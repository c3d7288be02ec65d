use crate::domain::model::{CourierOrder, CourierToken};
use crate::domain::ports::Courier;
use crate::utils::error::{DispatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

const SERVICE: &str = "DODO";

#[derive(Debug, Clone)]
pub struct DodoSettings {
    pub oauth_uri: String,
    pub scope: String,
    pub client_id: String,
    pub client_secret: String,
    pub orders_api: String,
    pub timeout: Duration,
}

/// DODO courier REST client, OAuth client-credentials protected.
pub struct DodoClient {
    client: Client,
    settings: DodoSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct OrderPayload<'a> {
    identifier: &'a str,
    pickup: PickupPayload<'a>,
    drop: DropPayload<'a>,
    customer_name: &'a str,
    customer_phone: &'a str,
    price: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PickupPayload<'a> {
    branch_identifier: &'a str,
    required_start: String,
    required_end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DropPayload<'a> {
    address_raw_value: &'a str,
    required_start: String,
    required_end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusPayload<'a> {
    status: &'a str,
    reason: &'a str,
    status_change_time: String,
}

fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl DodoClient {
    pub fn new(settings: DodoSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn status_url(&self, identifier: &str) -> Result<Url> {
        let mut url = Url::parse(&self.settings.orders_api)?;
        url.path_segments_mut()
            .map_err(|_| DispatchError::ConfigError {
                message: format!(
                    "courier.orders_api cannot be a base URL: {}",
                    self.settings.orders_api
                ),
            })?
            .pop_if_empty()
            .push(identifier)
            .push("status");
        Ok(url)
    }
}

#[async_trait]
impl Courier for DodoClient {
    async fn fetch_token(&self) -> Result<CourierToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("scope", self.settings.scope.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ];

        tracing::debug!("Requesting DODO token from {}", self.settings.oauth_uri);
        let response = self
            .client
            .post(&self.settings.oauth_uri)
            .form(&params)
            .send()
            .await?;
        let response = DispatchError::check_response("DODO OAuth", response).await?;
        Ok(response.json::<CourierToken>().await?)
    }

    async fn create_order(&self, order: &CourierOrder, token: &CourierToken) -> Result<()> {
        let payload = OrderPayload {
            identifier: &order.identifier,
            pickup: PickupPayload {
                branch_identifier: &order.branch_identifier,
                required_start: iso(order.pickup.start),
                required_end: iso(order.pickup.end),
                note: order.pickup_note.as_deref(),
            },
            drop: DropPayload {
                address_raw_value: &order.drop_address,
                required_start: iso(order.drop.start),
                required_end: iso(order.drop.end),
                note: order.drop_note.as_deref(),
            },
            customer_name: &order.customer_name,
            customer_phone: &order.customer_phone,
            price: 0,
        };

        let response = self
            .client
            .post(&self.settings.orders_api)
            .bearer_auth(&token.access_token)
            .json(&payload)
            .send()
            .await?;
        DispatchError::check_response(SERVICE, response).await?;
        tracing::debug!("DODO accepted order {}", order.identifier);
        Ok(())
    }

    async fn cancel_order(
        &self,
        identifier: &str,
        reason: &str,
        changed_at: DateTime<Utc>,
        token: &CourierToken,
    ) -> Result<()> {
        let payload = StatusPayload {
            status: "Cancelled",
            reason,
            status_change_time: iso(changed_at),
        };

        let response = self
            .client
            .put(self.status_url(identifier)?)
            .bearer_auth(&token.access_token)
            .json(&payload)
            .send()
            .await?;
        DispatchError::check_response(SERVICE, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(orders_api: &str) -> DodoSettings {
        DodoSettings {
            oauth_uri: "https://login.example.com/token".to_string(),
            scope: "scope/.default".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            orders_api: orders_api.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_status_url_encodes_identifier() {
        let client =
            DodoClient::new(settings("https://api.example.com/integrations/v2/zj/orders")).unwrap();

        let url = client.status_url("donor-charita 1-6. 10. 2022").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/integrations/v2/zj/orders/donor-charita%201-6.%2010.%202022/status"
        );
    }

    #[test]
    fn test_status_url_tolerates_trailing_slash() {
        let client = DodoClient::new(settings("https://api.example.com/orders/")).unwrap();
        let url = client.status_url("abc-def-1.2.2024").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/orders/abc-def-1.2.2024/status");
    }
}
