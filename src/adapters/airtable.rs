use crate::domain::model::{
    Charity, Confirmation, Donor, LocalDay, NewOrder, Order, OrderKind, OrderStatus, TimeOfDay,
};
use crate::domain::ports::OrderStore;
use crate::utils::error::{DispatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

const SERVICE: &str = "Airtable";

#[derive(Debug, Clone)]
pub struct AirtableTables {
    pub donors: String,
    pub charities: String,
    pub orders: String,
    pub offers: String,
}

impl Default for AirtableTables {
    fn default() -> Self {
        Self {
            donors: "Dárci".to_string(),
            charities: "Příjemci".to_string(),
            orders: "Rozvozy".to_string(),
            offers: "Nabídka".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AirtableSettings {
    /// Base URL including the base id, e.g. `https://api.airtable.com/v0/appXXXX`.
    pub base_url: String,
    pub api_key: String,
    pub view: String,
    pub tables: AirtableTables,
}

pub struct AirtableStore {
    client: Client,
    settings: AirtableSettings,
}

#[derive(Deserialize)]
struct Page {
    records: Vec<Value>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Deserialize)]
struct AirtableRecord<F> {
    id: String,
    fields: F,
}

#[derive(Deserialize)]
struct OrderFields {
    #[serde(rename = "Identifikátor")]
    identifier: String,
    #[serde(rename = "Dárce")]
    donor: Vec<String>,
    #[serde(rename = "Příjemce")]
    recipient: Vec<String>,
    #[serde(rename = "Vyzvednout od")]
    pickup_from: DateTime<Utc>,
    #[serde(rename = "Vyzvednout do", default)]
    pickup_to: Option<DateTime<Utc>>,
    #[serde(rename = "Status")]
    status: String,
}

#[derive(Deserialize)]
struct ConfirmationFields {
    #[serde(rename = "Svoz krabiček", default)]
    package_pickup: Option<bool>,
}

#[derive(Deserialize)]
struct DonorFields {
    #[serde(rename = "ID")]
    external_id: String,
    #[serde(rename = "Telefonní číslo")]
    phone: String,
    #[serde(rename = "Vyzvednout od")]
    pickup_from: TimeOfDay,
    #[serde(rename = "Vyzvednout do")]
    pickup_to: TimeOfDay,
    #[serde(rename = "Doručit od")]
    deliver_from: TimeOfDay,
    #[serde(rename = "Doručit do")]
    deliver_to: TimeOfDay,
    #[serde(rename = "Odpovědná osoba")]
    responsible_person: String,
    #[serde(rename = "Příjemce", default)]
    recipients: Vec<String>,
    #[serde(rename = "Adresa", default)]
    address: Option<String>,
    #[serde(rename = "Oblast", default)]
    area: Option<String>,
    #[serde(rename = "Poznámka pro řidiče", default)]
    note: Option<String>,
}

#[derive(Deserialize)]
struct CharityFields {
    #[serde(rename = "ID")]
    external_id: String,
    #[serde(rename = "Telefonní číslo")]
    phone: String,
    #[serde(rename = "Odpovědná osoba")]
    responsible_person: String,
    #[serde(rename = "Adresa")]
    address: String,
    #[serde(rename = "Poznámka pro řidiče", default)]
    note: Option<String>,
}

fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "čeká",
        OrderStatus::Confirmed => "potvrzeno",
        OrderStatus::Canceled => "storno",
    }
}

fn parse_status(record_id: &str, label: &str) -> Result<OrderStatus> {
    match label {
        "čeká" => Ok(OrderStatus::Pending),
        "potvrzeno" => Ok(OrderStatus::Confirmed),
        "storno" => Ok(OrderStatus::Canceled),
        other => Err(DispatchError::SchemaError {
            record_id: record_id.to_string(),
            message: format!("unknown status '{}'", other),
        }),
    }
}

fn parse_record<F: DeserializeOwned>(value: Value) -> Result<AirtableRecord<F>> {
    let record_id = value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    serde_json::from_value(value).map_err(|e| DispatchError::SchemaError {
        record_id,
        message: e.to_string(),
    })
}

fn first_link(record_id: &str, field: &str, links: Vec<String>) -> Result<String> {
    links
        .into_iter()
        .next()
        .ok_or_else(|| DispatchError::SchemaError {
            record_id: record_id.to_string(),
            message: format!("'{}' has no linked record", field),
        })
}

fn to_order(value: Value) -> Result<Order> {
    let record = parse_record::<OrderFields>(value)?;
    let fields = record.fields;
    Ok(Order {
        status: parse_status(&record.id, &fields.status)?,
        donor_id: first_link(&record.id, "Dárce", fields.donor)?,
        recipient_id: first_link(&record.id, "Příjemce", fields.recipient)?,
        identifier: fields.identifier,
        pickup_from: fields.pickup_from,
        pickup_to: fields.pickup_to,
        id: record.id,
    })
}

fn to_donor(value: Value) -> Result<Donor> {
    let record = parse_record::<DonorFields>(value)?;
    let fields = record.fields;
    // 地址加上區域，例如 "Spojená 22, Praha 3 Žižkov"
    let address = match (fields.address, fields.area) {
        (Some(address), Some(area)) if !area.trim().is_empty() => {
            Some(format!("{} {}", address, area))
        }
        (address, _) => address,
    };
    Ok(Donor {
        id: record.id,
        external_id: fields.external_id,
        responsible_person: fields.responsible_person,
        phone: fields.phone,
        address,
        pickup_from: fields.pickup_from,
        pickup_to: fields.pickup_to,
        deliver_from: fields.deliver_from,
        deliver_to: fields.deliver_to,
        recipient_ids: fields.recipients,
        note: fields.note,
    })
}

fn to_charity(value: Value) -> Result<Charity> {
    let record = parse_record::<CharityFields>(value)?;
    let fields = record.fields;
    Ok(Charity {
        id: record.id,
        external_id: fields.external_id,
        responsible_person: fields.responsible_person,
        phone: fields.phone,
        address: fields.address,
        note: fields.note,
    })
}

fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Airtable formula string literal.
fn formula_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl AirtableStore {
    pub fn new(settings: AirtableSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: AirtableSettings) -> Self {
        Self { client, settings }
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        let mut url = Url::parse(&self.settings.base_url)?;
        url.path_segments_mut()
            .map_err(|_| DispatchError::ConfigError {
                message: format!(
                    "store.airtable.base_url cannot be a base URL: {}",
                    self.settings.base_url
                ),
            })?
            .pop_if_empty()
            .push(table);
        Ok(url)
    }

    fn record_url(&self, table: &str, record_id: &str) -> Result<Url> {
        let mut url = self.table_url(table)?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(record_id);
        }
        Ok(url)
    }

    /// 讀取整個表格，依 `offset` 自動翻頁
    async fn list_records(&self, table: &str, formula: Option<&str>) -> Result<Vec<Value>> {
        let url = self.table_url(table)?;
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .bearer_auth(&self.settings.api_key)
                .query(&[("view", self.settings.view.as_str())]);
            if let Some(formula) = formula {
                request = request.query(&[("filterByFormula", formula)]);
            }
            if let Some(offset) = &offset {
                request = request.query(&[("offset", offset.as_str())]);
            }

            let response = DispatchError::check_response(SERVICE, request.send().await?).await?;
            let page: Page = response.json().await?;
            records.extend(page.records);

            match page.offset {
                Some(next) => {
                    tracing::debug!("More records found in \"{}\" with offset {}", table, next);
                    offset = Some(next);
                }
                None => break,
            }
        }

        Ok(records)
    }

    async fn get_record(&self, table: &str, record_id: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.record_url(table, record_id)?)
            .bearer_auth(&self.settings.api_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DispatchError::NotFoundError {
                record_id: record_id.to_string(),
                collection: table.to_string(),
            });
        }
        let response = DispatchError::check_response(SERVICE, response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl OrderStore for AirtableStore {
    fn orders_location(&self) -> &str {
        &self.settings.tables.orders
    }

    // Airtable 的 TODAY() 以 base 時區計算，不需要 today
    async fn list_pending_orders_due_today(
        &self,
        _today: &LocalDay,
    ) -> Result<Vec<Result<Order>>> {
        let formula = format!(
            "AND(IS_SAME({{Vyzvednout od}},TODAY(),\"day\"),{{Status}}={})",
            formula_string(status_label(OrderStatus::Pending))
        );
        let records = self
            .list_records(&self.settings.tables.orders, Some(&formula))
            .await?;
        Ok(records.into_iter().map(to_order).collect())
    }

    async fn list_confirmations_for_donor_today(
        &self,
        donor_id: &str,
        _today: &LocalDay,
    ) -> Result<Vec<Confirmation>> {
        let formula = format!(
            "AND({{DárceID}}={},IS_SAME({{Přidáno dne}},TODAY(),\"day\"))",
            formula_string(donor_id)
        );
        let records = self
            .list_records(&self.settings.tables.offers, Some(&formula))
            .await?;

        records
            .into_iter()
            .map(|value| {
                let record = parse_record::<ConfirmationFields>(value)?;
                Ok(Confirmation {
                    id: record.id,
                    package_pickup: record.fields.package_pickup.unwrap_or(false),
                })
            })
            .collect()
    }

    async fn list_donors(&self) -> Result<Vec<Result<Donor>>> {
        let records = self
            .list_records(&self.settings.tables.donors, None)
            .await?;
        Ok(records.into_iter().map(to_donor).collect())
    }

    async fn list_charities(&self) -> Result<Vec<Result<Charity>>> {
        let records = self
            .list_records(&self.settings.tables.charities, None)
            .await?;
        Ok(records.into_iter().map(to_charity).collect())
    }

    async fn get_donor(&self, donor_id: &str) -> Result<Donor> {
        let record = self
            .get_record(&self.settings.tables.donors, donor_id)
            .await?;
        to_donor(record)
    }

    async fn get_charity(&self, charity_id: &str) -> Result<Charity> {
        let record = self
            .get_record(&self.settings.tables.charities, charity_id)
            .await?;
        to_charity(record)
    }

    async fn set_order_status(&self, order: &Order, status: OrderStatus) -> Result<()> {
        let body = json!({
            "records": [
                {
                    "id": order.id,
                    "fields": { "Status": status_label(status) }
                }
            ]
        });

        let response = self
            .client
            .patch(self.table_url(&self.settings.tables.orders)?)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;
        DispatchError::check_response(SERVICE, response).await?;
        Ok(())
    }

    async fn create_order(&self, order: &NewOrder) -> Result<()> {
        let courier = &order.courier;
        let mut fields = json!({
            "Identifikátor": courier.identifier,
            "Dárce": [order.donor_id],
            "Příjemce": [order.recipient_id],
            "Vyzvednout od": iso(courier.pickup.start),
            "Vyzvednout do": iso(courier.pickup.end),
            "Doručit od": iso(courier.drop.start),
            "Doručit do": iso(courier.drop.end),
            "Status": status_label(OrderStatus::Pending),
        });
        // 一般訂單的表格沒有 Typ 欄位
        if order.kind == OrderKind::Packages {
            fields["Typ"] = json!("krabičky");
        }

        let response = self
            .client
            .post(self.table_url(&self.settings.tables.orders)?)
            .bearer_auth(&self.settings.api_key)
            .json(&json!({ "records": [ { "fields": fields } ] }))
            .send()
            .await?;
        DispatchError::check_response(SERVICE, response).await?;
        Ok(())
    }
}
