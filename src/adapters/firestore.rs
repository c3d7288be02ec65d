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
use serde_json::{json, Map, Value};

const SERVICE: &str = "Firestore";
const PAGE_SIZE: &str = "300";

#[derive(Debug, Clone)]
pub struct FirestoreCollections {
    pub donors: String,
    pub charities: String,
    pub orders: String,
    pub offers: String,
}

impl Default for FirestoreCollections {
    fn default() -> Self {
        Self {
            donors: "canteens".to_string(),
            charities: "charities".to_string(),
            orders: "deliveries".to_string(),
            offers: "offeredFood".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    pub api_key: String,
    pub collections: FirestoreCollections,
}

/// Firestore accessed through its REST API with an API key.
pub struct FirestoreStore {
    client: Client,
    settings: FirestoreSettings,
}

#[derive(Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Document {
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct QueryItem {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderDoc {
    identifier: String,
    donor_id: String,
    recipient_id: String,
    pick_up_from: DateTime<Utc>,
    #[serde(default)]
    pick_up_to: Option<DateTime<Utc>>,
    state: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferDoc {
    #[serde(default)]
    packages_pickup: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DonorDoc {
    dodo_id: String,
    establishment_id: String,
    phone: String,
    pick_up_from: TimeOfDay,
    pick_up_within: TimeOfDay,
    deliver_from: TimeOfDay,
    deliver_within: TimeOfDay,
    responsible_person: String,
    city: String,
    street: String,
    house_number: String,
    postal_code: String,
    recipient_id: String,
    #[serde(default)]
    note_for_driver: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CharityDoc {
    #[serde(rename = "dodoID")]
    dodo_id: String,
    establishment_id: String,
    phone: String,
    responsible_person: String,
    city: String,
    street: String,
    house_number: String,
    postal_code: String,
    #[serde(default)]
    note_for_driver: Option<String>,
}

fn postal_address(street: &str, house_number: &str, postal_code: &str, city: &str) -> String {
    format!("{} {}, {} {}", street, house_number, postal_code, city)
}

fn state_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Čeká",
        OrderStatus::Confirmed => "Potvrzeno",
        OrderStatus::Canceled => "Storno",
    }
}

fn parse_state(record_id: &str, label: &str) -> Result<OrderStatus> {
    match label {
        "Čeká" => Ok(OrderStatus::Pending),
        "Potvrzeno" => Ok(OrderStatus::Confirmed),
        "Storno" => Ok(OrderStatus::Canceled),
        other => Err(DispatchError::SchemaError {
            record_id: record_id.to_string(),
            message: format!("unknown state '{}'", other),
        }),
    }
}

/// Firestore typed value (`{"stringValue": "..."}`) to plain JSON.
pub fn decode_value(value: &Value) -> Value {
    let Some(object) = value.as_object() else {
        return Value::Null;
    };

    if let Some(text) = object.get("integerValue") {
        // 整數以字串傳輸
        return text
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| text.clone());
    }
    if let Some(array) = object.get("arrayValue") {
        let values = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    if let Some(map) = object.get("mapValue") {
        return map
            .get("fields")
            .and_then(Value::as_object)
            .map(decode_fields)
            .unwrap_or_else(|| Value::Object(Map::new()));
    }

    for key in [
        "stringValue",
        "booleanValue",
        "doubleValue",
        "timestampValue",
        "referenceValue",
    ] {
        if let Some(inner) = object.get(key) {
            return inner.clone();
        }
    }
    Value::Null
}

pub fn decode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), decode_value(value)))
            .collect(),
    )
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn timestamp_value(instant: DateTime<Utc>) -> Value {
    json!({ "timestampValue": instant.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

fn field_filter(path: &str, op: &str, value: Value) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": path },
            "op": op,
            "value": value
        }
    })
}

fn parse_document<T: DeserializeOwned>(document: &Document) -> Result<T> {
    serde_json::from_value(decode_fields(&document.fields)).map_err(|e| {
        DispatchError::SchemaError {
            record_id: document.id().to_string(),
            message: e.to_string(),
        }
    })
}

fn to_order(document: &Document) -> Result<Order> {
    let doc: OrderDoc = parse_document(document)?;
    Ok(Order {
        id: document.id().to_string(),
        status: parse_state(document.id(), &doc.state)?,
        identifier: doc.identifier,
        donor_id: doc.donor_id,
        recipient_id: doc.recipient_id,
        pickup_from: doc.pick_up_from,
        pickup_to: doc.pick_up_to,
    })
}

fn to_donor(document: &Document) -> Result<Donor> {
    let doc: DonorDoc = parse_document(document)?;
    Ok(Donor {
        address: Some(postal_address(
            &doc.street,
            &doc.house_number,
            &doc.postal_code,
            &doc.city,
        )),
        id: doc.establishment_id,
        external_id: doc.dodo_id,
        responsible_person: doc.responsible_person,
        phone: doc.phone,
        pickup_from: doc.pick_up_from,
        pickup_to: doc.pick_up_within,
        deliver_from: doc.deliver_from,
        deliver_to: doc.deliver_within,
        recipient_ids: vec![doc.recipient_id],
        note: doc.note_for_driver,
    })
}

fn to_charity(document: &Document) -> Result<Charity> {
    let doc: CharityDoc = parse_document(document)?;
    Ok(Charity {
        address: postal_address(&doc.street, &doc.house_number, &doc.postal_code, &doc.city),
        id: doc.establishment_id,
        external_id: doc.dodo_id,
        responsible_person: doc.responsible_person,
        phone: doc.phone,
        note: doc.note_for_driver,
    })
}

impl FirestoreStore {
    pub fn new(settings: FirestoreSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: FirestoreSettings) -> Self {
        Self { client, settings }
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.project_id,
            self.settings.database
        )
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let url = format!("{}/{}", self.documents_root(), collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[
                ("key", self.settings.api_key.as_str()),
                ("pageSize", PAGE_SIZE),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = DispatchError::check_response(SERVICE, request.send().await?).await?;
            let page: ListPage = response.json().await?;
            documents.extend(page.documents);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn run_query(&self, collection: &str, filters: Vec<Value>) -> Result<Vec<Document>> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "compositeFilter": { "op": "AND", "filters": filters }
                }
            }
        });

        let response = self
            .client
            .post(format!("{}:runQuery", self.documents_root()))
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let response = DispatchError::check_response(SERVICE, response).await?;
        let items: Vec<QueryItem> = response.json().await?;
        Ok(items.into_iter().filter_map(|item| item.document).collect())
    }

    async fn find_by_establishment(&self, collection: &str, id: &str) -> Result<Document> {
        let mut documents = self
            .run_query(
                collection,
                vec![field_filter("establishmentId", "EQUAL", string_value(id))],
            )
            .await?;

        if documents.is_empty() {
            return Err(DispatchError::NotFoundError {
                record_id: id.to_string(),
                collection: collection.to_string(),
            });
        }
        Ok(documents.swap_remove(0))
    }
}

#[async_trait]
impl OrderStore for FirestoreStore {
    fn orders_location(&self) -> &str {
        &self.settings.collections.orders
    }

    async fn list_pending_orders_due_today(
        &self,
        today: &LocalDay,
    ) -> Result<Vec<Result<Order>>> {
        let documents = self
            .run_query(
                &self.settings.collections.orders,
                vec![
                    field_filter("state", "EQUAL", string_value(state_label(OrderStatus::Pending))),
                    field_filter("deliverFrom", "GREATER_THAN", timestamp_value(today.now)),
                    field_filter("deliverFrom", "LESS_THAN", timestamp_value(today.end)),
                ],
            )
            .await?;
        Ok(documents.iter().map(to_order).collect())
    }

    async fn list_confirmations_for_donor_today(
        &self,
        donor_id: &str,
        today: &LocalDay,
    ) -> Result<Vec<Confirmation>> {
        let documents = self
            .run_query(
                &self.settings.collections.offers,
                vec![
                    field_filter("donorId", "EQUAL", string_value(donor_id)),
                    field_filter("date", "GREATER_THAN_OR_EQUAL", timestamp_value(today.start)),
                    field_filter("date", "LESS_THAN", timestamp_value(today.end)),
                ],
            )
            .await?;

        documents
            .iter()
            .map(|document| {
                let offer: OfferDoc = parse_document(document)?;
                Ok(Confirmation {
                    id: document.id().to_string(),
                    package_pickup: offer.packages_pickup.unwrap_or(false),
                })
            })
            .collect()
    }

    async fn list_donors(&self) -> Result<Vec<Result<Donor>>> {
        let documents = self.list_documents(&self.settings.collections.donors).await?;
        Ok(documents.iter().map(to_donor).collect())
    }

    async fn list_charities(&self) -> Result<Vec<Result<Charity>>> {
        let documents = self
            .list_documents(&self.settings.collections.charities)
            .await?;
        Ok(documents.iter().map(to_charity).collect())
    }

    async fn get_donor(&self, donor_id: &str) -> Result<Donor> {
        let document = self
            .find_by_establishment(&self.settings.collections.donors, donor_id)
            .await?;
        to_donor(&document)
    }

    async fn get_charity(&self, charity_id: &str) -> Result<Charity> {
        let document = self
            .find_by_establishment(&self.settings.collections.charities, charity_id)
            .await?;
        to_charity(&document)
    }

    async fn set_order_status(&self, order: &Order, status: OrderStatus) -> Result<()> {
        let url = format!(
            "{}/{}/{}",
            self.documents_root(),
            self.settings.collections.orders,
            order.id
        );
        let body = json!({ "fields": { "state": string_value(state_label(status)) } });

        let response = self
            .client
            .patch(url)
            .query(&[
                ("key", self.settings.api_key.as_str()),
                ("updateMask.fieldPaths", "state"),
            ])
            .json(&body)
            .send()
            .await?;
        DispatchError::check_response(SERVICE, response).await?;
        Ok(())
    }

    async fn create_order(&self, order: &NewOrder) -> Result<()> {
        let courier = &order.courier;
        let kind = match order.kind {
            OrderKind::Food => "jídlo",
            OrderKind::Packages => "krabičky",
        };
        let body = json!({
            "fields": {
                "identifier": string_value(&courier.identifier),
                "donorId": string_value(&order.donor_id),
                "recipientId": string_value(&order.recipient_id),
                "pickUpFrom": timestamp_value(courier.pickup.start),
                "pickUpTo": timestamp_value(courier.pickup.end),
                "deliverFrom": timestamp_value(courier.drop.start),
                "deliverTo": timestamp_value(courier.drop.end),
                "state": string_value(state_label(OrderStatus::Pending)),
                "type": string_value(kind),
            }
        });

        // 文件 id 即訂單識別碼，重複建立會被 Firestore 拒絕
        let response = self
            .client
            .post(format!(
                "{}/{}",
                self.documents_root(),
                self.settings.collections.orders
            ))
            .query(&[
                ("key", self.settings.api_key.as_str()),
                ("documentId", courier.identifier.as_str()),
            ])
            .json(&body)
            .send()
            .await?;
        DispatchError::check_response(SERVICE, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_typed_values() {
        let fields = json!({
            "identifier": { "stringValue": "a-b-1.2.2024" },
            "count": { "integerValue": "42" },
            "active": { "booleanValue": true },
            "when": { "timestampValue": "2024-02-01T12:30:00Z" },
            "tags": { "arrayValue": { "values": [ { "stringValue": "x" } ] } },
            "empty": { "arrayValue": {} },
            "nested": { "mapValue": { "fields": { "n": { "nullValue": null } } } }
        });

        let decoded = decode_fields(fields.as_object().unwrap());
        assert_eq!(
            decoded,
            json!({
                "identifier": "a-b-1.2.2024",
                "count": 42,
                "active": true,
                "when": "2024-02-01T12:30:00Z",
                "tags": ["x"],
                "empty": [],
                "nested": { "n": null }
            })
        );
    }

    #[test]
    fn test_donor_document_mapping() {
        let document: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/canteens/abc123",
            "fields": {
                "dodoId": { "stringValue": "zj-ad-zizkov" },
                "establishmentId": { "stringValue": "primirest-tanvald" },
                "establishmentName": { "stringValue": "Rodinné centrum Maják" },
                "phone": { "stringValue": "+420123999888" },
                "pickUpFrom": { "stringValue": "16:30" },
                "pickUpWithin": { "stringValue": "17:00" },
                "deliverFrom": { "stringValue": "17:30" },
                "deliverWithin": { "stringValue": "18:00" },
                "responsiblePerson": { "stringValue": "Anna Strejcová" },
                "city": { "stringValue": "Praha" },
                "street": { "stringValue": "Spojená" },
                "houseNumber": { "stringValue": "866/63" },
                "postalCode": { "stringValue": "130 00" },
                "recipientId": { "stringValue": "zj-cck-beroun" }
            }
        }))
        .unwrap();

        assert_eq!(document.id(), "abc123");
        let donor = to_donor(&document).unwrap();
        assert_eq!(donor.id, "primirest-tanvald");
        assert_eq!(donor.external_id, "zj-ad-zizkov");
        assert_eq!(donor.address.as_deref(), Some("Spojená 866/63, 130 00 Praha"));
        assert_eq!(donor.pickup_from, TimeOfDay::from_hm(16, 30));
        assert_eq!(donor.recipient_ids, vec!["zj-cck-beroun".to_string()]);
    }
}
