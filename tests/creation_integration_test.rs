use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use httpmock::prelude::*;
use rescue_dispatch::adapters::airtable::{AirtableSettings, AirtableStore, AirtableTables};
use rescue_dispatch::adapters::dodo::{DodoClient, DodoSettings};
use rescue_dispatch::core::creation::{CreationSettings, OrderCreationJob};
use rescue_dispatch::domain::policy::IdentifierOrder;
use rescue_dispatch::DispatchError;
use serde_json::{json, Value};
use std::sync::Arc;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap()
}

fn job(server: &MockServer, settings: CreationSettings) -> OrderCreationJob<Utc> {
    let store = AirtableStore::new(AirtableSettings {
        base_url: server.url("/v0/appTest"),
        api_key: "airtable-key".to_string(),
        view: "Grid view".to_string(),
        tables: AirtableTables {
            donors: "Donors".to_string(),
            charities: "Charities".to_string(),
            orders: "Orders".to_string(),
            offers: "Offers".to_string(),
        },
    });
    let courier = DodoClient::new(DodoSettings {
        oauth_uri: server.url("/oauth/token"),
        scope: "dodo/.default".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        orders_api: server.url("/api/orders"),
        timeout: std::time::Duration::from_secs(5),
    })
    .unwrap();

    OrderCreationJob::with_timezone(Arc::new(store), Arc::new(courier), settings, Utc)
}

fn donor_record(id: &str, external_id: &str, recipients: &[&str]) -> Value {
    json!({
        "id": id,
        "fields": {
            "ID": external_id,
            "Telefonní číslo": "+420111222333",
            "Vyzvednout od": 50400,
            "Vyzvednout do": 52200,
            "Doručit od": 54000,
            "Doručit do": 55800,
            "Odpovědná osoba": "Anna Strejcová",
            "Příjemce": recipients,
            "Poznámka pro řidiče": "Vchod ze dvora"
        }
    })
}

fn mock_directory(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/v0/appTest/Donors");
        then.status(200).json_body(json!({
            "records": [
                donor_record("recDonorOne", "Donor One", &["recCharity1", "recMissing"]),
                { "id": "recBroken", "fields": { "ID": "broken" } }
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v0/appTest/Charities");
        then.status(200).json_body(json!({
            "records": [
                {
                    "id": "recCharity1",
                    "fields": {
                        "ID": "charita1",
                        "Telefonní číslo": "+420999888777",
                        "Odpovědná osoba": "Jan Novák",
                        "Adresa": "Husova 10, Beroun",
                        "Poznámka pro řidiče": "Zazvoňte u zadního vchodu"
                    }
                }
            ]
        }));
    });
}

fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200).json_body(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "dodo-token"
        }));
    })
}

/// 每個捐贈者與受贈者組合各自成功或失敗
#[tokio::test]
async fn test_creation_isolates_failing_pairings() -> Result<()> {
    let server = MockServer::start();
    mock_directory(&server);
    let token = mock_token(&server);

    let courier_order = server.mock(|when, then| {
        when.method(POST)
            .path("/api/orders")
            .header("authorization", "Bearer dodo-token")
            .json_body_partial(
                r#"{
                    "Identifier": "donorone-charita1-22.1.2024",
                    "Pickup": {
                        "BranchIdentifier": "Donor One",
                        "RequiredStart": "2024-01-22T14:00:00.000Z",
                        "RequiredEnd": "2024-01-22T14:30:00.000Z",
                        "Note": "Vchod ze dvora"
                    },
                    "Drop": {
                        "AddressRawValue": "Husova 10, Beroun",
                        "RequiredStart": "2024-01-22T15:00:00.000Z",
                        "RequiredEnd": "2024-01-22T15:30:00.000Z",
                        "Note": "Zazvoňte u zadního vchodu"
                    },
                    "CustomerName": "Jan Novák",
                    "CustomerPhone": "+420999888777",
                    "Price": 0
                }"#,
            );
        then.status(201);
    });
    let stored = server.mock(|when, then| {
        when.method(POST)
            .path("/v0/appTest/Orders")
            .body_contains("donorone-charita1-22.1.2024")
            .body_contains("recDonorOne")
            .body_contains("čeká");
        then.status(200).json_body(json!({ "records": [] }));
    });

    let report = job(&server, CreationSettings::default())
        .run_at(now())
        .await?;

    token.assert_hits(1);
    courier_order.assert_hits(1);
    stored.assert_hits(1);

    assert_eq!(report.donors, 2);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 2);
    assert!(report.ensure_any_created().is_ok());

    Ok(())
}

#[tokio::test]
async fn test_charity_first_identifier() -> Result<()> {
    let server = MockServer::start();
    mock_directory(&server);
    mock_token(&server);

    let courier_order = server.mock(|when, then| {
        when.method(POST)
            .path("/api/orders")
            .json_body_partial(r#"{ "Identifier": "charita1-donorone-18.1.2024" }"#);
        then.status(201);
    });
    server.mock(|when, then| {
        when.method(POST).path("/v0/appTest/Orders");
        then.status(200).json_body(json!({ "records": [] }));
    });

    let settings = CreationSettings {
        days_ahead: 3,
        identifier_order: IdentifierOrder::CharityFirst,
        dry_run: false,
    };
    let report = job(&server, settings).run_at(now()).await?;

    courier_order.assert_hits(1);
    assert_eq!(report.created, 1);

    Ok(())
}

#[tokio::test]
async fn test_rejected_orders_are_not_stored() -> Result<()> {
    let server = MockServer::start();
    mock_directory(&server);
    mock_token(&server);

    server.mock(|when, then| {
        when.method(POST).path("/api/orders");
        then.status(400).body(r#"{"error":"Identifier already exists"}"#);
    });
    let stored = server.mock(|when, then| {
        when.method(POST).path("/v0/appTest/Orders");
        then.status(200);
    });

    let report = job(&server, CreationSettings::default())
        .run_at(now())
        .await?;

    stored.assert_hits(0);
    assert_eq!(report.created, 0);
    let err = report.ensure_any_created().unwrap_err();
    assert_eq!(err.to_string(), "No orders have been handled");

    Ok(())
}

#[tokio::test]
async fn test_token_failure_aborts_creation() -> Result<()> {
    let server = MockServer::start();
    mock_directory(&server);

    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(401).body("invalid_client");
    });
    let courier_order = server.mock(|when, then| {
        when.method(POST).path("/api/orders");
        then.status(201);
    });

    let result = job(&server, CreationSettings::default())
        .run_at(now())
        .await;

    courier_order.assert_hits(0);
    match result {
        Err(DispatchError::ApiError { status, body, .. }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid_client");
        }
        other => panic!("expected API error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_dry_run_skips_token_and_writes() -> Result<()> {
    let server = MockServer::start();
    mock_directory(&server);
    let token = mock_token(&server);
    let courier_order = server.mock(|when, then| {
        when.method(POST).path("/api/orders");
        then.status(201);
    });

    let settings = CreationSettings {
        dry_run: true,
        ..CreationSettings::default()
    };
    let report = job(&server, settings).run_at(now()).await?;

    token.assert_hits(0);
    courier_order.assert_hits(0);
    assert_eq!(report.created, 1);

    Ok(())
}
