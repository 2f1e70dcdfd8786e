use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::ClientConfig;
use crate::session::SessionStore;

fn gateway_for(server: &MockServer, user_id: Option<i64>) -> Gateway {
    let session = SessionStore::in_memory();
    session.set_session("tok", user_id).unwrap();
    Gateway::new(&ClientConfig::new(&server.uri()), Arc::new(session)).unwrap()
}

fn sample_input() -> PropertyInput {
    PropertyInput {
        property_type: Some(PropertyType::Commercial),
        features: vec!["parking".into(), "lift".into()],
        price: Some(250_000.0),
        taxes: None,
        income: Some(1200.5),
        expenditure: None,
    }
}

// =============================================================================
// PropertyType
// =============================================================================

#[test]
fn property_type_parses_and_displays() {
    for t in PropertyType::ALL {
        assert_eq!(t.as_str().parse::<PropertyType>().unwrap(), t);
        assert_eq!(t.to_string(), t.as_str());
    }
    assert_eq!(PropertyType::Land.label(), "Land");
    assert_eq!("Villa".parse::<PropertyType>().unwrap_err(), UnknownPropertyType("Villa".into()));
}

// =============================================================================
// Property decoding
// =============================================================================

#[test]
fn property_decodes_lenient_fields() {
    let property: Property = serde_json::from_value(json!({
        "id": 4,
        "property_type": "residential",
        "features": "pool, garage,,",
        "price": "1500.25",
        "taxes": 12,
        "income": "n/a",
        "expenditure": null,
        "user_id": "9",
        "created_at": "2024-01-01"
    }))
    .unwrap();

    assert_eq!(property.id, 4);
    assert_eq!(property.property_type.as_deref(), Some("residential"));
    assert_eq!(property.features, vec!["pool", "garage"]);
    assert_eq!(property.price, Some(1500.25));
    assert_eq!(property.taxes, Some(12.0));
    assert_eq!(property.income, None);
    assert_eq!(property.expenditure, None);
    assert_eq!(property.user_id, Some(9));
}

#[test]
fn property_features_array_drops_non_strings() {
    let property: Property = serde_json::from_value(json!({ "id": 1, "features": ["pool", 3, " ", "garden"] })).unwrap();
    assert_eq!(property.features, vec!["pool", "garden"]);
}

#[test]
fn property_minimal_record() {
    let property: Property = serde_json::from_value(json!({ "id": 1 })).unwrap();
    assert_eq!(property, Property { id: 1, ..Property::default() });
}

#[test]
fn input_serializes_explicit_nulls() {
    let value = serde_json::to_value(PropertyInput::default()).unwrap();
    assert_eq!(
        value,
        json!({
            "property_type": null,
            "features": [],
            "price": null,
            "taxes": null,
            "income": null,
            "expenditure": null
        })
    );
}

// =============================================================================
// list / get
// =============================================================================

#[tokio::test]
async fn list_accepts_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/properties"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }, { "id": 2 }])))
        .mount(&server)
        .await;

    let ids: Vec<i64> = list(&gateway_for(&server, None)).await.unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn list_accepts_data_envelope_and_skips_bad_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/properties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "id": 3 }, { "name": "no id" }] })))
        .mount(&server)
        .await;

    let properties = list(&gateway_for(&server, None)).await.unwrap();
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0].id, 3);
}

#[tokio::test]
async fn list_other_shapes_are_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/properties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": 1 } })))
        .mount(&server)
        .await;

    assert!(list(&gateway_for(&server, None)).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_unwraps_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/properties/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": 7, "price": 10 } })))
        .mount(&server)
        .await;

    let property = get(&gateway_for(&server, None), 7).await.unwrap();
    assert_eq!(property.id, 7);
    assert_eq!(property.price, Some(10.0));
}

#[tokio::test]
async fn get_missing_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/properties/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not found" })))
        .mount(&server)
        .await;

    let err = get(&gateway_for(&server, None), 99).await.unwrap_err();
    assert_eq!(err.api().unwrap().status, 404);
}

// =============================================================================
// create / update / delete
// =============================================================================

#[tokio::test]
async fn create_adds_user_id_when_known() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/properties"))
        .and(body_json(json!({
            "property_type": "commercial",
            "features": ["parking", "lift"],
            "price": 250_000.0,
            "taxes": null,
            "income": 1200.5,
            "expenditure": null,
            "user_id": 42
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": 10, "user_id": 42 } })))
        .expect(1)
        .mount(&server)
        .await;

    let property = create(&gateway_for(&server, Some(42)), &sample_input()).await.unwrap();
    assert_eq!(property.id, 10);
    assert_eq!(property.user_id, Some(42));
}

#[tokio::test]
async fn create_without_user_id_sends_input_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/properties"))
        .and(body_json(serde_json::to_value(sample_input()).unwrap()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 11 })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(create(&gateway_for(&server, None), &sample_input()).await.unwrap().id, 11);
}

#[tokio::test]
async fn update_puts_to_member_with_user_id() {
    let server = MockServer::start().await;
    let mut expected = serde_json::to_value(sample_input()).unwrap();
    expected["user_id"] = json!(5);
    Mock::given(method("PUT"))
        .and(path("/api/properties/3"))
        .and(body_json(expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 3, "price": "250000" })))
        .expect(1)
        .mount(&server)
        .await;

    let property = update(&gateway_for(&server, Some(5)), 3, &sample_input()).await.unwrap();
    assert_eq!(property.price, Some(250_000.0));
}

#[tokio::test]
async fn update_validation_errors_surface() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/properties/3"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Invalid",
            "errors": { "price": ["The price must be at least 0."] }
        })))
        .mount(&server)
        .await;

    let err = update(&gateway_for(&server, None), 3, &sample_input()).await.unwrap_err();
    assert_eq!(err.api().unwrap().field_error("price"), Some("The price must be at least 0."));
}

#[tokio::test]
async fn delete_ignores_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/properties/8"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    delete(&gateway_for(&server, None), 8).await.unwrap();
}
