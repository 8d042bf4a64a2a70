/// Integration tests for the customer-relation registry resolver.
use bank_aggregator_api::customer_registry::CustomerRegistry;
use bank_aggregator_api::token_provider::TokenProvider;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "321" })))
        .mount(server)
        .await;
}

fn registry(
    server: &MockServer,
    token_server: &MockServer,
    implemented_banks: Vec<String>,
) -> CustomerRegistry {
    let http = reqwest::Client::new();
    let token_provider = TokenProvider::new(
        http.clone(),
        format!("{}/token", token_server.uri()),
        "54345".to_string(),
    );
    CustomerRegistry::new(
        http,
        token_provider,
        format!("{}/kar", server.uri()),
        format!("{}/enheter", server.uri()),
        implemented_banks,
        "test".to_string(),
    )
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
}

#[tokio::test]
async fn relations_are_looked_up_with_the_query_date() {
    let server = MockServer::start().await;
    let token_server = MockServer::start().await;
    mock_token_endpoint(&token_server).await;

    Mock::given(method("GET"))
        .and(path("/kar/customerrelations/12345678901"))
        .and(query_param("fromDate", "2024-04-01"))
        .and(query_param("toDate", "2024-04-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "banks": [
                { "organizationID": "789", "bankName": "bank1", "activeAccount": true },
                { "organizationID": "456", "bankName": "bank2", "activeAccount": false }
            ]
        })))
        .mount(&server)
        .await;

    let relations = registry(&server, &token_server, vec![])
        .banks_for_customer("12345678901", as_of(), Uuid::new_v4(), false)
        .await
        .unwrap();

    assert_eq!(relations.len(), 2);
    assert_eq!(relations[0].organization_id, "789");
    assert_eq!(relations[0].bank_name, "bank1");
    assert!(relations[0].active_account);
    assert!(!relations[1].active_account);
}

#[tokio::test]
async fn registry_failure_propagates_as_error() {
    let server = MockServer::start().await;
    let token_server = MockServer::start().await;
    mock_token_endpoint(&token_server).await;

    Mock::given(method("GET"))
        .and(path("/kar/customerrelations/12345678901"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = registry(&server, &token_server, vec![])
        .banks_for_customer("12345678901", as_of(), Uuid::new_v4(), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn skip_mode_resolves_implemented_banks_once() {
    let server = MockServer::start().await;
    let token_server = MockServer::start().await;

    // Each configured bank is resolved against the units registry exactly
    // once per process, however many requests come in.
    Mock::given(method("GET"))
        .and(path("/enheter/789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organisasjonsNummer": "789",
            "navn": "Bank One ASA"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/enheter/456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organisasjonsNummer": "456",
            "navn": "Bank Two ASA"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry(
        &server,
        &token_server,
        vec!["789".to_string(), "456".to_string()],
    );

    let first = registry
        .banks_for_customer("12345678901", as_of(), Uuid::new_v4(), true)
        .await
        .unwrap();
    let second = registry
        .banks_for_customer("98765432109", as_of(), Uuid::new_v4(), true)
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    let names: Vec<_> = first.iter().map(|r| r.bank_name.as_str()).collect();
    assert!(names.contains(&"Bank One ASA"));
    assert!(names.contains(&"Bank Two ASA"));
    assert!(first.iter().all(|r| r.active_account));
}
