/// Integration tests for the cached bank endpoint catalogue.
use bank_aggregator_api::endpoints::EndpointCatalogue;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOGUE: &str = "\
org_no,name,file_name,url_prod,url_test,version
789,bank1,bank1.json,https://bank1.example/dsop,https://test.bank1.example/dsop,V2
456,bank2,bank2.json,https://bank2.example/dsop,,V2
123,oldbank,old.json,https://old.example/dsop,,V1
";

fn catalogue(server: &MockServer, use_test_endpoints: bool) -> EndpointCatalogue {
    EndpointCatalogue::new(
        reqwest::Client::new(),
        format!("{}/catalogue.csv", server.uri()),
        use_test_endpoints,
        60,
    )
}

#[tokio::test]
async fn catalogue_is_fetched_once_and_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATALOGUE))
        .expect(1)
        .mount(&server)
        .await;

    let catalogue = catalogue(&server, false);
    let first = catalogue.endpoints().await.unwrap();
    let second = catalogue.endpoints().await.unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 3);
    assert_eq!(first[0].org_no, "789");
    assert_eq!(first[0].url, "https://bank1.example/dsop");
}

#[tokio::test]
async fn refresh_forces_a_second_read() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATALOGUE))
        .expect(2)
        .mount(&server)
        .await;

    let catalogue = catalogue(&server, false);
    catalogue.endpoints().await.unwrap();
    let refreshed = catalogue.refresh().await.unwrap();
    assert_eq!(refreshed.len(), 3);

    // The refreshed copy serves subsequent reads without another fetch.
    catalogue.endpoints().await.unwrap();
}

#[tokio::test]
async fn supported_endpoints_drop_older_api_versions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATALOGUE))
        .mount(&server)
        .await;

    let supported = catalogue(&server, false).supported_endpoints().await.unwrap();
    assert_eq!(supported.len(), 2);
    assert!(supported.iter().all(|e| e.version == "V2"));
    assert!(!supported.iter().any(|e| e.org_no == "123"));
}

#[tokio::test]
async fn test_mode_drops_banks_without_a_test_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATALOGUE))
        .mount(&server)
        .await;

    let endpoints = catalogue(&server, true).endpoints().await.unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].url, "https://test.bank1.example/dsop");
    assert_eq!(endpoints[0].env, "test");
}

#[tokio::test]
async fn catalogue_fetch_failure_is_a_registry_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue.csv"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = catalogue(&server, false).endpoints().await.unwrap_err();
    assert!(err.to_string().contains("503"));
}
