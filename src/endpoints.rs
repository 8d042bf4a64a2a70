use crate::errors::AppError;
use crate::models::SUPPORTED_API_VERSION;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const CATALOGUE_CACHE_KEY: &str = "endpoints";
const CATALOGUE_REQUEST_TIMEOUT_SECS: u64 = 30;

/// One row of the hosted endpoint catalogue file.
#[derive(Debug, Deserialize)]
struct CatalogueRecord {
    org_no: String,
    name: String,
    #[allow(dead_code)]
    #[serde(default)]
    file_name: String,
    url_prod: String,
    #[serde(default)]
    url_test: String,
    #[serde(default)]
    version: String,
}

/// One bank endpoint as exposed to consumers and to the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInfo {
    pub org_no: String,
    pub name: String,
    pub url: String,
    pub version: String,
    pub env: String,
}

/// Listing shape served by the endpoints API.
#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointsList {
    pub endpoints: Vec<EndpointInfo>,
    pub total: usize,
}

/// Endpoint catalogue: maps a bank's org number to its base URL and API
/// version. The source is an externally hosted delimited-text file, parsed
/// and held in an in-memory cache with a TTL. Concurrent readers share one
/// coalesced refresh; nobody races on (re)populating the cache.
#[derive(Clone)]
pub struct EndpointCatalogue {
    client: reqwest::Client,
    catalogue_url: String,
    use_test_endpoints: bool,
    cache: Cache<String, Arc<Vec<EndpointInfo>>>,
}

impl EndpointCatalogue {
    pub fn new(
        client: reqwest::Client,
        catalogue_url: String,
        use_test_endpoints: bool,
        ttl_minutes: u64,
    ) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_minutes * 60))
            .max_capacity(1)
            .build();
        Self {
            client,
            catalogue_url,
            use_test_endpoints,
            cache,
        }
    }

    /// All catalogue endpoints, served from cache when fresh.
    pub async fn endpoints(&self) -> Result<Arc<Vec<EndpointInfo>>, AppError> {
        self.cache
            .try_get_with(CATALOGUE_CACHE_KEY.to_string(), self.fetch_catalogue())
            .await
            .map_err(|e: Arc<AppError>| e.as_ref().clone())
    }

    /// Re-reads the catalogue unconditionally and replaces the cached copy.
    pub async fn refresh(&self) -> Result<Arc<Vec<EndpointInfo>>, AppError> {
        let endpoints = self.fetch_catalogue().await?;
        self.cache
            .insert(CATALOGUE_CACHE_KEY.to_string(), endpoints.clone())
            .await;
        tracing::info!(total = endpoints.len(), "Endpoint cache refresh completed");
        Ok(endpoints)
    }

    /// Endpoints legally permitted for the aggregation flow: only the
    /// supported API version carries the ownership-restriction capability.
    pub async fn supported_endpoints(&self) -> Result<Vec<EndpointInfo>, AppError> {
        let endpoints = self.endpoints().await?;
        Ok(endpoints
            .iter()
            .filter(|e| e.version == SUPPORTED_API_VERSION)
            .cloned()
            .collect())
    }

    async fn fetch_catalogue(&self) -> Result<Arc<Vec<EndpointInfo>>, AppError> {
        let response = self
            .client
            .get(&self.catalogue_url)
            .timeout(Duration::from_secs(CATALOGUE_REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| AppError::Registry(format!("Catalogue request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Registry(format!(
                "Catalogue fetch returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Registry(format!("Failed reading catalogue body: {}", e)))?;

        let endpoints = parse_catalogue(&body, self.use_test_endpoints)?;
        if endpoints.is_empty() {
            tracing::error!("No endpoints found in the catalogue file");
        } else {
            tracing::info!(total = endpoints.len(), "Endpoints parsed from catalogue");
        }

        Ok(Arc::new(endpoints))
    }
}

/// Parses the delimited catalogue file. The first row is a header; rows
/// missing an org number or a usable URL are dropped.
fn parse_catalogue(content: &str, use_test_endpoints: bool) -> Result<Vec<EndpointInfo>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let env = if use_test_endpoints { "test" } else { "prod" };
    let mut endpoints = Vec::new();
    for record in reader.deserialize::<CatalogueRecord>() {
        let record =
            record.map_err(|e| AppError::Registry(format!("Catalogue parse failed: {}", e)))?;
        let url = if use_test_endpoints {
            record.url_test
        } else {
            record.url_prod
        };
        if record.org_no.is_empty() || url.is_empty() {
            continue;
        }
        endpoints.push(EndpointInfo {
            org_no: record.org_no,
            name: record.name,
            url,
            version: record.version,
            env: env.to_string(),
        });
    }

    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
org_no,name,file_name,url_prod,url_test,version
789,\"bank1\",bank1.json,https://bank1.example/dsop,https://test.bank1.example/dsop,V2
456,bank2,bank2.json,https://bank2.example/dsop,,V2
123,oldbank,old.json,https://old.example/dsop,https://test.old.example/dsop,V1
,missing,x.json,https://nowhere.example,,V2
";

    #[test]
    fn parses_prod_urls_and_drops_incomplete_rows() {
        let endpoints = parse_catalogue(SAMPLE, false).unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].org_no, "789");
        assert_eq!(endpoints[0].name, "bank1");
        assert_eq!(endpoints[0].url, "https://bank1.example/dsop");
        assert_eq!(endpoints[0].env, "prod");
    }

    #[test]
    fn test_mode_uses_test_urls() {
        let endpoints = parse_catalogue(SAMPLE, true).unwrap();
        // bank2 has no test URL and is dropped
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().all(|e| e.env == "test"));
        assert_eq!(endpoints[0].url, "https://test.bank1.example/dsop");
    }

    #[test]
    fn version_filter_keeps_only_supported() {
        let endpoints = parse_catalogue(SAMPLE, false).unwrap();
        let supported: Vec<_> = endpoints
            .into_iter()
            .filter(|e| e.version == SUPPORTED_API_VERSION)
            .collect();
        assert_eq!(supported.len(), 2);
        assert!(supported.iter().all(|e| e.version == "V2"));
    }
}
