use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// PEM-encoded RSA private key used to decrypt bank response envelopes.
    pub decryption_key_pem: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub bank_scope: String,
    pub kar_url: String,
    pub units_registry_url: String,
    pub endpoints_url: String,
    pub endpoint_cache_ttl_minutes: u64,
    /// Org numbers of banks with a working implementation, used when the
    /// customer registry is skipped.
    pub implemented_banks: Vec<String>,
    /// Org numbers of banks whose upstreams corrupt concurrent requests;
    /// account calls against these run strictly sequentially.
    pub serial_banks: Vec<String>,
    /// Skip the customer-relation registry and query all implemented banks.
    pub skip_customer_registry: bool,
    pub maskinporten_env: String,
    /// Use the test endpoint column of the catalogue instead of production.
    pub use_test_endpoints: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            decryption_key_pem: match std::env::var("DECRYPTION_KEY_PATH") {
                Ok(path) => std::fs::read_to_string(&path).map_err(|e| {
                    anyhow::anyhow!("Failed to read DECRYPTION_KEY_PATH {}: {}", path, e)
                })?,
                Err(_) => std::env::var("DECRYPTION_KEY").map_err(|_| {
                    anyhow::anyhow!(
                        "DECRYPTION_KEY or DECRYPTION_KEY_PATH environment variable required"
                    )
                })?,
            },
            token_endpoint: std::env::var("TOKEN_ENDPOINT")
                .map_err(|_| anyhow::anyhow!("TOKEN_ENDPOINT environment variable required"))
                .and_then(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("TOKEN_ENDPOINT must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            client_id: std::env::var("CLIENT_ID")
                .map_err(|_| anyhow::anyhow!("CLIENT_ID environment variable required"))
                .and_then(|id| {
                    if id.trim().is_empty() {
                        anyhow::bail!("CLIENT_ID cannot be empty");
                    }
                    Ok(id)
                })?,
            bank_scope: std::env::var("BANK_SCOPE")
                .unwrap_or_else(|_| "bits:kontoinformasjon.oed".to_string()),
            kar_url: std::env::var("KAR_URL")
                .map_err(|_| anyhow::anyhow!("KAR_URL environment variable required"))
                .and_then(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("KAR_URL must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            units_registry_url: std::env::var("UNITS_REGISTRY_URL").unwrap_or_else(|_| {
                "https://data.brreg.no/enhetsregisteret/api/enheter".to_string()
            }),
            endpoints_url: std::env::var("ENDPOINTS_URL")
                .map_err(|_| anyhow::anyhow!("ENDPOINTS_URL environment variable required"))
                .and_then(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("ENDPOINTS_URL must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            endpoint_cache_ttl_minutes: std::env::var("ENDPOINT_CACHE_TTL_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ENDPOINT_CACHE_TTL_MINUTES must be a number"))?,
            implemented_banks: std::env::var("IMPLEMENTED_BANKS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            serial_banks: std::env::var("SERIAL_BANKS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            skip_customer_registry: std::env::var("SKIP_CUSTOMER_REGISTRY")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            maskinporten_env: std::env::var("MASKINPORTEN_ENV")
                .unwrap_or_else(|_| "prod".to_string()),
            use_test_endpoints: std::env::var("USE_TEST_ENDPOINTS")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Token endpoint: {}", config.token_endpoint);
        tracing::debug!("KAR URL: {}", config.kar_url);
        tracing::debug!("Endpoints URL: {}", config.endpoints_url);
        tracing::debug!(
            "Endpoint cache TTL: {} minutes",
            config.endpoint_cache_ttl_minutes
        );
        tracing::debug!("Implemented banks: {}", config.implemented_banks.len());
        if !config.serial_banks.is_empty() {
            tracing::info!(
                "Sequential account processing forced for {} bank(s)",
                config.serial_banks.len()
            );
        }
        if config.skip_customer_registry {
            tracing::warn!("Customer registry lookups are DISABLED (test mode)");
        }
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }
}
