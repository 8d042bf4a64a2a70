use crate::errors::AppError;
use crate::models::mask_subject;
use crate::token_provider::TokenProvider;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

const REGISTRY_REQUEST_TIMEOUT_SECS: u64 = 30;
const REGISTRY_SCOPE: &str = "bits:kundeforhold";

/// One customer relation as reported by the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRelation {
    #[serde(rename = "organizationID")]
    pub organization_id: String,
    #[serde(rename = "bankName")]
    pub bank_name: String,
    #[serde(rename = "activeAccount", default)]
    pub active_account: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RegistryResponse {
    #[serde(default)]
    banks: Vec<CustomerRelation>,
}

/// Unit as returned by the public units registry, used to resolve bank
/// names for pre-configured org numbers when the customer registry is
/// skipped.
#[derive(Debug, Deserialize)]
struct RegisteredUnit {
    #[serde(rename = "organisasjonsNummer")]
    organization_number: String,
    #[serde(rename = "navn")]
    name: String,
}

/// Customer-relation registry resolver: which banks does this subject have
/// a relationship with?
#[derive(Clone)]
pub struct CustomerRegistry {
    client: reqwest::Client,
    token_provider: TokenProvider,
    kar_url: String,
    units_registry_url: String,
    implemented_banks: Vec<String>,
    maskinporten_env: String,
    /// Skip-mode bank set, resolved once and reused for the process lifetime.
    implemented_cache: Arc<OnceCell<Vec<CustomerRelation>>>,
}

impl CustomerRegistry {
    pub fn new(
        client: reqwest::Client,
        token_provider: TokenProvider,
        kar_url: String,
        units_registry_url: String,
        implemented_banks: Vec<String>,
        maskinporten_env: String,
    ) -> Self {
        Self {
            client,
            token_provider,
            kar_url,
            units_registry_url,
            implemented_banks,
            maskinporten_env,
            implemented_cache: Arc::new(OnceCell::new()),
        }
    }

    /// Resolves the banks to query for a subject.
    ///
    /// With `skip` set (test mode) the registry is bypassed and the fixed,
    /// pre-validated set of implemented banks is returned instead.
    pub async fn banks_for_customer(
        &self,
        subject: &str,
        as_of: NaiveDate,
        reference_id: Uuid,
        skip: bool,
    ) -> Result<Vec<CustomerRelation>, AppError> {
        if skip {
            tracing::info!(
                reference_id = %reference_id,
                "Skipping customer registry, using implemented banks"
            );
            return self.implemented_banks().await;
        }

        let correlation_id = Uuid::new_v4();
        let token = self
            .token_provider
            .get_token(&self.maskinporten_env, REGISTRY_SCOPE, "")
            .await
            .map_err(|e| AppError::Registry(format!("Registry token failed: {}", e)))?;

        let date = as_of.format("%Y-%m-%d").to_string();
        let url = format!("{}/customerrelations/{}", self.kar_url, subject);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(Duration::from_secs(REGISTRY_REQUEST_TIMEOUT_SECS))
            .query(&[("fromDate", date.as_str()), ("toDate", date.as_str())])
            .header("AccountInfoRequestId", reference_id.to_string())
            .header("CorrelationId", correlation_id.to_string())
            .send()
            .await
            .map_err(|e| AppError::Registry(format!("Registry request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Registry(format!(
                "Registry returned {} for subject {} (reference id {}, correlation id {})",
                response.status(),
                mask_subject(subject),
                reference_id,
                correlation_id
            )));
        }

        let result: RegistryResponse = response
            .json()
            .await
            .map_err(|e| AppError::Registry(format!("Failed to parse registry response: {}", e)))?;

        tracing::info!(
            subject = mask_subject(subject),
            banks = result.banks.len(),
            reference_id = %reference_id,
            correlation_id = %correlation_id,
            "Retrieved customer relations"
        );

        Ok(result.banks)
    }

    /// The fixed set of implemented banks, looked up by org number against
    /// the public units registry and cached for the process lifetime.
    async fn implemented_banks(&self) -> Result<Vec<CustomerRelation>, AppError> {
        let relations = self
            .implemented_cache
            .get_or_try_init(|| self.resolve_implemented_banks())
            .await?;
        Ok(relations.clone())
    }

    async fn resolve_implemented_banks(&self) -> Result<Vec<CustomerRelation>, AppError> {
        let mut handles = Vec::with_capacity(self.implemented_banks.len());
        for org_no in &self.implemented_banks {
            let client = self.client.clone();
            let url = format!("{}/{}", self.units_registry_url, org_no);
            handles.push(tokio::spawn(async move {
                let unit: RegisteredUnit = client
                    .get(&url)
                    .timeout(Duration::from_secs(REGISTRY_REQUEST_TIMEOUT_SECS))
                    .send()
                    .await
                    .map_err(|e| AppError::Registry(format!("Units registry request failed: {}", e)))?
                    .json()
                    .await
                    .map_err(|e| {
                        AppError::Registry(format!("Failed to parse units registry response: {}", e))
                    })?;
                Ok::<CustomerRelation, AppError>(CustomerRelation {
                    organization_id: unit.organization_number,
                    bank_name: unit.name,
                    active_account: true,
                })
            }));
        }

        let mut relations = Vec::with_capacity(handles.len());
        for handle in handles {
            let relation = handle
                .await
                .map_err(|e| AppError::InternalError(format!("Units registry task failed: {}", e)))??;
            relations.push(relation);
        }

        tracing::info!(banks = relations.len(), "Resolved implemented banks");
        Ok(relations)
    }
}
