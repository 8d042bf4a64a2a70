//! Multi-bank aggregation: one concurrent unit of work per configured bank,
//! merged into a single response that distinguishes bank-level and
//! account-level failures from successful data.

use crate::bank_client::BankClient;
use crate::errors::AppError;
use crate::models::{mask_subject, AggregateResponse, BankConfig, BankResult};
use crate::token_provider::TokenProvider;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

/// Drives one [`BankClient`] per configured bank in parallel and merges all
/// bank results. Upstream-class failures are absorbed at bank granularity;
/// anything else propagates unmodified.
#[derive(Clone)]
pub struct Aggregator {
    http: reqwest::Client,
    token_provider: TokenProvider,
    decryption_key_pem: Arc<String>,
    bank_scope: String,
}

impl Aggregator {
    pub fn new(
        http: reqwest::Client,
        token_provider: TokenProvider,
        decryption_key_pem: Arc<String>,
        bank_scope: String,
    ) -> Self {
        Self {
            http,
            token_provider,
            decryption_key_pem,
            bank_scope,
        }
    }

    /// Aggregates account data for one subject across all configured banks.
    ///
    /// Every bank gets its own worker and its own audience-scoped token.
    /// The response carries exactly one [`BankResult`] per configured bank,
    /// in configuration order, except that with `skip_registry` set at most
    /// one legitimately-empty bank is kept (synthetic test fixtures would
    /// otherwise fill up with indistinguishable empty banks).
    #[allow(clippy::too_many_arguments)]
    pub async fn aggregate(
        &self,
        subject: &str,
        bank_configs: Vec<BankConfig>,
        from_date: NaiveDate,
        to_date: NaiveDate,
        include_transactions: bool,
        reference_id: Uuid,
        skip_registry: bool,
    ) -> Result<AggregateResponse, AppError> {
        let mut handles = Vec::with_capacity(bank_configs.len());
        for config in bank_configs {
            let aggregator = self.clone();
            let subject = subject.to_string();
            handles.push(tokio::spawn(async move {
                aggregator
                    .invoke_bank(
                        &subject,
                        config,
                        from_date,
                        to_date,
                        include_transactions,
                        reference_id,
                    )
                    .await
            }));
        }

        let mut bank_accounts = Vec::with_capacity(handles.len());
        let mut taken_one_empty_bank = false;
        for handle in handles {
            let bank = handle
                .await
                .map_err(|e| AppError::InternalError(format!("Bank task failed: {}", e)))??;

            // In test mode many banks legitimately return nothing; keep only
            // one of them to still prove the empty-bank path.
            if skip_registry && bank.accounts.is_empty() && !bank.has_errors {
                if taken_one_empty_bank {
                    continue;
                }
                taken_one_empty_bank = true;
            }

            bank_accounts.push(bank);
        }

        Ok(AggregateResponse { bank_accounts })
    }

    /// One bank's unit of work: acquire the audience token, run the fetch
    /// sequence, contain upstream-class failures as a bank-level error.
    async fn invoke_bank(
        &self,
        subject: &str,
        config: BankConfig,
        from_date: NaiveDate,
        to_date: NaiveDate,
        include_transactions: bool,
        reference_id: Uuid,
    ) -> Result<BankResult, AppError> {
        let bank_name = config.name.clone();
        let org_no = config.org_no.clone();

        let result = async {
            let token = self
                .token_provider
                .get_token(&config.maskinporten_env, &self.bank_scope, &config.audience)
                .await?;

            let client = BankClient::new(
                self.http.clone(),
                config,
                token,
                self.decryption_key_pem.clone(),
                reference_id,
                from_date,
                to_date,
                include_transactions,
            );
            client.fetch_bank(subject).await
        }
        .await;

        match result {
            Ok(bank) => Ok(bank),
            Err(e) if e.is_upstream() => {
                tracing::error!(
                    "Bank failed while processing bank {} ({}) for {}, error {}, reference id {}, correlation id {}",
                    bank_name,
                    org_no,
                    mask_subject(subject),
                    e,
                    reference_id,
                    e.correlation_id().unwrap_or("-")
                );
                Ok(BankResult::failed(bank_name))
            }
            // Unexpected errors are programming defects; never absorb them.
            Err(e) => Err(e),
        }
    }
}
