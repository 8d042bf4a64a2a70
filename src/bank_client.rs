//! Single-bank fetch sequence: list accounts, per-account detail, per-account
//! transactions. Failures are isolated to the smallest possible unit — a
//! detail failure degrades one account, a transaction failure degrades one
//! account's transaction list, and only a list-accounts failure (or an
//! unexpected error) fails the whole bank.

use crate::decryption;
use crate::errors::AppError;
use crate::mapper;
use crate::models::{
    mask_subject, Accounts, AccountDetails, AccountSummary, BankConfig, BankResult,
    ConcurrencyMode, NormalizedAccount, Transactions, LEGAL_MANDATE,
};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const ACCOUNT_LIST_TIMEOUT_SECS: u64 = 30;
const ACCOUNT_DETAILS_TIMEOUT_SECS: u64 = 30;
const TRANSACTIONS_TIMEOUT_SECS: u64 = 30;

/// Sentinel account reference: the bank intentionally withheld this account.
fn is_data_not_delivered(reference: &str) -> bool {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\bdataNotDelivered\b").unwrap())
        .is_match(reference)
}

/// Client bound to one bank for the duration of one aggregation request.
#[derive(Clone)]
pub struct BankClient {
    http: reqwest::Client,
    config: BankConfig,
    token: String,
    decryption_key_pem: Arc<String>,
    /// Stable across every call belonging to one aggregation request.
    reference_id: Uuid,
    from_date: NaiveDate,
    to_date: NaiveDate,
    include_transactions: bool,
}

impl BankClient {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: reqwest::Client,
        config: BankConfig,
        token: String,
        decryption_key_pem: Arc<String>,
        reference_id: Uuid,
        from_date: NaiveDate,
        to_date: NaiveDate,
        include_transactions: bool,
    ) -> Self {
        Self {
            http,
            config,
            token,
            decryption_key_pem,
            reference_id,
            from_date,
            to_date,
            include_transactions,
        }
    }

    /// Runs the full fetch sequence for this bank.
    ///
    /// Returns `Err` only for failures that must be contained (or rethrown)
    /// by the caller at bank granularity: a list-accounts failure, or any
    /// unexpected error escaping account processing.
    pub async fn fetch_bank(&self, subject: &str) -> Result<BankResult, AppError> {
        let accounts = self.list_accounts(subject).await?;
        let normalized = self.process_accounts(subject, accounts).await?;
        let has_errors = normalized.iter().any(|a| a.has_errors);

        Ok(BankResult {
            bank_name: self.config.name.clone(),
            is_implemented: true,
            accounts: normalized,
            has_errors,
        })
    }

    /// Fetches detail and transactions for every listed account, in parallel
    /// or sequentially according to the bank's concurrency policy.
    async fn process_accounts(
        &self,
        subject: &str,
        accounts: Accounts,
    ) -> Result<Vec<NormalizedAccount>, AppError> {
        let mut eligible = Vec::new();
        for summary in accounts.accounts {
            if is_data_not_delivered(&summary.account_reference) {
                tracing::info!(
                    "Data not delivered for account at bank {} ({}), subject {}, reference id {}",
                    self.config.name,
                    self.config.org_no,
                    mask_subject(subject),
                    self.reference_id
                );
                continue;
            }
            eligible.push(summary);
        }

        let mut normalized = Vec::with_capacity(eligible.len());
        match self.config.concurrency {
            ConcurrencyMode::Sequential => {
                // This upstream corrupts concurrent requests; process accounts
                // strictly in list order.
                for summary in eligible {
                    normalized.push(self.process_account(subject, summary).await?);
                }
            }
            ConcurrencyMode::Parallel => {
                let mut handles = Vec::with_capacity(eligible.len());
                for summary in eligible {
                    let client = self.clone();
                    let subject = subject.to_string();
                    handles.push(tokio::spawn(async move {
                        client.process_account(&subject, summary).await
                    }));
                }
                for handle in handles {
                    let account = handle.await.map_err(|e| {
                        AppError::InternalError(format!("Account task failed: {}", e))
                    })??;
                    normalized.push(account);
                }
            }
        }

        Ok(normalized)
    }

    /// Fetches one account's detail and transactions.
    ///
    /// An upstream-class detail failure yields the degraded representation;
    /// an upstream-class transaction failure keeps the balances and drops
    /// only the transaction list. Anything else propagates and fails the
    /// whole bank.
    async fn process_account(
        &self,
        subject: &str,
        summary: AccountSummary,
    ) -> Result<NormalizedAccount, AppError> {
        let details = match self.get_account_detail(&summary).await {
            Ok(details) => details,
            Err(e) if e.is_upstream() => {
                tracing::error!(
                    "Account detail failed for account {} at bank {} ({}), subject {}, error {}, reference id {}, correlation id {}",
                    summary.account_reference,
                    self.config.name,
                    self.config.org_no,
                    mask_subject(subject),
                    e,
                    self.reference_id,
                    e.correlation_id().unwrap_or("-")
                );
                return Ok(mapper::degraded_account(&summary));
            }
            Err(e) => return Err(e),
        };

        let Some(detail) = details.account else {
            tracing::warn!(
                "Account detail response for {} at bank {} carried no account body",
                summary.account_reference,
                self.config.name
            );
            return Ok(mapper::degraded_account(&summary));
        };

        let mut transactions_failed = false;
        let transactions = if self.include_transactions {
            match self.list_transactions(&summary, subject).await {
                Ok(transactions) => Some(transactions.transactions),
                Err(e) if e.is_upstream() => {
                    // Balances were already obtained; degrade only the
                    // transaction list.
                    tracing::error!(
                        "Transactions failed for account {} at bank {} ({}), subject {}, error {}, reference id {}",
                        summary.account_reference,
                        self.config.name,
                        self.config.org_no,
                        mask_subject(subject),
                        e,
                        self.reference_id
                    );
                    transactions_failed = true;
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let mut mapped = mapper::map_account(detail, summary.account_type.clone(), transactions);
        if transactions_failed {
            mapped.has_errors = true;
        }
        Ok(mapped)
    }

    /// Lists the subject's accounts at this bank under its own deadline.
    async fn list_accounts(&self, subject: &str) -> Result<Accounts, AppError> {
        let correlation_id = Uuid::new_v4();
        tracing::info!(
            "Preparing request to {}, audience {}, version {}, reference id {}, correlation id {}, from {} to {}",
            self.config.name,
            self.config.audience,
            self.config.api_version,
            self.reference_id,
            correlation_id,
            self.from_date,
            self.to_date
        );

        let url = format!("{}/accounts", self.config.base_url.trim_end_matches('/'));
        let response = self
            .request(&url, correlation_id, ACCOUNT_LIST_TIMEOUT_SECS)
            .header("CustomerID", subject)
            .header("OwnerOnly", "true")
            .send()
            .await
            .map_err(|e| self.transport_error(e, "list accounts"))?;

        let accounts: Accounts =
            decryption::process_response(response, &self.decryption_key_pem, "list accounts")
                .await?;

        tracing::info!(
            "Found {} accounts for {} in bank {} with reference id {} and correlation id {}",
            accounts.accounts.len(),
            mask_subject(subject),
            self.config.org_no,
            self.reference_id,
            correlation_id
        );

        Ok(accounts)
    }

    /// Fetches one account's full detail under its own deadline.
    async fn get_account_detail(&self, summary: &AccountSummary) -> Result<AccountDetails, AppError> {
        let correlation_id = Uuid::new_v4();
        tracing::info!(
            "Getting account details: bank {} account reference {} reference id {} correlation id {}",
            self.config.name,
            summary.account_reference,
            self.reference_id,
            correlation_id
        );

        let url = format!(
            "{}/accounts/{}",
            self.config.base_url.trim_end_matches('/'),
            summary.account_reference
        );
        let response = self
            .request(&url, correlation_id, ACCOUNT_DETAILS_TIMEOUT_SECS)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "account details"))?;

        decryption::process_response(response, &self.decryption_key_pem, "account details").await
    }

    /// Fetches one account's transactions under its own deadline.
    async fn list_transactions(
        &self,
        summary: &AccountSummary,
        subject: &str,
    ) -> Result<Transactions, AppError> {
        let correlation_id = Uuid::new_v4();
        tracing::info!(
            "Getting transactions: bank {} account reference {} subject {} reference id {} correlation id {}",
            self.config.name,
            summary.account_reference,
            mask_subject(subject),
            self.reference_id,
            correlation_id
        );

        let url = format!(
            "{}/accounts/{}/transactions",
            self.config.base_url.trim_end_matches('/'),
            summary.account_reference
        );
        let response = self
            .request(&url, correlation_id, TRANSACTIONS_TIMEOUT_SECS)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "transactions"))?;

        let transactions: Transactions =
            decryption::process_response(response, &self.decryption_key_pem, "transactions")
                .await?;

        tracing::info!(
            "Retrieved {} transactions for account reference {} at bank {}, correlation id {}",
            transactions.transactions.len(),
            summary.account_reference,
            self.config.name,
            correlation_id
        );

        Ok(transactions)
    }

    fn request(
        &self,
        url: &str,
        correlation_id: Uuid,
        timeout_secs: u64,
    ) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(timeout_secs))
            .header("AccountInfoRequestId", self.reference_id.to_string())
            .header("CorrelationId", correlation_id.to_string())
            // The mandate contains non-ASCII characters and must travel
            // percent-encoded in the query string, not as a header.
            .query(&[
                ("legalMandate", LEGAL_MANDATE.to_string()),
                ("fromDate", self.from_date.format("%Y-%m-%d").to_string()),
                ("toDate", self.to_date.format("%Y-%m-%d").to_string()),
            ])
    }

    fn transport_error(&self, e: reqwest::Error, operation: &str) -> AppError {
        if e.is_timeout() {
            AppError::Timeout {
                operation: format!("{} ({})", operation, self.config.name),
            }
        } else {
            AppError::UpstreamApi {
                status: e.status().map(|s| s.as_u16()),
                correlation_id: None,
                message: format!("{} request to {} failed: {}", operation, self.config.name, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_not_delivered_matches_any_case() {
        assert!(is_data_not_delivered("dataNotDelivered"));
        assert!(is_data_not_delivered("DATANOTDELIVERED"));
        assert!(is_data_not_delivered("datanotdelivered"));
        assert!(is_data_not_delivered("prefix dataNotDelivered suffix"));
    }

    #[test]
    fn ordinary_references_are_not_sentinels() {
        assert!(!is_data_not_delivered("ref-12345"));
        assert!(!is_data_not_delivered("dataDelivered"));
        assert!(!is_data_not_delivered("dataNotDeliveredExtra"));
    }
}
