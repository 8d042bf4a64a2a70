use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Statutory basis for the data request, sent with every upstream call.
pub const LEGAL_MANDATE: &str = "Arveloven \u{a7} 92 f\u{f8}rste ledd og \u{a7} 118, jf. \u{a7} 88 a";

/// The only bank API version permitted for cross-account aggregation.
/// V1 lacks the ownership-restriction capability and is filtered out.
pub const SUPPORTED_API_VERSION: &str = "V2";

/// Returns the loggable prefix of a subject identifier.
///
/// Privacy constraint: never log more than the first 6 characters of a
/// national identity number.
pub fn mask_subject(subject: &str) -> &str {
    match subject.char_indices().nth(6) {
        Some((idx, _)) => &subject[..idx],
        None => subject,
    }
}

/// How account-level calls against one bank may be scheduled.
///
/// Some upstream systems corrupt concurrent requests; those banks are
/// configured for strictly sequential account processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    Parallel,
    Sequential,
}

/// Immutable per-bank configuration, resolved once per request.
#[derive(Debug, Clone)]
pub struct BankConfig {
    pub name: String,
    pub org_no: String,
    pub base_url: String,
    pub api_version: String,
    pub audience: String,
    pub maskinporten_env: String,
    pub concurrency: ConcurrencyMode,
}

// ---------------------------------------------------------------------------
// Bank wire model (decrypted JSON bodies)
// ---------------------------------------------------------------------------

/// Response body of the "list accounts" operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Accounts {
    #[serde(default)]
    pub accounts: Vec<AccountSummary>,
}

/// One account as returned by "list accounts".
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    /// Opaque, bank-scoped id used for follow-up calls.
    pub account_reference: String,
    /// Human-facing account number.
    pub account_identifier: String,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub status: Option<String>,
    pub primary_owner: Option<AccountOwner>,
    pub servicer: Option<Servicer>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOwner {
    pub identifier: Option<Identifier>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Servicer {
    pub identifier: Option<Identifier>,
    pub name: Option<String>,
}

/// Response body of the "get account detail" operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub response_details: Option<ResponseDetails>,
    pub account: Option<AccountDetail>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDetails {
    pub status: Option<String>,
    pub message: Option<String>,
}

/// Full account representation including balance entries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetail {
    pub account_reference: Option<String>,
    pub account_identifier: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub status: Option<String>,
    pub primary_owner: Option<AccountOwner>,
    pub servicer: Option<Servicer>,
    pub balances: Option<Vec<Balance>>,
}

/// One typed balance entry. Well-formed responses carry at most one entry
/// per (type, creditDebitIndicator) pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(rename = "type")]
    pub balance_type: BalanceType,
    pub credit_debit_indicator: CreditOrDebit,
    pub amount: BigDecimal,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum BalanceType {
    #[serde(rename = "availableBalance")]
    AvailableBalance,
    #[serde(rename = "bookedBalance")]
    BookedBalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CreditOrDebit {
    #[serde(rename = "credit")]
    Credit,
    #[serde(rename = "debit")]
    Debit,
}

/// Response body of the "list transactions" operation. Transaction records
/// are bank-defined and passed through unmodified.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transactions {
    #[serde(default)]
    pub transactions: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Normalized internal model (the aggregate response payload)
// ---------------------------------------------------------------------------

/// One account in the unified output shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAccount {
    pub account_number: Option<String>,
    pub account_detail: AccountDetail,
    /// Omitted when transaction inclusion is disabled or the fetch degraded.
    pub transactions: Option<Vec<Value>>,
    pub account_available_balance: BigDecimal,
    pub account_booked_balance: BigDecimal,
    pub has_errors: bool,
}

/// One bank's contribution to the aggregate, successful or not.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankResult {
    pub bank_name: String,
    pub is_implemented: bool,
    pub accounts: Vec<NormalizedAccount>,
    pub has_errors: bool,
}

impl BankResult {
    /// Bank-level failure: no accounts could be retrieved at all.
    pub fn failed(bank_name: impl Into<String>) -> Self {
        Self {
            bank_name: bank_name.into(),
            is_implemented: true,
            accounts: Vec::new(),
            has_errors: true,
        }
    }
}

/// The final aggregated response: exactly one entry per configured bank
/// (minus the empty-bank dedup rule in test mode).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub bank_accounts: Vec<BankResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_subject_takes_first_six_chars() {
        assert_eq!(mask_subject("12345678901"), "123456");
        assert_eq!(mask_subject("1234"), "1234");
        assert_eq!(mask_subject(""), "");
    }

    #[test]
    fn balance_wire_names_round_trip() {
        let json = r#"{
            "type": "availableBalance",
            "creditDebitIndicator": "credit",
            "amount": 100.50,
            "currency": "NOK"
        }"#;
        let balance: Balance = serde_json::from_str(json).unwrap();
        assert_eq!(balance.balance_type, BalanceType::AvailableBalance);
        assert_eq!(balance.credit_debit_indicator, CreditOrDebit::Credit);

        let back = serde_json::to_value(&balance).unwrap();
        assert_eq!(back["type"], "availableBalance");
        assert_eq!(back["creditDebitIndicator"], "credit");
    }

    #[test]
    fn accounts_default_to_empty_list() {
        let accounts: Accounts = serde_json::from_str("{}").unwrap();
        assert!(accounts.accounts.is_empty());
    }
}
